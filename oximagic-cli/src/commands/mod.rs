//! Command implementations for OxiMagic CLI.

pub mod detect;
pub mod probe;
pub mod rules;

pub use detect::{DetectOptions, cmd_detect};
pub use probe::{ProbeType, cmd_probe};
pub use rules::cmd_rules;
