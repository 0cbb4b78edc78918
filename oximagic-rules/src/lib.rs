//! # OxiMagic Rules
//!
//! Rule-tree evaluation engine for OxiMagic.
//!
//! A rule database is a tree of [`RuleNode`]s. Each node carries matchers
//! (predicates over the stream), actions (writes into the result) and
//! children (refinements). Evaluation walks the tree depth first: a node
//! whose matchers all accept runs its actions and then tries its children
//! until one of them matches.
//!
//! - [`node`]: Tree nodes and the evaluation walk
//! - [`matcher`]: Numeric, string, regexp and text matchers
//! - [`action`]: MIME type, extension, property and description setters
//! - [`context`]: Per-analysis state and diagnostics
//! - [`result`]: Result builder and finalized [`Properties`]
//! - [`database`]: JSON rule database model
//! - [`registry`]: Matcher type tags
//! - [`analyzer`]: [`Analyzer`] façade and the builtin database
//!
//! ## Example
//!
//! ```rust
//! use oximagic_rules::{Analyzer, AnalyzerConfig, Locale};
//!
//! let analyzer = Analyzer::builtin().unwrap();
//! let config = AnalyzerConfig::new().with_locale(Locale::new("de"));
//!
//! let props = analyzer.analyze_bytes(b"%PDF-1.4\n", &config).unwrap();
//! assert_eq!(props.mime_type(), Some("application/pdf"));
//! assert_eq!(props.extension(), Some("pdf"));
//! assert_eq!(props.description(), Some("PDF-Dokument, version 1.x"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod action;
pub mod analyzer;
pub mod charset;
pub mod comparison;
pub mod context;
pub mod database;
pub mod description;
pub mod location;
pub mod matcher;
pub mod node;
pub mod registry;
pub mod result;

// Re-exports for convenience
pub use action::{Action, SetDescription, SetExtension, SetMimeType, SetProperty};
pub use analyzer::{Analyzer, AnalyzerConfig, BUILTIN_RULES};
pub use charset::Charset;
pub use comparison::Comparison;
pub use context::{Context, DiagnosticListener, Locale, TracingListener};
pub use database::{ActionSpec, MatcherSpec, RuleDatabase, RuleSpec};
pub use description::Description;
pub use location::{AbsoluteOffset, Location};
pub use matcher::Matcher;
pub use node::RuleNode;
pub use registry::MatcherRegistry;
pub use result::{Properties, ResultBuilder, Value};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::analyzer::{Analyzer, AnalyzerConfig};
    pub use crate::context::{Context, Locale};
    pub use crate::matcher::Matcher;
    pub use crate::node::RuleNode;
    pub use crate::registry::MatcherRegistry;
    pub use crate::result::Properties;
}
