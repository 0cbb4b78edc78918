//! OxiMagic CLI - The Oxidized Magic
//!
//! Identifies file content by walking a rule tree over each input.

mod commands;
mod utils;

use clap::{Parser, Subcommand};
use commands::{DetectOptions, ProbeType, cmd_detect, cmd_probe, cmd_rules};
use oximagic_core::endian::ByteOrder;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "oximagic")]
#[command(
    author,
    version,
    about = "The Oxidized Magic - Pure Rust content identification"
)]
#[command(long_about = "
OxiMagic identifies file content by matching magic numbers, strings and
patterns against a tree of rules. A built-in rule database is embedded;
`--rules` loads a JSON database instead.

Examples:
  oximagic detect report.pdf image.png
  oximagic detect --json --progress downloads/*
  cat unknown.bin | oximagic detect -
  oximagic detect --locale de --name data.csv export.tmp
  oximagic probe image.bmp --offset 14 --type u32 --order little
  oximagic probe archive.bin --type bits:4
  oximagic rules --rules custom.json
")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Identify the content of files
    #[command(alias = "d")]
    Detect {
        /// Files to analyze (`-` reads standard input)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output one JSON object per file
        #[arg(short, long)]
        json: bool,

        /// Rule database to use instead of the built-in one
        #[arg(short, long)]
        rules: Option<PathBuf>,

        /// Language for descriptions (defaults to LC_ALL/LC_MESSAGES/LANG)
        #[arg(short = 'L', long)]
        locale: Option<String>,

        /// Filename to state for every input, overriding the real one
        #[arg(short, long)]
        name: Option<String>,

        /// Show progress bar
        #[arg(short = 'P', long)]
        progress: bool,
    },

    /// Read one typed value from a file
    #[command(alias = "p")]
    Probe {
        /// File to read
        file: PathBuf,

        /// Byte offset to read at
        #[arg(short, long, default_value_t = 0)]
        offset: u64,

        /// Value type: u8, i8, u16, i16, u32, i32, u64, i64, f32, f64, bits:N, utf, line
        #[arg(short = 't', long = "type", default_value = "u8")]
        kind: ProbeType,

        /// Byte order for multi-byte values
        #[arg(long, default_value = "big", value_parser = parse_order)]
        order: ByteOrder,
    },

    /// Validate a rule database and print its tree
    #[command(alias = "r")]
    Rules {
        /// Rule database file (built-in database if omitted)
        #[arg(short, long)]
        rules: Option<PathBuf>,

        /// Print the normalized database as JSON
        #[arg(short, long)]
        json: bool,
    },
}

fn parse_order(label: &str) -> Result<ByteOrder, String> {
    ByteOrder::parse(label).map_err(|e| e.to_string())
}

fn main() {
    let cli = Cli::parse();
    utils::init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Detect {
            files,
            json,
            rules,
            locale,
            name,
            progress,
        } => cmd_detect(
            &files,
            &DetectOptions {
                json,
                rules,
                locale,
                name,
                progress,
            },
        ),
        Commands::Probe {
            file,
            offset,
            kind,
            order,
        } => cmd_probe(&file, offset, kind, order),
        Commands::Rules { rules, json } => cmd_rules(rules.as_deref(), json),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
