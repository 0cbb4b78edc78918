//! Detect command implementation.

use super::rules::load_database;
use crate::utils::create_progress_bar;
use oximagic_core::error::Result;
use oximagic_core::reaper::{Reaper, ResourceReaper};
use oximagic_rules::{Analyzer, AnalyzerConfig, Locale, MatcherRegistry, Properties};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Path that selects standard input.
const STDIN_PATH: &str = "-";

/// Flags for `oximagic detect`.
#[derive(Debug, Default)]
pub struct DetectOptions {
    pub json: bool,
    pub rules: Option<PathBuf>,
    pub locale: Option<String>,
    pub name: Option<String>,
    pub progress: bool,
}

#[derive(Serialize)]
struct DetectionJson<'a> {
    file: String,
    #[serde(flatten)]
    properties: Option<&'a Properties>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub fn cmd_detect(
    files: &[PathBuf],
    options: &DetectOptions,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let database = load_database(options.rules.as_deref())?;
    let analyzer = Analyzer::from_database(&database, &MatcherRegistry::with_builtins())?;

    let locale = options
        .locale
        .as_deref()
        .map(Locale::new)
        .unwrap_or_else(Locale::from_env);
    let mut config = AnalyzerConfig::new().with_locale(locale);
    if let Some(name) = &options.name {
        config = config.with_stated_name(name.clone());
    }

    let reaper = ResourceReaper::spawn()?;
    let shared: Arc<dyn Reaper> = reaper.clone();

    let pb = create_progress_bar(files.len() as u64, options.progress);
    let outcomes = analyze_all(files, |path| {
        let outcome = detect_one(&analyzer, path, &shared, &config);
        pb.inc(1);
        outcome
    });
    pb.finish_and_clear();

    let mut failures = 0usize;
    for (path, outcome) in files.iter().zip(&outcomes) {
        if outcome.is_err() {
            failures += 1;
        }
        if options.json {
            println!("{}", render_json(path, outcome)?);
        } else {
            match outcome {
                Ok(props) => println!("{}: {}", path.display(), props),
                Err(e) => eprintln!("{}: {}", path.display(), e),
            }
        }
    }

    reaper.wait_idle();
    reaper.shutdown();

    if failures > 0 {
        return Err(format!("{} of {} inputs could not be analyzed", failures, files.len()).into());
    }
    Ok(())
}

/// Classify one input: a file, or stdin for `-`.
fn detect_one(
    analyzer: &Analyzer,
    path: &Path,
    reaper: &Arc<dyn Reaper>,
    config: &AnalyzerConfig,
) -> Result<Properties> {
    if path.as_os_str() == STDIN_PATH {
        analyzer.analyze_reader(io::stdin().lock(), config)
    } else {
        analyzer.analyze_path(path, Arc::clone(reaper), config)
    }
}

#[cfg(feature = "parallel")]
fn analyze_all<F>(files: &[PathBuf], f: F) -> Vec<Result<Properties>>
where
    F: Fn(&Path) -> Result<Properties> + Sync + Send,
{
    files.par_iter().map(|path| f(path.as_path())).collect()
}

#[cfg(not(feature = "parallel"))]
fn analyze_all<F>(files: &[PathBuf], f: F) -> Vec<Result<Properties>>
where
    F: Fn(&Path) -> Result<Properties>,
{
    files.iter().map(|path| f(path.as_path())).collect()
}

fn render_json(path: &Path, outcome: &Result<Properties>) -> serde_json::Result<String> {
    let record = match outcome {
        Ok(props) => DetectionJson {
            file: path.display().to_string(),
            properties: Some(props),
            error: None,
        },
        Err(e) => DetectionJson {
            file: path.display().to_string(),
            properties: None,
            error: Some(e.to_string()),
        },
    };
    serde_json::to_string(&record)
}
