//! Rules command implementation.

use oximagic_core::error::Result;
use oximagic_rules::{
    ActionSpec, BUILTIN_RULES, MatcherRegistry, MatcherSpec, RuleDatabase, RuleSpec,
};
use std::path::Path;

/// Parse the database at `path`, or the built-in one.
pub fn load_database(path: Option<&Path>) -> Result<RuleDatabase> {
    match path {
        Some(path) => RuleDatabase::from_path(path),
        None => RuleDatabase::from_json(BUILTIN_RULES),
    }
}

pub fn cmd_rules(
    path: Option<&Path>,
    json: bool,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let database = load_database(path)?;
    let root = database.build(&MatcherRegistry::with_builtins())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&database)?);
        return Ok(());
    }

    let source = path
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<built-in>".to_string());
    println!("Database: {}", database.name.as_deref().unwrap_or("<unnamed>"));
    println!("Source: {}", source);
    if let Some(description) = &database.description {
        println!("Description: {}", description);
    }
    println!("Nodes: {}", root.node_count());
    println!();

    let mut lines = Vec::new();
    render_tree(&database.root, 0, &mut lines);
    for line in lines {
        println!("{}", line);
    }
    Ok(())
}

/// One line per node, indented by depth.
fn render_tree(spec: &RuleSpec, depth: usize, out: &mut Vec<String>) {
    let indent = "  ".repeat(depth);
    let name = spec.name.as_deref().unwrap_or("*");
    let matchers: Vec<String> = spec.matchers.iter().map(describe_matcher).collect();
    let mut line = format!("{indent}{name}");
    if !matchers.is_empty() {
        line.push_str(&format!(" [{}]", matchers.join(" && ")));
    }
    if let Some(mime) = spec.actions.iter().find_map(|a| match a {
        ActionSpec::MimeType { value } => Some(value.as_str()),
        _ => None,
    }) {
        line.push_str(&format!(" -> {mime}"));
    }
    out.push(line);

    for child in &spec.children {
        render_tree(child, depth + 1, out);
    }
}

fn describe_matcher(spec: &MatcherSpec) -> String {
    let mut text = format!("{}@{}", spec.kind, spec.offset);
    if let Some(comparison) = &spec.comparison {
        text.push(' ');
        text.push_str(comparison);
    }
    if let Some(value) = &spec.value {
        text.push(' ');
        text.push_str(&value.to_string());
    }
    if !spec.extensions.is_empty() {
        text.push_str(&format!(" {:?}", spec.extensions));
    }
    text
}
