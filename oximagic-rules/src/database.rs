//! JSON rule database model.
//!
//! A database is a tree of [`RuleSpec`]s. Each matcher entry names its type
//! with a `type` tag resolved through a [`MatcherRegistry`]; all literals,
//! byte orders, encodings and patterns are validated when the tree is built,
//! so a database that builds never fails at match time for configuration
//! reasons.
//!
//! ```json
//! {
//!   "name": "example",
//!   "root": {
//!     "name": "pdf",
//!     "matchers": [{ "type": "ubyte", "offset": 0, "value": "0x25" }],
//!     "children": [{
//!       "matchers": [{ "type": "string", "offset": 1, "value": "PDF-" }],
//!       "actions": [
//!         { "action": "mimeType", "value": "application/pdf" },
//!         { "action": "description", "lang": "default", "text": "PDF document" }
//!       ]
//!     }]
//!   }
//! }
//! ```

use crate::action::{Action, SetDescription, SetExtension, SetMimeType, SetProperty};
use crate::charset::Charset;
use crate::comparison::Comparison;
use crate::description::DEFAULT_LANGUAGE;
use crate::matcher::parse_literal;
use crate::node::RuleNode;
use crate::registry::MatcherRegistry;
use crate::result::Value;
use oximagic_core::endian::ByteOrder;
use oximagic_core::error::{OxiMagicError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// A whole rule database.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleDatabase {
    /// Database name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Free-form description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Root node.
    pub root: RuleSpec,
}

impl RuleDatabase {
    /// Parse a database from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| OxiMagicError::rule_database(e.to_string()))
    }

    /// Read and parse a database file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        Self::from_json(&text).map_err(|e| {
            OxiMagicError::rule_database(format!("{}: {e}", path.display()))
        })
    }

    /// Build the rule tree, resolving matcher tags through `registry`.
    pub fn build(&self, registry: &MatcherRegistry) -> Result<RuleNode> {
        let root = self.root.build(registry)?;
        tracing::info!(
            database = self.name.as_deref().unwrap_or("<unnamed>"),
            nodes = root.node_count(),
            "rule database loaded"
        );
        Ok(root)
    }
}

/// One node of the database.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSpec {
    /// Node name for diagnostics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Matchers, all of which must accept.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub matchers: Vec<MatcherSpec>,
    /// Actions run on a match.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<ActionSpec>,
    /// Refinements, first match wins.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RuleSpec>,
}

impl RuleSpec {
    /// Build this subtree.
    pub fn build(&self, registry: &MatcherRegistry) -> Result<RuleNode> {
        self.build_at(registry, "")
    }

    fn build_at(&self, registry: &MatcherRegistry, parent: &str) -> Result<RuleNode> {
        let label = self.name.as_deref().unwrap_or("*");
        let path = if parent.is_empty() {
            label.to_string()
        } else {
            format!("{parent}/{label}")
        };

        let mut node = match &self.name {
            Some(name) => RuleNode::named(name.clone()),
            None => RuleNode::new(),
        };
        for (index, spec) in self.matchers.iter().enumerate() {
            let matcher = registry
                .build(spec)
                .map_err(|e| in_rule(e, &path, &format!("matcher {index} ({})", spec.kind)))?;
            node.push_matcher(matcher);
        }
        for (index, spec) in self.actions.iter().enumerate() {
            let action = spec
                .build()
                .map_err(|e| in_rule(e, &path, &format!("action {index}")))?;
            node.push_action(action);
        }
        for child in &self.children {
            node.push_child(child.build_at(registry, &path)?);
        }
        Ok(node)
    }
}

/// Add the rule path to configuration errors.
fn in_rule(error: OxiMagicError, path: &str, what: &str) -> OxiMagicError {
    match error {
        OxiMagicError::InvalidRule { message } => {
            OxiMagicError::invalid_rule(format!("{path}: {what}: {message}"))
        }
        OxiMagicError::EncodingError { message } => {
            OxiMagicError::invalid_rule(format!("{path}: {what}: {message}"))
        }
        other => other,
    }
}

/// A matcher entry.
///
/// Fields not listed here are kept in [`extra`](Self::extra) for custom
/// matcher factories.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MatcherSpec {
    /// Registry tag, such as `ubyte` or `regexp`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Absolute offset.
    pub offset: u64,
    /// Reference value or pattern.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    /// Bit mask for numeric matchers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask: Option<serde_json::Value>,
    /// `big`, `little` or `native`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_order: Option<String>,
    /// Comparison operator, default `==`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<String>,
    /// Character encoding label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    /// Window size in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<usize>,
    /// Regexp flag names.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<String>,
    /// Extensions for the `extension` matcher.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<String>,
    /// Unrecognized fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl MatcherSpec {
    /// Entry with only a type tag and offset.
    pub fn new(kind: impl Into<String>, offset: u64) -> Self {
        Self {
            kind: kind.into(),
            offset,
            ..Self::default()
        }
    }

    /// Set the value.
    pub fn with_value(mut self, value: impl Into<serde_json::Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// The value as text; numbers are rendered in decimal.
    pub fn value_text(&self) -> Result<String> {
        match &self.value {
            Some(serde_json::Value::String(text)) => Ok(text.clone()),
            Some(serde_json::Value::Number(number)) => Ok(number.to_string()),
            Some(other) => Err(OxiMagicError::invalid_rule(format!(
                "value must be a string or number, got {other}"
            ))),
            None => Err(OxiMagicError::invalid_rule("missing value")),
        }
    }

    /// The value as an integer literal.
    pub fn value_literal(&self) -> Result<i64> {
        literal(self.value.as_ref(), "value")?
            .ok_or_else(|| OxiMagicError::invalid_rule("missing value"))
    }

    /// The mask, if present.
    pub fn mask_literal(&self) -> Result<Option<u32>> {
        literal(self.mask.as_ref(), "mask")?
            .map(|mask| {
                u32::try_from(mask)
                    .map_err(|_| OxiMagicError::invalid_rule(format!("mask {mask} out of range")))
            })
            .transpose()
    }

    /// Parsed comparison, default `==`.
    pub fn comparison(&self) -> Result<Comparison> {
        self.comparison
            .as_deref()
            .map_or(Ok(Comparison::Equals), Comparison::parse)
    }

    /// Parsed byte order, default big-endian.
    pub fn byte_order(&self) -> Result<ByteOrder> {
        self.byte_order
            .as_deref()
            .map_or(Ok(ByteOrder::BigEndian), ByteOrder::parse)
    }

    /// Charset, default ISO-8859-1.
    pub fn charset(&self) -> Result<Charset> {
        self.encoding
            .as_deref()
            .map_or(Ok(Charset::Latin1), Charset::for_label)
    }
}

fn literal(value: Option<&serde_json::Value>, field: &str) -> Result<Option<i64>> {
    match value {
        None => Ok(None),
        Some(serde_json::Value::String(text)) => parse_literal(text).map(Some),
        Some(serde_json::Value::Number(number)) => number
            .as_i64()
            .map(Some)
            .ok_or_else(|| OxiMagicError::invalid_rule(format!("{field} {number} is not an integer"))),
        Some(other) => Err(OxiMagicError::invalid_rule(format!(
            "{field} must be a string or integer, got {other}"
        ))),
    }
}

/// An action entry, tagged by `action`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ActionSpec {
    /// Set the MIME type.
    MimeType {
        /// MIME type.
        value: String,
    },
    /// Set the default extension.
    Extension {
        /// Extension without the dot.
        value: String,
    },
    /// Set a named property.
    Property {
        /// Property key.
        name: String,
        /// String, integer or boolean.
        value: serde_json::Value,
    },
    /// Append a description fragment.
    Description {
        /// Language tag.
        #[serde(default = "default_language")]
        lang: String,
        /// Fragment text.
        text: String,
        /// Discard earlier fragments.
        #[serde(default)]
        replace: bool,
    },
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

impl ActionSpec {
    /// Build the action.
    pub fn build(&self) -> Result<Box<dyn Action>> {
        let action: Box<dyn Action> = match self {
            Self::MimeType { value } => Box::new(SetMimeType(value.clone())),
            Self::Extension { value } => Box::new(SetExtension(value.clone())),
            Self::Property { name, value } => Box::new(SetProperty::new(name.clone(), property_value(value)?)),
            Self::Description {
                lang,
                text,
                replace,
            } => Box::new(SetDescription::new(lang.clone(), text.clone(), *replace)),
        };
        Ok(action)
    }
}

fn property_value(value: &serde_json::Value) -> Result<Value> {
    match value {
        serde_json::Value::String(text) => Ok(Value::Text(text.clone())),
        serde_json::Value::Bool(flag) => Ok(Value::Boolean(*flag)),
        serde_json::Value::Number(number) => number.as_i64().map(Value::Integer).ok_or_else(|| {
            OxiMagicError::invalid_rule(format!("property value {number} is not an integer"))
        }),
        other => Err(OxiMagicError::invalid_rule(format!(
            "property value must be a string, integer or boolean, got {other}"
        ))),
    }
}
