//! Analysis result accumulation.
//!
//! The rule tree writes into a [`ResultBuilder`] while it walks. Most keys
//! hold a plain [`Value`]; the description key holds an open [`Description`]
//! accumulator until [`ResultBuilder::finalize`] resolves it for a locale and
//! produces the caller-facing [`Properties`].

use crate::context::Locale;
use crate::description::Description;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Key of the MIME type property.
pub const MIME_TYPE: &str = "mimeType";

/// Key of the default extension property.
pub const EXTENSION: &str = "extension";

/// Key of the description property.
pub const DESCRIPTION: &str = "description";

/// A property value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Text value.
    Text(String),
    /// Integer value.
    Integer(i64),
    /// Boolean value.
    Boolean(bool),
}

impl Value {
    /// Borrow the text, if this is a text value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// The integer, if this is an integer value.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// The flag, if this is a boolean value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(flag) => Some(*flag),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Boolean(flag) => write!(f, "{flag}"),
        }
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for Value {
    fn from(flag: bool) -> Self {
        Self::Boolean(flag)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Slot {
    Value(Value),
    Description(Description),
}

/// Mutable result map written by actions during a tree walk.
#[derive(Debug, Clone, Default)]
pub struct ResultBuilder {
    slots: BTreeMap<String, Slot>,
}

impl ResultBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` to `value`, overwriting any earlier entry.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.slots.insert(key.into(), Slot::Value(value.into()));
    }

    /// Plain value stored under `key`.
    ///
    /// Open description accumulators are not visible here.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self.slots.get(key) {
            Some(Slot::Value(value)) => Some(value),
            _ => None,
        }
    }

    /// Append a localized fragment to the description stored under `key`.
    ///
    /// A plain value previously stored under `key` is replaced by a fresh
    /// accumulator.
    pub fn append_description(&mut self, key: &str, language: &str, text: &str, replace: bool) {
        let slot = self
            .slots
            .entry(key.to_string())
            .or_insert_with(|| Slot::Description(Description::new()));
        if !matches!(slot, Slot::Description(_)) {
            *slot = Slot::Description(Description::new());
        }
        if let Slot::Description(description) = slot {
            description.append(language, text, replace);
        }
    }

    /// Whether anything has been written under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    /// Number of keys written so far.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Resolve open accumulators for `locale` and produce the final map.
    ///
    /// A description that resolves to nothing for the locale is omitted.
    pub fn finalize(self, locale: &Locale) -> Properties {
        let map = self
            .slots
            .into_iter()
            .filter_map(|(key, slot)| match slot {
                Slot::Value(value) => Some((key, value)),
                Slot::Description(description) => description
                    .resolve(locale)
                    .map(|text| (key, Value::Text(text))),
            })
            .collect();
        Properties(map)
    }
}

/// Finalized analysis result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Properties(BTreeMap<String, Value>);

impl Properties {
    /// Value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Text stored under `key`.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// The MIME type, if any rule set one.
    pub fn mime_type(&self) -> Option<&str> {
        self.get_str(MIME_TYPE)
    }

    /// The default extension, if any rule set one.
    pub fn extension(&self) -> Option<&str> {
        self.get_str(EXTENSION)
    }

    /// The resolved description.
    pub fn description(&self) -> Option<&str> {
        self.get_str(DESCRIPTION)
    }

    /// Iterate over all properties in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no property was set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Unwrap into the underlying map.
    pub fn into_inner(self) -> BTreeMap<String, Value> {
        self.0
    }
}

impl fmt::Display for Properties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mime_type().unwrap_or("unknown"))?;
        if let Some(extension) = self.extension() {
            write!(f, " ({extension})")?;
        }
        if let Some(description) = self.description() {
            write!(f, " {description}")?;
        }
        Ok(())
    }
}
