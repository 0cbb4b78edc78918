//! Locale-aware description accumulation.
//!
//! A rule tree describes a match piecemeal: a parent node may set a generic
//! description and a child appends a refinement, each in several languages.
//! [`Description`] collects those fragments in groups. Appending a
//! [`DEFAULT_LANGUAGE`] entry opens a new group, so a rule author writes the
//! default text first and its translations after it. Resolution picks one
//! text per group for the requested locale and joins the groups with `", "`.

use crate::context::Locale;
use std::collections::BTreeMap;

/// Language tag of the fallback text in each group.
pub const DEFAULT_LANGUAGE: &str = "default";

/// Separator between resolved groups.
pub const SEPARATOR: &str = ", ";

/// Grouped, localized description fragments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Description {
    groups: Vec<BTreeMap<String, String>>,
}

impl Description {
    /// Create an empty description.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `text` for `language`, discarding everything so far if
    /// `replace` is set.
    pub fn append(&mut self, language: &str, text: &str, replace: bool) {
        if replace {
            self.groups.clear();
        }
        let language = language.trim().to_ascii_lowercase();
        if language == DEFAULT_LANGUAGE || self.groups.is_empty() {
            self.groups.push(BTreeMap::new());
        }
        if let Some(group) = self.groups.last_mut() {
            group.insert(language, text.to_string());
        }
    }

    /// Number of groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether nothing has been appended.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Resolve to a single string for `locale`.
    ///
    /// Each group contributes its entry for the locale's language, else its
    /// default entry, else nothing. Returns `None` when no group contributes.
    pub fn resolve(&self, locale: &Locale) -> Option<String> {
        let parts: Vec<&str> = self
            .groups
            .iter()
            .filter_map(|group| {
                group
                    .get(locale.language())
                    .or_else(|| group.get(DEFAULT_LANGUAGE))
                    .map(String::as_str)
            })
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(SEPARATOR))
        }
    }
}
