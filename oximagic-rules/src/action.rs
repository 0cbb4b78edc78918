//! Result mutators run when a node's matchers all pass.

use crate::context::Context;
use crate::result::{DESCRIPTION, EXTENSION, MIME_TYPE, Value};
use std::fmt;

/// A mutation applied to the analysis result.
pub trait Action: fmt::Debug + Send + Sync {
    /// Apply to `ctx`.
    fn perform(&self, ctx: &mut Context<'_>);
}

/// Sets the MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetMimeType(pub String);

impl Action for SetMimeType {
    fn perform(&self, ctx: &mut Context<'_>) {
        ctx.result_mut().set(MIME_TYPE, self.0.as_str());
    }
}

/// Sets the default extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetExtension(pub String);

impl Action for SetExtension {
    fn perform(&self, ctx: &mut Context<'_>) {
        ctx.result_mut().set(EXTENSION, self.0.as_str());
    }
}

/// Sets an arbitrary named property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetProperty {
    /// Property key.
    pub name: String,
    /// Property value.
    pub value: Value,
}

impl SetProperty {
    /// Create a property setter.
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl Action for SetProperty {
    fn perform(&self, ctx: &mut Context<'_>) {
        ctx.result_mut().set(self.name.as_str(), self.value.clone());
    }
}

/// Appends a localized description fragment.
///
/// Fragments accumulate across nodes; see
/// [`Description`](crate::description::Description) for grouping and
/// resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetDescription {
    /// Language tag, or `default`.
    pub language: String,
    /// Fragment text.
    pub text: String,
    /// Discard earlier fragments first.
    pub replace: bool,
}

impl SetDescription {
    /// Create a description fragment.
    pub fn new(language: impl Into<String>, text: impl Into<String>, replace: bool) -> Self {
        Self {
            language: language.into(),
            text: text.into(),
            replace,
        }
    }
}

impl Action for SetDescription {
    fn perform(&self, ctx: &mut Context<'_>) {
        ctx.result_mut()
            .append_description(DESCRIPTION, &self.language, &self.text, self.replace);
    }
}
