//! Rule tree nodes and the evaluation walk.

use crate::action::Action;
use crate::context::Context;
use crate::matcher::Matcher;
use oximagic_core::error::Result;

/// A node of the rule tree.
///
/// Matchers, actions and children are evaluated in declaration order. A node
/// is immutable once built and can be shared between analyses on different
/// threads.
#[derive(Debug, Default)]
pub struct RuleNode {
    name: Option<String>,
    matchers: Vec<Box<dyn Matcher>>,
    actions: Vec<Box<dyn Action>>,
    children: Vec<RuleNode>,
}

impl RuleNode {
    /// Create an empty, anonymous node. It matches everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty node with a name used in diagnostics.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Append a matcher.
    pub fn with_matcher(mut self, matcher: impl Matcher + 'static) -> Self {
        self.matchers.push(Box::new(matcher));
        self
    }

    /// Append an action.
    pub fn with_action(mut self, action: impl Action + 'static) -> Self {
        self.actions.push(Box::new(action));
        self
    }

    /// Append a child.
    pub fn with_child(mut self, child: RuleNode) -> Self {
        self.children.push(child);
        self
    }

    /// Append an already boxed matcher.
    pub fn push_matcher(&mut self, matcher: Box<dyn Matcher>) {
        self.matchers.push(matcher);
    }

    /// Append an already boxed action.
    pub fn push_action(&mut self, action: Box<dyn Action>) {
        self.actions.push(action);
    }

    /// Append a child.
    pub fn push_child(&mut self, child: RuleNode) {
        self.children.push(child);
    }

    /// Name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Matchers in evaluation order.
    pub fn matchers(&self) -> &[Box<dyn Matcher>] {
        &self.matchers
    }

    /// Actions in execution order.
    pub fn actions(&self) -> &[Box<dyn Action>] {
        &self.actions
    }

    /// Children in trial order.
    pub fn children(&self) -> &[RuleNode] {
        &self.children
    }

    /// Number of nodes in this subtree, including this one.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(RuleNode::node_count).sum::<usize>()
    }

    fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("<anonymous>")
    }

    /// Evaluate this subtree against `ctx`.
    ///
    /// 1. All matchers must accept, else the node fails without side effects.
    /// 2. The actions run in order.
    /// 3. Children are tried in order until one matches.
    /// 4. The node reports a match whether or not a child matched.
    ///
    /// A matcher error is a non-match unless it is a stream contract
    /// violation, which is returned to the caller.
    pub fn analyze(&self, ctx: &mut Context<'_>) -> Result<bool> {
        for matcher in &self.matchers {
            match matcher.matches(ctx) {
                Ok(true) => {}
                Ok(false) => {
                    tracing::trace!(node = self.label(), "no match");
                    return Ok(false);
                }
                Err(e) if e.is_contract_violation() => return Err(e),
                Err(e) => {
                    tracing::debug!(
                        node = self.label(),
                        matcher = ?matcher,
                        error = %e,
                        "matcher failed; treated as no match"
                    );
                    ctx.info(self.label(), &format!("matcher failed: {e}"));
                    return Ok(false);
                }
            }
        }

        tracing::trace!(node = self.label(), "matched");
        for action in &self.actions {
            action.perform(ctx);
        }

        for child in &self.children {
            if child.analyze(ctx)? {
                break;
            }
        }
        Ok(true)
    }
}
