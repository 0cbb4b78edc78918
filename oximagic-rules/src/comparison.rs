//! Relational operators used by matchers.

use oximagic_core::error::{OxiMagicError, Result};
use std::cmp::Ordering;
use std::fmt;

/// One of the six comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Comparison {
    /// `==`
    #[default]
    Equals,
    /// `!=`
    NotEquals,
    /// `>`
    Greater,
    /// `>=`
    GreaterOrEqual,
    /// `<`
    Less,
    /// `<=`
    LessOrEqual,
}

impl Comparison {
    /// Parse an operator name or symbol.
    ///
    /// Accepts symbols (`==`, `!=`, `>`, …) as well as names such as
    /// `equals`, `not_equals`, `greater_or_equal` in any case.
    pub fn parse(label: &str) -> Result<Self> {
        let normalized = label.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        let comparison = match normalized.as_str() {
            "=" | "==" | "eq" | "equals" => Self::Equals,
            "!=" | "<>" | "ne" | "not_equals" | "notequals" => Self::NotEquals,
            ">" | "gt" | "greater" => Self::Greater,
            ">=" | "ge" | "greater_or_equal" | "greaterorequal" => Self::GreaterOrEqual,
            "<" | "lt" | "less" => Self::Less,
            "<=" | "le" | "less_or_equal" | "lessorequal" => Self::LessOrEqual,
            _ => {
                return Err(OxiMagicError::invalid_rule(format!(
                    "unknown comparison '{label}'"
                )));
            }
        };
        Ok(comparison)
    }

    /// Whether this is `Equals` or `NotEquals`.
    pub fn is_equality(self) -> bool {
        matches!(self, Self::Equals | Self::NotEquals)
    }

    /// Apply the operator to `actual` and `reference`.
    ///
    /// Ordering operators on values without an ordering (such as NaN)
    /// evaluate to `false`.
    pub fn evaluate<T: PartialOrd + ?Sized>(self, actual: &T, reference: &T) -> bool {
        match self {
            Self::Equals => actual == reference,
            Self::NotEquals => actual != reference,
            _ => match actual.partial_cmp(reference) {
                Some(ordering) => self.accepts(ordering),
                None => false,
            },
        }
    }

    /// Apply the operator to values that only support equality.
    ///
    /// Ordering operators always evaluate to `false`.
    pub fn evaluate_unordered<T: PartialEq + ?Sized>(self, actual: &T, reference: &T) -> bool {
        match self {
            Self::Equals => actual == reference,
            Self::NotEquals => actual != reference,
            _ => false,
        }
    }

    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Self::Equals => ordering == Ordering::Equal,
            Self::NotEquals => ordering != Ordering::Equal,
            Self::Greater => ordering == Ordering::Greater,
            Self::GreaterOrEqual => ordering != Ordering::Less,
            Self::Less => ordering == Ordering::Less,
            Self::LessOrEqual => ordering != Ordering::Greater,
        }
    }

    /// Operator symbol.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Equals => "==",
            Self::NotEquals => "!=",
            Self::Greater => ">",
            Self::GreaterOrEqual => ">=",
            Self::Less => "<",
            Self::LessOrEqual => "<=",
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!(Comparison::parse("==").unwrap(), Comparison::Equals);
        assert_eq!(Comparison::parse("NOT_EQUALS").unwrap(), Comparison::NotEquals);
        assert_eq!(
            Comparison::parse("greater-or-equal").unwrap(),
            Comparison::GreaterOrEqual
        );
        assert_eq!(Comparison::parse("lt").unwrap(), Comparison::Less);
        assert!(Comparison::parse("approximately").is_err());
    }

    #[test]
    fn test_integer_ordering() {
        assert!(Comparison::Greater.evaluate(&5, &3));
        assert!(!Comparison::Greater.evaluate(&3, &3));
        assert!(Comparison::GreaterOrEqual.evaluate(&3, &3));
        assert!(Comparison::Less.evaluate(&-1, &0));
        assert!(Comparison::LessOrEqual.evaluate(&0, &0));
        assert!(Comparison::NotEquals.evaluate(&1, &2));
    }

    #[test]
    fn test_incomparable_is_false() {
        assert!(!Comparison::Less.evaluate(&f64::NAN, &1.0));
        assert!(!Comparison::GreaterOrEqual.evaluate(&f64::NAN, &1.0));
        assert!(Comparison::NotEquals.evaluate(&f64::NAN, &f64::NAN));
    }

    #[test]
    fn test_unordered() {
        assert!(Comparison::Equals.evaluate_unordered(&true, &true));
        assert!(Comparison::NotEquals.evaluate_unordered(&false, &true));
        assert!(!Comparison::Greater.evaluate_unordered(&true, &false));
    }
}
