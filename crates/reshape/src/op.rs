//! Operators for declarative filter rules.
//!
//! The [`FilterOp`] enum names every operator a rule may use. Operator names are
//! parsed leniently: several spellings map to the same operator, and a name
//! that is not recognised becomes [`FilterOp::Unknown`], which lets every record
//! through.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Filter rule operator.
///
/// Operators are grouped by how they compare:
/// - **Loose equality**: `Equals`, `NotEquals` (numbers and numeric strings compare)
/// - **Ordering**: `GreaterThan`, `GreaterThanOrEqual`, `LessThan`, `LessThanOrEqual`, `Between`
/// - **Strict membership**: `In`, `NotIn`
/// - **Text**: `Contains`, `StartsWith`, `EndsWith`, `Regex`
/// - **Presence**: `IsNull`, `NotNull`, `Empty`, `NotEmpty`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FilterOp {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    /// Value is one of a list (strict comparison).
    In,
    /// Value is none of a list (strict comparison).
    NotIn,
    /// Substring match. Also spelled `like`.
    Contains,
    StartsWith,
    EndsWith,
    /// Inclusive `[low, high]` range.
    Between,
    /// Also spelled `null`.
    IsNull,
    /// Also spelled `notNull`.
    NotNull,
    /// Falsy value (`null`, `""`, `"0"`, `0`, `false`, empty container).
    Empty,
    NotEmpty,
    /// Text matches a regular expression.
    Regex,
    /// Unrecognised operator name. Always passes.
    Unknown(String),
}

impl FilterOp {
    /// Parses an operator name. Never fails; see [`FilterOp::Unknown`].
    pub fn parse(name: &str) -> FilterOp {
        match name {
            "equals" | "eq" | "=" | "==" => FilterOp::Equals,
            "notEquals" | "ne" | "!=" | "<>" => FilterOp::NotEquals,
            "greaterThan" | "gt" | ">" => FilterOp::GreaterThan,
            "greaterThanOrEqual" | "gte" | ">=" => FilterOp::GreaterThanOrEqual,
            "lessThan" | "lt" | "<" => FilterOp::LessThan,
            "lessThanOrEqual" | "lte" | "<=" => FilterOp::LessThanOrEqual,
            "in" => FilterOp::In,
            "notIn" => FilterOp::NotIn,
            "like" | "contains" => FilterOp::Contains,
            "startsWith" => FilterOp::StartsWith,
            "endsWith" => FilterOp::EndsWith,
            "between" => FilterOp::Between,
            "null" | "isNull" => FilterOp::IsNull,
            "notNull" | "isNotNull" => FilterOp::NotNull,
            "empty" => FilterOp::Empty,
            "notEmpty" => FilterOp::NotEmpty,
            "regex" | "matches" => FilterOp::Regex,
            other => FilterOp::Unknown(other.to_string()),
        }
    }

    /// Returns the canonical name of this operator.
    pub fn as_str(&self) -> &str {
        match self {
            FilterOp::Equals => "equals",
            FilterOp::NotEquals => "notEquals",
            FilterOp::GreaterThan => "greaterThan",
            FilterOp::GreaterThanOrEqual => "greaterThanOrEqual",
            FilterOp::LessThan => "lessThan",
            FilterOp::LessThanOrEqual => "lessThanOrEqual",
            FilterOp::In => "in",
            FilterOp::NotIn => "notIn",
            FilterOp::Contains => "contains",
            FilterOp::StartsWith => "startsWith",
            FilterOp::EndsWith => "endsWith",
            FilterOp::Between => "between",
            FilterOp::IsNull => "isNull",
            FilterOp::NotNull => "notNull",
            FilterOp::Empty => "empty",
            FilterOp::NotEmpty => "notEmpty",
            FilterOp::Regex => "regex",
            FilterOp::Unknown(name) => name,
        }
    }

    /// Returns `true` if the rule value must be a list (`in`, `notIn`, `between`).
    pub fn takes_list(&self) -> bool {
        matches!(self, FilterOp::In | FilterOp::NotIn | FilterOp::Between)
    }

    /// Returns `true` if the operator ignores the rule value.
    pub fn is_unary(&self) -> bool {
        matches!(
            self,
            FilterOp::IsNull | FilterOp::NotNull | FilterOp::Empty | FilterOp::NotEmpty
        )
    }

    /// Evaluates an ordering operator given the ordering of field vs. rule value.
    ///
    /// Returns `None` for operators that are not ordering-based.
    pub fn eval_ordering(&self, ordering: Ordering) -> Option<bool> {
        match self {
            FilterOp::GreaterThan => Some(ordering == Ordering::Greater),
            FilterOp::GreaterThanOrEqual => Some(ordering != Ordering::Less),
            FilterOp::LessThan => Some(ordering == Ordering::Less),
            FilterOp::LessThanOrEqual => Some(ordering != Ordering::Greater),
            _ => None,
        }
    }
}

impl From<String> for FilterOp {
    fn from(name: String) -> Self {
        FilterOp::parse(&name)
    }
}

impl From<&str> for FilterOp {
    fn from(name: &str) -> Self {
        FilterOp::parse(name)
    }
}

impl From<FilterOp> for String {
    fn from(op: FilterOp) -> Self {
        op.as_str().to_string()
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
