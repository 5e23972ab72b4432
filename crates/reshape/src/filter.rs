//! Record predicates and how they combine.
//!
//! A [`FilterSet`] holds named [`Predicate`]s: declarative [`FilterRule`]s bound
//! to a field, or caller-supplied functions over the whole record. It runs in
//! one of two modes:
//!
//! ```text
//! grouped:       match = grouped predicate                (others ignored)
//! combinational: AND -> no predicate is false
//!                OR  -> at least one predicate is true
//!                (no predicates -> every record matches)
//! ```
//!
//! The grouped mode is entered by registering a function under [`GROUPED`].
//! Other predicates stay registered and take effect again once it is removed.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConfigError, PipelineError, Result};
use crate::op::FilterOp;
use crate::path::FieldPath;
use crate::value::{loose_cmp, loose_eq, to_text, truthy};
use crate::Record;

/// Reserved predicate name that switches a [`FilterSet`] to grouped mode.
pub const GROUPED: &str = "grouped";

/// Caller-supplied predicate over a raw record.
pub type PredicateFn = Arc<dyn Fn(&Record) -> anyhow::Result<bool> + Send + Sync>;

/// How the predicates of a [`FilterSet`] combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Logic {
    /// Every predicate must pass.
    #[default]
    #[serde(alias = "and")]
    And,
    /// At least one predicate must pass.
    #[serde(alias = "or")]
    Or,
}

impl FromStr for Logic {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "AND" => Ok(Logic::And),
            "OR" => Ok(Logic::Or),
            _ => Err(ConfigError::InvalidLogic(s.to_string())),
        }
    }
}

impl fmt::Display for Logic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Logic::And => f.write_str("AND"),
            Logic::Or => f.write_str("OR"),
        }
    }
}

/// A declarative `{type, value}` rule.
///
/// The rule is checked against the field's value after its cast rule has been
/// applied. Construction validates the value against the operator: list
/// operators need a list (`between` exactly two items), and `regex` needs a
/// pattern that compiles.
#[derive(Debug, Clone)]
pub struct FilterRule {
    op: FilterOp,
    value: Value,
    regex: Option<Regex>,
}

impl FilterRule {
    /// Creates a rule. `field` is only used for error messages.
    pub fn new(
        field: &str,
        op: impl Into<FilterOp>,
        value: impl Into<Value>,
    ) -> std::result::Result<Self, ConfigError> {
        let op = op.into();
        let value = value.into();
        let invalid = |message: &str| ConfigError::InvalidFilterRule {
            field: field.to_string(),
            message: message.to_string(),
        };

        if op.takes_list() && !value.is_array() {
            return Err(invalid(&format!("'{}' expects a list", op)));
        }
        if op == FilterOp::Between && value.as_array().map(Vec::len) != Some(2) {
            return Err(invalid("'between' expects exactly two bounds"));
        }
        let regex = match (&op, &value) {
            (FilterOp::Regex, Value::String(pattern)) => {
                Some(Regex::new(pattern).map_err(|e| ConfigError::InvalidRegex {
                    field: field.to_string(),
                    message: e.to_string(),
                })?)
            }
            (FilterOp::Regex, _) => return Err(invalid("'regex' expects a pattern string")),
            _ => None,
        };

        Ok(FilterRule { op, value, regex })
    }

    /// Shorthand for an `equals` rule, which never fails validation.
    pub fn equals(value: impl Into<Value>) -> Self {
        FilterRule {
            op: FilterOp::Equals,
            value: value.into(),
            regex: None,
        }
    }

    pub fn op(&self) -> &FilterOp {
        &self.op
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Evaluates this rule against a (cast) field value; missing fields are `null`.
    pub fn matches(&self, field: &Value) -> bool {
        match &self.op {
            FilterOp::Equals => loose_eq(field, &self.value),
            FilterOp::NotEquals => !loose_eq(field, &self.value),
            op @ (FilterOp::GreaterThan
            | FilterOp::GreaterThanOrEqual
            | FilterOp::LessThan
            | FilterOp::LessThanOrEqual) => op
                .eval_ordering(loose_cmp(field, &self.value))
                .unwrap_or(true),
            FilterOp::In => self.list().contains(field),
            FilterOp::NotIn => !self.list().contains(field),
            FilterOp::Contains => to_text(field).contains(&to_text(&self.value)),
            FilterOp::StartsWith => to_text(field).starts_with(&to_text(&self.value)),
            FilterOp::EndsWith => to_text(field).ends_with(&to_text(&self.value)),
            FilterOp::Between => match self.list() {
                [low, high] => loose_cmp(field, low).is_ge() && loose_cmp(field, high).is_le(),
                _ => false,
            },
            FilterOp::IsNull => field.is_null(),
            FilterOp::NotNull => !field.is_null(),
            FilterOp::Empty => !truthy(field),
            FilterOp::NotEmpty => truthy(field),
            FilterOp::Regex => self
                .regex
                .as_ref()
                .is_some_and(|regex| regex.is_match(&to_text(field))),
            FilterOp::Unknown(_) => true,
        }
    }

    fn list(&self) -> &[Value] {
        self.value.as_array().map(Vec::as_slice).unwrap_or(&[])
    }
}

/// `op value`, or just `op` for operators that ignore the value.
impl fmt::Display for FilterRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.op.is_unary() {
            write!(f, "{}", self.op)
        } else {
            write!(f, "{} {}", self.op, self.value)
        }
    }
}

/// A single registered predicate.
#[derive(Clone)]
pub enum Predicate {
    /// Declarative rule on one field.
    Rule { field: FieldPath, rule: FilterRule },
    /// Caller-supplied function over the raw record.
    Func(PredicateFn),
}

impl Predicate {
    /// Wraps a caller-supplied function.
    pub fn func<F>(f: F) -> Self
    where
        F: Fn(&Record) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        Predicate::Func(Arc::new(f))
    }

    /// Evaluates this predicate. `access` yields the cast value of a field.
    pub fn eval<A>(&self, record: &Record, access: &A) -> Result<bool>
    where
        A: Fn(&Record, &FieldPath) -> Result<Value>,
    {
        match self {
            Predicate::Rule { field, rule } => Ok(rule.matches(&access(record, field)?)),
            Predicate::Func(f) => f(record).map_err(PipelineError::Callback),
        }
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Rule { field, rule } => f
                .debug_struct("Rule")
                .field("field", field)
                .field("rule", rule)
                .finish(),
            Predicate::Func(_) => f.write_str("Func(..)"),
        }
    }
}

/// Named predicates plus their combination logic.
///
/// Declarative rules are named after their field, so one field holds one rule.
/// Functions live in their own namespace: a rule on a field called `grouped`
/// never switches the set to grouped mode. Unnamed functions get generated
/// names (`filter_1`, `filter_2`, ...).
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    rules: IndexMap<String, Predicate>,
    functions: IndexMap<String, Predicate>,
    logic: Logic,
    generated: usize,
}

impl FilterSet {
    /// Registers a rule for `field`, replacing any earlier rule on that field.
    pub fn insert_rule(&mut self, field: FieldPath, rule: FilterRule) {
        let name = field.as_str().to_string();
        self.rules.insert(name, Predicate::Rule { field, rule });
    }

    /// Drops every declarative rule, keeping function predicates.
    pub fn clear_rules(&mut self) {
        self.rules.clear();
    }

    /// Registers a function predicate and returns the name it was stored under.
    pub fn insert_fn(&mut self, name: Option<&str>, f: PredicateFn) -> String {
        let name = match name {
            Some(name) => name.to_string(),
            None => loop {
                self.generated += 1;
                let candidate = format!("filter_{}", self.generated);
                if !self.functions.contains_key(&candidate) {
                    break candidate;
                }
            },
        };
        self.functions.insert(name.clone(), Predicate::Func(f));
        name
    }

    /// Removes a predicate by name. Returns `true` if one was removed.
    ///
    /// A function registered under `name` goes first; otherwise the rule on
    /// the field `name` is removed.
    pub fn remove(&mut self, name: &str) -> bool {
        self.functions.shift_remove(name).is_some() || self.rules.shift_remove(name).is_some()
    }

    /// The function registered under [`GROUPED`], if any.
    pub fn grouped(&self) -> Option<&Predicate> {
        self.functions.get(GROUPED)
    }

    pub fn logic(&self) -> Logic {
        self.logic
    }

    pub fn set_logic(&mut self, logic: Logic) {
        self.logic = logic;
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.functions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len() + self.functions.len()
    }

    /// Declarative rules with their fields, in registration order.
    pub fn rules(&self) -> impl Iterator<Item = (&FieldPath, &FilterRule)> {
        self.rules.values().filter_map(|predicate| match predicate {
            Predicate::Rule { field, rule } => Some((field, rule)),
            Predicate::Func(_) => None,
        })
    }

    /// Names of the registered predicates: rules first, then functions.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().chain(self.functions.keys()).map(String::as_str)
    }

    /// Tests whether a record passes the set.
    ///
    /// In combinational mode every predicate is evaluated (no short-circuit),
    /// so caller functions see every record.
    pub fn matches<A>(&self, record: &Record, access: &A) -> Result<bool>
    where
        A: Fn(&Record, &FieldPath) -> Result<Value>,
    {
        if let Some(grouped) = self.grouped() {
            return grouped.eval(record, access);
        }

        let results = self
            .rules
            .values()
            .chain(self.functions.values())
            .map(|predicate| predicate.eval(record, access))
            .collect::<Result<Vec<bool>>>()?;

        Ok(match self.logic {
            _ if results.is_empty() => true,
            Logic::And => !results.contains(&false),
            Logic::Or => results.contains(&true),
        })
    }
}
