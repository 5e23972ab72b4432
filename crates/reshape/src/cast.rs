//! Value casting by source path.
//!
//! A [`CastRule`] is either one of the built-in [`NamedCast`]s or a
//! caller-supplied function. Rules are registered per source path (before any
//! alias is applied) and are dispatched with a single match in [`cast`].
//!
//! | Cast | Result |
//! |------|--------|
//! | `int` | integer, non-numeric strings become `0` |
//! | `float` | float, non-numeric strings become `0.0` |
//! | `string` | text (`null` is `""`, `true` is `"1"`) |
//! | `bool` | truthiness |
//! | `json` | decoded JSON for strings; malformed text becomes `null` |
//! | `date` | `YYYY-MM-DD` |
//! | `datetime` / `timestamp` | `YYYY-MM-DD HH:MM:SS` |
//! | `enum` | label from the [`EnumMap`], or the raw value |
//!
//! Unknown cast names are kept as [`CastRule::Unknown`] and leave values untouched.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use serde_json::Value;

use crate::error::{PipelineError, Result};
use crate::path::FieldPath;
use crate::value::{numeric_str, to_number, to_text, truthy};

/// Caller-supplied transform used as a cast.
pub type CastFn = Arc<dyn Fn(&Value) -> anyhow::Result<Value> + Send + Sync>;

/// Built-in casts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedCast {
    Int,
    Float,
    String,
    Bool,
    Json,
    Date,
    /// Also registered as `timestamp`.
    DateTime,
    Enum,
}

impl NamedCast {
    pub fn as_str(self) -> &'static str {
        match self {
            NamedCast::Int => "int",
            NamedCast::Float => "float",
            NamedCast::String => "string",
            NamedCast::Bool => "bool",
            NamedCast::Json => "json",
            NamedCast::Date => "date",
            NamedCast::DateTime => "datetime",
            NamedCast::Enum => "enum",
        }
    }
}

impl FromStr for NamedCast {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "int" | "integer" => Ok(NamedCast::Int),
            "float" | "double" => Ok(NamedCast::Float),
            "string" => Ok(NamedCast::String),
            "bool" | "boolean" => Ok(NamedCast::Bool),
            "json" => Ok(NamedCast::Json),
            "date" => Ok(NamedCast::Date),
            "datetime" | "timestamp" => Ok(NamedCast::DateTime),
            "enum" => Ok(NamedCast::Enum),
            _ => Err(()),
        }
    }
}

impl fmt::Display for NamedCast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cast registered for a field path.
#[derive(Clone)]
pub enum CastRule {
    Named(NamedCast),
    /// A cast name that is not recognised. Values pass through unchanged.
    Unknown(String),
    Func(CastFn),
}

impl CastRule {
    /// Builds a rule from a cast name; unknown names are kept, not rejected.
    pub fn from_name(name: &str) -> Self {
        match name.parse() {
            Ok(named) => CastRule::Named(named),
            Err(()) => CastRule::Unknown(name.to_string()),
        }
    }

    /// Wraps a caller-supplied transform.
    pub fn func<F>(f: F) -> Self
    where
        F: Fn(&Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        CastRule::Func(Arc::new(f))
    }

    /// The cast's name. Function casts report `custom`.
    pub fn name(&self) -> &str {
        match self {
            CastRule::Named(named) => named.as_str(),
            CastRule::Unknown(name) => name,
            CastRule::Func(_) => "custom",
        }
    }

    /// Returns `true` for the `json` cast.
    pub fn is_json(&self) -> bool {
        matches!(self, CastRule::Named(NamedCast::Json))
    }
}

impl fmt::Debug for CastRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CastRule::Named(named) => write!(f, "Named({})", named),
            CastRule::Unknown(name) => write!(f, "Unknown({})", name),
            CastRule::Func(_) => f.write_str("Func(..)"),
        }
    }
}

impl From<NamedCast> for CastRule {
    fn from(named: NamedCast) -> Self {
        CastRule::Named(named)
    }
}

impl From<&str> for CastRule {
    fn from(name: &str) -> Self {
        CastRule::from_name(name)
    }
}

/// Cast rules keyed by source path.
#[derive(Debug, Clone, Default)]
pub struct CastRules {
    rules: IndexMap<FieldPath, CastRule>,
}

impl CastRules {
    pub fn insert(&mut self, path: FieldPath, rule: CastRule) {
        self.rules.insert(path, rule);
    }

    pub fn get(&self, path: &str) -> Option<&CastRule> {
        self.rules.get(path)
    }

    /// Returns `true` if `path` has the `json` cast.
    pub fn is_json(&self, path: &str) -> bool {
        self.get(path).is_some_and(CastRule::is_json)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldPath, &CastRule)> {
        self.rules.iter()
    }
}

impl FromIterator<(FieldPath, CastRule)> for CastRules {
    fn from_iter<I: IntoIterator<Item = (FieldPath, CastRule)>>(iter: I) -> Self {
        CastRules {
            rules: iter.into_iter().collect(),
        }
    }
}

/// Display labels for raw values, per field path. Used by the `enum` cast.
///
/// Raw values are matched by their text form, so `1` and `"1"` share a label.
#[derive(Debug, Clone, Default)]
pub struct EnumMap {
    labels: IndexMap<FieldPath, IndexMap<String, Value>>,
}

impl EnumMap {
    /// Registers (or replaces) the labels for a path.
    pub fn insert(&mut self, path: FieldPath, labels: IndexMap<String, Value>) {
        self.labels.insert(path, labels);
    }

    /// Looks up the label for a raw value at `path`.
    pub fn lookup(&self, path: &str, raw: &Value) -> Option<&Value> {
        self.labels.get(path)?.get(&to_text(raw))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldPath, &IndexMap<String, Value>)> {
        self.labels.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Applies `rule` to `value`. With no rule the value is returned as is.
///
/// Only a failing [`CastRule::Func`] produces an error.
pub fn cast(value: Value, rule: Option<&CastRule>, path: &str, enums: &EnumMap) -> Result<Value> {
    let Some(rule) = rule else {
        return Ok(value);
    };
    match rule {
        CastRule::Func(f) => f(&value).map_err(PipelineError::Callback),
        CastRule::Unknown(_) => Ok(value),
        CastRule::Named(named) => Ok(apply_named(*named, value, path, enums)),
    }
}

fn apply_named(named: NamedCast, value: Value, path: &str, enums: &EnumMap) -> Value {
    match named {
        NamedCast::Int => Value::from(to_number(&value).to_i64()),
        NamedCast::Float => Value::from(to_number(&value).to_f64()),
        NamedCast::String => Value::String(to_text(&value)),
        NamedCast::Bool => Value::Bool(truthy(&value)),
        NamedCast::Json => decode_json(value),
        NamedCast::Date => format_datetime(&value, "%Y-%m-%d"),
        NamedCast::DateTime => format_datetime(&value, "%Y-%m-%d %H:%M:%S"),
        NamedCast::Enum => match enums.lookup(path, &value) {
            Some(label) => label.clone(),
            None => value,
        },
    }
}

/// Decodes a JSON string. Values that are already structured pass through.
pub(crate) fn decode_json(value: Value) -> Value {
    match value {
        Value::String(text) => serde_json::from_str(&text).unwrap_or(Value::Null),
        other => other,
    }
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d-%m-%Y"];

/// Parses a date/time from a string or a Unix timestamp in seconds.
///
/// Offsets in RFC 3339 input are kept as written (the wall-clock time is used).
pub fn parse_datetime(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::Number(n) => from_unix(n.as_f64()?),
        Value::String(s) => {
            let s = s.trim();
            if let Some(n) = numeric_str(s) {
                return from_unix(n.to_f64());
            }
            if let Ok(parsed) = DateTime::parse_from_rfc3339(s) {
                return Some(parsed.naive_local());
            }
            DATETIME_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
                .or_else(|| {
                    DATE_FORMATS
                        .iter()
                        .find_map(|format| NaiveDate::parse_from_str(s, format).ok())
                        .and_then(|date| date.and_hms_opt(0, 0, 0))
                })
        }
        _ => None,
    }
}

fn from_unix(secs: f64) -> Option<NaiveDateTime> {
    if !secs.is_finite() {
        return None;
    }
    DateTime::from_timestamp(secs.trunc() as i64, 0).map(|dt| dt.naive_utc())
}

fn format_datetime(value: &Value, format: &str) -> Value {
    match parse_datetime(value) {
        Some(parsed) => Value::String(parsed.format(format).to_string()),
        None => Value::Null,
    }
}
