//! Dot-path addressing into nested records.
//!
//! A [`FieldPath`] is parsed and validated once, when it is registered, and is
//! then resolved against each record with [`FieldPath::resolve`].
//!
//! # Path syntax
//!
//! | Segment | Meaning |
//! |---------|---------|
//! | `name`  | key lookup in a map |
//! | `0`, `12` | position in a list (or the key `"12"` in a map) |
//! | `*`     | every element of the list at this position |
//!
//! A literal key that equals the whole path wins over dot traversal, so a
//! record `{"a.b": 1}` resolves `"a.b"` to `1` without descending. This keeps
//! already-flattened records addressable by the same keys they were written with.
//!
//! # Wildcards
//!
//! `*` resolves the rest of the path against every element and collects the
//! non-null results into a list. When the rest itself contains a wildcard, each
//! per-element list is spliced in, so `items.*.tags.*` yields one flat list.
//!
//! ```
//! use reshape::FieldPath;
//! use serde_json::json;
//!
//! let record = json!({"items": [{"v": 1}, {"v": 2}, {"w": 3}]});
//! let path = FieldPath::parse("items.*.v").unwrap();
//! assert_eq!(path.resolve(&record).into_owned(), json!([1, 2]));
//! ```

use std::borrow::{Borrow, Cow};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;

/// One step of a [`FieldPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Map key.
    Key(String),
    /// List position.
    Index(usize),
    /// Every element of a list.
    Wildcard,
}

impl Segment {
    fn parse(text: &str) -> Segment {
        if text == "*" {
            return Segment::Wildcard;
        }
        // Only canonical integers are positions; "007" stays a key.
        let canonical = text == "0" || (!text.starts_with('0') && !text.is_empty());
        if canonical && text.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(index) = text.parse() {
                return Segment::Index(index);
            }
        }
        Segment::Key(text.to_string())
    }
}

/// A validated, pre-split field path such as `meta.tags.*` or `views`.
///
/// Equality and hashing use the original string, so paths can be looked up in
/// maps by `&str`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldPath {
    raw: String,
    segments: Vec<Segment>,
}

impl FieldPath {
    /// Parses a path, rejecting empty paths and empty segments.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        if raw.is_empty() || raw.split('.').any(str::is_empty) {
            return Err(ConfigError::InvalidField(raw.to_string()));
        }
        let segments = if raw.contains('.') {
            raw.split('.').map(Segment::parse).collect()
        } else {
            vec![Segment::Key(raw.to_string())]
        };
        Ok(FieldPath {
            raw: raw.to_string(),
            segments,
        })
    }

    /// Returns the path as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Returns `true` if the path has more than one segment.
    pub fn is_nested(&self) -> bool {
        self.segments.len() > 1
    }

    /// Returns `true` if any segment is a `*` wildcard.
    pub fn has_wildcard(&self) -> bool {
        self.segments.contains(&Segment::Wildcard)
    }

    /// Returns the text of the first segment.
    pub fn root(&self) -> &str {
        self.raw.split('.').next().unwrap_or(&self.raw)
    }

    /// Resolves this path against a record.
    ///
    /// Anything missing along the way resolves to `null`; resolution never fails.
    pub fn resolve<'a>(&self, record: &'a Value) -> Cow<'a, Value> {
        if let Value::Object(map) = record {
            if let Some(value) = map.get(&self.raw) {
                return Cow::Borrowed(value);
            }
        }
        if !self.is_nested() {
            return Cow::Owned(Value::Null);
        }
        resolve_segments(record, &self.segments).unwrap_or(Cow::Owned(Value::Null))
    }

    /// Resolves this path against a map-shaped record.
    pub fn resolve_in<'a>(&self, record: &'a serde_json::Map<String, Value>) -> Cow<'a, Value> {
        if let Some(value) = record.get(&self.raw) {
            return Cow::Borrowed(value);
        }
        match self.segments.split_first() {
            Some((Segment::Key(key), rest)) if self.is_nested() => record
                .get(key)
                .and_then(|value| resolve_segments(value, rest))
                .unwrap_or(Cow::Owned(Value::Null)),
            Some((Segment::Index(index), rest)) if self.is_nested() => record
                .get(&index.to_string())
                .and_then(|value| resolve_segments(value, rest))
                .unwrap_or(Cow::Owned(Value::Null)),
            // A top-level wildcard walks the record's own values.
            Some((Segment::Wildcard, _)) => {
                resolve_wildcard(record.values(), &self.segments[1..])
                    .unwrap_or(Cow::Owned(Value::Null))
            }
            _ => Cow::Owned(Value::Null),
        }
    }
}

fn resolve_segments<'a>(current: &'a Value, segments: &[Segment]) -> Option<Cow<'a, Value>> {
    let Some((head, rest)) = segments.split_first() else {
        return Some(Cow::Borrowed(current));
    };
    match (head, current) {
        (Segment::Key(key), Value::Object(map)) => {
            map.get(key).and_then(|next| resolve_segments(next, rest))
        }
        (Segment::Index(index), Value::Array(items)) => {
            items.get(*index).and_then(|next| resolve_segments(next, rest))
        }
        (Segment::Index(index), Value::Object(map)) => map
            .get(&index.to_string())
            .and_then(|next| resolve_segments(next, rest)),
        (Segment::Wildcard, Value::Array(items)) => resolve_wildcard(items.iter(), rest),
        (Segment::Wildcard, Value::Object(map)) => resolve_wildcard(map.values(), rest),
        _ => None,
    }
}

fn resolve_wildcard<'a, I>(elements: I, rest: &[Segment]) -> Option<Cow<'a, Value>>
where
    I: Iterator<Item = &'a Value>,
{
    let splice = rest.contains(&Segment::Wildcard);
    let mut collected = Vec::new();
    for element in elements {
        match resolve_segments(element, rest) {
            None => {}
            Some(value) if value.is_null() => {}
            Some(value) => match value.into_owned() {
                Value::Array(items) if splice => collected.extend(items),
                other => collected.push(other),
            },
        }
    }
    Some(Cow::Owned(Value::Array(collected)))
}

/// Resolves a path string against a record.
///
/// An invalid path resolves to `null`, like a missing key.
pub fn resolve(record: &Value, path: &str) -> Value {
    match FieldPath::parse(path) {
        Ok(path) => path.resolve(record).into_owned(),
        Err(_) => Value::Null,
    }
}

impl PartialEq for FieldPath {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for FieldPath {}

impl Hash for FieldPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl Borrow<str> for FieldPath {
    fn borrow(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for FieldPath {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldPath::parse(s)
    }
}

impl TryFrom<String> for FieldPath {
    type Error = ConfigError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        FieldPath::parse(&raw)
    }
}

impl From<FieldPath> for String {
    fn from(path: FieldPath) -> Self {
        path.raw
    }
}
