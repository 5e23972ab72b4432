//! Multi-key record ordering.
//!
//! Provides [`Dir`] for sort direction, [`SortKey`] for field-based ordering
//! and [`sort_records`], a stable sort over a list of keys.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConfigError, Result};
use crate::path::FieldPath;
use crate::value::sort_cmp;
use crate::Record;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dir {
    /// Smallest first; nulls lead.
    #[default]
    Asc,
    Desc,
}

impl Dir {
    /// Orients an ascending comparison result.
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Dir::Asc => ordering,
            Dir::Desc => ordering.reverse(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Dir::Asc => "asc",
            Dir::Desc => "desc",
        }
    }
}

impl FromStr for Dir {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(Dir::Asc),
            "desc" => Ok(Dir::Desc),
            _ => Err(ConfigError::InvalidDirection(s.to_string())),
        }
    }
}

impl fmt::Display for Dir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single sort key: a field and a direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: FieldPath,
    #[serde(default, alias = "dir")]
    pub direction: Dir,
}

impl SortKey {
    pub fn new(field: FieldPath, direction: Dir) -> Self {
        SortKey { field, direction }
    }

    /// Compares two values according to this key, using [`sort_cmp`].
    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        self.direction.apply(sort_cmp(a, b))
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.direction)
    }
}

/// Compares two rows of pre-resolved sort values key by key.
///
/// The first key that does not compare equal decides; if all are equal the
/// rows are equal.
pub fn compare_by_keys(a: &[Value], b: &[Value], keys: &[SortKey]) -> Ordering {
    keys.iter()
        .zip(a.iter().zip(b))
        .map(|(key, (x, y))| key.compare(x, y))
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Sorts records by `keys`, keeping the input order of equal records.
///
/// Each record's sort values are resolved once through `access` before
/// sorting, so a failing accessor aborts the sort with its error.
pub fn sort_records<A>(records: Vec<Record>, keys: &[SortKey], access: &A) -> Result<Vec<Record>>
where
    A: Fn(&Record, &FieldPath) -> Result<Value>,
{
    if keys.is_empty() {
        return Ok(records);
    }

    let mut rows = records
        .into_iter()
        .map(|record| {
            let values = keys
                .iter()
                .map(|key| access(&record, &key.field))
                .collect::<Result<Vec<Value>>>()?;
            Ok((values, record))
        })
        .collect::<Result<Vec<(Vec<Value>, Record)>>>()?;

    // `sort_by` is stable
    rows.sort_by(|(a, _), (b, _)| compare_by_keys(a, b, keys));
    Ok(rows.into_iter().map(|(_, record)| record).collect())
}
