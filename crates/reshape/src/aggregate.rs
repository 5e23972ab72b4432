//! Aggregations and utilities over the projected result set.
//!
//! Every method runs the whole pipeline first and works on its output, so keys
//! are output keys (after aliasing and casting). Nothing is cached between
//! calls.

use indexmap::IndexMap;
use rand::seq::SliceRandom;
use serde_json::Value;

use crate::error::{ConfigError, PipelineError, Result};
use crate::path::FieldPath;
use crate::pipeline::Pipeline;
use crate::value::{sort_cmp, to_number, to_text, Number};
use crate::Record;

/// Result of [`Pipeline::random`].
#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    /// `n == 1`: a single record, or `None` for an empty result.
    One(Option<Record>),
    /// Any other `n`: up to `n` distinct records.
    Many(Vec<Record>),
}

impl Sample {
    /// Flattens the sample into a list.
    pub fn into_vec(self) -> Vec<Record> {
        match self {
            Sample::One(record) => record.into_iter().collect(),
            Sample::Many(records) => records,
        }
    }
}

impl Pipeline {
    /// Number of records in the result.
    pub fn count(&mut self) -> Result<usize> {
        Ok(self.run()?.len())
    }

    pub fn first(&mut self) -> Result<Option<Record>> {
        Ok(self.run()?.into_iter().next())
    }

    pub fn last(&mut self) -> Result<Option<Record>> {
        Ok(self.run()?.pop())
    }

    /// Picks `n` distinct records uniformly at random.
    ///
    /// The order of a multi-record sample is unspecified.
    pub fn random(&mut self, n: usize) -> Result<Sample> {
        let records = self.run()?;
        let mut rng = rand::thread_rng();
        let mut picked: Vec<Record> = records
            .choose_multiple(&mut rng, n)
            .cloned()
            .collect();
        Ok(if n == 1 {
            Sample::One(picked.pop())
        } else {
            Sample::Many(picked)
        })
    }

    pub fn reverse(&mut self) -> Result<Vec<Record>> {
        let mut records = self.run()?;
        records.reverse();
        Ok(records)
    }

    pub fn shuffle(&mut self) -> Result<Vec<Record>> {
        let mut records = self.run()?;
        records.shuffle(&mut rand::thread_rng());
        Ok(records)
    }

    /// The value under `key` in every record (`null` where absent).
    pub fn pluck(&mut self, key: &str) -> Result<Vec<Value>> {
        Ok(self
            .run()?
            .iter()
            .map(|record| record.get(key).cloned().unwrap_or(Value::Null))
            .collect())
    }

    /// Keeps the records `predicate` accepts.
    pub fn filter<F>(&mut self, predicate: F) -> Result<Vec<Record>>
    where
        F: Fn(&Record) -> anyhow::Result<bool>,
    {
        let mut kept = Vec::new();
        for record in self.run()? {
            if predicate(&record).map_err(PipelineError::Callback)? {
                kept.push(record);
            }
        }
        Ok(kept)
    }

    /// Transforms every record.
    pub fn map<F, T>(&mut self, transform: F) -> Result<Vec<T>>
    where
        F: Fn(Record) -> anyhow::Result<T>,
    {
        self.run()?
            .into_iter()
            .map(|record| transform(record).map_err(PipelineError::Callback))
            .collect()
    }

    /// Sum of `key` over the result. Missing values and non-numbers count as 0.
    pub fn sum(&mut self, key: &str) -> Result<Number> {
        Ok(sum_of(&self.run()?, key))
    }

    /// Mean of `key` over the result, `0.0` for an empty result.
    pub fn avg(&mut self, key: &str) -> Result<f64> {
        let records = self.run()?;
        if records.is_empty() {
            return Ok(0.0);
        }
        Ok(sum_of(&records, key).to_f64() / records.len() as f64)
    }

    /// Smallest value of `key`, ignoring records where it is missing or null.
    pub fn min(&mut self, key: &str) -> Result<Option<Value>> {
        Ok(present(&self.run()?, key).min_by(|a, b| sort_cmp(a, b)).cloned())
    }

    /// Largest value of `key`, ignoring records where it is missing or null.
    pub fn max(&mut self, key: &str) -> Result<Option<Value>> {
        Ok(present(&self.run()?, key).max_by(|a, b| sort_cmp(a, b)).cloned())
    }

    /// Partitions the result by the value at `key`.
    ///
    /// `key` may be a dot path but not a wildcard. Groups appear in
    /// first-occurrence order and are keyed by the value's text form:
    ///
    /// ```text
    /// null, missing  -> ""
    /// false / true   -> "0" / "1"
    /// 2.5, "x"       -> "2.5", "x"
    /// lists, maps    -> compact JSON
    /// ```
    pub fn group_by(&mut self, key: &str) -> Result<IndexMap<String, Vec<Record>>> {
        let path = match FieldPath::parse(key) {
            Ok(path) if !path.has_wildcard() => path,
            _ => return Err(self.reject_arg(ConfigError::InvalidGroupKey(key.to_string()))),
        };

        let mut groups: IndexMap<String, Vec<Record>> = IndexMap::new();
        for record in self.run()? {
            let group = group_key(&path.resolve_in(&record));
            groups.entry(group).or_default().push(record);
        }
        Ok(groups)
    }
}

fn group_key(value: &Value) -> String {
    match value {
        Value::Bool(false) => "0".to_string(),
        other => to_text(other),
    }
}

fn sum_of(records: &[Record], key: &str) -> Number {
    records
        .iter()
        .map(|record| record.get(key).map(to_number).unwrap_or(Number::I64(0)))
        .fold(Number::I64(0), |acc, n| acc + n)
}

fn present<'r>(records: &'r [Record], key: &'r str) -> impl Iterator<Item = &'r Value> {
    records
        .iter()
        .filter_map(move |record| record.get(key))
        .filter(|value| !value.is_null())
}
