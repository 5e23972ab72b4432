//! Declarative pipeline configuration.
//!
//! A [`PipelineConfig`] describes a whole pipeline setup as data, so it can be
//! kept in a JSON or YAML file and applied with
//! [`Pipeline::apply_config`](crate::Pipeline::apply_config).
//!
//! ```yaml
//! fields: [id, view_count, meta.author]
//! aliases:
//!   views: view_count
//! casts:
//!   views: int
//!   meta: json
//! filters:
//!   status: active              # shorthand for equals
//!   views: { type: greaterThan, value: 10 }
//! logic: AND
//! sort:
//!   - { field: view_count, direction: desc }
//! limit: 20
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::expand::Expansion;
use crate::filter::Logic;

/// A filter entry: a full `{type, value}` rule or a bare value meaning `equals`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleSpec {
    Rule {
        #[serde(rename = "type")]
        op: String,
        #[serde(default)]
        value: Value,
    },
    Equals(Value),
}

/// One sort entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    #[serde(default = "default_direction", alias = "dir")]
    pub direction: String,
}

fn default_direction() -> String {
    "asc".to_string()
}

/// Whole-pipeline configuration. Every section is optional.
///
/// Paths and names are kept as plain strings here and validated when applied,
/// so a bad entry surfaces as the same [`ConfigError`](crate::ConfigError) a
/// setter call would produce.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub fields: Vec<String>,
    /// Source path to output key.
    pub aliases: IndexMap<String, String>,
    /// Source path to cast name.
    pub casts: IndexMap<String, String>,
    /// Source path to `{raw value: label}`.
    pub enums: IndexMap<String, IndexMap<String, Value>>,
    pub filters: IndexMap<String, RuleSpec>,
    pub logic: Logic,
    pub sort: Vec<SortSpec>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub expand: Option<Expansion>,
}

impl PipelineConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }
}
