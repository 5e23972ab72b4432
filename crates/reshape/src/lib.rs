//! Reshape - declarative transformation pipeline for loosely-typed records.
//!
//! Reshape takes a dataset of nested, JSON-like records and runs a configured
//! set of operations over it:
//!
//! - Filtering with declarative rules, caller predicates, AND/OR logic
//! - Type casts by source path (`int`, `json`, `date`, custom functions)
//! - Renaming through aliases and projection onto an output field list
//! - Dot-path addressing with list indices and `*` wildcards
//! - Multi-key stable sorting, limit and offset
//! - Expansion of nested lists into one record per element
//! - Aggregations (`count`, `sum`, `group_by`, ...) and JSON/CSV output
//!
//! # Quick Start
//!
//! ```rust
//! use reshape::{Dir, FilterRule, NamedCast, Pipeline};
//! use serde_json::json;
//!
//! let mut posts = Pipeline::from_value(json!([
//!     {"id": 1, "stats": {"views": "120"}, "meta": "{\"author\":\"ann\"}"},
//!     {"id": 2, "stats": {"views": "15"},  "meta": "{\"author\":\"bob\"}"},
//!     {"id": 3, "stats": {"views": "300"}, "meta": "{\"author\":\"ann\"}"}
//! ]))?;
//!
//! posts
//!     .cast("stats.views", NamedCast::Int)?
//!     .cast("meta", NamedCast::Json)?
//!     .alias("stats.views", "views")?
//!     .alias("meta.author", "author")?
//!     .fields(["id", "author", "views"])?
//!     .add_filter("views", FilterRule::new("views", "greaterThan", 100)?)?
//!     .order_by("views", Dir::Desc)?;
//!
//! let rows = posts.to_array()?;
//! assert_eq!(rows.len(), 2);
//! assert_eq!(rows[0]["id"], json!(3));
//! assert_eq!(rows[0]["author"], json!("ann"));
//!
//! assert_eq!(
//!     posts.to_csv(Default::default())?,
//!     "\"id\",\"author\",\"views\"\n\"3\",\"ann\",\"300\"\n\"1\",\"ann\",\"120\""
//! );
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Pipeline Semantics
//!
//! Every terminal operation runs the same stages over the stored dataset:
//!
//! ```text
//! dataset -> filter -> sort -> paginate (only with a limit) -> project
//! ```
//!
//! - **Filter**: a registered `grouped` predicate decides alone; otherwise all
//!   predicates combine with AND (none false) or OR (any true)
//! - **Sort**: values rank by type (null, bool, number or numeric string, text,
//!   list, map), then by value (`"10"` sorts after `9`); ties keep input order
//! - **Project**: with a field list, one output key per requested field (missing
//!   values are `null`); without one, nested maps flatten to dot keys
//!
//! Setters validate their input and return `Result<&mut Pipeline, ConfigError>`.
//! A rejected call leaves the configuration unchanged and is also available
//! through [`Pipeline::last_error`] and [`Pipeline::log`].
//!
//! # Filter Operators
//!
//! | Operator | Matches when the cast field value... |
//! |----------|--------------------------------------|
//! | `equals`, `notEquals` | loosely equals the value (`"1"` equals `1`) |
//! | `greaterThan`, `lessThan`, ... | orders loosely against the value |
//! | `in`, `notIn` | is (strictly) one of the listed values |
//! | `contains`, `startsWith`, `endsWith` | contains the text |
//! | `between` | lies within `[low, high]` inclusive |
//! | `isNull`, `notNull`, `empty`, `notEmpty` | is null or falsy |
//! | `regex` | matches the pattern |

mod aggregate;
mod alias;
mod cast;
mod config;
mod error;
mod expand;
mod filter;
mod log;
mod op;
mod ordering;
mod page;
mod path;
mod pipeline;
mod projection;
mod serialize;
mod value;

/// A record: an ordered map from keys to JSON values.
pub type Record = serde_json::Map<String, serde_json::Value>;

// Re-export public API
pub use aggregate::Sample;
pub use alias::AliasMap;
pub use cast::{cast, parse_datetime, CastFn, CastRule, CastRules, EnumMap, NamedCast};
pub use config::{PipelineConfig, RuleSpec, SortSpec};
pub use error::{ConfigError, PipelineError, Result};
pub use expand::Expansion;
pub use filter::{FilterRule, FilterSet, Logic, Predicate, PredicateFn, GROUPED};
pub use op::FilterOp;
pub use ordering::{compare_by_keys, sort_records, Dir, SortKey};
pub use page::paginate;
pub use path::{resolve, FieldPath, Segment};
pub use pipeline::Pipeline;
pub use projection::Projector;
pub use serialize::{csv_headers, to_csv, to_json, CsvOptions, JsonOptions};
pub use value::{as_number, loose_cmp, loose_eq, sort_cmp, to_number, to_text, truthy, Number};
