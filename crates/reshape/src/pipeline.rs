//! The pipeline handle.
//!
//! A [`Pipeline`] owns a dataset and a configuration. Setters change the
//! configuration and return `Result<&mut Pipeline, ConfigError>`, so a chain
//! stops at the first rejected call. Terminal operations run the stages below
//! over a fresh copy of the dataset every time:
//!
//! ```text
//! dataset -> filter -> sort -> paginate -> project -> output
//! ```
//!
//! Filtering and sorting see raw records. Fields are looked up through the
//! alias map and cast rules, so `view_count` can be sorted on before
//! projection has renamed `views`. Projection runs last, on the page only.
//!
//! Expansion is not a stage. It rewrites the stored dataset once, and the
//! result persists until the next expansion or [`Pipeline::reset`].
//!
//! # Example
//!
//! ```
//! use reshape::{Dir, NamedCast, Pipeline};
//! use serde_json::json;
//!
//! let mut pipeline = Pipeline::from_value(json!([
//!     {"id": "1", "views": "10"},
//!     {"id": "2", "views": "20"}
//! ]))?;
//!
//! pipeline
//!     .cast("id", NamedCast::Int)?
//!     .cast("views", NamedCast::Int)?
//!     .alias("views", "view_count")?
//!     .fields(["id", "view_count"])?
//!     .order_by("view_count", Dir::Desc)?;
//!
//! assert_eq!(
//!     pipeline.to_json(Default::default())?,
//!     r#"[{"id":2,"view_count":20},{"id":1,"view_count":10}]"#
//! );
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::alias::AliasMap;
use crate::cast::{CastRule, CastRules, EnumMap};
use crate::config::{PipelineConfig, RuleSpec, SortSpec};
use crate::error::{ConfigError, PipelineError, Result};
use crate::expand::Expansion;
use crate::filter::{FilterRule, FilterSet, Logic, PredicateFn, GROUPED};
use crate::log::OperationLog;
use crate::ordering::{sort_records, Dir, SortKey};
use crate::page::paginate;
use crate::path::FieldPath;
use crate::projection::Projector;
use crate::serialize::{self, CsvOptions, JsonOptions};
use crate::Record;

type Setter<'p> = std::result::Result<&'p mut Pipeline, ConfigError>;

/// Everything a terminal operation needs besides the dataset.
#[derive(Debug, Clone, Default)]
struct Settings {
    fields: Vec<FieldPath>,
    aliases: AliasMap,
    casts: CastRules,
    enums: EnumMap,
    filters: FilterSet,
    sort: Vec<SortKey>,
    limit: Option<usize>,
    offset: usize,
}

impl Settings {
    fn projector(&self) -> Projector<'_> {
        Projector {
            fields: &self.fields,
            aliases: &self.aliases,
            casts: &self.casts,
            enums: &self.enums,
        }
    }
}

/// A dataset plus the operations to run over it.
#[derive(Debug, Clone)]
pub struct Pipeline {
    original: Vec<Record>,
    dataset: Vec<Record>,
    expansion: Option<Expansion>,
    settings: Settings,
    log: OperationLog,
    last_error: Option<String>,
}

impl Pipeline {
    // ========================================================================
    // Construction
    // ========================================================================

    /// Creates a pipeline over `records`.
    pub fn new(records: Vec<Record>) -> Self {
        let mut log = OperationLog::default();
        log.record(format!("loaded {} records", records.len()));
        Pipeline {
            original: records.clone(),
            dataset: records,
            expansion: None,
            settings: Settings::default(),
            log,
            last_error: None,
        }
    }

    /// Creates a pipeline from a JSON value.
    ///
    /// Accepts an array of objects, or an object whose values are all objects
    /// (a keyed collection; the keys are dropped). Anything else is
    /// [`PipelineError::InvalidInput`].
    pub fn from_value(value: Value) -> Result<Self> {
        let items: Vec<Value> = match value {
            Value::Array(items) => items,
            Value::Object(map) => map.into_iter().map(|(_, item)| item).collect(),
            other => {
                return Err(PipelineError::InvalidInput(format!(
                    "expected a list of records, got {}",
                    kind_of(&other)
                )))
            }
        };

        let records = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::Object(record) => Ok(record),
                other => Err(PipelineError::InvalidInput(format!(
                    "record {} is {}, not an object",
                    index,
                    kind_of(&other)
                ))),
            })
            .collect::<Result<Vec<Record>>>()?;
        Ok(Pipeline::new(records))
    }

    /// Creates a pipeline from any serializable collection of records.
    pub fn from_serialize<T: Serialize + ?Sized>(data: &T) -> Result<Self> {
        Pipeline::from_value(serde_json::to_value(data)?)
    }

    // ========================================================================
    // Error bookkeeping
    // ========================================================================

    /// Records a rejected setter call and hands the error back.
    fn reject(&mut self, err: ConfigError) -> ConfigError {
        let message = err.to_string();
        self.log.error(message.clone());
        self.last_error = Some(message);
        err
    }

    fn check<T>(
        &mut self,
        result: std::result::Result<T, ConfigError>,
    ) -> std::result::Result<T, ConfigError> {
        result.map_err(|err| self.reject(err))
    }

    fn path(&mut self, raw: &str) -> std::result::Result<FieldPath, ConfigError> {
        self.check(FieldPath::parse(raw))
    }

    // ========================================================================
    // Casts, aliases and enums
    // ========================================================================

    /// Registers a cast for a source path, replacing any earlier one.
    ///
    /// `rule` is a [`NamedCast`](crate::NamedCast), a cast name such as
    /// `"int"`, or a [`CastRule::func`].
    pub fn cast(&mut self, field: &str, rule: impl Into<CastRule>) -> Setter<'_> {
        let path = self.path(field)?;
        let rule = rule.into();
        self.log.record(format!("cast '{}' as {}", path, rule.name()));
        self.settings.casts.insert(path, rule);
        Ok(self)
    }

    /// Registers a caller-supplied transform as the cast for a source path.
    pub fn cast_fn<F>(&mut self, field: &str, f: F) -> Setter<'_>
    where
        F: Fn(&Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.cast(field, CastRule::func(f))
    }

    /// Replaces every cast rule. Nothing changes if any path is invalid.
    pub fn set_casts<I, K, R>(&mut self, casts: I) -> Setter<'_>
    where
        I: IntoIterator<Item = (K, R)>,
        K: AsRef<str>,
        R: Into<CastRule>,
    {
        let parsed = casts
            .into_iter()
            .map(|(field, rule)| Ok((FieldPath::parse(field.as_ref())?, rule.into())))
            .collect::<std::result::Result<CastRules, ConfigError>>();
        let casts = self.check(parsed)?;
        self.log.record(format!("casts replaced ({} rules)", casts.len()));
        self.settings.casts = casts;
        Ok(self)
    }

    /// Outputs the value at `field` under the key `target`.
    pub fn alias(&mut self, field: &str, target: &str) -> Setter<'_> {
        let path = self.path(field)?;
        let target = self.output_key(target)?;
        self.log.record(format!("alias '{}' -> '{}'", path, target));
        self.settings.aliases.insert(path, target);
        Ok(self)
    }

    /// Replaces every alias. Nothing changes if any entry is invalid.
    pub fn set_aliases<I, K, T>(&mut self, aliases: I) -> Setter<'_>
    where
        I: IntoIterator<Item = (K, T)>,
        K: AsRef<str>,
        T: AsRef<str>,
    {
        let parsed = aliases
            .into_iter()
            .map(|(field, target)| {
                let target = target.as_ref();
                if target.is_empty() {
                    return Err(ConfigError::InvalidField(target.to_string()));
                }
                Ok((FieldPath::parse(field.as_ref())?, target.to_string()))
            })
            .collect::<std::result::Result<AliasMap, ConfigError>>();
        let aliases = self.check(parsed)?;
        self.log
            .record(format!("aliases replaced ({} entries)", aliases.len()));
        self.settings.aliases = aliases;
        Ok(self)
    }

    fn output_key(&mut self, key: &str) -> std::result::Result<String, ConfigError> {
        if key.is_empty() {
            return Err(self.reject(ConfigError::InvalidField(key.to_string())));
        }
        Ok(key.to_string())
    }

    /// Registers display labels for the raw values of `field`, used by the
    /// `enum` cast.
    pub fn enum_map<I, K, V>(&mut self, field: &str, labels: I) -> Setter<'_>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let path = self.path(field)?;
        let labels: IndexMap<String, Value> = labels
            .into_iter()
            .map(|(raw, label)| (raw.into(), label.into()))
            .collect();
        self.log
            .record(format!("enum map for '{}' ({} labels)", path, labels.len()));
        self.settings.enums.insert(path, labels);
        Ok(self)
    }

    // ========================================================================
    // Output fields
    // ========================================================================

    /// Sets the output field list, replacing any earlier one.
    ///
    /// Each entry is an output key: an alias target, or a source path
    /// (wildcards allowed). An empty list switches back to flattening.
    pub fn fields<I, S>(&mut self, fields: I) -> Setter<'_>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let fields = self.parse_fields(fields)?;
        self.log.record(format!("fields set: {}", join(&fields)));
        self.settings.fields = fields;
        Ok(self)
    }

    /// Appends to the output field list.
    pub fn add_fields<I, S>(&mut self, fields: I) -> Setter<'_>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let fields = self.parse_fields(fields)?;
        self.log.record(format!("fields added: {}", join(&fields)));
        self.settings.fields.extend(fields);
        Ok(self)
    }

    fn parse_fields<I, S>(&mut self, fields: I) -> std::result::Result<Vec<FieldPath>, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let parsed = fields
            .into_iter()
            .map(|field| {
                let field = field.as_ref();
                FieldPath::parse(field).map_err(|_| {
                    ConfigError::InvalidFieldList(format!("'{}' is not a field path", field))
                })
            })
            .collect();
        self.check(parsed)
    }

    // ========================================================================
    // Filters
    // ========================================================================

    /// Registers a declarative rule for `field`, replacing any earlier rule on
    /// that field.
    pub fn add_filter(&mut self, field: &str, rule: FilterRule) -> Setter<'_> {
        let path = self.path(field)?;
        self.log.record(format!("filter '{}' {}", path, rule));
        self.settings.filters.insert_rule(path, rule);
        Ok(self)
    }

    /// Builds and registers a rule from an operator name and value.
    ///
    /// ```
    /// # use reshape::Pipeline;
    /// let mut pipeline = Pipeline::new(vec![]);
    /// pipeline.filter_by("age", "greaterThan", 18)?;
    /// assert!(pipeline.filter_by("age", "between", 18).is_err());
    /// # Ok::<(), reshape::ConfigError>(())
    /// ```
    pub fn filter_by(&mut self, field: &str, op: &str, value: impl Into<Value>) -> Setter<'_> {
        let rule = FilterRule::new(field, op, value);
        let rule = self.check(rule)?;
        self.add_filter(field, rule)
    }

    /// Replaces every declarative rule. Function filters are kept.
    /// Nothing changes if any entry is invalid.
    pub fn set_filters<I, K>(&mut self, rules: I) -> Setter<'_>
    where
        I: IntoIterator<Item = (K, FilterRule)>,
        K: AsRef<str>,
    {
        let parsed = rules
            .into_iter()
            .map(|(field, rule)| Ok((FieldPath::parse(field.as_ref())?, rule)))
            .collect::<std::result::Result<Vec<_>, ConfigError>>();
        let rules = self.check(parsed)?;
        self.settings.filters.clear_rules();
        self.log.record(format!("filters replaced ({} rules)", rules.len()));
        for (path, rule) in rules {
            self.settings.filters.insert_rule(path, rule);
        }
        Ok(self)
    }

    /// Registers a predicate over raw records.
    ///
    /// Without a name one is generated (`filter_1`, ...). Naming it
    /// [`GROUPED`] makes it the only predicate that decides; see
    /// [`Pipeline::grouped_filter`].
    pub fn add_filter_fn<F>(&mut self, name: Option<&str>, f: F) -> &mut Self
    where
        F: Fn(&Record) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        let f: PredicateFn = std::sync::Arc::new(f);
        let name = self.settings.filters.insert_fn(name, f);
        self.log.record(format!("filter function '{}' registered", name));
        self
    }

    /// Registers the grouped predicate, which alone decides inclusion while
    /// it is registered. Other filters stay registered but are ignored.
    pub fn grouped_filter<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&Record) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        self.add_filter_fn(Some(GROUPED), f)
    }

    /// Removes a filter by name (a rule is named after its field). Returns
    /// whether one was removed.
    pub fn remove_filter(&mut self, name: &str) -> bool {
        let removed = self.settings.filters.remove(name);
        if removed {
            self.log.record(format!("filter '{}' removed", name));
        }
        removed
    }

    /// Sets how filters combine.
    pub fn set_logic(&mut self, logic: Logic) -> &mut Self {
        self.log.record(format!("filter logic {}", logic));
        self.settings.filters.set_logic(logic);
        self
    }

    /// [`Pipeline::set_logic`] from a name, `AND` or `OR` in any case.
    pub fn logic(&mut self, logic: &str) -> Setter<'_> {
        let logic = self.check(logic.parse())?;
        Ok(self.set_logic(logic))
    }

    // ========================================================================
    // Sorting and pagination
    // ========================================================================

    /// Appends a sort key. Earlier keys take precedence.
    pub fn order_by(&mut self, field: &str, direction: Dir) -> Setter<'_> {
        let key = SortKey::new(self.path(field)?, direction);
        self.log.record(format!("order by {}", key));
        self.settings.sort.push(key);
        Ok(self)
    }

    /// [`Pipeline::order_by`] with the direction as text (`asc` or `desc`, any
    /// case).
    pub fn sort_by(&mut self, field: &str, direction: &str) -> Setter<'_> {
        let path = self.path(field)?;
        let direction = self.check(direction.parse::<Dir>())?;
        let key = SortKey::new(path, direction);
        self.log.record(format!("order by {}", key));
        self.settings.sort.push(key);
        Ok(self)
    }

    /// Keeps at most `limit` records. Negative values are rejected.
    pub fn limit(&mut self, limit: i64) -> Setter<'_> {
        let limit =
            self.check(usize::try_from(limit).map_err(|_| ConfigError::NegativeLimit(limit)))?;
        self.log.record(format!("limit {}", limit));
        self.settings.limit = Some(limit);
        Ok(self)
    }

    /// Removes the limit, so the whole (filtered, sorted) set is returned.
    pub fn clear_limit(&mut self) -> &mut Self {
        self.log.record("limit cleared");
        self.settings.limit = None;
        self
    }

    /// Skips the first `offset` records. Only takes effect with a limit set.
    pub fn offset(&mut self, offset: i64) -> Setter<'_> {
        let offset =
            self.check(usize::try_from(offset).map_err(|_| ConfigError::NegativeOffset(offset)))?;
        self.log.record(format!("offset {}", offset));
        self.settings.offset = offset;
        Ok(self)
    }

    // ========================================================================
    // Dataset rewriting
    // ========================================================================

    /// Replaces each record with one record per element of its `list_key`
    /// list, lifting `mapping` (`output key -> path inside the element`) onto
    /// each. See [`Expansion::apply`].
    pub fn expand<I, K, S>(&mut self, list_key: &str, mapping: I) -> Setter<'_>
    where
        I: IntoIterator<Item = (K, S)>,
        K: Into<String>,
        S: AsRef<str>,
    {
        let parsed = mapping
            .into_iter()
            .map(|(output, source)| Ok((output.into(), FieldPath::parse(source.as_ref())?)))
            .collect::<std::result::Result<Vec<_>, ConfigError>>();
        let mapping = self.check(parsed)?;
        self.apply_expansion(Expansion {
            list_key: list_key.to_string(),
            mapping,
        })
    }

    /// Applies a prepared [`Expansion`] to the current dataset.
    pub fn apply_expansion(&mut self, expansion: Expansion) -> Setter<'_> {
        if expansion.list_key.is_empty() {
            return Err(self.reject(ConfigError::InvalidField(String::new())));
        }
        let before = self.dataset.len();
        self.dataset = expansion.apply(&self.dataset);
        self.log.notice(format!(
            "expanded '{}': {} -> {} records",
            expansion.list_key,
            before,
            self.dataset.len()
        ));
        self.expansion = Some(expansion);
        Ok(self)
    }

    /// Clears the configuration, the log and the last error, and restores the
    /// dataset as it was constructed.
    pub fn reset(&mut self) -> &mut Self {
        self.settings = Settings::default();
        self.dataset = self.original.clone();
        self.expansion = None;
        self.last_error = None;
        self.log.clear();
        self.log
            .notice(format!("reset ({} records)", self.dataset.len()));
        self
    }

    // ========================================================================
    // Declarative configuration
    // ========================================================================

    /// Applies a [`PipelineConfig`] through the individual setters.
    ///
    /// Sections are applied in declaration order. The first invalid entry
    /// aborts with its error; entries applied before it remain.
    pub fn apply_config(&mut self, config: &PipelineConfig) -> Setter<'_> {
        if let Some(expansion) = &config.expand {
            self.apply_expansion(expansion.clone())?;
        }
        if !config.fields.is_empty() {
            self.fields(&config.fields)?;
        }
        for (field, target) in &config.aliases {
            self.alias(field, target)?;
        }
        for (field, name) in &config.casts {
            self.cast(field, name.as_str())?;
        }
        for (field, labels) in &config.enums {
            self.enum_map(field, labels.clone())?;
        }
        for (field, spec) in &config.filters {
            match spec {
                RuleSpec::Rule { op, value } => self.filter_by(field, op, value.clone())?,
                RuleSpec::Equals(value) => self.add_filter(field, FilterRule::equals(value.clone()))?,
            };
        }
        self.set_logic(config.logic);
        for key in &config.sort {
            self.sort_by(&key.field, &key.direction)?;
        }
        if let Some(limit) = config.limit {
            self.limit(limit)?;
        }
        if let Some(offset) = config.offset {
            self.offset(offset)?;
        }
        Ok(self)
    }

    /// The declarative part of the current configuration.
    ///
    /// Function filters are omitted and function casts are reported as
    /// `custom`, so the result round-trips only for declarative setups.
    pub fn config(&self) -> PipelineConfig {
        let settings = &self.settings;
        PipelineConfig {
            fields: settings.fields.iter().map(|f| f.to_string()).collect(),
            aliases: settings
                .aliases
                .iter()
                .map(|(source, target)| (source.to_string(), target.to_string()))
                .collect(),
            casts: settings
                .casts
                .iter()
                .map(|(path, rule)| (path.to_string(), rule.name().to_string()))
                .collect(),
            enums: settings
                .enums
                .iter()
                .map(|(path, labels)| (path.to_string(), labels.clone()))
                .collect(),
            filters: settings
                .filters
                .rules()
                .map(|(field, rule)| {
                    let spec = RuleSpec::Rule {
                        op: rule.op().to_string(),
                        value: rule.value().clone(),
                    };
                    (field.to_string(), spec)
                })
                .collect(),
            logic: settings.filters.logic(),
            sort: settings
                .sort
                .iter()
                .map(|key| SortSpec {
                    field: key.field.to_string(),
                    direction: key.direction.to_string(),
                })
                .collect(),
            limit: settings.limit.map(|n| n as i64),
            offset: (settings.offset > 0).then_some(settings.offset as i64),
            expand: self.expansion.clone(),
        }
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Operation log entries, oldest first.
    pub fn log(&self) -> &[String] {
        self.log.entries()
    }

    /// Message of the most recently rejected setter call, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// The stored dataset (after any expansion), before filtering.
    pub fn dataset(&self) -> &[Record] {
        &self.dataset
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Runs filter, sort, paginate and project over the stored dataset.
    pub(crate) fn run(&mut self) -> Result<Vec<Record>> {
        let settings = &self.settings;
        let log = &mut self.log;
        let projector = settings.projector();
        let access = |record: &Record, field: &FieldPath| projector.field_value(record, field);

        let total = self.dataset.len();
        let mut rows = Vec::with_capacity(total);
        for record in &self.dataset {
            if settings.filters.matches(record, &access)? {
                rows.push(record.clone());
            }
        }
        if settings.filters.grouped().is_some() {
            log.record(format!("grouped filter: {} -> {} records", total, rows.len()));
        } else if !settings.filters.is_empty() {
            log.record(format!(
                "filter ({}): {} -> {} records",
                settings.filters.logic(),
                total,
                rows.len()
            ));
        }

        if !settings.sort.is_empty() {
            rows = sort_records(rows, &settings.sort, &access)?;
            log.record(format!("sorted by {}", join(&settings.sort)));
        }

        if let Some(limit) = settings.limit {
            let before = rows.len();
            rows = paginate(rows, settings.offset, Some(limit));
            log.record(format!(
                "paginated (offset {}, limit {}): {} -> {} records",
                settings.offset,
                limit,
                before,
                rows.len()
            ));
        }

        let projected = rows
            .iter()
            .map(|record| projector.project(record))
            .collect::<Result<Vec<Record>>>()?;
        if settings.fields.is_empty() {
            log.record(format!("flattened {} records", projected.len()));
        } else {
            log.record(format!(
                "projected {} records onto {} fields",
                projected.len(),
                settings.fields.len()
            ));
        }
        Ok(projected)
    }

    /// Runs the pipeline and returns the projected records.
    pub fn to_array(&mut self) -> Result<Vec<Record>> {
        self.run()
    }

    /// Runs the pipeline and renders the result as a JSON array.
    pub fn to_json(&mut self, options: JsonOptions) -> Result<String> {
        self.log.record(format!(
            "output json (pretty={}, escape_slashes={})",
            options.pretty, options.escape_slashes
        ));
        let records = self.run()?;
        serialize::to_json(&records, options)
    }

    /// Runs the pipeline and renders the result as CSV. An empty result is an
    /// empty string.
    ///
    /// Options are checked before the pipeline runs; a bad delimiter or
    /// enclosure is recorded like a rejected setter call.
    pub fn to_csv(&mut self, options: CsvOptions) -> Result<String> {
        if let Err(err) = options.validate() {
            return Err(self.reject_arg(err));
        }
        self.log.record(format!(
            "output csv (delimiter {:?}, enclosure {:?})",
            options.delimiter, options.enclosure
        ));
        let records = self.run()?;
        serialize::to_csv(&records, options)
    }

    /// Runs the pipeline and returns the CSV column names.
    pub fn csv_headers(&mut self) -> Result<Vec<String>> {
        self.log.record("output csv headers");
        let records = self.run()?;
        Ok(serialize::csv_headers(&records))
    }

    /// Records a rejected terminal-operation argument and converts it.
    pub(crate) fn reject_arg(&mut self, err: ConfigError) -> PipelineError {
        PipelineError::Config(self.reject(err))
    }
}

fn join<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
