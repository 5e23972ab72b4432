//! Building output records from requested fields.
//!
//! The [`Projector`] turns a filtered, sorted, paginated record into an output
//! record. It works in one of two modes.
//!
//! **Explicit fields.** When an output field list is set, every requested key
//! becomes exactly one output key, in request order:
//!
//! 1. The key is mapped back to its source path through the alias map (a key
//!    no alias targets is its own source path).
//! 2. Parents that carry a `json` cast and still hold a JSON string are decoded
//!    on a scratch copy of the record, once per parent, so dot paths can reach
//!    into them.
//! 3. The source path is resolved (wildcards included) and the cast registered
//!    for the source path is applied.
//! 4. The value is stored under the requested key, `null` if nothing resolved.
//!
//! **Flattening.** Without a field list, nested maps are flattened into
//! dot-joined keys. Each leaf gets the cast registered for its dot path and is
//! stored under its alias if it has one.

use std::borrow::Cow;
use std::collections::HashSet;

use serde_json::Value;

use crate::alias::AliasMap;
use crate::cast::{cast, decode_json, CastRules, EnumMap};
use crate::error::Result;
use crate::path::FieldPath;
use crate::Record;

/// Projects records according to a field list, aliases and cast rules.
#[derive(Debug, Clone, Copy)]
pub struct Projector<'a> {
    pub fields: &'a [FieldPath],
    pub aliases: &'a AliasMap,
    pub casts: &'a CastRules,
    pub enums: &'a EnumMap,
}

impl<'a> Projector<'a> {
    /// Source path for a requested output key.
    pub fn source_of<'k>(&self, key: &'k FieldPath) -> &'k FieldPath
    where
        'a: 'k,
    {
        self.aliases.source_of(key.as_str()).unwrap_or(key)
    }

    /// Projects one record.
    pub fn project(&self, record: &Record) -> Result<Record> {
        if self.fields.is_empty() {
            let mut out = Record::new();
            self.flatten_into(None, record, &mut out)?;
            return Ok(out);
        }

        let sources: Vec<(&FieldPath, &FieldPath)> = self
            .fields
            .iter()
            .map(|key| (key, self.source_of(key)))
            .collect();
        let scratch = decode_json_parents(record, sources.iter().map(|(_, src)| *src), self.casts);

        let mut out = Record::with_capacity(sources.len());
        for (key, source) in sources {
            let value = self.value_at(&scratch, source)?;
            out.insert(key.as_str().to_string(), value);
        }
        Ok(out)
    }

    /// Resolves `source` in an already pre-decoded record and applies its cast.
    fn value_at(&self, record: &Record, source: &FieldPath) -> Result<Value> {
        let raw = source.resolve_in(record).into_owned();
        cast(raw, self.casts.get(source.as_str()), source.as_str(), self.enums)
    }

    /// The cast value an output key (or source path) has in a raw record.
    ///
    /// Used by filtering and sorting, which run before projection.
    pub fn field_value(&self, record: &Record, key: &FieldPath) -> Result<Value> {
        let source = self.source_of(key);
        let scratch = decode_json_parents(record, std::iter::once(source), self.casts);
        self.value_at(&scratch, source)
    }

    fn flatten_into(&self, prefix: Option<&str>, map: &Record, out: &mut Record) -> Result<()> {
        for (key, value) in map {
            let path = match prefix {
                Some(prefix) => format!("{}.{}", prefix, key),
                None => key.clone(),
            };
            match value {
                Value::Object(nested) if !nested.is_empty() => {
                    self.flatten_into(Some(&path), nested, out)?;
                }
                _ => {
                    let value = cast(value.clone(), self.casts.get(&path), &path, self.enums)?;
                    let key = match self.aliases.target_of(&path) {
                        Some(alias) => alias.to_string(),
                        None => path,
                    };
                    out.insert(key, value);
                }
            }
        }
        Ok(())
    }
}

/// Decodes JSON-string parents of nested source paths that carry a `json` cast.
///
/// Returns the record unchanged (borrowed) when nothing needed decoding.
pub(crate) fn decode_json_parents<'r, 'p, I>(
    record: &'r Record,
    sources: I,
    casts: &CastRules,
) -> Cow<'r, Record>
where
    I: IntoIterator<Item = &'p FieldPath>,
{
    let mut scratch = Cow::Borrowed(record);
    let mut decoded: HashSet<&str> = HashSet::new();

    for source in sources {
        let root = source.root();
        if !source.is_nested() || decoded.contains(root) || !casts.is_json(root) {
            continue;
        }
        if !matches!(scratch.get(root), Some(Value::String(_))) {
            continue;
        }
        if let Some(raw) = scratch.to_mut().get_mut(root) {
            *raw = decode_json(raw.take());
        }
        decoded.insert(root);
    }
    scratch
}
