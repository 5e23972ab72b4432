//! Exploding records that hold a nested list into one record per element.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::path::FieldPath;
use crate::Record;

/// How to expand a dataset: which list to explode and which nested keys to lift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expansion {
    /// Top-level key holding the nested list.
    pub list_key: String,
    /// `(output key, nested source path)` pairs copied from each element.
    #[serde(default, with = "pairs")]
    pub mapping: Vec<(String, FieldPath)>,
}

impl Expansion {
    /// Expands a dataset.
    ///
    /// Records whose list is missing, not a list, or empty are dropped. Every
    /// other record yields one record per element: the parent without the list
    /// key, plus each mapped key taken from the element (`null` if absent).
    /// Output is parent-major, then in list order.
    pub fn apply(&self, dataset: &[Record]) -> Vec<Record> {
        let mut expanded = Vec::new();
        for record in dataset {
            let Some(Value::Array(items)) = record.get(&self.list_key) else {
                continue;
            };
            let mut parent = record.clone();
            parent.shift_remove(&self.list_key);

            for item in items {
                let mut row = parent.clone();
                for (output, source) in &self.mapping {
                    let value = match item {
                        Value::Object(map) => source.resolve_in(map).into_owned(),
                        _ => Value::Null,
                    };
                    row.insert(output.clone(), value);
                }
                expanded.push(row);
            }
        }
        expanded
    }
}

/// Serializes the mapping as an ordered `{output: source}` object.
mod pairs {
    use indexmap::IndexMap;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::path::FieldPath;

    pub fn serialize<S: Serializer>(
        pairs: &[(String, FieldPath)],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let map: IndexMap<&str, &str> = pairs
            .iter()
            .map(|(output, source)| (output.as_str(), source.as_str()))
            .collect();
        map.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<(String, FieldPath)>, D::Error> {
        let map = IndexMap::<String, FieldPath>::deserialize(deserializer)?;
        Ok(map.into_iter().collect())
    }
}
