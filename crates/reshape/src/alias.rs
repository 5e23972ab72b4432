//! Source-path to output-key renames.

use indexmap::IndexMap;

use crate::path::FieldPath;

/// Bidirectional map between source paths and output keys.
///
/// Each source has at most one output key and each output key names at most
/// one source; re-registering either side replaces the older pairing.
#[derive(Debug, Clone, Default)]
pub struct AliasMap {
    by_source: IndexMap<FieldPath, String>,
    by_target: IndexMap<String, FieldPath>,
}

impl AliasMap {
    pub fn insert(&mut self, source: FieldPath, target: String) {
        if let Some(old_target) = self.by_source.shift_remove(source.as_str()) {
            self.by_target.shift_remove(&old_target);
        }
        if let Some(old_source) = self.by_target.shift_remove(&target) {
            self.by_source.shift_remove(old_source.as_str());
        }
        self.by_source.insert(source.clone(), target.clone());
        self.by_target.insert(target, source);
    }

    /// Output key for a source path, if aliased.
    pub fn target_of(&self, source: &str) -> Option<&str> {
        self.by_source.get(source).map(String::as_str)
    }

    /// Source path for an output key, if some alias targets it.
    pub fn source_of(&self, target: &str) -> Option<&FieldPath> {
        self.by_target.get(target)
    }

    pub fn is_empty(&self) -> bool {
        self.by_source.is_empty()
    }

    pub fn len(&self) -> usize {
        self.by_source.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldPath, &str)> {
        self.by_source
            .iter()
            .map(|(source, target)| (source, target.as_str()))
    }
}

impl FromIterator<(FieldPath, String)> for AliasMap {
    fn from_iter<I: IntoIterator<Item = (FieldPath, String)>>(iter: I) -> Self {
        let mut map = AliasMap::default();
        for (source, target) in iter {
            map.insert(source, target);
        }
        map
    }
}
