//! Offset/limit slicing.

/// Returns `limit` items starting at `offset`.
///
/// Without a limit the input is returned untouched, offset included. An
/// offset past the end yields an empty result.
pub fn paginate<T>(items: Vec<T>, offset: usize, limit: Option<usize>) -> Vec<T> {
    let Some(limit) = limit else {
        return items;
    };
    items.into_iter().skip(offset).take(limit).collect()
}
