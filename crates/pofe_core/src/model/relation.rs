//! `related_to` list handling shared by every layer.
//!
//! # Invariants
//! - Merging is a union that keeps first-seen order and never duplicates.
//! - Non-string entries in a stored `related_to` list are ignored on read and
//!   dropped when the list is rewritten.

use serde_json::Value;

pub const RELATED_TO_FIELD: &str = "related_to";

/// Returns the outbound references declared by `item`.
///
/// A bare string is read as a one-element list.
pub fn related_uids(item: &Value) -> Vec<&str> {
    match item.get(RELATED_TO_FIELD) {
        Some(Value::Array(refs)) => refs.iter().filter_map(Value::as_str).collect(),
        Some(Value::String(single)) => vec![single.as_str()],
        _ => Vec::new(),
    }
}

/// Appends each incoming uid not already present in `existing`.
///
/// Returns the number of uids added.
pub fn merge_related<I, S>(existing: &mut Vec<String>, incoming: I) -> usize
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut added = 0;
    for uid in incoming {
        let uid = uid.as_ref();
        if !existing.iter().any(|present| present == uid) {
            existing.push(uid.to_string());
            added += 1;
        }
    }
    added
}

/// Merges `incoming` into the `related_to` list of an item object in place.
///
/// A missing or malformed list is replaced by a normalized string list.
/// Non-object items are left untouched and report zero additions.
pub fn merge_related_into<I, S>(item: &mut Value, incoming: I) -> usize
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    if !item.is_object() {
        return 0;
    }
    let mut current: Vec<String> = related_uids(item)
        .into_iter()
        .map(str::to_string)
        .collect();
    let Some(object) = item.as_object_mut() else {
        return 0;
    };
    let added = merge_related(&mut current, incoming);
    object.insert(
        RELATED_TO_FIELD.to_string(),
        Value::Array(current.into_iter().map(Value::String).collect()),
    );
    added
}
