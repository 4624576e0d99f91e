//! Per-layer item extraction.
//!
//! # Responsibility
//! - Find every addressable item inside a layer document.
//! - Report each item as a JSON pointer so readers and point-updates share
//!   one walk.
//!
//! # Invariants
//! - Only objects carrying a non-empty string `uid` are reported.
//! - Locations are reported in document order.
//! - Extraction never fails: missing or mistyped containers yield no items.

use crate::model::layer::LayerKind;
use serde_json::Value;

/// Position of one addressable item inside a layer document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemLocation {
    pub uid: String,
    /// RFC 6901 pointer into the layer document.
    pub pointer: String,
}

/// Lists every addressable item of `doc` according to the layer's shape.
pub fn extract_items(kind: LayerKind, doc: &Value) -> Vec<ItemLocation> {
    let mut out = Vec::new();
    match kind {
        LayerKind::Requirements => collect_list(doc, "/requirements", &mut out),
        LayerKind::Architecture => {
            if doc.pointer("/architecture/components").is_some() {
                collect_list(doc, "/architecture/components", &mut out);
            } else {
                collect_list(doc, "/components", &mut out);
            }
        }
        LayerKind::Implementation => {
            for file_pointer in file_entry_pointers(doc) {
                collect_file_entry(doc, &file_pointer, &mut out);
            }
        }
        LayerKind::Ideas => collect_list(doc, "/ideas", &mut out),
        LayerKind::Overview | LayerKind::Custom => {}
    }
    out
}

/// Finds the item with `uid` and returns a mutable handle into `doc`.
pub fn locate_item_mut<'a>(kind: LayerKind, doc: &'a mut Value, uid: &str) -> Option<&'a mut Value> {
    let pointer = extract_items(kind, doc)
        .into_iter()
        .find(|location| location.uid == uid)?
        .pointer;
    doc.pointer_mut(&pointer)
}

/// Pointers to every implementation file entry.
///
/// File entries may sit under `files` or `implementation`, and either key may
/// hold a list of entries or a group object/list that nests further `files`.
pub fn file_entry_pointers(doc: &Value) -> Vec<String> {
    let mut out = Vec::new();
    collect_file_containers(doc, "", &mut out);
    out
}

pub(crate) fn item_uid(item: &Value) -> Option<&str> {
    item.get("uid")
        .and_then(Value::as_str)
        .filter(|uid| !uid.is_empty())
}

fn collect_list(doc: &Value, pointer: &str, out: &mut Vec<ItemLocation>) {
    let Some(items) = doc.pointer(pointer).and_then(Value::as_array) else {
        return;
    };
    for (index, item) in items.iter().enumerate() {
        push_item(item, format!("{pointer}/{index}"), out);
    }
}

fn push_item(item: &Value, pointer: String, out: &mut Vec<ItemLocation>) {
    if let Some(uid) = item_uid(item) {
        out.push(ItemLocation {
            uid: uid.to_string(),
            pointer,
        });
    }
}

fn collect_file_containers(node: &Value, pointer: &str, out: &mut Vec<String>) {
    for key in ["files", "implementation"] {
        let child_pointer = format!("{pointer}/{key}");
        match node.get(key) {
            Some(Value::Array(entries)) => {
                for (index, entry) in entries.iter().enumerate() {
                    let entry_pointer = format!("{child_pointer}/{index}");
                    if is_file_group(entry) {
                        collect_file_containers(entry, &entry_pointer, out);
                    } else if entry.is_object() {
                        out.push(entry_pointer);
                    }
                }
            }
            Some(child @ Value::Object(_)) => {
                collect_file_containers(child, &child_pointer, out);
            }
            _ => {}
        }
    }
}

fn is_file_group(entry: &Value) -> bool {
    entry.get("files").is_some() || entry.get("implementation").is_some()
}

fn collect_file_entry(doc: &Value, file_pointer: &str, out: &mut Vec<ItemLocation>) {
    let Some(file) = doc.pointer(file_pointer) else {
        return;
    };

    if let Some(classes) = file.get("classes").and_then(Value::as_array) {
        for (class_index, class) in classes.iter().enumerate() {
            let class_pointer = format!("{file_pointer}/classes/{class_index}");
            push_item(class, class_pointer.clone(), out);
            // Methods stay addressable even when their class has no uid yet.
            if let Some(methods) = class.get("methods").and_then(Value::as_array) {
                for (method_index, method) in methods.iter().enumerate() {
                    push_item(
                        method,
                        format!("{class_pointer}/methods/{method_index}"),
                        out,
                    );
                }
            }
        }
    }

    if let Some(functions) = file.get("functions").and_then(Value::as_array) {
        for (index, function) in functions.iter().enumerate() {
            push_item(function, format!("{file_pointer}/functions/{index}"), out);
        }
    }
}
