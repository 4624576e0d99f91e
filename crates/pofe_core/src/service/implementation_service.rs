//! Implementation use-case service.
//!
//! # Responsibility
//! - Merge designed file entries into the `implementation` layer.
//! - Give every class, method and function a deterministic uid.
//!
//! # Invariants
//! - File entries are keyed by `component`, falling back to `path`; a later
//!   entry with the same key replaces the earlier one in place.
//! - Stored form is always `{"implementation": {"files": [...]}}`.

use crate::model::extract::file_entry_pointers;
use crate::model::layer::IMPLEMENTATION_LAYER;
use crate::model::relation::merge_related_into;
use crate::model::uid::{make_uid, UidKind};
use crate::repo::document_store::{DocumentStore, StoreResult};
use log::info;
use serde_json::{json, Map, Value};

/// Implementation service facade over a document store.
pub struct ImplementationService<S: DocumentStore> {
    store: S,
}

impl<S: DocumentStore> ImplementationService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns every stored file entry in document order.
    ///
    /// Accepts flat, grouped and top-level `files` shapes.
    pub fn list_file_specs(&self) -> StoreResult<Vec<Value>> {
        if !self.store.exists(IMPLEMENTATION_LAYER)? {
            return Ok(Vec::new());
        }
        let doc = self.store.read(IMPLEMENTATION_LAYER)?;
        Ok(file_entry_pointers(&doc)
            .iter()
            .filter_map(|pointer| doc.pointer(pointer).cloned())
            .collect())
    }

    /// Merges `specs` into the stored file entries and returns the merged
    /// list.
    ///
    /// Non-object specs are skipped.
    pub fn merge_file_specs(&self, specs: Vec<Value>) -> StoreResult<Vec<Value>> {
        let mut files = self.list_file_specs()?;
        let mut replaced = 0;
        let mut added = 0;

        for mut spec in specs.into_iter().filter(Value::is_object) {
            assign_uids(&mut spec);
            let key = file_key(&spec).to_string();
            match files.iter().position(|file| file_key(file) == key) {
                Some(index) => {
                    files[index] = spec;
                    replaced += 1;
                }
                None => {
                    files.push(spec);
                    added += 1;
                }
            }
        }

        let mut doc = if self.store.exists(IMPLEMENTATION_LAYER)? {
            self.store.read(IMPLEMENTATION_LAYER)?
        } else {
            Value::Object(Map::new())
        };
        if let Some(fields) = doc.as_object_mut() {
            fields.remove("files");
            fields.insert(
                "implementation".to_string(),
                json!({ "files": files.clone() }),
            );
        }
        self.store.update(IMPLEMENTATION_LAYER, &doc, false)?;

        info!(
            "event=file_specs_merge module=implementation status=ok replaced={replaced} added={added} total={}",
            files.len()
        );
        Ok(files)
    }
}

fn file_key(file: &Value) -> &str {
    ["component", "path"]
        .iter()
        .find_map(|key| file.get(*key).and_then(Value::as_str))
        .unwrap_or_default()
}

fn assign_uids(file: &mut Value) {
    let path = file
        .get("path")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    if let Some(classes) = file.get_mut("classes").and_then(Value::as_array_mut) {
        for class in classes.iter_mut() {
            let class_name = string_field(class, "name");
            ensure_identity(class, UidKind::Class, &[path.as_str(), class_name.as_str()]);
            if let Some(methods) = class.get_mut("methods").and_then(Value::as_array_mut) {
                for method in methods.iter_mut() {
                    let method_name = string_field(method, "name");
                    ensure_identity(
                        method,
                        UidKind::Method,
                        &[path.as_str(), class_name.as_str(), method_name.as_str()],
                    );
                }
            }
        }
    }

    if let Some(functions) = file.get_mut("functions").and_then(Value::as_array_mut) {
        for function in functions.iter_mut() {
            let name = string_field(function, "name");
            ensure_identity(function, UidKind::Function, &[path.as_str(), name.as_str()]);
        }
    }
}

fn string_field(item: &Value, key: &str) -> String {
    item.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn ensure_identity(item: &mut Value, kind: UidKind, parts: &[&str]) {
    let Some(fields) = item.as_object_mut() else {
        return;
    };
    let has_uid = fields
        .get("uid")
        .and_then(Value::as_str)
        .is_some_and(|uid| !uid.is_empty());
    if !has_uid {
        fields.insert("uid".to_string(), json!(make_uid(kind, parts.iter().copied())));
    }
    merge_related_into(item, std::iter::empty::<&str>());
}
