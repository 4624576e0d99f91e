//! Architecture use-case service.
//!
//! # Responsibility
//! - Apply component create/update/delete suggestions to the `architecture`
//!   layer.
//! - Report which components changed so implementation design can follow.
//!
//! # Invariants
//! - Components are addressed by their `component` name.
//! - Every stored component carries a `uid` and a `related_to` list.

use crate::model::layer::ARCHITECTURE_LAYER;
use crate::model::relation::{merge_related_into, related_uids, RELATED_TO_FIELD};
use crate::model::uid::{make_uid, UidKind};
use crate::repo::document_store::{DocumentStore, StoreResult};
use log::{info, warn};
use serde_json::{json, Value};

const NAME_FIELD: &str = "component";

/// Architecture service facade over a document store.
pub struct ArchitectureService<S: DocumentStore> {
    store: S,
}

impl<S: DocumentStore> ArchitectureService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the stored architecture object.
    ///
    /// Falls back to `{"components": [], "behaviors": []}` when the layer is
    /// absent or malformed.
    pub fn get_architecture(&self) -> StoreResult<Value> {
        if !self.store.exists(ARCHITECTURE_LAYER)? {
            return Ok(empty_architecture());
        }
        let doc = self.store.read(ARCHITECTURE_LAYER)?;
        Ok(doc
            .get("architecture")
            .filter(|architecture| architecture.is_object())
            .cloned()
            .unwrap_or_else(empty_architecture))
    }

    /// Applies `[{"action": ..., "component": {...}}]` and returns the names
    /// of affected components in change order.
    ///
    /// - `create` skips names that already exist.
    /// - `update` unions `related_to` with the stored component and replaces
    ///   the rest; a missing name is appended.
    /// - `delete` removes every component with that name.
    pub fn apply_component_changes(&self, changes: &[Value]) -> StoreResult<Vec<String>> {
        let mut architecture = self.get_architecture()?;
        let mut components: Vec<Value> = architecture
            .get("components")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let mut affected = Vec::new();

        for change in changes {
            let action = change.get("action").and_then(Value::as_str).unwrap_or("");
            let Some(mut component) = change.get("component").cloned().filter(Value::is_object)
            else {
                warn!("event=component_change module=architecture status=skipped reason=missing_component");
                continue;
            };
            let name = component_name(&component).to_string();
            let declared_uid = component.get("uid").is_some();
            ensure_identity(&mut component, &name);

            match action {
                "create" => {
                    if position_of(&components, &name).is_none() {
                        components.push(component);
                        affected.push(name);
                    }
                }
                "update" => {
                    match position_of(&components, &name) {
                        Some(index) => {
                            let previous: Vec<String> = related_uids(&components[index])
                                .into_iter()
                                .map(str::to_string)
                                .collect();
                            let incoming: Vec<String> = related_uids(&component)
                                .into_iter()
                                .map(str::to_string)
                                .collect();
                            let stored_uid = components[index].get("uid").cloned();
                            if let Some(fields) = component.as_object_mut() {
                                fields.insert(RELATED_TO_FIELD.to_string(), json!(previous));
                                if let (false, Some(uid)) = (declared_uid, stored_uid) {
                                    fields.insert("uid".to_string(), uid);
                                }
                            }
                            merge_related_into(&mut component, incoming);
                            components[index] = component;
                        }
                        None => components.push(component),
                    }
                    affected.push(name);
                }
                "delete" => {
                    let before = components.len();
                    components.retain(|existing| component_name(existing) != name);
                    if components.len() < before {
                        affected.push(name);
                    }
                }
                other => {
                    warn!("event=component_change module=architecture status=skipped action={other}");
                }
            }
        }

        if let Some(fields) = architecture.as_object_mut() {
            fields.insert("components".to_string(), Value::Array(components));
        }
        self.store.update(
            ARCHITECTURE_LAYER,
            &json!({ "architecture": architecture }),
            true,
        )?;

        info!(
            "event=component_changes module=architecture status=ok affected={}",
            affected.len()
        );
        Ok(affected)
    }

    /// Returns full component items for the given names, in stored order.
    pub fn components_named(&self, names: &[&str]) -> StoreResult<Vec<Value>> {
        let architecture = self.get_architecture()?;
        Ok(architecture
            .get("components")
            .and_then(Value::as_array)
            .map(|components| {
                components
                    .iter()
                    .filter(|component| names.contains(&component_name(component)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

fn empty_architecture() -> Value {
    json!({"components": [], "behaviors": []})
}

fn component_name(component: &Value) -> &str {
    component
        .get(NAME_FIELD)
        .and_then(Value::as_str)
        .unwrap_or_default()
}

fn position_of(components: &[Value], name: &str) -> Option<usize> {
    components
        .iter()
        .position(|component| component_name(component) == name)
}

fn ensure_identity(component: &mut Value, name: &str) {
    let Some(fields) = component.as_object_mut() else {
        return;
    };
    fields
        .entry("uid")
        .or_insert_with(|| json!(make_uid(UidKind::Component, [name])));
    fields.entry(RELATED_TO_FIELD).or_insert_with(|| json!([]));
}
