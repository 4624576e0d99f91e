//! Requirement use-case service.
//!
//! # Responsibility
//! - Maintain the `requirements` list inside the `requirements` layer.
//! - Assign requirement uids and defaults on creation.
//! - Apply batches of create/update/delete changes in one write.
//!
//! # Invariants
//! - Requirements are addressed by `title`; the uid is derived from the title
//!   at creation and never rewritten by updates.
//! - `related_to` is merged on update, never replaced.

use crate::model::entry::{ReviewStatus, STATUS_FIELD};
use crate::model::layer::REQUIREMENTS_LAYER;
use crate::model::relation::{merge_related_into, RELATED_TO_FIELD};
use crate::model::uid::{make_uid, UidKind};
use crate::repo::document_store::{DocumentStore, StoreError};
use log::{info, warn};
use serde_json::{json, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for requirement use-cases.
#[derive(Debug)]
pub enum RequirementServiceError {
    /// Input is not an object or lacks a non-empty `title`.
    InvalidRequirement(String),
    /// No requirement carries this title.
    RequirementNotFound(String),
    /// A requirement with this title already exists.
    DuplicateTitle(String),
    /// Persistence-layer failure.
    Store(StoreError),
}

impl Display for RequirementServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRequirement(message) => write!(f, "invalid requirement: {message}"),
            Self::RequirementNotFound(title) => write!(f, "requirement not found: `{title}`"),
            Self::DuplicateTitle(title) => write!(f, "requirement already exists: `{title}`"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RequirementServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for RequirementServiceError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

pub type RequirementResult<T> = Result<T, RequirementServiceError>;

/// Counts of changes applied by [`RequirementService::apply_changes`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppliedChanges {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

/// Requirement service facade over a document store.
pub struct RequirementService<S: DocumentStore> {
    store: S,
}

impl<S: DocumentStore> RequirementService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns stored requirements; empty when the layer does not exist yet.
    pub fn list_requirements(&self) -> RequirementResult<Vec<Value>> {
        if !self.store.exists(REQUIREMENTS_LAYER)? {
            return Ok(Vec::new());
        }
        let doc = self.store.read(REQUIREMENTS_LAYER)?;
        Ok(doc
            .get("requirements")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    /// Adds a requirement and returns its uid.
    ///
    /// # Contract
    /// - `title` is required; `tags`, `status`, `related_to`, `uid` default to
    ///   `[]`, `new`, `[]` and `req-<hash(title)>`.
    pub fn create_requirement(&self, requirement: Value) -> RequirementResult<String> {
        let mut requirements = self.list_requirements()?;
        let uid = insert_requirement(&mut requirements, requirement)?;
        self.save(requirements)?;
        Ok(uid)
    }

    /// Updates the requirement titled `title` and returns its uid.
    ///
    /// `related_to` in `updates` is unioned into the existing list; `uid` is
    /// ignored; every other key overwrites.
    pub fn update_requirement(&self, title: &str, updates: Value) -> RequirementResult<String> {
        let mut requirements = self.list_requirements()?;
        let uid = patch_requirement(&mut requirements, title, updates)?;
        self.save(requirements)?;
        Ok(uid)
    }

    /// Removes the requirement titled `title`.
    pub fn delete_requirement(&self, title: &str) -> RequirementResult<()> {
        let mut requirements = self.list_requirements()?;
        if !drop_requirement(&mut requirements, title) {
            return Err(RequirementServiceError::RequirementNotFound(title.to_string()));
        }
        self.save(requirements)
    }

    /// Applies `[{"action": ..., "requirement": {...}}]` changes in one write.
    ///
    /// - `create` on an existing title behaves like `update`.
    /// - `update` on a missing title creates it.
    /// - `delete` on a missing title is ignored.
    /// - Unknown actions are skipped.
    pub fn apply_changes(&self, changes: &[Value]) -> RequirementResult<AppliedChanges> {
        let mut requirements = self.list_requirements()?;
        let mut applied = AppliedChanges::default();

        for change in changes {
            let action = change.get("action").and_then(Value::as_str).unwrap_or("");
            let requirement = change.get("requirement").cloned().unwrap_or(Value::Null);
            let title = requirement
                .get("title")
                .and_then(Value::as_str)
                .map(str::to_string);

            match (action, title) {
                ("create" | "update", Some(title)) if find_index(&requirements, &title).is_some() => {
                    patch_requirement(&mut requirements, &title, requirement)?;
                    applied.updated += 1;
                }
                ("create" | "update", _) => {
                    insert_requirement(&mut requirements, requirement)?;
                    applied.created += 1;
                }
                ("delete", Some(title)) => {
                    if drop_requirement(&mut requirements, &title) {
                        applied.deleted += 1;
                    }
                }
                (other, _) => {
                    warn!("event=requirement_change module=requirements status=skipped action={other}");
                }
            }
        }

        self.save(requirements)?;
        info!(
            "event=requirement_changes module=requirements status=ok created={} updated={} deleted={}",
            applied.created, applied.updated, applied.deleted
        );
        Ok(applied)
    }

    fn save(&self, requirements: Vec<Value>) -> RequirementResult<()> {
        self.store
            .update(REQUIREMENTS_LAYER, &json!({ "requirements": requirements }), true)?;
        Ok(())
    }
}

fn find_index(requirements: &[Value], title: &str) -> Option<usize> {
    requirements
        .iter()
        .position(|requirement| requirement.get("title").and_then(Value::as_str) == Some(title))
}

fn insert_requirement(requirements: &mut Vec<Value>, requirement: Value) -> RequirementResult<String> {
    let Value::Object(mut fields) = requirement else {
        return Err(RequirementServiceError::InvalidRequirement(
            "requirement must be a JSON object".to_string(),
        ));
    };
    let title = fields
        .get("title")
        .and_then(Value::as_str)
        .filter(|title| !title.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            RequirementServiceError::InvalidRequirement("`title` is required".to_string())
        })?;
    if find_index(requirements, &title).is_some() {
        return Err(RequirementServiceError::DuplicateTitle(title));
    }

    fields.entry("tags").or_insert_with(|| json!([]));
    fields
        .entry(STATUS_FIELD)
        .or_insert_with(|| json!(ReviewStatus::New.as_str()));
    fields.entry(RELATED_TO_FIELD).or_insert_with(|| json!([]));
    let uid = fields
        .entry("uid")
        .or_insert_with(|| json!(make_uid(UidKind::Requirement, [title.as_str()])))
        .as_str()
        .map(str::to_string)
        .unwrap_or_default();

    requirements.push(Value::Object(fields));
    Ok(uid)
}

fn patch_requirement(
    requirements: &mut [Value],
    title: &str,
    updates: Value,
) -> RequirementResult<String> {
    let index = find_index(requirements, title)
        .ok_or_else(|| RequirementServiceError::RequirementNotFound(title.to_string()))?;
    let Value::Object(updates) = updates else {
        return Err(RequirementServiceError::InvalidRequirement(
            "updates must be a JSON object".to_string(),
        ));
    };

    let existing = &mut requirements[index];
    let incoming_related: Vec<String> = updates
        .get(RELATED_TO_FIELD)
        .map(related_list)
        .unwrap_or_default();
    merge_related_into(existing, incoming_related);

    if let Some(fields) = existing.as_object_mut() {
        for (key, value) in updates {
            if key == RELATED_TO_FIELD || key == "uid" {
                continue;
            }
            fields.insert(key, value);
        }
    }

    Ok(existing
        .get("uid")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string())
}

fn drop_requirement(requirements: &mut Vec<Value>, title: &str) -> bool {
    let before = requirements.len();
    requirements.retain(|requirement| requirement.get("title").and_then(Value::as_str) != Some(title));
    requirements.len() != before
}

fn related_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(refs) => refs
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Value::String(single) => vec![single.clone()],
        _ => Vec::new(),
    }
}
