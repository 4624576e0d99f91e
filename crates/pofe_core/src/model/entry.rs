//! Entity index read model and review lifecycle.

use crate::model::uid::UidKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{Display, Formatter};

pub const STATUS_FIELD: &str = "status";

/// One row of the entity index: an item and the layer that owns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub uid: String,
    /// Name of the layer document the item lives in.
    pub layer: String,
    /// Derived from the uid prefix; `None` for foreign uid formats.
    pub kind: Option<UidKind>,
    /// Copy of the item's `status` field when it is a string.
    pub status: Option<String>,
    /// Copy of the item as stored in its layer document.
    pub item: Value,
}

impl IndexEntry {
    pub fn new(uid: impl Into<String>, layer: impl Into<String>, item: Value) -> Self {
        let uid = uid.into();
        Self {
            kind: UidKind::of_uid(&uid),
            status: item
                .get(STATUS_FIELD)
                .and_then(Value::as_str)
                .map(str::to_string),
            uid,
            layer: layer.into(),
            item,
        }
    }

    /// Human-facing name of the item: `title`, `component` or `name`.
    pub fn display_name(&self) -> Option<&str> {
        ["title", "component", "name"]
            .into_iter()
            .find_map(|field| {
                self.item
                    .get(field)
                    .and_then(Value::as_str)
                    .filter(|name| !name.trim().is_empty())
            })
    }
}

/// Review progression used by the human review workflow.
///
/// Items may carry other status strings (e.g. `in progress`); those are
/// outside the review progression and are queried by raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    /// Freshly created or inferred.
    New,
    /// Checked by a human.
    Reviewed,
    /// Accepted and implemented.
    Done,
}

impl ReviewStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Reviewed => "reviewed",
            Self::Done => "done",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "new" => Some(Self::New),
            "reviewed" => Some(Self::Reviewed),
            "done" => Some(Self::Done),
            _ => None,
        }
    }

    /// Next step of the progression; `Done` is terminal.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::New => Some(Self::Reviewed),
            Self::Reviewed => Some(Self::Done),
            Self::Done => None,
        }
    }
}

impl Display for ReviewStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
