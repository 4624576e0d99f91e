//! Layer naming and kind dispatch.
//!
//! # Responsibility
//! - Map layer names to the closed set of known layer kinds.
//! - Validate layer names before they reach storage or export paths.
//!
//! # Invariants
//! - Valid names match `^[a-z][a-z0-9_-]{0,63}$` and are therefore safe as
//!   file stems.
//! - Unknown but valid names map to `LayerKind::Custom` and hold no items.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const OVERVIEW_LAYER: &str = "overview";
pub const REQUIREMENTS_LAYER: &str = "requirements";
pub const ARCHITECTURE_LAYER: &str = "architecture";
pub const IMPLEMENTATION_LAYER: &str = "implementation";
pub const IDEAS_LAYER: &str = "ideas";

static LAYER_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_-]{0,63}$").expect("valid layer name regex"));

/// Item-extraction shape selected by layer name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    /// Free-form project summary; no addressable items.
    Overview,
    /// Flat `requirements` list.
    Requirements,
    /// Nested `architecture.components` list.
    Architecture,
    /// File entries with classes, methods and functions.
    Implementation,
    /// Flat `ideas` list.
    Ideas,
    /// Any other layer; stored but never indexed.
    Custom,
}

impl LayerKind {
    pub fn from_name(name: &str) -> Self {
        match name {
            OVERVIEW_LAYER => Self::Overview,
            REQUIREMENTS_LAYER => Self::Requirements,
            ARCHITECTURE_LAYER => Self::Architecture,
            IMPLEMENTATION_LAYER => Self::Implementation,
            IDEAS_LAYER => Self::Ideas,
            _ => Self::Custom,
        }
    }
}

/// Returns whether `name` can be used as a layer name.
pub fn is_valid_layer_name(name: &str) -> bool {
    LAYER_NAME_RE.is_match(name)
}
