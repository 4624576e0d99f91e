//! Domain model for layered project context.
//!
//! # Responsibility
//! - Define item identity, layer kinds and the index read model.
//! - Keep per-layer item extraction in one closed dispatch.
//!
//! # Invariants
//! - Every addressable item is identified by a deterministic uid.
//! - `related_to` entries are weak references and may dangle.

pub mod entry;
pub mod extract;
pub mod layer;
pub mod relation;
pub mod uid;
