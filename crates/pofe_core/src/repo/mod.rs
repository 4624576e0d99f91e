//! Persistence layer for layer documents and the entity index.
//!
//! # Responsibility
//! - Define the document store contract used by services.
//! - Keep SQL and index maintenance behind that contract.
//!
//! # Invariants
//! - Callers never write index rows directly; the index only changes as a
//!   side effect of document writes or `rebuild_all`.
//! - Store APIs return semantic errors (`NotFound`, `AlreadyExists`) in
//!   addition to DB transport errors.

pub mod document_store;
mod entity_index;
