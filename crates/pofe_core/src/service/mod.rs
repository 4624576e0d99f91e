//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store calls into use-case level APIs.
//! - Keep callers decoupled from storage and indexing details.

pub mod architecture_service;
pub mod context_service;
pub mod implementation_service;
pub mod requirement_service;
