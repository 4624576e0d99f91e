//! Query entry points that resolve free text into item uids.
//!
//! # Responsibility
//! - Bridge user questions to traversal seeds without scanning documents.

pub mod names;
