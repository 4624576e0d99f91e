//! Free-text to uid resolution over indexed item names.
//!
//! # Responsibility
//! - Turn a user question into traversal seeds by spotting known item names
//!   (`title`, `component`, `name`) inside it.
//!
//! # Invariants
//! - Matching is case-insensitive and on word boundaries, so `Store` does
//!   not match inside `Restore`.
//! - Hits are ordered by uid and contain each uid at most once.

use crate::model::uid::UidKind;
use crate::repo::document_store::{DocumentStore, StoreResult};
use regex::RegexBuilder;

/// Options for name resolution.
#[derive(Debug, Clone)]
pub struct NameQuery {
    /// Free text to scan for item names.
    pub text: String,
    /// Optional item kind filter.
    pub kind: Option<UidKind>,
    /// Maximum number of hits to return.
    pub limit: usize,
}

impl NameQuery {
    /// Creates a query with the default limit and no kind filter.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: None,
            limit: 50,
        }
    }
}

/// One item whose name occurs in the query text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameHit {
    pub uid: String,
    pub layer: String,
    pub kind: Option<UidKind>,
    pub name: String,
}

/// Returns indexed items whose display name appears in `query.text`.
///
/// Returns an empty list for blank text or a zero limit.
pub fn resolve_names<S: DocumentStore>(store: &S, query: &NameQuery) -> StoreResult<Vec<NameHit>> {
    let text = query.text.trim();
    if text.is_empty() || query.limit == 0 {
        return Ok(Vec::new());
    }

    let mut hits = Vec::new();
    for entry in store.entries()? {
        if query.kind.is_some() && entry.kind != query.kind {
            continue;
        }
        let Some(name) = entry.display_name() else {
            continue;
        };
        if !contains_word(text, name.trim()) {
            continue;
        }
        hits.push(NameHit {
            name: name.to_string(),
            uid: entry.uid,
            layer: entry.layer,
            kind: entry.kind,
        });
        if hits.len() == query.limit {
            break;
        }
    }

    Ok(hits)
}

fn contains_word(haystack: &str, needle: &str) -> bool {
    let pattern = format!(r"(?:^|\W){}(?:\W|$)", regex::escape(needle));
    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .map(|re| re.is_match(haystack))
        .unwrap_or(false)
}
