//! Deterministic item identity.
//!
//! # Responsibility
//! - Derive `<prefix>-<8 hex>` identifiers from a kind tag and identifying
//!   strings (file path, declared name, title, ...).
//!
//! # Invariants
//! - Same kind and same parts in the same order always give the same uid,
//!   across processes and machines.
//! - Part order is significant; callers keep one ordering per kind.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::{Display, Formatter};

/// Separator placed between identifying parts before hashing.
const PART_SEPARATOR: &str = ":";
/// Number of hex characters kept from the digest.
const DIGEST_CHARS: usize = 8;

/// Item category, encoded as the uid prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UidKind {
    /// Requirement (`req-`).
    Requirement,
    /// Architecture component (`arch-`).
    Component,
    /// Implementation class (`cls-`).
    Class,
    /// Method of an implementation class (`mtd-`).
    Method,
    /// Free implementation function (`fn-`).
    Function,
}

impl UidKind {
    pub const ALL: [UidKind; 5] = [
        UidKind::Requirement,
        UidKind::Component,
        UidKind::Class,
        UidKind::Method,
        UidKind::Function,
    ];

    pub fn prefix(self) -> &'static str {
        match self {
            Self::Requirement => "req",
            Self::Component => "arch",
            Self::Class => "cls",
            Self::Method => "mtd",
            Self::Function => "fn",
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.prefix() == prefix)
    }

    /// Recovers the kind of an existing uid from its prefix.
    ///
    /// Returns `None` for uids that do not follow the `<prefix>-...` form or
    /// carry an unknown prefix.
    pub fn of_uid(uid: &str) -> Option<Self> {
        uid.split_once('-')
            .and_then(|(prefix, _)| Self::from_prefix(prefix))
    }
}

impl Display for UidKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Derives the stable uid for an entity of `kind` identified by `parts`.
///
/// Empty parts are accepted but weaken collision resistance.
pub fn make_uid<I, S>(kind: UidKind, parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut hasher = Sha256::new();
    for (index, part) in parts.into_iter().enumerate() {
        if index > 0 {
            hasher.update(PART_SEPARATOR.as_bytes());
        }
        hasher.update(part.as_ref().as_bytes());
    }
    let digest = format!("{:x}", hasher.finalize());
    format!("{}-{}", kind.prefix(), &digest[..DIGEST_CHARS])
}
