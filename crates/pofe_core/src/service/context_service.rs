//! Cross-layer context use-cases over a document store.
//!
//! # Responsibility
//! - Follow `related_to` links from seed uids into a traversal bundle.
//! - Serve the review workflow (status queries and point updates).
//! - Keep relationships queryable from both endpoints (`link`,
//!   `backfill_links`).
//! - Export every layer document as a flat JSON file.
//!
//! # Invariants
//! - Traversal never fails on dangling references or unknown seeds.
//! - Seeds never appear in the `related` part of a bundle.
//! - Point updates go through whole-document writes so the index is
//!   refreshed by the store.

use crate::model::entry::{IndexEntry, ReviewStatus, STATUS_FIELD};
use crate::model::extract::{extract_items, locate_item_mut};
use crate::model::layer::LayerKind;
use crate::model::relation::{merge_related_into, related_uids};
use crate::repo::document_store::{DocumentStore, StoreResult};
use log::{debug, info};
use serde::Serialize;
use serde_json::Value;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::path::{Path, PathBuf};

/// Result of [`ContextService::gather`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TraversalBundle {
    /// Seed item; `None` when the seed uid is unknown.
    pub root: Option<Value>,
    /// Items reachable within the hop budget, keyed by uid.
    pub related: BTreeMap<String, Value>,
}

/// Result of [`ContextService::gather_many`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchBundle {
    /// Seed items that exist, keyed by uid.
    pub items: BTreeMap<String, Value>,
    /// Non-seed items reachable within the hop budget, keyed by uid.
    pub related: BTreeMap<String, Value>,
}

/// Context use-case service wrapping a [`DocumentStore`].
pub struct ContextService<S: DocumentStore> {
    store: S,
}

impl<S: DocumentStore> ContextService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Collects items reachable from `uid` in at most `depth` hops.
    ///
    /// `depth = 0` returns only the root.
    pub fn gather(&self, uid: &str, depth: usize) -> StoreResult<TraversalBundle> {
        let Some(root) = self.store.find(uid)? else {
            debug!("event=gather module=context status=ok seeds=0 depth={depth} related=0");
            return Ok(TraversalBundle::default());
        };

        let related = self.walk(std::slice::from_ref(&root), depth)?;
        debug!(
            "event=gather module=context status=ok seeds=1 depth={depth} related={}",
            related.len()
        );
        Ok(TraversalBundle {
            root: Some(root.item),
            related,
        })
    }

    /// Batched [`gather`](Self::gather); unknown seeds are left out of `items`.
    pub fn gather_many<I, U>(&self, uids: I, depth: usize) -> StoreResult<BatchBundle>
    where
        I: IntoIterator<Item = U>,
        U: AsRef<str>,
    {
        let mut seeds: Vec<IndexEntry> = Vec::new();
        for uid in uids {
            let uid = uid.as_ref();
            if seeds.iter().any(|seed| seed.uid == uid) {
                continue;
            }
            if let Some(entry) = self.store.find(uid)? {
                seeds.push(entry);
            }
        }

        let related = self.walk(&seeds, depth)?;
        debug!(
            "event=gather_many module=context status=ok seeds={} depth={depth} related={}",
            seeds.len(),
            related.len()
        );
        Ok(BatchBundle {
            items: seeds
                .into_iter()
                .map(|seed| (seed.uid, seed.item))
                .collect(),
            related,
        })
    }

    fn walk(&self, seeds: &[IndexEntry], depth: usize) -> StoreResult<BTreeMap<String, Value>> {
        let mut visited: HashSet<String> = seeds.iter().map(|seed| seed.uid.clone()).collect();
        let mut queue: VecDeque<(Value, usize)> =
            seeds.iter().map(|seed| (seed.item.clone(), 0)).collect();
        let mut related = BTreeMap::new();

        while let Some((item, hops)) = queue.pop_front() {
            if hops >= depth {
                continue;
            }
            for target in related_uids(&item) {
                if !visited.insert(target.to_string()) {
                    continue;
                }
                // Dangling references are expected while layers are being built.
                let Some(entry) = self.store.find(target)? else {
                    continue;
                };
                queue.push_back((entry.item.clone(), hops + 1));
                related.insert(entry.uid, entry.item);
            }
        }

        Ok(related)
    }

    /// Every indexed item whose `status` equals `status`.
    pub fn find_by_status(&self, status: &str) -> StoreResult<Vec<IndexEntry>> {
        self.store.find_by_status(status)
    }

    /// Sets `status` on the item `uid` inside its owning layer document.
    ///
    /// Returns `false` when the uid is not indexed.
    pub fn update_item_status(&self, uid: &str, status: &str) -> StoreResult<bool> {
        let Some(entry) = self.store.find(uid)? else {
            return Ok(false);
        };

        let mut doc = self.store.read(&entry.layer)?;
        let Some(item) = locate_item_mut(LayerKind::from_name(&entry.layer), &mut doc, uid)
            .and_then(Value::as_object_mut)
        else {
            return Ok(false);
        };
        item.insert(STATUS_FIELD.to_string(), Value::String(status.to_string()));
        self.store.update(&entry.layer, &doc, false)?;

        info!(
            "event=item_status_update module=context status=ok layer={} uid={uid} item_status={status}",
            entry.layer
        );
        Ok(true)
    }

    /// Moves an item one step along `new → reviewed → done`.
    ///
    /// Returns the new status, or `None` when the item is unknown, already
    /// done, or carries a status outside the review progression.
    pub fn advance_review(&self, uid: &str) -> StoreResult<Option<ReviewStatus>> {
        let Some(entry) = self.store.find(uid)? else {
            return Ok(None);
        };
        let Some(next) = entry
            .status
            .as_deref()
            .and_then(ReviewStatus::parse)
            .and_then(ReviewStatus::next)
        else {
            return Ok(None);
        };

        if self.update_item_status(uid, next.as_str())? {
            Ok(Some(next))
        } else {
            Ok(None)
        }
    }

    /// Records a relationship on both endpoints in one atomic write.
    ///
    /// Returns `false` when either uid is unknown or both are the same item.
    pub fn link(&self, from: &str, to: &str) -> StoreResult<bool> {
        if from == to {
            return Ok(false);
        }
        let (Some(source), Some(target)) = (self.store.find(from)?, self.store.find(to)?) else {
            return Ok(false);
        };

        let mut pending = PendingLayers::new(&self.store);
        pending.add_relation(&source.layer, from, to)?;
        pending.add_relation(&target.layer, to, from)?;
        pending.commit()?;
        Ok(true)
    }

    /// Mirrors every resolvable `related_to` edge declared in `layer` onto
    /// its target item.
    ///
    /// Returns the number of reverse edges added.
    pub fn backfill_links(&self, layer: &str) -> StoreResult<usize> {
        let doc = self.store.read(layer)?;

        let mut pending = PendingLayers::new(&self.store);
        let mut added = 0;
        for location in extract_items(LayerKind::from_name(layer), &doc) {
            let Some(item) = doc.pointer(&location.pointer) else {
                continue;
            };
            for target in related_uids(item) {
                if target == location.uid {
                    continue;
                }
                let Some(entry) = self.store.find(target)? else {
                    continue;
                };
                if pending.add_relation(&entry.layer, target, &location.uid)? {
                    added += 1;
                }
            }
        }
        pending.commit()?;

        info!("event=backfill_links module=context status=ok layer={layer} added={added}");
        Ok(added)
    }

    /// Writes every layer document to `<dir>/<layer>.json`.
    ///
    /// Each file is written to a temporary sibling first and renamed into
    /// place. Returns the written paths in layer-name order.
    pub fn export(&self, dir: impl AsRef<Path>) -> StoreResult<Vec<PathBuf>> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let mut written = Vec::new();
        for layer in self.store.list()? {
            let doc = self.store.read(&layer)?;
            let path = dir.join(format!("{layer}.json"));
            let tmp = dir.join(format!("{layer}.json.tmp"));
            write_replacing(&tmp, &path, serde_json::to_string_pretty(&doc)?.as_bytes())?;
            written.push(path);
        }

        info!(
            "event=context_export module=context status=ok layers={} dir={}",
            written.len(),
            dir.display()
        );
        Ok(written)
    }
}

/// Writes `bytes` to `tmp` and renames it onto `path`.
///
/// `tmp` is removed when either step fails.
fn write_replacing(tmp: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let result = std::fs::write(tmp, bytes).and_then(|()| std::fs::rename(tmp, path));
    if result.is_err() {
        let _ = std::fs::remove_file(tmp);
    }
    result
}

/// Layer documents loaded for a multi-item edit and written back together.
struct PendingLayers<'s, S: DocumentStore> {
    store: &'s S,
    docs: BTreeMap<String, Value>,
    dirty: BTreeSet<String>,
}

impl<'s, S: DocumentStore> PendingLayers<'s, S> {
    fn new(store: &'s S) -> Self {
        Self {
            store,
            docs: BTreeMap::new(),
            dirty: BTreeSet::new(),
        }
    }

    /// Adds `target` to the `related_to` list of item `uid` in `layer`.
    ///
    /// Returns whether the list changed.
    fn add_relation(&mut self, layer: &str, uid: &str, target: &str) -> StoreResult<bool> {
        let doc = match self.docs.entry(layer.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(self.store.read(layer)?),
        };
        let Some(item) = locate_item_mut(LayerKind::from_name(layer), doc, uid) else {
            return Ok(false);
        };
        if merge_related_into(item, [target]) == 0 {
            return Ok(false);
        }
        self.dirty.insert(layer.to_string());
        Ok(true)
    }

    fn commit(self) -> StoreResult<()> {
        if self.dirty.is_empty() {
            return Ok(());
        }
        let docs: Vec<(&str, &Value)> = self
            .dirty
            .iter()
            .filter_map(|layer| self.docs.get(layer).map(|doc| (layer.as_str(), doc)))
            .collect();
        self.store.replace_many(&docs)
    }
}
