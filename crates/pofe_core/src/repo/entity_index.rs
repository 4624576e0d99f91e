//! Entity index maintenance over the `entity_index` table.
//!
//! # Responsibility
//! - Replace one layer's index rows from its document (`reindex`).
//! - Hand uids released by a rewrite or removal to the next layer holding
//!   them (`restore`).
//! - Rebuild every row from stored documents (`rebuild_all`).
//! - Serve uid and status lookups.
//!
//! # Invariants
//! - Only called with a connection that is inside the caller's write
//!   transaction; these functions never open or commit transactions.
//! - A uid present in several layers is owned by the smallest layer name;
//!   within one document the first occurrence wins. Live writes and
//!   `rebuild_all` apply the same rule, so a rebuild never changes an owner.

use crate::model::entry::{IndexEntry, STATUS_FIELD};
use crate::model::extract::extract_items;
use crate::model::layer::LayerKind;
use crate::model::uid::UidKind;
use crate::repo::document_store::{load_all_layers, StoreError, StoreResult};
use log::{debug, warn};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};

const ENTRY_SELECT_SQL: &str = "SELECT uid, layer, item FROM entity_index";

/// Replaces every index row attributed to `layer` with the items of `doc`.
///
/// `doc` must already be persisted in `layers`. Uids the layer owned before
/// and no longer holds are handed to the next layer that still contains
/// them. Returns the number of rows written for `layer`.
pub(crate) fn reindex(conn: &Connection, layer: &str, doc: &Value) -> StoreResult<usize> {
    let released = release_layer(conn, layer)?;

    let mut claimed: HashSet<String> = HashSet::new();
    let mut written = 0;
    for location in extract_items(LayerKind::from_name(layer), doc) {
        if !claimed.insert(location.uid.clone()) {
            warn!(
                "event=index_uid_conflict module=index status=skipped layer={layer} owner={layer} uid={}",
                location.uid
            );
            continue;
        }
        let Some(item) = doc.pointer(&location.pointer) else {
            continue;
        };
        if let Some(owner) = owner_of(conn, &location.uid)? {
            if owner.as_str() < layer {
                warn!(
                    "event=index_uid_conflict module=index status=skipped layer={layer} owner={owner} uid={}",
                    location.uid
                );
                continue;
            }
        }
        upsert_entry(conn, &location.uid, layer, item)?;
        written += 1;
    }

    let orphaned: BTreeSet<String> = released
        .into_iter()
        .filter(|uid| !claimed.contains(uid))
        .collect();
    restore(conn, orphaned)?;

    Ok(written)
}

/// Deletes every index row owned by `layer` and returns the released uids.
pub(crate) fn release_layer(conn: &Connection, layer: &str) -> StoreResult<Vec<String>> {
    let mut stmt = conn.prepare_cached("SELECT uid FROM entity_index WHERE layer = ?1;")?;
    let released = stmt
        .query_map([layer], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    conn.execute("DELETE FROM entity_index WHERE layer = ?1;", [layer])?;
    Ok(released)
}

/// Indexes each uid in `uids` from the first stored layer, by name, that
/// still contains it. Uids found nowhere stay unindexed.
pub(crate) fn restore(conn: &Connection, mut uids: BTreeSet<String>) -> StoreResult<usize> {
    if uids.is_empty() {
        return Ok(0);
    }

    let mut restored = 0;
    for (layer, doc) in load_all_layers(conn)? {
        for location in extract_items(LayerKind::from_name(&layer), &doc) {
            if !uids.remove(&location.uid) {
                continue;
            }
            if let Some(item) = doc.pointer(&location.pointer) {
                upsert_entry(conn, &location.uid, &layer, item)?;
                restored += 1;
            }
        }
        if uids.is_empty() {
            break;
        }
    }

    debug!("event=index_restore module=index status=ok restored={restored} unresolved={}", uids.len());
    Ok(restored)
}

/// Drops the whole index and re-derives it from `layers`, visited in name
/// order.
pub(crate) fn rebuild_all(conn: &Connection, layers: &[(String, Value)]) -> StoreResult<usize> {
    conn.execute("DELETE FROM entity_index;", [])?;
    let mut total = 0;
    for (layer, doc) in layers {
        total += reindex(conn, layer, doc)?;
    }
    Ok(total)
}

fn owner_of(conn: &Connection, uid: &str) -> StoreResult<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT layer FROM entity_index WHERE uid = ?1;",
            [uid],
            |row| row.get::<_, String>(0),
        )
        .optional()?)
}

fn upsert_entry(conn: &Connection, uid: &str, layer: &str, item: &Value) -> StoreResult<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO entity_index (uid, layer, kind, status, item)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(uid) DO UPDATE SET
            layer = excluded.layer,
            kind = excluded.kind,
            status = excluded.status,
            item = excluded.item;",
    )?;
    stmt.execute(params![
        uid,
        layer,
        UidKind::of_uid(uid).map(UidKind::prefix),
        item.get(STATUS_FIELD).and_then(Value::as_str),
        serde_json::to_string(item)?,
    ])?;
    Ok(())
}

pub(crate) fn find(conn: &Connection, uid: &str) -> StoreResult<Option<IndexEntry>> {
    conn.query_row(
        &format!("{ENTRY_SELECT_SQL} WHERE uid = ?1;"),
        [uid],
        |row| Ok(parse_entry_row(row)),
    )
    .optional()?
    .transpose()
}

pub(crate) fn list_by_status(conn: &Connection, status: &str) -> StoreResult<Vec<IndexEntry>> {
    let mut stmt = conn.prepare(&format!(
        "{ENTRY_SELECT_SQL} WHERE status = ?1 ORDER BY uid ASC;"
    ))?;
    let entries = collect_entries(stmt.query([status])?);
    entries
}

pub(crate) fn list_all(conn: &Connection) -> StoreResult<Vec<IndexEntry>> {
    let mut stmt = conn.prepare(&format!("{ENTRY_SELECT_SQL} ORDER BY uid ASC;"))?;
    let entries = collect_entries(stmt.query([])?);
    entries
}

fn collect_entries(mut rows: rusqlite::Rows<'_>) -> StoreResult<Vec<IndexEntry>> {
    let mut entries = Vec::new();
    while let Some(row) = rows.next()? {
        entries.push(parse_entry_row(row)?);
    }
    Ok(entries)
}

fn parse_entry_row(row: &Row<'_>) -> StoreResult<IndexEntry> {
    let uid: String = row.get("uid")?;
    let layer: String = row.get("layer")?;
    let item_text: String = row.get("item")?;
    let item = serde_json::from_str(&item_text).map_err(|err| {
        StoreError::InvalidData(format!("invalid item json for `{uid}` in entity_index.item: {err}"))
    })?;
    Ok(IndexEntry::new(uid, layer, item))
}
