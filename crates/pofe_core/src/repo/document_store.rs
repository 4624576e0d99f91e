//! Layer document store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist one JSON document per layer with create/read/update/remove.
//! - Keep the entity index in lockstep with every document write.
//!
//! # Invariants
//! - A document write and its reindex commit in the same transaction; no
//!   reader observes one without the other.
//! - The index is rebuilt from stored documents whenever a store is built
//!   on a connection.
//! - Stored documents are JSON objects under valid layer names.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::{open_db, open_db_in_memory, DbError};
use crate::model::entry::IndexEntry;
use crate::model::layer::is_valid_layer_name;
use crate::repo::entity_index;
use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::time::Instant;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by the context store.
#[derive(Debug)]
pub enum StoreError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Layer has no stored document.
    NotFound(String),
    /// `create` on a layer that already has a document.
    AlreadyExists(String),
    /// Layer name is not usable as a storage key and file stem.
    InvalidLayerName(String),
    /// Document does not have the expected top-level shape.
    InvalidDocument { layer: String, message: String },
    /// Document could not be serialized.
    Json(serde_json::Error),
    /// Filesystem failure while exporting.
    Io(std::io::Error),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted bytes cannot be decoded.
    InvalidData(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(layer) => write!(f, "context layer not found: {layer}"),
            Self::AlreadyExists(layer) => write!(
                f,
                "context layer already exists: {layer}; use update to modify it"
            ),
            Self::InvalidLayerName(layer) => write!(f, "invalid layer name: `{layer}`"),
            Self::InvalidDocument { layer, message } => {
                write!(f, "invalid document for layer `{layer}`: {message}")
            }
            Self::Json(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "{err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "context store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "context store requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "context store requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted context data: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Json(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Layer document storage with a derived entity index.
pub trait DocumentStore {
    /// Stores a new layer document; fails with `AlreadyExists`.
    fn create(&self, layer: &str, doc: &Value) -> StoreResult<()>;
    /// Returns a layer document; fails with `NotFound`.
    fn read(&self, layer: &str) -> StoreResult<Value>;
    /// Shallow-merges (`merge=true`) or replaces the document, creating the
    /// layer when absent.
    fn update(&self, layer: &str, doc: &Value, merge: bool) -> StoreResult<()>;
    /// Deletes a layer document and its index rows; fails with `NotFound`.
    fn remove(&self, layer: &str) -> StoreResult<()>;
    /// Lists stored layer names in ascending order.
    fn list(&self) -> StoreResult<Vec<String>>;
    fn exists(&self, layer: &str) -> StoreResult<bool>;
    /// Replaces several layer documents in one transaction.
    fn replace_many(&self, docs: &[(&str, &Value)]) -> StoreResult<()>;
    /// Looks up one indexed item by uid, whatever layer owns it.
    fn find(&self, uid: &str) -> StoreResult<Option<IndexEntry>>;
    /// Indexed items whose `status` equals `status`, ordered by uid.
    fn find_by_status(&self, status: &str) -> StoreResult<Vec<IndexEntry>>;
    /// Every indexed item, ordered by uid.
    fn entries(&self) -> StoreResult<Vec<IndexEntry>>;
    /// Re-derives the whole index from stored documents.
    fn rebuild_all(&self) -> StoreResult<usize>;
}

impl<S: DocumentStore + ?Sized> DocumentStore for &S {
    fn create(&self, layer: &str, doc: &Value) -> StoreResult<()> {
        (**self).create(layer, doc)
    }

    fn read(&self, layer: &str) -> StoreResult<Value> {
        (**self).read(layer)
    }

    fn update(&self, layer: &str, doc: &Value, merge: bool) -> StoreResult<()> {
        (**self).update(layer, doc, merge)
    }

    fn remove(&self, layer: &str) -> StoreResult<()> {
        (**self).remove(layer)
    }

    fn list(&self) -> StoreResult<Vec<String>> {
        (**self).list()
    }

    fn exists(&self, layer: &str) -> StoreResult<bool> {
        (**self).exists(layer)
    }

    fn replace_many(&self, docs: &[(&str, &Value)]) -> StoreResult<()> {
        (**self).replace_many(docs)
    }

    fn find(&self, uid: &str) -> StoreResult<Option<IndexEntry>> {
        (**self).find(uid)
    }

    fn find_by_status(&self, status: &str) -> StoreResult<Vec<IndexEntry>> {
        (**self).find_by_status(status)
    }

    fn entries(&self) -> StoreResult<Vec<IndexEntry>> {
        (**self).entries()
    }

    fn rebuild_all(&self) -> StoreResult<usize> {
        (**self).rebuild_all()
    }
}

/// SQLite-backed document store owning its connection and index state.
pub struct SqliteDocumentStore {
    conn: Connection,
}

impl SqliteDocumentStore {
    /// Opens a database file, migrates it and rebuilds the index.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::try_new(open_db(path)?)
    }

    /// Opens a private in-memory store.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::try_new(open_db_in_memory()?)
    }

    /// Wraps a migrated connection and rebuilds the index from its documents.
    ///
    /// # Errors
    /// - Schema version or required tables/columns do not match.
    /// - A stored document cannot be decoded.
    pub fn try_new(conn: Connection) -> StoreResult<Self> {
        ensure_store_connection_ready(&conn)?;
        let store = Self { conn };
        store.rebuild_all()?;
        Ok(store)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn begin(&self) -> StoreResult<Transaction<'_>> {
        Ok(Transaction::new_unchecked(
            &self.conn,
            TransactionBehavior::Immediate,
        )?)
    }
}

impl DocumentStore for SqliteDocumentStore {
    fn create(&self, layer: &str, doc: &Value) -> StoreResult<()> {
        validate_write(layer, doc)?;
        let started_at = Instant::now();

        let tx = self.begin()?;
        if layer_exists_in(&tx, layer)? {
            return Err(StoreError::AlreadyExists(layer.to_string()));
        }
        let items = write_layer(&tx, layer, doc)?;
        tx.commit()?;

        debug!(
            "event=layer_create module=store status=ok layer={layer} items={items} duration_ms={}",
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    fn read(&self, layer: &str) -> StoreResult<Value> {
        load_layer(&self.conn, layer)?.ok_or_else(|| StoreError::NotFound(layer.to_string()))
    }

    fn update(&self, layer: &str, doc: &Value, merge: bool) -> StoreResult<()> {
        validate_write(layer, doc)?;
        let started_at = Instant::now();

        let tx = self.begin()?;
        let next = match (merge, load_layer(&tx, layer)?) {
            (true, Some(mut existing)) => {
                if let (Some(target), Some(incoming)) = (existing.as_object_mut(), doc.as_object()) {
                    for (key, value) in incoming {
                        target.insert(key.clone(), value.clone());
                    }
                }
                existing
            }
            _ => doc.clone(),
        };
        let items = write_layer(&tx, layer, &next)?;
        tx.commit()?;

        debug!(
            "event=layer_update module=store status=ok layer={layer} merge={merge} items={items} duration_ms={}",
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    fn remove(&self, layer: &str) -> StoreResult<()> {
        let tx = self.begin()?;
        let released = entity_index::release_layer(&tx, layer)?;
        let changed = tx.execute("DELETE FROM layers WHERE name = ?1;", [layer])?;
        if changed == 0 {
            return Err(StoreError::NotFound(layer.to_string()));
        }
        let restored = entity_index::restore(&tx, released.into_iter().collect())?;
        tx.commit()?;

        debug!("event=layer_remove module=store status=ok layer={layer} restored={restored}");
        Ok(())
    }

    fn list(&self) -> StoreResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM layers ORDER BY name ASC;")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    fn exists(&self, layer: &str) -> StoreResult<bool> {
        layer_exists_in(&self.conn, layer)
    }

    fn replace_many(&self, docs: &[(&str, &Value)]) -> StoreResult<()> {
        for (layer, doc) in docs {
            validate_write(layer, doc)?;
        }

        let tx = self.begin()?;
        for (layer, doc) in docs {
            write_layer(&tx, layer, doc)?;
        }
        tx.commit()?;

        debug!(
            "event=layer_replace_many module=store status=ok layers={}",
            docs.len()
        );
        Ok(())
    }

    fn find(&self, uid: &str) -> StoreResult<Option<IndexEntry>> {
        entity_index::find(&self.conn, uid)
    }

    fn find_by_status(&self, status: &str) -> StoreResult<Vec<IndexEntry>> {
        entity_index::list_by_status(&self.conn, status)
    }

    fn entries(&self) -> StoreResult<Vec<IndexEntry>> {
        entity_index::list_all(&self.conn)
    }

    fn rebuild_all(&self) -> StoreResult<usize> {
        let started_at = Instant::now();

        let tx = self.begin()?;
        let layers = load_all_layers(&tx)?;
        let items = entity_index::rebuild_all(&tx, &layers)?;
        tx.commit()?;

        info!(
            "event=index_rebuild module=index status=ok layers={} items={items} duration_ms={}",
            layers.len(),
            started_at.elapsed().as_millis()
        );
        Ok(items)
    }
}

fn validate_write(layer: &str, doc: &Value) -> StoreResult<()> {
    if !is_valid_layer_name(layer) {
        return Err(StoreError::InvalidLayerName(layer.to_string()));
    }
    if !doc.is_object() {
        return Err(StoreError::InvalidDocument {
            layer: layer.to_string(),
            message: "top-level value must be a JSON object".to_string(),
        });
    }
    Ok(())
}

fn write_layer(conn: &Connection, layer: &str, doc: &Value) -> StoreResult<usize> {
    conn.execute(
        "INSERT INTO layers (name, document) VALUES (?1, ?2)
         ON CONFLICT(name) DO UPDATE SET
            document = excluded.document,
            updated_at = (strftime('%s', 'now') * 1000);",
        params![layer, serde_json::to_string(doc)?],
    )?;
    entity_index::reindex(conn, layer, doc)
}

fn load_layer(conn: &Connection, layer: &str) -> StoreResult<Option<Value>> {
    let text: Option<String> = conn
        .query_row(
            "SELECT document FROM layers WHERE name = ?1;",
            [layer],
            |row| row.get(0),
        )
        .optional()?;
    text.map(|text| decode_document(layer, &text)).transpose()
}

pub(crate) fn load_all_layers(conn: &Connection) -> StoreResult<Vec<(String, Value)>> {
    let mut stmt = conn.prepare("SELECT name, document FROM layers ORDER BY name ASC;")?;
    let mut rows = stmt.query([])?;
    let mut layers = Vec::new();
    while let Some(row) = rows.next()? {
        let name: String = row.get(0)?;
        let text: String = row.get(1)?;
        let doc = decode_document(&name, &text)?;
        layers.push((name, doc));
    }
    Ok(layers)
}

fn decode_document(layer: &str, text: &str) -> StoreResult<Value> {
    serde_json::from_str(text).map_err(|err| {
        StoreError::InvalidData(format!("invalid document json for layer `{layer}`: {err}"))
    })
}

fn layer_exists_in(conn: &Connection, layer: &str) -> StoreResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM layers WHERE name = ?1);",
        [layer],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn ensure_store_connection_ready(conn: &Connection) -> StoreResult<()> {
    let expected_version = latest_version();
    let actual_version = current_user_version(conn)?;
    if actual_version != expected_version {
        return Err(StoreError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    const REQUIRED: &[(&str, &[&str])] = &[
        ("layers", &["name", "document", "created_at", "updated_at"]),
        ("entity_index", &["uid", "layer", "kind", "status", "item"]),
    ];
    for (table, columns) in REQUIRED {
        if !table_exists(conn, table)? {
            return Err(StoreError::MissingRequiredTable(*table));
        }
        for column in *columns {
            if !table_has_column(conn, table, column)? {
                return Err(StoreError::MissingRequiredColumn {
                    table: *table,
                    column: *column,
                });
            }
        }
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> StoreResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> StoreResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
