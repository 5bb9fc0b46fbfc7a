//! Embedded document store
//!
//! This module implements [`DocumentStore`] on top of the embedded redb database.
//! Each entity type gets its own table; documents are stored as JSON strings
//! keyed by a random 20-character id.
//!
//! Every entity table has one secondary index table keyed by
//! `"{field value}\0{id}"`: movies by title, collections by owner. Title-ordered
//! queries range-scan the movie index from the cursor position and stop after
//! `limit` documents; owner-filtered queries prefix-scan the collection index.
//! Any other query falls back to a full table scan. Index entries are written in
//! the same write transaction as the document, and both indexes are rebuilt
//! when the database is opened.
//!
//! redb serializes write transactions, so every read-modify-write performed
//! inside one write transaction (partial updates, array add/remove) is atomic
//! with respect to other writers.

use std::ops::Bound;
use std::sync::Arc;

use async_trait::async_trait;
use rand::{distr::Alphanumeric, Rng};
use redb::{
    Database, Range, ReadOnlyTable, ReadableDatabase, ReadableTable, TableDefinition,
    WriteTransaction,
};
use serde_json::Value;

use crate::store::{Document, DocumentStore, EntityKind, Fields, Filter, Position, Query, StoreError};

/// Movies table
///
/// Key: document id
/// Value: JSON-serialized movie fields (without the id)
pub const TABLE_MOVIES: TableDefinition<&str, &str> = TableDefinition::new("movies_v1");

/// Collections table
///
/// Key: document id
/// Value: JSON-serialized collection fields, including the `movies` id array
pub const TABLE_COLLECTIONS: TableDefinition<&str, &str> = TableDefinition::new("collections_v1");

/// Secondary index for title-ordered catalog pages
///
/// Key: `"{title}\0{id}"`
/// Value: movie id
pub const TABLE_MOVIES_BY_TITLE: TableDefinition<&str, &str> =
    TableDefinition::new("movies_by_title_v1");

/// Secondary index for per-owner collection lookups
///
/// Key: `"{userId}\0{id}"`
/// Value: collection id
pub const TABLE_COLLECTIONS_BY_OWNER: TableDefinition<&str, &str> =
    TableDefinition::new("collections_by_owner_v1");

/// Length of generated document ids
pub const DOCUMENT_ID_LEN: usize = 20;

/// Separates the indexed value from the id in index keys. Sorts below every
/// other character, so `"A\0.."` < `"AB\0.."` like `"A"` < `"AB"`.
const KEY_SEPARATOR: char = '\0';

impl From<redb::Error> for StoreError {
    fn from(err: redb::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

fn table_for(kind: EntityKind) -> TableDefinition<'static, &'static str, &'static str> {
    match kind {
        EntityKind::Movies => TABLE_MOVIES,
        EntityKind::Collections => TABLE_COLLECTIONS,
    }
}

/// A secondary index over one string field of an entity table
struct Index {
    table: TableDefinition<'static, &'static str, &'static str>,
    field: &'static str,
}

impl Index {
    fn key_of(&self, fields: &Fields, id: &str) -> Option<String> {
        fields
            .get(self.field)
            .and_then(Value::as_str)
            .map(|value| index_key(value, id))
    }
}

fn index_for(kind: EntityKind) -> Index {
    match kind {
        EntityKind::Movies => Index {
            table: TABLE_MOVIES_BY_TITLE,
            field: "title",
        },
        EntityKind::Collections => Index {
            table: TABLE_COLLECTIONS_BY_OWNER,
            field: "userId",
        },
    }
}

fn index_key(value: &str, id: &str) -> String {
    format!("{}{}{}", value, KEY_SEPARATOR, id)
}

fn generate_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(DOCUMENT_ID_LEN)
        .map(char::from)
        .collect()
}

fn parse_fields(id: &str, raw: &str) -> Result<Fields, StoreError> {
    serde_json::from_str(raw)
        .map_err(|err| StoreError::Malformed(format!("document {}: {}", id, err)))
}

/// Undecodable rows are left out of listings instead of failing them
fn listed(kind: EntityKind, id: &str, raw: &str) -> Option<Document> {
    match parse_fields(id, raw) {
        Ok(fields) => Some(Document {
            id: id.to_string(),
            fields,
        }),
        Err(err) => {
            tracing::warn!(kind = %kind, error = %err, "skipping unreadable document");
            None
        }
    }
}

/// Initializes the embedded database and creates required tables
///
/// Creates or opens the database file at `db_path`, opens the entity tables
/// inside one write transaction so they exist before the first read, and
/// rebuilds the secondary indexes from the entity tables.
///
/// # Example
///
/// ```no_run
/// # use cinelog::database::init_db;
/// let db = init_db("data.db").expect("Failed to initialize database");
/// ```
pub fn init_db(db_path: &str) -> Result<Database, redb::Error> {
    let db = Database::create(db_path)?;

    let write_txn = db.begin_write()?;
    {
        write_txn.open_table(TABLE_MOVIES)?;
        write_txn.open_table(TABLE_COLLECTIONS)?;
        rebuild_index(&write_txn, EntityKind::Movies)?;
        rebuild_index(&write_txn, EntityKind::Collections)?;
    }
    write_txn.commit()?;

    Ok(db)
}

/// Drops and refills the index of `kind` so it covers documents written
/// without it.
fn rebuild_index(write_txn: &WriteTransaction, kind: EntityKind) -> Result<(), redb::Error> {
    let index = index_for(kind);
    write_txn.delete_table(index.table)?;

    let table = write_txn.open_table(table_for(kind))?;
    let mut by_key = write_txn.open_table(index.table)?;
    let mut indexed = 0usize;
    for entry in table.iter()? {
        let (id, raw) = entry?;
        let Ok(fields) = parse_fields(id.value(), raw.value()) else {
            continue;
        };
        if let Some(key) = index.key_of(&fields, id.value()) {
            by_key.insert(key.as_str(), id.value())?;
            indexed += 1;
        }
    }

    tracing::debug!(kind = %kind, indexed, "index rebuilt");
    Ok(())
}

/// Moves the index entry of one document from its `before` to its `after` state.
fn reindex(
    write_txn: &WriteTransaction,
    kind: EntityKind,
    id: &str,
    before: Option<&Fields>,
    after: Option<&Fields>,
) -> Result<(), redb::Error> {
    let index = index_for(kind);
    let old = before.and_then(|fields| index.key_of(fields, id));
    let new = after.and_then(|fields| index.key_of(fields, id));
    if old == new {
        return Ok(());
    }

    let mut by_key = write_txn.open_table(index.table)?;
    if let Some(old) = old {
        by_key.remove(old.as_str())?;
    }
    if let Some(new) = new {
        by_key.insert(new.as_str(), id)?;
    }
    Ok(())
}

/// Loads the documents named by index entries, skipping entries whose
/// document is gone or unreadable, until `limit` documents are collected.
fn load_indexed(
    kind: EntityKind,
    table: &ReadOnlyTable<&'static str, &'static str>,
    entries: Range<'static, &'static str, &'static str>,
    limit: usize,
) -> Result<Vec<Document>, redb::Error> {
    let mut docs = Vec::new();
    for entry in entries {
        if docs.len() >= limit {
            break;
        }
        let (_, id) = entry?;
        let id = id.value();
        if let Some(raw) = table.get(id)? {
            docs.extend(listed(kind, id, raw.value()));
        }
    }
    Ok(docs)
}

/// [`DocumentStore`] backed by an embedded redb database
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    pub fn new(db: Database) -> Self {
        Self { db: Arc::new(db) }
    }

    /// Opens (or creates) the database file and wraps it.
    pub fn open(db_path: &str) -> Result<Self, StoreError> {
        Ok(Self::new(init_db(db_path)?))
    }

    fn read_one(&self, kind: EntityKind, id: &str) -> Result<Option<String>, redb::Error> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(table_for(kind))?;
        let raw = table.get(id)?.map(|guard| guard.value().to_string());
        Ok(raw)
    }

    fn read_all(&self, kind: EntityKind) -> Result<Vec<Document>, redb::Error> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(table_for(kind))?;
        let mut docs = Vec::new();
        for entry in table.iter()? {
            let (id, raw) = entry?;
            docs.extend(listed(kind, id.value(), raw.value()));
        }
        Ok(docs)
    }

    /// Documents in index order, strictly after `after`, at most `limit` of them.
    ///
    /// Documents whose indexed field is missing or not a string are not in the
    /// index and never returned here.
    fn read_ordered(
        &self,
        kind: EntityKind,
        after: Option<&Position>,
        limit: usize,
    ) -> Result<Vec<Document>, redb::Error> {
        let start = match after {
            None => Bound::Unbounded,
            Some(Position {
                key: Value::String(value),
                id,
            }) => Bound::Excluded(index_key(value, id)),
            // Arrays and objects sort after every string
            Some(Position {
                key: Value::Array(_) | Value::Object(_),
                ..
            }) => return Ok(Vec::new()),
            Some(_) => Bound::Unbounded,
        };

        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(table_for(kind))?;
        let by_key = read_txn.open_table(index_for(kind).table)?;

        let range = by_key.range::<&str>((start.as_ref().map(String::as_str), Bound::Unbounded))?;
        load_indexed(kind, &table, range, limit)
    }

    /// Documents whose indexed field equals `value`, in index order.
    fn read_prefixed(&self, kind: EntityKind, value: &str) -> Result<Vec<Document>, redb::Error> {
        let start = format!("{}{}", value, KEY_SEPARATOR);
        let end = format!("{}\u{1}", value);

        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(table_for(kind))?;
        let by_key = read_txn.open_table(index_for(kind).table)?;

        let range = by_key.range(start.as_str()..end.as_str())?;
        load_indexed(kind, &table, range, usize::MAX)
    }

    /// Runs `mutate` over the stored fields of one document inside a single
    /// write transaction, then writes the result back and moves its index entry.
    fn modify<F>(&self, kind: EntityKind, id: &str, mutate: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Fields) -> Result<(), StoreError>,
    {
        let write_txn = self.db.begin_write().map_err(redb::Error::from)?;
        let (before, after) = {
            let mut table = write_txn
                .open_table(table_for(kind))
                .map_err(redb::Error::from)?;

            let raw = table
                .get(id)
                .map_err(redb::Error::from)?
                .map(|guard| guard.value().to_string())
                .ok_or_else(|| StoreError::NotFound {
                    kind,
                    id: id.to_string(),
                })?;

            let before = parse_fields(id, &raw)?;
            let mut after = before.clone();
            mutate(&mut after)?;

            let encoded = serde_json::to_string(&after)?;
            table
                .insert(id, encoded.as_str())
                .map_err(redb::Error::from)?;
            (before, after)
        };
        reindex(&write_txn, kind, id, Some(&before), Some(&after))?;
        write_txn.commit().map_err(redb::Error::from)?;
        Ok(())
    }
}

fn array_field<'a>(
    fields: &'a mut Fields,
    field: &str,
) -> Result<&'a mut Vec<Value>, StoreError> {
    let slot = fields
        .entry(field.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    slot.as_array_mut()
        .ok_or_else(|| StoreError::Malformed(format!("field `{}` is not an array", field)))
}

#[async_trait]
impl DocumentStore for RedbStore {
    async fn get(&self, kind: EntityKind, id: &str) -> Result<Option<Document>, StoreError> {
        match self.read_one(kind, id)? {
            Some(raw) => Ok(Some(Document {
                id: id.to_string(),
                fields: parse_fields(id, &raw)?,
            })),
            None => Ok(None),
        }
    }

    async fn query(&self, kind: EntityKind, query: &Query) -> Result<Vec<Document>, StoreError> {
        let indexed = index_for(kind).field;

        let docs = match (&query.filter, query.order_by.as_deref()) {
            (None, Some(field)) if field == indexed => {
                let limit = query.limit.unwrap_or(usize::MAX);
                return Ok(self.read_ordered(kind, query.after.as_ref(), limit)?);
            }
            (Some(Filter::Eq(field, Value::String(value))), _) if field == indexed => {
                self.read_prefixed(kind, value)?
            }
            _ => self.read_all(kind)?,
        };

        Ok(query.apply(docs))
    }

    async fn insert(&self, kind: EntityKind, fields: Fields) -> Result<String, StoreError> {
        let encoded = serde_json::to_string(&fields)?;

        let write_txn = self.db.begin_write().map_err(redb::Error::from)?;
        let id = {
            let mut table = write_txn
                .open_table(table_for(kind))
                .map_err(redb::Error::from)?;

            // Regenerate on the (unlikely) event of an id collision
            let mut id = generate_id();
            while table.get(id.as_str()).map_err(redb::Error::from)?.is_some() {
                id = generate_id();
            }

            table
                .insert(id.as_str(), encoded.as_str())
                .map_err(redb::Error::from)?;
            id
        };
        reindex(&write_txn, kind, &id, None, Some(&fields))?;
        write_txn.commit().map_err(redb::Error::from)?;

        tracing::debug!(kind = %kind, id = %id, "document inserted");
        Ok(id)
    }

    async fn update_fields(
        &self,
        kind: EntityKind,
        id: &str,
        fields: Fields,
    ) -> Result<(), StoreError> {
        self.modify(kind, id, |stored| {
            stored.extend(fields);
            Ok(())
        })
    }

    async fn delete(&self, kind: EntityKind, id: &str) -> Result<bool, StoreError> {
        let write_txn = self.db.begin_write().map_err(redb::Error::from)?;
        let removed = {
            let mut table = write_txn
                .open_table(table_for(kind))
                .map_err(redb::Error::from)?;
            let removed = table.remove(id).map_err(redb::Error::from)?;
            removed.map(|guard| guard.value().to_string())
        };
        let existed = removed.is_some();
        if let Some(before) = removed.and_then(|raw| parse_fields(id, &raw).ok()) {
            reindex(&write_txn, kind, id, Some(&before), None)?;
        }
        write_txn.commit().map_err(redb::Error::from)?;

        tracing::debug!(kind = %kind, id = %id, existed, "document deleted");
        Ok(existed)
    }

    async fn array_add(
        &self,
        kind: EntityKind,
        id: &str,
        field: &str,
        value: Value,
    ) -> Result<(), StoreError> {
        self.modify(kind, id, |fields| {
            let items = array_field(fields, field)?;
            if !items.contains(&value) {
                items.push(value);
            }
            Ok(())
        })
    }

    async fn array_remove(
        &self,
        kind: EntityKind,
        id: &str,
        field: &str,
        value: Value,
    ) -> Result<(), StoreError> {
        self.modify(kind, id, |fields| {
            array_field(fields, field)?.retain(|item| item != &value);
            Ok(())
        })
    }
}
