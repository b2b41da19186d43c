//! LanceDB connection and table helpers for one collection directory.
//!
//! A collection is a LanceDB database holding a `chunks` table (rows plus
//! vectors) and a `meta` key/value table describing how it was built.

use arrow_array::{RecordBatch, RecordBatchIterator};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection, Table};
use std::collections::HashMap;
use std::path::Path;

use lawbot_core::{Error, Result};

use crate::schema::{meta_record_batch, record_batch_to_entries};

pub const CHUNKS_TABLE: &str = "chunks";
pub const META_TABLE: &str = "meta";

pub async fn open_db(dir: &Path) -> Result<Connection> {
    connect(dir.to_string_lossy().as_ref()).execute().await.map_err(Error::storage)
}

pub async fn has_tables(conn: &Connection, names: &[&str]) -> Result<bool> {
    let existing = conn.table_names().execute().await.map_err(Error::storage)?;
    Ok(names.iter().all(|n| existing.iter().any(|e| e == n)))
}

pub async fn create_table_from_batch(conn: &Connection, name: &str, batch: RecordBatch) -> Result<Table> {
    let schema = batch.schema();
    let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
    conn.create_table(name, reader).execute().await.map_err(Error::storage)
}

pub async fn open_table(conn: &Connection, name: &str) -> Result<Table> {
    conn.open_table(name).execute().await.map_err(Error::storage)
}

/// Read every row of `table` in storage order.
pub async fn scan(table: &Table, limit: usize) -> Result<Vec<RecordBatch>> {
    table
        .query()
        .limit(limit)
        .execute()
        .await
        .map_err(Error::storage)?
        .try_collect()
        .await
        .map_err(Error::storage)
}

/// How and from what a collection was built. Stored in the `meta` table.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionManifest {
    pub name: String,
    pub source_path: String,
    pub embedder_id: String,
    pub dim: usize,
    pub chunk_count: usize,
    pub built_at: DateTime<Utc>,
}

impl CollectionManifest {
    fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("name", self.name.clone()),
            ("source_path", self.source_path.clone()),
            ("embedder_id", self.embedder_id.clone()),
            ("dim", self.dim.to_string()),
            ("chunk_count", self.chunk_count.to_string()),
            ("built_at", self.built_at.to_rfc3339()),
        ]
    }

    fn from_entries(entries: HashMap<String, String>) -> Result<Self> {
        let get = |key: &str| {
            entries.get(key).cloned().ok_or_else(|| Error::Storage(format!("collection meta is missing '{key}'")))
        };
        let number = |key: &str| -> Result<usize> {
            get(key)?.parse().map_err(|e| Error::Storage(format!("collection meta '{key}': {e}")))
        };
        let built_at = DateTime::parse_from_rfc3339(&get("built_at")?)
            .map_err(|e| Error::Storage(format!("collection meta 'built_at': {e}")))?
            .with_timezone(&Utc);
        Ok(Self {
            name: get("name")?,
            source_path: get("source_path")?,
            embedder_id: get("embedder_id")?,
            dim: number("dim")?,
            chunk_count: number("chunk_count")?,
            built_at,
        })
    }
}

pub async fn write_manifest(conn: &Connection, manifest: &CollectionManifest) -> Result<()> {
    let batch = meta_record_batch(&manifest.entries(), Utc::now().timestamp_millis())?;
    create_table_from_batch(conn, META_TABLE, batch).await?;
    Ok(())
}

pub async fn read_manifest(conn: &Connection) -> Result<CollectionManifest> {
    let table = open_table(conn, META_TABLE).await?;
    let rows = table.count_rows(None).await.map_err(Error::storage)?;
    let mut entries = HashMap::new();
    for batch in scan(&table, rows.max(1)).await? {
        entries.extend(record_batch_to_entries(&batch)?);
    }
    CollectionManifest::from_entries(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_entries_roundtrip() {
        let m = CollectionManifest {
            name: "qa-0123456789abcdef".into(),
            source_path: "/data/qa.txt".into(),
            embedder_id: "hash:d64".into(),
            dim: 64,
            chunk_count: 12,
            built_at: DateTime::parse_from_rfc3339("2026-01-02T03:04:05Z").expect("ts").with_timezone(&Utc),
        };
        let map: HashMap<String, String> = m.entries().into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        assert_eq!(CollectionManifest::from_entries(map).expect("manifest"), m);
    }

    #[test]
    fn missing_meta_key_is_storage_error() {
        assert!(matches!(CollectionManifest::from_entries(HashMap::new()), Err(Error::Storage(_))));
    }
}
