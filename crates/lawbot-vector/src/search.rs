use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{DistanceType, Table};
use std::path::{Path, PathBuf};
use tracing::debug;

use lawbot_core::types::{Chunk, SearchHit};
use lawbot_core::{Error, Result};

use crate::schema::record_batch_to_chunks;
use crate::table::{has_tables, open_db, open_table, read_manifest, scan, CollectionManifest, CHUNKS_TABLE, META_TABLE};

/// A built, read-only collection of embedded chunks.
pub struct Collection {
    name: String,
    dir: PathBuf,
    chunks: Table,
    manifest: CollectionManifest,
}

impl Collection {
    /// Open the collection stored at `dir`; `CollectionNotFound` when absent.
    pub async fn open(dir: &Path, name: &str) -> Result<Self> {
        if !dir.is_dir() {
            return Err(Error::CollectionNotFound(name.to_string()));
        }
        let conn = open_db(dir).await?;
        if !has_tables(&conn, &[CHUNKS_TABLE, META_TABLE]).await? {
            return Err(Error::CollectionNotFound(name.to_string()));
        }
        let manifest = read_manifest(&conn).await?;
        let chunks = open_table(&conn, CHUNKS_TABLE).await?;
        Ok(Self { name: name.to_string(), dir: dir.to_path_buf(), chunks, manifest })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn manifest(&self) -> &CollectionManifest {
        &self.manifest
    }

    pub async fn count(&self) -> Result<usize> {
        self.chunks.count_rows(None).await.map_err(Error::storage)
    }

    /// k nearest chunks by cosine distance; `score = 1 - distance`.
    /// Order among equal distances is whatever the store returns.
    pub async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.manifest.dim {
            return Err(Error::Storage(format!(
                "query vector has dimension {} but collection '{}' has {}",
                query.len(),
                self.name,
                self.manifest.dim
            )));
        }
        let batches: Vec<_> = self
            .chunks
            .vector_search(query.to_vec())
            .map_err(Error::storage)?
            .distance_type(DistanceType::Cosine)
            .limit(k)
            .execute()
            .await
            .map_err(Error::storage)?
            .try_collect()
            .await
            .map_err(Error::storage)?;
        let mut hits = Vec::with_capacity(k);
        for batch in &batches {
            for (chunk, distance) in record_batch_to_chunks(batch)? {
                hits.push(SearchHit { chunk, score: distance.map_or(0.0, |d| 1.0 - d) });
            }
        }
        debug!(collection = %self.name, k, hits = hits.len(), "vector search");
        Ok(hits)
    }

    /// The first `limit` chunks by chunk index.
    pub async fn peek(&self, limit: usize) -> Result<Vec<Chunk>> {
        let mut chunks = self.chunks().await?;
        chunks.truncate(limit);
        Ok(chunks)
    }

    /// Every chunk, ordered by chunk index.
    pub async fn chunks(&self) -> Result<Vec<Chunk>> {
        let rows = self.count().await?;
        let mut out = Vec::with_capacity(rows);
        for batch in scan(&self.chunks, rows.max(1)).await? {
            out.extend(record_batch_to_chunks(&batch)?.into_iter().map(|(c, _)| c));
        }
        out.sort_by_key(|c| c.chunk_index);
        Ok(out)
    }
}
