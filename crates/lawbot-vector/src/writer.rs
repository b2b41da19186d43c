use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

use lawbot_core::types::Chunk;
use lawbot_core::{Error, Result};

use crate::schema::chunks_to_record_batch;
use crate::table::{create_table_from_batch, open_db, write_manifest, CollectionManifest, CHUNKS_TABLE};

/// Writes a complete collection into a hidden sibling directory, then swaps
/// it into place with renames. A failed write leaves the previous collection
/// (if any) untouched and no partial directory behind.
pub struct CollectionWriter<'a> {
    root: &'a Path,
    name: &'a str,
}

impl<'a> CollectionWriter<'a> {
    pub fn new(root: &'a Path, name: &'a str) -> Self {
        Self { root, name }
    }

    pub fn target_dir(&self) -> PathBuf {
        self.root.join(self.name)
    }

    fn sibling(&self, tag: &str) -> PathBuf {
        let nanos = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_nanos()).unwrap_or_default();
        self.root.join(format!(".{}.{tag}-{}-{nanos}", self.name, std::process::id()))
    }

    pub async fn write(&self, chunks: &[Chunk], vectors: &[Vec<f32>], manifest: &CollectionManifest) -> Result<PathBuf> {
        let batch = chunks_to_record_batch(chunks, vectors, manifest.dim)?;
        fs::create_dir_all(self.root)?;
        let staging = self.sibling("building");
        let result = async {
            fs::create_dir_all(&staging)?;
            let conn = open_db(&staging).await?;
            create_table_from_batch(&conn, CHUNKS_TABLE, batch).await?;
            write_manifest(&conn, manifest).await?;
            drop(conn);
            self.commit(&staging)
        }
        .await;
        if result.is_err() && staging.exists() {
            if let Err(e) = fs::remove_dir_all(&staging) {
                warn!(dir = %staging.display(), error = %e, "failed to remove staging directory");
            }
        }
        result
    }

    fn commit(&self, staging: &Path) -> Result<PathBuf> {
        let target = self.target_dir();
        if !target.exists() {
            fs::rename(staging, &target)?;
            info!(collection = self.name, dir = %target.display(), "collection committed");
            return Ok(target);
        }
        let retired = self.sibling("old");
        fs::rename(&target, &retired)?;
        if let Err(e) = fs::rename(staging, &target) {
            // Put the previous collection back before reporting
            if let Err(restore) = fs::rename(&retired, &target) {
                warn!(collection = self.name, error = %restore, "could not restore previous collection");
            }
            return Err(Error::Io(e));
        }
        if let Err(e) = fs::remove_dir_all(&retired) {
            warn!(dir = %retired.display(), error = %e, "failed to remove replaced collection");
        }
        debug!(collection = self.name, "replaced previous collection");
        info!(collection = self.name, dir = %target.display(), "collection committed");
        Ok(target)
    }
}
