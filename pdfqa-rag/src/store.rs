//! Durable storage for index snapshots.
//!
//! A snapshot is a single JSON document, `index.json`, inside the configured
//! data directory. Writes go to a temporary sibling file that is synced and
//! then renamed over the previous snapshot, so a crash mid-write leaves the
//! old snapshot intact.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::document::IndexEntry;
use crate::error::{RagError, Result};
use crate::index::{IndexSnapshot, IndexState};

/// Current on-disk format version.
pub const SNAPSHOT_VERSION: u32 = 1;

const SNAPSHOT_FILE: &str = "index.json";
const SNAPSHOT_TMP_FILE: &str = "index.json.tmp";

#[derive(Serialize)]
struct PersistedIndexRef<'a> {
    version: u32,
    state: IndexState,
    dimensions: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    embedding_model: Option<&'a str>,
    entries: Vec<&'a IndexEntry>,
}

#[derive(Deserialize)]
struct PersistedIndex {
    version: u32,
    state: IndexState,
    dimensions: Option<usize>,
    #[serde(default)]
    embedding_model: Option<String>,
    entries: Vec<IndexEntry>,
}

/// A directory holding the index snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
    embedding_model: Option<String>,
}

impl SnapshotStore {
    /// Create a store rooted at `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), embedding_model: None }
    }

    /// Record `model` in every saved snapshot and warn when loading one
    /// written by a different model.
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = Some(model.into());
        self
    }

    /// The directory this store writes to.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn snapshot_path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILE)
    }

    /// Write `snapshot`, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Persistence`] if serialization or any filesystem
    /// step fails. The previous snapshot is left in place in that case.
    pub async fn save(&self, snapshot: &IndexSnapshot) -> Result<()> {
        let persisted = PersistedIndexRef {
            version: SNAPSHOT_VERSION,
            state: snapshot.state(),
            dimensions: snapshot.dimensions(),
            embedding_model: self.embedding_model.as_deref(),
            entries: snapshot.entries().collect(),
        };
        let data = serde_json::to_vec(&persisted)
            .map_err(|e| RagError::Persistence(format!("failed to encode index snapshot: {e}")))?;

        let path = self.snapshot_path();
        let tmp_path = self.dir.join(SNAPSHOT_TMP_FILE);
        debug!(path = %path.display(), bytes = data.len(), "writing index snapshot");

        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            RagError::Persistence(format!("failed to create snapshot directory: {e}"))
        })?;
        write_synced(&tmp_path, &data)
            .await
            .map_err(|e| RagError::Persistence(format!("failed to write index snapshot: {e}")))?;
        tokio::fs::rename(&tmp_path, &path).await.map_err(|e| {
            RagError::Persistence(format!("failed to replace index snapshot: {e}"))
        })?;
        sync_dir(&self.dir).await.map_err(|e| {
            RagError::Persistence(format!("failed to sync snapshot directory: {e}"))
        })?;

        info!(entries = snapshot.len(), state = ?snapshot.state(), "saved index snapshot");
        Ok(())
    }

    /// Read the snapshot, or `None` if none has been written yet.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Persistence`] if the file exists but cannot be
    /// read or decoded, or was written in an unsupported format version.
    pub async fn load(&self) -> Result<Option<IndexSnapshot>> {
        let path = self.snapshot_path();
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no index snapshot found, starting empty");
                return Ok(None);
            }
            Err(e) => {
                return Err(RagError::Persistence(format!("failed to read index snapshot: {e}")));
            }
        };

        let persisted: PersistedIndex = serde_json::from_slice(&data)
            .map_err(|e| RagError::Persistence(format!("failed to decode index snapshot: {e}")))?;

        if persisted.version != SNAPSHOT_VERSION {
            return Err(RagError::Persistence(format!(
                "unsupported index snapshot version {} (expected {SNAPSHOT_VERSION})",
                persisted.version
            )));
        }
        if let (Some(stored), Some(configured)) =
            (persisted.embedding_model.as_deref(), self.embedding_model.as_deref())
        {
            if stored != configured {
                warn!(stored, configured, "index snapshot was built with a different embedding model");
            }
        }

        let snapshot =
            IndexSnapshot::from_parts(persisted.state, persisted.dimensions, persisted.entries)?;
        info!(entries = snapshot.len(), state = ?snapshot.state(), "loaded index snapshot");
        Ok(Some(snapshot))
    }
}

async fn write_synced(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(data).await?;
    file.sync_all().await
}

/// Make the rename itself durable.
#[cfg(unix)]
async fn sync_dir(dir: &Path) -> std::io::Result<()> {
    tokio::fs::File::open(dir).await?.sync_all().await
}

#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}
