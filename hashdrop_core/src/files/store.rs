//! Content-addressed object store over a single flat directory.
//!
//! Every object lives at `<root>/<sha256 hex>.<extension>`. The directory is
//! the only source of truth; nothing is cached in memory, so the store can be
//! cloned freely and several processes may share one root.

use chrono::{DateTime, Utc};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs as async_fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use uuid::Uuid;

use super::models::{ObjectKey, StorageStats, StoreOutcome, StoredObject};

/// Prefix of in-flight writes. The leading dot keeps them out of key space.
pub const TEMP_PREFIX: &str = ".upload-";

#[derive(Debug, Clone)]
pub struct ContentStore {
    root: PathBuf,
}

impl ContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn initialize(&self) -> io::Result<()> {
        if !async_fs::try_exists(&self.root).await? {
            async_fs::create_dir_all(&self.root).await?;
            info!("Created storage directory {}", self.root.display());
        }
        Ok(())
    }

    pub fn path_for(&self, key: &ObjectKey) -> PathBuf {
        self.root.join(key.to_string())
    }

    pub async fn contains(&self, key: &ObjectKey) -> io::Result<bool> {
        async_fs::try_exists(self.path_for(key)).await
    }

    /// Stores `data` under its content key unless an object with that key
    /// already exists.
    ///
    /// The bytes are written to a private temporary file first and then
    /// published with a hard link, which fails if the key appeared in the
    /// meantime. Concurrent uploads of the same content therefore yield one
    /// `Stored` and `Duplicate` for everyone else, and no reader can observe
    /// a partially written object.
    pub async fn put(&self, data: &[u8], extension: &str) -> io::Result<StoreOutcome> {
        let key = ObjectKey::for_content(data, extension);
        let path = self.path_for(&key);

        if async_fs::try_exists(&path).await? {
            debug!(key = %key, "object already present");
            return Ok(StoreOutcome::Duplicate(key));
        }

        let temp_path = self
            .root
            .join(format!("{}{}.tmp", TEMP_PREFIX, Uuid::new_v4()));

        if let Err(e) = write_synced(&temp_path, data).await {
            let _ = async_fs::remove_file(&temp_path).await;
            return Err(e);
        }

        let published = publish(&temp_path, &path).await;

        match async_fs::remove_file(&temp_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => debug!("Failed to remove temporary file {}: {}", temp_path.display(), e),
        }

        if published? {
            debug!(key = %key, size = data.len(), "object stored");
            Ok(StoreOutcome::Stored(key))
        } else {
            debug!(key = %key, "lost publish race, object already present");
            Ok(StoreOutcome::Duplicate(key))
        }
    }

    pub async fn get(&self, key: &ObjectKey) -> io::Result<Option<Vec<u8>>> {
        match async_fs::read(self.path_for(key)).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn get_object(&self, key: &ObjectKey) -> io::Result<Option<StoredObject>> {
        match async_fs::metadata(self.path_for(key)).await {
            Ok(metadata) => Ok(Some(StoredObject {
                key: key.clone(),
                size: metadata.len(),
                created_at: DateTime::<Utc>::from(creation_time(&metadata)?),
            })),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Lists every well-formed object. Temporary files and foreign entries
    /// are skipped, as are objects deleted while the listing runs.
    pub async fn list(&self) -> io::Result<Vec<StoredObject>> {
        let mut objects = Vec::new();
        let mut entries = async_fs::read_dir(&self.root).await?;

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(key) = name.to_str().and_then(ObjectKey::parse) else {
                continue;
            };

            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            };

            if !metadata.is_file() {
                continue;
            }

            objects.push(StoredObject {
                key,
                size: metadata.len(),
                created_at: DateTime::<Utc>::from(creation_time(&metadata)?),
            });
        }

        Ok(objects)
    }

    pub async fn stats(&self) -> io::Result<StorageStats> {
        let objects = self.list().await?;

        Ok(StorageStats {
            object_count: objects.len() as u64,
            total_size: objects.iter().map(|o| o.size).sum(),
            storage_path: self.root.clone(),
        })
    }
}

/// Birth time of a directory entry. Falls back to the modification time on
/// filesystems without birth times; objects are never modified once
/// published, so the two agree.
pub fn creation_time(metadata: &std::fs::Metadata) -> io::Result<SystemTime> {
    metadata.created().or_else(|_| metadata.modified())
}

async fn write_synced(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = async_fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    Ok(())
}

/// Returns `false` when `target` already exists.
async fn publish(temp_path: &Path, target: &Path) -> io::Result<bool> {
    match async_fs::hard_link(temp_path, target).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => {
            // Some filesystems refuse hard links. A rename may replace an
            // object raced in by another writer, but with identical bytes.
            debug!("hard link failed ({}), publishing by rename", e);
            async_fs::rename(temp_path, target).await?;
            Ok(true)
        }
    }
}
