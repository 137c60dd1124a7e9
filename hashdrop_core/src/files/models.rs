use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::PathBuf;

/// Length of a hex-encoded SHA-256 digest.
pub const DIGEST_HEX_LEN: usize = 64;

/// Canonical name of a stored object: `<hex sha256>.<extension>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectKey {
    digest: String,
    extension: String,
}

impl ObjectKey {
    /// `extension` must already be normalized by the validator.
    pub fn for_content(data: &[u8], extension: &str) -> Self {
        Self {
            digest: hex::encode(Sha256::digest(data)),
            extension: extension.to_string(),
        }
    }

    /// Parses a filename back into a key. Returns `None` for anything that
    /// could not have been produced by [`ObjectKey::for_content`].
    pub fn parse(name: &str) -> Option<Self> {
        let (digest, extension) = name.split_once('.')?;

        let digest_ok = digest.len() == DIGEST_HEX_LEN
            && digest
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        let extension_ok = !extension.is_empty()
            && extension
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit());

        if digest_ok && extension_ok {
            Some(Self {
                digest: digest.to_string(),
                extension: extension.to_string(),
            })
        } else {
            None
        }
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.digest, self.extension)
    }
}

/// An object as found on disk.
#[derive(Debug, Clone, Serialize)]
pub struct StoredObject {
    pub key: ObjectKey,
    pub size: u64,
    pub created_at: DateTime<Utc>,
}

/// One inbound upload, owned by the ingest pipeline for the request's lifetime.
#[derive(Debug)]
pub struct UploadRequest {
    pub original_filename: String,
    pub data: Vec<u8>,
}

impl UploadRequest {
    pub fn new(original_filename: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            original_filename: original_filename.into(),
            data: data.into(),
        }
    }

    pub fn declared_size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// What the content store did with a validated upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOutcome {
    Stored(ObjectKey),
    Duplicate(ObjectKey),
}

impl StoreOutcome {
    pub fn key(&self) -> &ObjectKey {
        match self {
            StoreOutcome::Stored(key) | StoreOutcome::Duplicate(key) => key,
        }
    }
}

/// Every way an upload can end.
#[derive(Debug)]
pub enum UploadResult {
    NoFile,
    InvalidType,
    TooLarge { size: u64, max_size: u64 },
    Duplicate(ObjectKey),
    Stored(ObjectKey),
    StorageFailure(std::io::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct StorageStats {
    pub object_count: u64,
    pub total_size: u64,
    pub storage_path: PathBuf,
}
