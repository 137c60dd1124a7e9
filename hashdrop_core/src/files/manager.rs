use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::StorageConfig;
use crate::error::{AppError, Result};
use crate::metrics::UploadMetrics;
use super::models::{ObjectKey, StorageStats, StoreOutcome, StoredObject, UploadRequest, UploadResult};
use super::retention::{RetentionSweeper, SweepReport};
use super::store::ContentStore;
use super::validation::{FileValidationConfig, FileValidator, ValidationError};

#[derive(Debug, Clone)]
pub struct FileManagerConfig {
    pub storage_path: PathBuf,
    pub validation: FileValidationConfig,
    pub lifetime: Duration,
}

impl Default for FileManagerConfig {
    fn default() -> Self {
        Self::from(&StorageConfig::default())
    }
}

impl From<&StorageConfig> for FileManagerConfig {
    fn from(storage: &StorageConfig) -> Self {
        Self {
            storage_path: storage.upload_dir.clone(),
            validation: FileValidationConfig::from(storage),
            lifetime: storage.lifetime(),
        }
    }
}

/// Runs one upload through sweep, validation and storage.
#[derive(Clone)]
pub struct FileManager {
    store: ContentStore,
    validator: FileValidator,
    sweeper: RetentionSweeper,
    metrics: UploadMetrics,
}

impl FileManager {
    pub fn new(config: FileManagerConfig) -> Self {
        Self {
            store: ContentStore::new(config.storage_path.clone()),
            validator: FileValidator::new(config.validation),
            sweeper: RetentionSweeper::new(config.storage_path, config.lifetime),
            metrics: UploadMetrics::new(),
        }
    }

    pub fn with_default_config() -> Self {
        Self::new(FileManagerConfig::default())
    }

    pub async fn initialize(&self) -> Result<()> {
        self.store.initialize().await?;
        Ok(())
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    pub fn validator(&self) -> &FileValidator {
        &self.validator
    }

    pub fn sweeper(&self) -> &RetentionSweeper {
        &self.sweeper
    }

    pub fn metrics(&self) -> &UploadMetrics {
        &self.metrics
    }

    /// Full upload path: a retention sweep, then validation, then storage.
    pub async fn upload_file(&self, original_filename: &str, data: &[u8]) -> UploadResult {
        self.sweep_expired().await;
        self.process_upload(original_filename, data).await
    }

    pub async fn store_file(&self, upload: UploadRequest) -> Result<StoreOutcome> {
        self.upload_file(&upload.original_filename, &upload.data)
            .await
            .into_outcome()
    }

    /// Validation and storage without the leading sweep, for callers that
    /// already swept before reading the request body.
    pub async fn process_upload(&self, original_filename: &str, data: &[u8]) -> UploadResult {
        if data.is_empty() {
            self.metrics.record_rejected();
            return UploadResult::NoFile;
        }

        let extension = match self
            .validator
            .validate(original_filename, data.len() as u64)
            .into_result()
        {
            Ok(extension) => extension,
            Err(reason) => {
                debug!("Rejected upload {:?}: {}", original_filename, reason);
                self.metrics.record_rejected();
                return match reason {
                    ValidationError::FileTooLarge { size, max_size } => {
                        UploadResult::TooLarge { size, max_size }
                    }
                    ValidationError::InvalidFileType { .. } => UploadResult::InvalidType,
                    ValidationError::EmptyFile => UploadResult::NoFile,
                };
            }
        };

        match self.store.put(data, &extension).await {
            Ok(StoreOutcome::Stored(key)) => {
                info!(key = %key, size = data.len(), "stored new upload");
                self.metrics.record_stored();
                UploadResult::Stored(key)
            }
            Ok(StoreOutcome::Duplicate(key)) => {
                info!(key = %key, "duplicate upload detected");
                self.metrics.record_duplicate();
                UploadResult::Duplicate(key)
            }
            Err(e) => {
                error!("Failed to store upload {:?}: {}", original_filename, e);
                self.metrics.record_failed();
                UploadResult::StorageFailure(e)
            }
        }
    }

    pub async fn sweep_expired(&self) -> SweepReport {
        let report = self.sweeper.sweep().await;
        self.metrics.record_sweep(&report);
        report
    }

    /// Sweeps every `interval` on the current runtime, in addition to the
    /// sweep each upload performs.
    pub fn spawn_periodic_sweep(&self, interval: Duration) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                manager.sweep_expired().await;
            }
        })
    }

    /// Looks up an object by its on-disk name. Names that are not valid keys
    /// for an allowed extension are treated as missing.
    pub async fn get_file_data(&self, name: &str) -> Result<Option<(StoredObject, Vec<u8>)>> {
        let Some(key) = self.parse_key(name) else {
            return Ok(None);
        };

        let Some(object) = self.store.get_object(&key).await? else {
            return Ok(None);
        };

        match self.store.get(&key).await? {
            Some(data) => Ok(Some((object, data))),
            None => Ok(None),
        }
    }

    pub async fn get_storage_stats(&self) -> Result<StorageStats> {
        Ok(self.store.stats().await?)
    }

    fn parse_key(&self, name: &str) -> Option<ObjectKey> {
        ObjectKey::parse(name).filter(|key| self.validator.is_allowed_extension(key.extension()))
    }
}

impl UploadResult {
    /// Splits the result into the success outcome and the error reported to
    /// clients.
    pub fn into_outcome(self) -> Result<StoreOutcome> {
        match self {
            UploadResult::Stored(key) => Ok(StoreOutcome::Stored(key)),
            UploadResult::Duplicate(key) => Ok(StoreOutcome::Duplicate(key)),
            UploadResult::NoFile => Err(AppError::NoFile),
            UploadResult::InvalidType => Err(AppError::InvalidFileType),
            UploadResult::TooLarge { max_size, .. } => Err(AppError::FileTooLarge { max_size }),
            UploadResult::StorageFailure(e) => Err(AppError::Storage(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_manager() -> (FileManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = FileManagerConfig {
            storage_path: temp_dir.path().to_path_buf(),
            ..FileManagerConfig::default()
        };
        (FileManager::new(config), temp_dir)
    }

    fn file_count(dir: &std::path::Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[tokio::test]
    async fn test_upload_then_duplicate() {
        let (manager, temp_dir) = create_test_manager();
        let data = b"GIF89a tiny".to_vec();

        let first = manager.upload_file("cat.gif", &data).await;
        let key = match first {
            UploadResult::Stored(key) => key,
            other => panic!("expected Stored, got {:?}", other),
        };

        let second = manager.upload_file("another-name.GIF", &data).await;
        assert!(matches!(second, UploadResult::Duplicate(ref k) if *k == key));

        assert_eq!(file_count(temp_dir.path()), 1);
        assert_eq!(std::fs::read(temp_dir.path().join(key.to_string())).unwrap(), data);
    }

    #[tokio::test]
    async fn test_extensions_normalize_to_one_key() {
        let (manager, temp_dir) = create_test_manager();
        let data = b"jpeg body".to_vec();

        assert!(matches!(manager.upload_file("photo.JPG", &data).await, UploadResult::Stored(_)));
        assert!(matches!(manager.upload_file("photo.jpg", &data).await, UploadResult::Duplicate(_)));
        assert!(matches!(manager.upload_file("photo.jPg", &data).await, UploadResult::Duplicate(_)));

        let key = ObjectKey::for_content(&data, "jpg");
        assert!(temp_dir.path().join(key.to_string()).exists());
        assert_eq!(file_count(temp_dir.path()), 1);
    }

    #[tokio::test]
    async fn test_rejections() {
        let (manager, temp_dir) = create_test_manager();

        assert!(matches!(manager.upload_file("a.png", b"").await, UploadResult::NoFile));
        assert!(matches!(manager.upload_file("archive.zip", b"PK").await, UploadResult::InvalidType));
        assert!(matches!(manager.upload_file("noext", b"data").await, UploadResult::InvalidType));

        let too_big = vec![0u8; 5_242_881];
        assert!(matches!(
            manager.upload_file("big.png", &too_big).await,
            UploadResult::TooLarge { size: 5_242_881, max_size: 5_242_880 }
        ));

        assert_eq!(file_count(temp_dir.path()), 0);
        assert_eq!(manager.metrics().get_snapshot().rejected, 4);
    }

    #[tokio::test]
    async fn test_exact_limit_is_accepted() {
        let (manager, _temp_dir) = create_test_manager();
        let data = vec![1u8; 5_242_880];

        assert!(matches!(manager.upload_file("max.webp", &data).await, UploadResult::Stored(_)));
    }

    #[tokio::test]
    async fn test_storage_failure() {
        let temp_dir = TempDir::new().unwrap();
        let config = FileManagerConfig {
            storage_path: temp_dir.path().join("not-created"),
            ..FileManagerConfig::default()
        };
        let manager = FileManager::new(config);

        let result = manager.upload_file("a.png", b"bytes").await;
        assert!(matches!(result, UploadResult::StorageFailure(_)));
        assert!(matches!(result.into_outcome(), Err(AppError::Storage(_))));
        assert_eq!(manager.metrics().get_snapshot().failed, 1);
    }

    #[tokio::test]
    async fn test_store_file_and_lookup() {
        let (manager, _temp_dir) = create_test_manager();

        let outcome = manager
            .store_file(UploadRequest::new("pic.png", b"png bytes".to_vec()))
            .await
            .unwrap();
        let name = outcome.key().to_string();

        let (object, data) = manager.get_file_data(&name).await.unwrap().unwrap();
        assert_eq!(object.key, *outcome.key());
        assert_eq!(object.size, 9);
        assert_eq!(data, b"png bytes");

        assert!(manager.get_file_data("../secret.png").await.unwrap().is_none());
        let disallowed = name.replace(".png", ".exe");
        assert!(manager.get_file_data(&disallowed).await.unwrap().is_none());

        let stats = manager.get_storage_stats().await.unwrap();
        assert_eq!(stats.object_count, 1);
        assert_eq!(stats.total_size, 9);
    }

    #[tokio::test]
    async fn test_periodic_sweep_runs() {
        let (manager, _temp_dir) = create_test_manager();

        let handle = manager.spawn_periodic_sweep(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort();

        assert!(manager.metrics().get_snapshot().sweeps >= 1);
    }

    #[tokio::test]
    async fn test_upload_runs_sweep_first() {
        let (manager, _temp_dir) = create_test_manager();

        manager.upload_file("x.txt", b"data").await;
        manager.upload_file("y.png", b"data").await;

        assert_eq!(manager.metrics().get_snapshot().sweeps, 2);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_upload_survives_bad_entries_in_sweep() {
        let (manager, temp_dir) = create_test_manager();
        std::os::unix::fs::symlink(
            temp_dir.path().join("missing"),
            temp_dir.path().join("dangling"),
        )
        .unwrap();
        let looped = temp_dir.path().join("loop");
        std::os::unix::fs::symlink(&looped, &looped).unwrap();

        let result = manager.upload_file("photo.png", b"png bytes").await;
        assert!(matches!(result, UploadResult::Stored(_)));

        let key = ObjectKey::for_content(b"png bytes", "png");
        assert!(temp_dir.path().join(key.to_string()).exists());
        assert_eq!(manager.metrics().get_snapshot().sweeps, 1);
    }
}
