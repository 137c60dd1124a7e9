use serde::Serialize;
use std::io;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tokio::fs as async_fs;
use tracing::{debug, info, warn};

use super::store::creation_time;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub scanned: u64,
    pub removed: u64,
    pub failed: u64,
}

/// Deletes every file in the storage directory that is older than the
/// configured lifetime. Age is taken from the filesystem birth time.
#[derive(Debug, Clone)]
pub struct RetentionSweeper {
    root: PathBuf,
    lifetime: Duration,
}

impl RetentionSweeper {
    pub fn new(root: impl Into<PathBuf>, lifetime: Duration) -> Self {
        Self {
            root: root.into(),
            lifetime,
        }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    pub async fn sweep(&self) -> SweepReport {
        self.sweep_at(SystemTime::now()).await
    }

    /// One pass over the directory, judging ages against `now`.
    ///
    /// Never fails: an unreadable directory yields an empty report and
    /// per-entry errors are counted in `failed` and skipped.
    pub async fn sweep_at(&self, now: SystemTime) -> SweepReport {
        let mut report = SweepReport::default();

        let mut entries = match async_fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Retention sweep could not read {}: {}", self.root.display(), e);
                return report;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!("Retention sweep stopped listing {}: {}", self.root.display(), e);
                    report.failed += 1;
                    break;
                }
            };

            report.scanned += 1;
            let path = entry.path();

            match self.remove_if_expired(&path, now).await {
                Ok(true) => {
                    debug!("Removed expired upload {}", path.display());
                    report.removed += 1;
                }
                Ok(false) => {}
                // Vanished between listing and removal: a concurrent sweep got it.
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    debug!("Skipping {} during retention sweep: {}", path.display(), e);
                    report.failed += 1;
                }
            }
        }

        if report.removed > 0 || report.failed > 0 {
            info!(
                scanned = report.scanned,
                removed = report.removed,
                failed = report.failed,
                "retention sweep finished"
            );
        }

        report
    }

    pub fn is_expired(&self, created: SystemTime, now: SystemTime) -> bool {
        match now.duration_since(created) {
            Ok(age) => age > self.lifetime,
            Err(_) => false,
        }
    }

    async fn remove_if_expired(&self, path: &std::path::Path, now: SystemTime) -> io::Result<bool> {
        let metadata = async_fs::metadata(path).await?;
        if !metadata.is_file() {
            return Ok(false);
        }

        if !self.is_expired(creation_time(&metadata)?, now) {
            return Ok(false);
        }

        async_fs::remove_file(path).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::store::ContentStore;
    use tempfile::TempDir;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);
    const MINUTE: Duration = Duration::from_secs(60);

    async fn stored_object_time(store: &ContentStore, data: &[u8]) -> (PathBuf, SystemTime) {
        let outcome = store.put(data, "png").await.unwrap();
        let path = store.path_for(outcome.key());
        let created = creation_time(&std::fs::metadata(&path).unwrap()).unwrap();
        (path, created)
    }

    #[tokio::test]
    async fn test_object_kept_just_before_lifetime() {
        let temp_dir = TempDir::new().unwrap();
        let store = ContentStore::new(temp_dir.path());
        let sweeper = RetentionSweeper::new(temp_dir.path(), DAY);

        let (path, created) = stored_object_time(&store, b"young").await;

        let report = sweeper.sweep_at(created + DAY - MINUTE).await;
        assert_eq!(report.removed, 0);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_object_removed_just_after_lifetime() {
        let temp_dir = TempDir::new().unwrap();
        let store = ContentStore::new(temp_dir.path());
        let sweeper = RetentionSweeper::new(temp_dir.path(), DAY);

        let (path, created) = stored_object_time(&store, b"old").await;

        let report = sweeper.sweep_at(created + DAY + MINUTE).await;
        assert_eq!(report, SweepReport { scanned: 1, removed: 1, failed: 0 });
        assert!(!path.exists());
    }

    #[test]
    fn test_expiry_is_strict() {
        let sweeper = RetentionSweeper::new("unused", DAY);
        let created = SystemTime::UNIX_EPOCH + DAY;

        assert!(!sweeper.is_expired(created, created + DAY));
        assert!(sweeper.is_expired(created, created + DAY + Duration::from_millis(1)));
        assert!(!sweeper.is_expired(created, created - MINUTE));
    }

    #[tokio::test]
    async fn test_sweep_leaves_directories_alone() {
        let temp_dir = TempDir::new().unwrap();
        let store = ContentStore::new(temp_dir.path());
        let sweeper = RetentionSweeper::new(temp_dir.path(), DAY);

        let (old_path, created) = stored_object_time(&store, b"first").await;
        let (new_path, _) = stored_object_time(&store, b"second").await;
        std::fs::create_dir(temp_dir.path().join("subdir")).unwrap();

        let report = sweeper.sweep_at(created + DAY + MINUTE).await;
        assert_eq!(report.scanned, 3);
        assert_eq!(report.removed, 2);
        assert!(!old_path.exists());
        assert!(!new_path.exists());
        assert!(temp_dir.path().join("subdir").is_dir());

        let report = sweeper.sweep().await;
        assert_eq!(report, SweepReport { scanned: 1, removed: 0, failed: 0 });
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_vanished_entry_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let store = ContentStore::new(temp_dir.path());
        let sweeper = RetentionSweeper::new(temp_dir.path(), DAY);

        let (path, created) = stored_object_time(&store, b"expired").await;
        std::os::unix::fs::symlink(
            temp_dir.path().join("deleted-target"),
            temp_dir.path().join("dangling"),
        )
        .unwrap();

        let report = sweeper.sweep_at(created + DAY + MINUTE).await;
        assert_eq!(report, SweepReport { scanned: 2, removed: 1, failed: 0 });
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unreadable_entry_is_counted_and_sweep_continues() {
        let temp_dir = TempDir::new().unwrap();
        let store = ContentStore::new(temp_dir.path());
        let sweeper = RetentionSweeper::new(temp_dir.path(), DAY);

        let (path, created) = stored_object_time(&store, b"expired").await;
        let looped = temp_dir.path().join("loop");
        std::os::unix::fs::symlink(&looped, &looped).unwrap();

        let report = sweeper.sweep_at(created + DAY + MINUTE).await;
        assert_eq!(report, SweepReport { scanned: 2, removed: 1, failed: 1 });
        assert!(!path.exists());
        assert!(std::fs::symlink_metadata(&looped).is_ok());
    }

    #[tokio::test]
    async fn test_sweep_of_missing_directory_is_harmless() {
        let temp_dir = TempDir::new().unwrap();
        let sweeper = RetentionSweeper::new(temp_dir.path().join("gone"), DAY);

        assert_eq!(sweeper.sweep().await, SweepReport::default());
    }

    #[tokio::test]
    async fn test_reupload_after_expiry_is_stored_again() {
        let temp_dir = TempDir::new().unwrap();
        let store = ContentStore::new(temp_dir.path());
        let sweeper = RetentionSweeper::new(temp_dir.path(), DAY);

        let (path, created) = stored_object_time(&store, b"cycle").await;
        sweeper.sweep_at(created + DAY + MINUTE).await;
        assert!(!path.exists());

        let outcome = store.put(b"cycle", "png").await.unwrap();
        assert!(matches!(outcome, crate::files::StoreOutcome::Stored(_)));
        assert!(path.exists());
    }
}
