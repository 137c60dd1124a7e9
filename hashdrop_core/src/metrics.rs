//! Upload and retention counters

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use parking_lot::RwLock;
use serde::Serialize;
use chrono::{DateTime, Utc};

use crate::files::SweepReport;

#[derive(Clone)]
pub struct UploadMetrics {
    stored: Arc<AtomicU64>,
    duplicates: Arc<AtomicU64>,
    rejected: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
    sweeps: Arc<AtomicU64>,
    swept_objects: Arc<AtomicU64>,
    last_sweep: Arc<RwLock<Option<DateTime<Utc>>>>,
    start_time: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub stored: u64,
    pub duplicates: u64,
    pub rejected: u64,
    pub failed: u64,
    pub sweeps: u64,
    pub swept_objects: u64,
    pub last_sweep: Option<DateTime<Utc>>,
    pub uptime_seconds: i64,
    pub duplicate_rate: f64,
}

impl UploadMetrics {
    pub fn new() -> Self {
        Self {
            stored: Arc::new(AtomicU64::new(0)),
            duplicates: Arc::new(AtomicU64::new(0)),
            rejected: Arc::new(AtomicU64::new(0)),
            failed: Arc::new(AtomicU64::new(0)),
            sweeps: Arc::new(AtomicU64::new(0)),
            swept_objects: Arc::new(AtomicU64::new(0)),
            last_sweep: Arc::new(RwLock::new(None)),
            start_time: Utc::now(),
        }
    }

    pub fn record_stored(&self) {
        self.stored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sweep(&self, report: &SweepReport) {
        self.sweeps.fetch_add(1, Ordering::Relaxed);
        self.swept_objects.fetch_add(report.removed, Ordering::Relaxed);
        *self.last_sweep.write() = Some(Utc::now());
    }

    pub fn get_snapshot(&self) -> MetricsSnapshot {
        let stored = self.stored.load(Ordering::Relaxed);
        let duplicates = self.duplicates.load(Ordering::Relaxed);
        let accepted = stored + duplicates;

        MetricsSnapshot {
            stored,
            duplicates,
            rejected: self.rejected.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            sweeps: self.sweeps.load(Ordering::Relaxed),
            swept_objects: self.swept_objects.load(Ordering::Relaxed),
            last_sweep: *self.last_sweep.read(),
            uptime_seconds: Utc::now().signed_duration_since(self.start_time).num_seconds(),
            duplicate_rate: if accepted > 0 {
                duplicates as f64 / accepted as f64
            } else {
                0.0
            },
        }
    }
}

impl Default for UploadMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_and_duplicate_rate() {
        let metrics = UploadMetrics::new();
        metrics.record_stored();
        metrics.record_duplicate();
        metrics.record_duplicate();
        metrics.record_duplicate();
        metrics.record_rejected();

        let snapshot = metrics.get_snapshot();
        assert_eq!(snapshot.stored, 1);
        assert_eq!(snapshot.duplicates, 3);
        assert_eq!(snapshot.rejected, 1);
        assert_eq!(snapshot.failed, 0);
        assert!((snapshot.duplicate_rate - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_sweep_recording() {
        let metrics = UploadMetrics::new();
        assert!(metrics.get_snapshot().last_sweep.is_none());

        metrics.record_sweep(&SweepReport { scanned: 4, removed: 2, failed: 1 });
        metrics.record_sweep(&SweepReport { scanned: 2, removed: 1, failed: 0 });

        let snapshot = metrics.get_snapshot();
        assert_eq!(snapshot.sweeps, 2);
        assert_eq!(snapshot.swept_objects, 3);
        assert!(snapshot.last_sweep.is_some());
    }
}
