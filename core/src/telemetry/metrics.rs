use serde::Serialize;
use std::sync::Mutex;

/// Per-run volume counters shared by the driver.
pub struct MetricsRecorder {
    inner: Mutex<Metrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub processed: usize,
    pub dealiased: usize,
    pub restored: usize,
    pub errors: usize,
    pub gates_dealiased: usize,
}

struct Metrics {
    snapshot: MetricsSnapshot,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Metrics {
                snapshot: MetricsSnapshot::default(),
            }),
        }
    }

    /// Counts one processed volume and whether it was unfolded or rolled back.
    pub fn record_volume(&self, unfolded: bool, gates_dealiased: usize) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.snapshot.processed += 1;
            if unfolded {
                metrics.snapshot.dealiased += 1;
                metrics.snapshot.gates_dealiased += gates_dealiased;
            } else {
                metrics.snapshot.restored += 1;
            }
        }
    }

    pub fn record_error(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.snapshot.processed += 1;
            metrics.snapshot.errors += 1;
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        if let Ok(metrics) = self.inner.lock() {
            metrics.snapshot
        } else {
            MetricsSnapshot::default()
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volumes_split_into_dealiased_and_restored() {
        let metrics = MetricsRecorder::new();
        metrics.record_volume(true, 120);
        metrics.record_volume(false, 0);
        metrics.record_error();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.processed, 3);
        assert_eq!(snapshot.dealiased, 1);
        assert_eq!(snapshot.restored, 1);
        assert_eq!(snapshot.errors, 1);
        assert_eq!(snapshot.gates_dealiased, 120);
    }
}
