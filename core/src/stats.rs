//! Shared cross-worker statistics
//!
//! Every worker holds an `Arc<SharedStats>`. Latency samples are folded in
//! per response, per-worker totals once per worker; both go through the same
//! lock, which is also taken for the final snapshot.

use parking_lot::Mutex;
use std::time::Duration;

/// Accumulated statistics across all workers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlobalStats {
    /// Cumulative elapsed time of each finished worker, in push order
    pub elapsed: Vec<Duration>,
    /// Frames processed by each finished worker, aligned with `elapsed`
    pub frames: Vec<usize>,
    /// Sum of decoded per-frame latencies
    pub latency_sum: f64,
    /// Number of latencies summed
    pub latency_count: u64,
}

impl GlobalStats {
    /// Number of workers that reported totals
    pub fn workers(&self) -> usize {
        self.elapsed.len()
    }

    /// Sum of per-worker elapsed times
    pub fn total_elapsed(&self) -> Duration {
        self.elapsed.iter().sum()
    }

    /// Sum of per-worker frame counts
    pub fn total_frames(&self) -> usize {
        self.frames.iter().sum()
    }

    /// Mean per-worker elapsed time in milliseconds
    pub fn mean_elapsed_ms(&self) -> Option<f64> {
        if self.elapsed.is_empty() {
            return None;
        }
        Some(self.total_elapsed().as_secs_f64() * 1000.0 / self.elapsed.len() as f64)
    }

    /// Mean latency, `None` when no latency was recorded
    pub fn average_latency(&self) -> Option<f64> {
        if self.latency_count == 0 {
            None
        } else {
            Some(self.latency_sum / self.latency_count as f64)
        }
    }
}

/// Lock-protected [`GlobalStats`] shared by all workers
#[derive(Debug, Default)]
pub struct SharedStats {
    inner: Mutex<GlobalStats>,
}

impl SharedStats {
    /// Create empty shared stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one decoded latency into the running sum and count
    pub fn record_latency(&self, latency: f64) {
        let mut stats = self.inner.lock();
        stats.latency_sum += latency;
        stats.latency_count += 1;
    }

    /// Append one worker's totals
    pub fn record_worker(&self, elapsed: Duration, frames: usize) {
        let mut stats = self.inner.lock();
        stats.elapsed.push(elapsed);
        stats.frames.push(frames);
    }

    /// Copy the current state
    pub fn snapshot(&self) -> GlobalStats {
        self.inner.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_global_stats_defaults() {
        let stats = GlobalStats::default();
        assert_eq!(stats.workers(), 0);
        assert_eq!(stats.total_frames(), 0);
        assert!(stats.mean_elapsed_ms().is_none());
        assert!(stats.average_latency().is_none());
    }

    #[test]
    fn test_average_latency() {
        let shared = SharedStats::new();
        for latency in [10.0, 20.0, 30.0, 40.0] {
            shared.record_latency(latency);
        }
        let stats = shared.snapshot();
        assert_eq!(stats.latency_count, 4);
        assert!((stats.average_latency().unwrap() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_worker_totals() {
        let shared = SharedStats::new();
        shared.record_worker(Duration::from_millis(4000), 100);
        shared.record_worker(Duration::from_millis(6000), 300);

        let stats = shared.snapshot();
        assert_eq!(stats.workers(), 2);
        assert_eq!(stats.total_frames(), 400);
        assert_eq!(stats.total_elapsed(), Duration::from_millis(10_000));
        assert!((stats.mean_elapsed_ms().unwrap() - 5000.0).abs() < 1e-9);
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        const WORKERS: usize = 64;
        const LATENCIES_PER_WORKER: usize = 500;

        let shared = Arc::new(SharedStats::new());
        let handles: Vec<_> = (0..WORKERS)
            .map(|id| {
                let shared = Arc::clone(&shared);
                std::thread::spawn(move || {
                    for _ in 0..LATENCIES_PER_WORKER {
                        shared.record_latency(1.0);
                    }
                    shared.record_worker(Duration::from_millis(id as u64), id);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let stats = shared.snapshot();
        assert_eq!(stats.elapsed.len(), WORKERS);
        assert_eq!(stats.frames.len(), WORKERS);
        assert_eq!(stats.total_frames(), (0..WORKERS).sum::<usize>());
        assert_eq!(stats.latency_count, (WORKERS * LATENCIES_PER_WORKER) as u64);
        assert_eq!(stats.latency_sum, (WORKERS * LATENCIES_PER_WORKER) as f64);
    }
}
