//! Worker statistics tracking

use serde::Serialize;
use std::time::Duration;

/// Which configuration pool a worker belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerPool {
    /// Multi-stream workers using the primary configuration
    Primary,
    /// Single-stream workers using the additional configuration
    Remainder,
}

/// Counters owned by one worker across all of its iterations
#[derive(Debug, Default, Clone)]
pub struct WorkerStats {
    /// Frames processed so far (cumulative across iterations)
    pub frames: usize,

    /// Frame count at the start of the current iteration, the fps baseline
    pub first_frame_index: usize,

    /// Sum of per-iteration elapsed times since first response
    pub elapsed: Duration,

    /// Sum of CPU readings, one per frame
    pub cpu_sum: f64,

    /// Sum of GPU readings, one per frame
    pub gpu_sum: f64,

    /// Iterations that ran to completion
    pub iterations: u32,

    /// Sessions that failed to open or ended with a non-ok status
    pub failed_sessions: u32,

    /// Latency samples this worker contributed to the shared stats
    pub latency_samples: usize,

    /// PerformanceData reports written
    pub performance_reports: usize,
}

impl WorkerStats {
    /// Create new empty stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Close an iteration: add its elapsed time and move the fps baseline
    pub fn finish_iteration(&mut self, elapsed: Duration) {
        self.elapsed += elapsed;
        self.first_frame_index = self.frames;
        self.iterations += 1;
    }

    /// Average CPU utilization per frame, normalized by logical CPU count
    pub fn cpu_average(&self, cpu_threads: usize) -> Option<f64> {
        let divisor = self.frames * cpu_threads.max(1);
        (divisor > 0).then(|| self.cpu_sum / divisor as f64)
    }

    /// Average GPU utilization per frame
    pub fn gpu_average(&self) -> Option<f64> {
        (self.frames > 0).then(|| self.gpu_sum / self.frames as f64)
    }
}

/// Instantaneous frames-per-second since the first response of an iteration
///
/// Returns 0 when no frame or no time has elapsed yet.
pub fn instantaneous_fps(frames_since_first: usize, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if frames_since_first == 0 || secs <= 0.0 {
        0.0
    } else {
        frames_since_first as f64 / secs
    }
}

/// Final totals returned by a worker
#[derive(Debug, Clone, Serialize)]
pub struct WorkerResult {
    /// Worker index, unique across both pools
    pub worker_id: usize,
    /// Pool membership
    pub pool: WorkerPool,
    /// Streams handled per run request
    pub stream_num: u32,
    /// Frames processed
    pub frames: usize,
    /// Cumulative elapsed time in milliseconds
    pub elapsed_ms: f64,
    /// Iterations completed
    pub iterations: u32,
    /// Failed sessions
    pub failed_sessions: u32,
    /// Latency samples contributed
    pub latency_samples: usize,
    /// PerformanceData reports written
    pub performance_reports: usize,
    /// Average CPU utilization in percent
    pub cpu_utilization: Option<f64>,
    /// Average GPU utilization in percent
    pub gpu_utilization: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_stats_defaults() {
        let stats = WorkerStats::default();
        assert_eq!(stats.frames, 0);
        assert_eq!(stats.first_frame_index, 0);
        assert_eq!(stats.elapsed, Duration::ZERO);
        assert!(stats.cpu_average(8).is_none());
        assert!(stats.gpu_average().is_none());
    }

    #[test]
    fn test_finish_iteration_moves_baseline() {
        let mut stats = WorkerStats::new();
        stats.frames = 120;
        stats.finish_iteration(Duration::from_millis(1500));
        assert_eq!(stats.first_frame_index, 120);
        assert_eq!(stats.iterations, 1);

        stats.frames = 250;
        stats.finish_iteration(Duration::from_millis(500));
        assert_eq!(stats.first_frame_index, 250);
        assert_eq!(stats.elapsed, Duration::from_millis(2000));
        assert_eq!(stats.iterations, 2);
    }

    #[test]
    fn test_utilization_averages() {
        let mut stats = WorkerStats::new();
        stats.frames = 10;
        stats.cpu_sum = 800.0;
        stats.gpu_sum = 450.0;

        assert!((stats.cpu_average(4).unwrap() - 20.0).abs() < 1e-9);
        assert!((stats.gpu_average().unwrap() - 45.0).abs() < 1e-9);
        // Zero threads is treated as one
        assert!((stats.cpu_average(0).unwrap() - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_instantaneous_fps() {
        assert_eq!(instantaneous_fps(0, Duration::from_secs(1)), 0.0);
        assert_eq!(instantaneous_fps(10, Duration::ZERO), 0.0);
        assert!((instantaneous_fps(30, Duration::from_millis(1500)) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_worker_pool_serialization() {
        assert_eq!(
            serde_json::to_string(&WorkerPool::Primary).unwrap(),
            "\"primary\""
        );
        assert_eq!(
            serde_json::to_string(&WorkerPool::Remainder).unwrap(),
            "\"remainder\""
        );
    }
}
