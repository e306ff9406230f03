//! Result aggregation from multiple workers

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::RunConfig;
use crate::stats::GlobalStats;
use crate::worker::WorkerResult;

/// Frame count and elapsed time of one finished worker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadBreakdown {
    /// Position in the shared stats (join order)
    pub index: usize,
    /// Frames processed
    pub frames: usize,
    /// Cumulative elapsed time in milliseconds
    pub elapsed_ms: f64,
}

/// Final statistics of a run
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    /// Frames per second per stream, `None` when it cannot be computed
    pub fps: Option<f64>,

    /// Mean per-frame latency, `None` when no latency was recorded
    pub average_latency: Option<f64>,

    /// Latency samples folded into the average
    pub latency_samples: u64,

    /// Frames processed by all workers
    pub total_frames: usize,

    /// Sum of per-worker elapsed times in milliseconds
    pub total_elapsed_ms: f64,

    /// Mean per-worker elapsed time in milliseconds
    pub mean_elapsed_ms: Option<f64>,

    /// Per-thread breakdown, one entry per worker that reported totals
    pub threads: Vec<ThreadBreakdown>,

    /// Per-worker results, including utilization
    pub workers: Vec<WorkerResult>,

    /// Workers whose task failed or panicked
    pub failed_workers: usize,

    /// Configuration the run used
    pub config: RunConfig,

    /// When workers were spawned
    pub started_at: DateTime<Utc>,

    /// When the last worker was joined
    pub finished_at: DateTime<Utc>,
}

impl Summary {
    /// Wall-clock run duration
    pub fn wall_time(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Throughput per stream
///
/// `(total_frames - pipeline_repeats) / total_stream_num / mean_elapsed_secs`.
/// One frame per pipeline repeat is excluded since elapsed time is measured
/// from the first response of each iteration.
pub fn compute_fps(
    total_frames: usize,
    pipeline_repeats: u32,
    total_stream_num: u32,
    mean_elapsed_ms: Option<f64>,
) -> Option<f64> {
    let mean_secs = mean_elapsed_ms? / 1000.0;
    if mean_secs <= 0.0 || total_stream_num == 0 {
        return None;
    }
    let frames = total_frames as f64 - f64::from(pipeline_repeats);
    Some(frames / f64::from(total_stream_num) / mean_secs)
}

/// Build the run summary from the shared stats and the joined worker results
pub fn summarize(
    stats: &GlobalStats,
    mut workers: Vec<WorkerResult>,
    failed_workers: usize,
    config: &RunConfig,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
) -> Summary {
    workers.sort_by_key(|w| w.worker_id);

    let total_frames = stats.total_frames();
    let mean_elapsed_ms = stats.mean_elapsed_ms();
    let threads = stats
        .elapsed
        .iter()
        .zip(&stats.frames)
        .enumerate()
        .map(|(index, (elapsed, frames))| ThreadBreakdown {
            index,
            frames: *frames,
            elapsed_ms: elapsed.as_secs_f64() * 1000.0,
        })
        .collect();

    Summary {
        fps: compute_fps(
            total_frames,
            config.pipeline_repeats,
            config.total_stream_num,
            mean_elapsed_ms,
        ),
        average_latency: stats.average_latency(),
        latency_samples: stats.latency_count,
        total_frames,
        total_elapsed_ms: stats.total_elapsed().as_secs_f64() * 1000.0,
        mean_elapsed_ms,
        threads,
        workers,
        failed_workers,
        config: config.clone(),
        started_at,
        finished_at,
    }
}
