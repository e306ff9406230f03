//! Worker module for driving pipeline sessions
//!
//! A Worker is one tokio task bound to one stream-group. It repeats a short
//! loop `pipeline_repeats` times: **open -> (handshake) -> run -> drain -> close**.
//!
//! 1. Opens a fresh duplex session through the PipelineTransport
//! 2. On the first iteration with warmup enabled, sends `load_pipeline` and
//!    keeps the returned job handle
//! 3. Spawns a reader task that owns the read half of the session
//! 4. Sends one `run` request carrying the job handle (or the full configuration)
//! 5. Waits for the reader to observe end-of-stream, then half-closes
//!
//! Per-frame work (latency, utilization sampling, PerformanceData reports)
//! happens in the reader. Totals are published to [`SharedStats`] once, after
//! the last iteration.
//!
//! # Example
//!
//! ```ignore
//! use pipeline_bench_core::worker::{WorkerBuilder, WorkerPool};
//!
//! let worker = WorkerBuilder::new(0, WorkerPool::Primary)
//!     .transport(transport)
//!     .probe(probe)
//!     .shared_stats(shared)
//!     .pipeline_config(config)
//!     .media_uris(uris)
//!     .stream_num(4)
//!     .report_path("performance_data_0.json")
//!     .build()?;
//!
//! let result = worker.run().await?;
//! println!("Frames: {}", result.frames);
//! ```
//!
//! [`SharedStats`]: crate::stats::SharedStats

mod builder;
mod executor;
mod reader;
mod stats;

pub use builder::WorkerBuilder;
pub use executor::Worker;
pub use stats::{instantaneous_fps, WorkerPool, WorkerResult, WorkerStats};
