//! Builder pattern for Worker construction

use crate::error::{BenchError, BenchResult};
use crate::stats::SharedStats;
use crate::traits::{PipelineTransport, UtilizationProbe};

use super::executor::Worker;
use super::stats::WorkerPool;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Builder for creating Worker instances
///
/// Provides ergonomic construction with validation.
///
/// # Example
/// ```ignore
/// let worker = WorkerBuilder::new(0, WorkerPool::Primary)
///     .transport(transport)
///     .probe(probe)
///     .shared_stats(shared)
///     .pipeline_config(config)
///     .media_uris(uris)
///     .stream_num(4)
///     .report_path("performance_data_0.json")
///     .build()?;
/// ```
pub struct WorkerBuilder {
    id: usize,
    pool: WorkerPool,
    transport: Option<Arc<dyn PipelineTransport>>,
    probe: Option<Arc<dyn UtilizationProbe>>,
    shared: Option<Arc<SharedStats>>,
    pipeline_config: Option<Arc<str>>,
    media_uris: Option<Arc<[String]>>,
    stream_num: Option<u32>,
    pipeline_repeats: u32,
    warmup: bool,
    report_path: Option<PathBuf>,
    session_timeout: Option<Duration>,
}

impl WorkerBuilder {
    /// Create a new builder with the given worker ID and pool
    pub fn new(id: usize, pool: WorkerPool) -> Self {
        Self {
            id,
            pool,
            transport: None,
            probe: None,
            shared: None,
            pipeline_config: None,
            media_uris: None,
            stream_num: None,
            pipeline_repeats: 1,
            warmup: true,
            report_path: None,
            session_timeout: None,
        }
    }

    /// Set the session transport
    pub fn transport(mut self, transport: Arc<dyn PipelineTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set the utilization probe
    pub fn probe(mut self, probe: Arc<dyn UtilizationProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Set the shared statistics sink
    pub fn shared_stats(mut self, shared: Arc<SharedStats>) -> Self {
        self.shared = Some(shared);
        self
    }

    /// Set the pipeline configuration payload
    pub fn pipeline_config(mut self, config: Arc<str>) -> Self {
        self.pipeline_config = Some(config);
        self
    }

    /// Set the expanded input list
    pub fn media_uris(mut self, uris: Arc<[String]>) -> Self {
        self.media_uris = Some(uris);
        self
    }

    /// Set the number of streams per run request
    pub fn stream_num(mut self, stream_num: u32) -> Self {
        self.stream_num = Some(stream_num);
        self
    }

    /// Set the number of session iterations (default 1)
    pub fn pipeline_repeats(mut self, repeats: u32) -> Self {
        self.pipeline_repeats = repeats;
        self
    }

    /// Enable or disable the load_pipeline handshake (default enabled)
    pub fn warmup(mut self, warmup: bool) -> Self {
        self.warmup = warmup;
        self
    }

    /// Set where PerformanceData reports are written
    pub fn report_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.report_path = Some(path.into());
        self
    }

    /// Bound each iteration by a deadline
    pub fn session_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.session_timeout = timeout;
        self
    }

    /// Build the Worker
    ///
    /// # Errors
    /// Returns an error if any required field is missing or a count is zero.
    pub fn build(self) -> BenchResult<Worker> {
        let transport = self
            .transport
            .ok_or(BenchError::missing_config("transport"))?;
        let probe = self.probe.ok_or(BenchError::missing_config("probe"))?;
        let shared = self
            .shared
            .ok_or(BenchError::missing_config("shared_stats"))?;
        let pipeline_config = self
            .pipeline_config
            .ok_or(BenchError::missing_config("pipeline_config"))?;
        let media_uris = self
            .media_uris
            .ok_or(BenchError::missing_config("media_uris"))?;
        let stream_num = self
            .stream_num
            .ok_or(BenchError::missing_config("stream_num"))?;
        let report_path = self
            .report_path
            .ok_or(BenchError::missing_config("report_path"))?;

        if stream_num == 0 {
            return Err(BenchError::config("worker stream number must be positive"));
        }
        if self.pipeline_repeats == 0 {
            return Err(BenchError::config("pipeline repeats must be positive"));
        }

        let worker = Worker::new(
            self.id,
            self.pool,
            transport,
            probe,
            shared,
            pipeline_config,
            media_uris,
            stream_num,
            self.pipeline_repeats,
            self.warmup,
            report_path,
        )
        .with_session_timeout(self.session_timeout);

        Ok(worker)
    }
}
