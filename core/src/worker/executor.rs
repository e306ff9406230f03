//! Worker execution loop

use crate::error::BenchResult;
use crate::request::{JobHandle, PipelineRef, RequestEnvelope};
use crate::response::{decode_handle, Payload};
use crate::session::Session;
use crate::stats::SharedStats;
use crate::traits::{CompletionStatus, PipelineTransport, Received, UtilizationProbe};

use super::reader::FrameReader;
use super::stats::{WorkerPool, WorkerResult, WorkerStats};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Worker drives one stream-group: open -> (handshake) -> run -> drain -> close
///
/// Each of the `pipeline_repeats` iterations uses a fresh session. Iterations
/// never overlap. The job handle obtained by the warmup handshake is kept for
/// the worker's whole lifetime.
pub struct Worker {
    /// Worker index, unique across both pools
    id: usize,

    /// Pool membership
    pool: WorkerPool,

    /// Session factory (shared across workers via Arc)
    transport: Arc<dyn PipelineTransport>,

    /// Utilization sensors (shared across workers via Arc)
    probe: Arc<dyn UtilizationProbe>,

    /// Cross-worker accumulator
    shared: Arc<SharedStats>,

    /// Configuration payload sent with handshakes and handle-less runs
    pipeline_config: Arc<str>,

    /// Inputs already expanded for repeats and stream count
    media_uris: Arc<[String]>,

    /// Streams per run request
    stream_num: u32,

    /// Number of open-run-close iterations
    pipeline_repeats: u32,

    /// Whether to send `load_pipeline` first
    warmup: bool,

    /// Where PerformanceData reports are written
    report_path: PathBuf,

    /// Optional deadline per iteration
    session_timeout: Option<Duration>,

    /// Handle obtained by the handshake, set at most once
    job_handle: Option<JobHandle>,
}

impl Worker {
    /// Create a new worker
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: usize,
        pool: WorkerPool,
        transport: Arc<dyn PipelineTransport>,
        probe: Arc<dyn UtilizationProbe>,
        shared: Arc<SharedStats>,
        pipeline_config: Arc<str>,
        media_uris: Arc<[String]>,
        stream_num: u32,
        pipeline_repeats: u32,
        warmup: bool,
        report_path: PathBuf,
    ) -> Self {
        Self {
            id,
            pool,
            transport,
            probe,
            shared,
            pipeline_config,
            media_uris,
            stream_num,
            pipeline_repeats,
            warmup,
            report_path,
            session_timeout: None,
            job_handle: None,
        }
    }

    /// Bound every iteration by a deadline
    pub fn with_session_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.session_timeout = timeout;
        self
    }

    /// Run all iterations and publish totals to the shared stats
    pub async fn run(mut self) -> BenchResult<WorkerResult> {
        let mut stats = WorkerStats::new();

        tracing::info!(
            worker_id = self.id,
            pool = ?self.pool,
            stream_num = self.stream_num,
            inputs = self.media_uris.len(),
            endpoint = self.transport.endpoint(),
            "Worker started"
        );

        for iteration in 0..self.pipeline_repeats {
            let status = self.run_iteration(iteration, &mut stats).await;
            if !status.is_ok() {
                stats.failed_sessions += 1;
                tracing::warn!(
                    worker_id = self.id,
                    iteration,
                    code = status.code,
                    message = %status.message,
                    "Session finished with error status"
                );
            }
            tracing::info!(
                worker_id = self.id,
                iteration,
                frames = stats.frames,
                "Request done"
            );
        }

        let cpu_utilization = stats.cpu_average(self.probe.cpu_threads());
        let gpu_utilization = stats.gpu_average();
        self.shared.record_worker(stats.elapsed, stats.frames);

        tracing::info!(
            worker_id = self.id,
            pool = ?self.pool,
            frames = stats.frames,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            cpu_utilization = ?cpu_utilization,
            gpu_utilization = ?gpu_utilization,
            "Worker finished"
        );

        Ok(WorkerResult {
            worker_id: self.id,
            pool: self.pool,
            stream_num: self.stream_num,
            frames: stats.frames,
            elapsed_ms: stats.elapsed.as_secs_f64() * 1000.0,
            iterations: stats.iterations,
            failed_sessions: stats.failed_sessions,
            latency_samples: stats.latency_samples,
            performance_reports: stats.performance_reports,
            cpu_utilization,
            gpu_utilization,
        })
    }

    /// One open-run-close cycle; returns the session's completion status
    async fn run_iteration(&mut self, iteration: u32, stats: &mut WorkerStats) -> CompletionStatus {
        let mut session = match Session::open(self.transport.as_ref()).await {
            Ok(session) => session,
            Err(e) => {
                return CompletionStatus::new(CompletionStatus::UNAVAILABLE, e.to_string());
            }
        };

        // One deadline bounds the handshake and the drain together
        let deadline = self
            .session_timeout
            .map(|timeout| tokio::time::Instant::now() + timeout);

        if self.warmup && iteration == 0 && self.job_handle.is_none() {
            if let Err(observed) = self.handshake(&mut session, deadline).await {
                return session.finish(observed).await;
            }
        }

        let Some(stream) = session.take_reader() else {
            return session.finish(None).await;
        };
        let reader = FrameReader {
            worker_id: self.id,
            shared: Arc::clone(&self.shared),
            probe: Arc::clone(&self.probe),
            report_path: self.report_path.clone(),
            deadline,
            baseline: stats.first_frame_index,
        };
        let drain = tokio::spawn(reader.drain(stream));

        let pipeline = PipelineRef::select(self.job_handle, &self.pipeline_config);
        match &pipeline {
            PipelineRef::Handle(handle) => tracing::info!(
                worker_id = self.id,
                job_handle = %handle,
                "Sending run request on job handle"
            ),
            PipelineRef::Config(_) => {
                tracing::info!(worker_id = self.id, "Sending run request with configuration")
            }
        }
        let request = RequestEnvelope::run(self.stream_num, Arc::clone(&self.media_uris), pipeline);
        if let Err(e) = session.write(request).await {
            tracing::warn!(worker_id = self.id, error = %e, "Failed to send run request");
        }

        let outcome = match drain.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(worker_id = self.id, error = %e, "Reader task failed");
                return session
                    .finish(Some(CompletionStatus::new(
                        CompletionStatus::CANCELLED,
                        e.to_string(),
                    )))
                    .await;
            }
        };

        stats.frames = outcome.frames;
        stats.cpu_sum += outcome.cpu_sum;
        stats.gpu_sum += outcome.gpu_sum;
        stats.latency_samples += outcome.latency_samples;
        stats.performance_reports += outcome.performance_reports;

        let status = session.finish(Some(outcome.status)).await;

        let elapsed = outcome
            .first_response
            .map(|first| first.elapsed())
            .unwrap_or(Duration::ZERO);
        stats.finish_iteration(elapsed);

        status
    }

    /// Send `load_pipeline` and wait for exactly one reply
    ///
    /// Returns `Err` when the session ended or the deadline passed during the
    /// handshake, carrying the final status if it is already known.
    async fn handshake(
        &mut self,
        session: &mut Session,
        deadline: Option<tokio::time::Instant>,
    ) -> Result<(), Option<CompletionStatus>> {
        tracing::info!(
            worker_id = self.id,
            stream_num = self.stream_num,
            "Sending load_pipeline request"
        );
        let request = RequestEnvelope::load_pipeline(Arc::clone(&self.pipeline_config), self.stream_num);
        if let Err(e) = session.write(request).await {
            tracing::warn!(worker_id = self.id, error = %e, "Failed to send load_pipeline request");
            return Err(None);
        }

        let received = match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, session.receive()).await {
                Ok(received) => received,
                Err(_) => {
                    tracing::warn!(
                        worker_id = self.id,
                        "Session deadline exceeded while waiting for load_pipeline reply"
                    );
                    return Err(Some(CompletionStatus::deadline_exceeded()));
                }
            },
            None => session.receive().await,
        };
        let reply = match received {
            Received::Response(reply) => reply,
            Received::Closed(status) => return Err(Some(status)),
        };
        tracing::info!(
            worker_id = self.id,
            code = reply.code,
            message = %reply.message,
            "load_pipeline reply"
        );

        if !reply.is_success() {
            tracing::warn!(
                worker_id = self.id,
                code = reply.code,
                "load_pipeline rejected, runs will carry the full configuration"
            );
            return Ok(());
        }

        match reply.payload() {
            Payload::Document(doc) | Payload::Performance(doc) => match decode_handle(&doc) {
                Ok(handle) => {
                    self.job_handle = Some(handle);
                    tracing::info!(
                        worker_id = self.id,
                        job_handle = %handle,
                        "Pipeline has been loaded"
                    );
                }
                Err(miss) => tracing::warn!(
                    worker_id = self.id,
                    error = %miss,
                    "No job handle in load_pipeline reply"
                ),
            },
            Payload::Unstructured(error) => tracing::warn!(
                worker_id = self.id,
                error = %error,
                raw = %reply.message,
                "Malformed load_pipeline reply"
            ),
        }

        Ok(())
    }

    /// Get the worker ID
    pub fn id(&self) -> usize {
        self.id
    }

    /// Get the worker's pool
    pub fn pool(&self) -> WorkerPool {
        self.pool
    }

    /// Job handle held by this worker, if any
    pub fn job_handle(&self) -> Option<JobHandle> {
        self.job_handle
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("pool", &self.pool)
            .field("endpoint", &self.transport.endpoint())
            .field("stream_num", &self.stream_num)
            .field("pipeline_repeats", &self.pipeline_repeats)
            .field("warmup", &self.warmup)
            .field("report_path", &self.report_path)
            .field("job_handle", &self.job_handle)
            .finish()
    }
}
