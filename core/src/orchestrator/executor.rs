//! Orchestrator execution logic

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;

use crate::config::{PoolPlan, RunConfig};
use crate::error::{BenchError, BenchResult};
use crate::inputs::InputSet;
use crate::stats::SharedStats;
use crate::traits::{PipelineTransport, UtilizationProbe};
use crate::worker::{Worker, WorkerBuilder, WorkerPool};

use super::aggregator::{summarize, Summary};

/// Report file written by every remainder worker
pub const ADDITIONAL_REPORT_FILE: &str = "performance_data_additional.json";

/// Report file written by primary worker `index`
pub fn primary_report_file(index: usize) -> String {
    format!("performance_data_{index}.json")
}

/// Orchestrator manages the run lifecycle
///
/// Responsible for splitting streams into worker pools, spawning workers,
/// starting and stopping the probe, and summarizing the results.
pub struct Orchestrator {
    /// Run configuration
    pub(crate) config: RunConfig,

    /// Session transport (shared across workers)
    pub(crate) transport: Arc<dyn PipelineTransport>,

    /// Utilization probe (shared across workers)
    pub(crate) probe: Arc<dyn UtilizationProbe>,

    /// Base input set
    pub(crate) inputs: InputSet,

    /// Configuration payload for primary workers
    pub(crate) primary_config: Arc<str>,

    /// Configuration payload for remainder workers
    pub(crate) additional_config: Arc<str>,

    /// Cross-worker accumulator
    pub(crate) shared: Arc<SharedStats>,
}

impl Orchestrator {
    /// Create a new orchestrator
    ///
    /// Use `OrchestratorBuilder` for a more ergonomic construction.
    pub fn new(
        config: RunConfig,
        transport: Arc<dyn PipelineTransport>,
        probe: Arc<dyn UtilizationProbe>,
        inputs: InputSet,
        primary_config: Arc<str>,
        additional_config: Arc<str>,
    ) -> Self {
        Self {
            config,
            transport,
            probe,
            inputs,
            primary_config,
            additional_config,
            shared: Arc::new(SharedStats::new()),
        }
    }

    /// Get the run configuration
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Get the shared statistics
    pub fn shared_stats(&self) -> &Arc<SharedStats> {
        &self.shared
    }

    /// Run all workers to completion and summarize
    pub async fn run(&self) -> BenchResult<Summary> {
        self.config.validate()?;
        let plan = self.config.pool_plan();

        tokio::fs::create_dir_all(&self.config.report_dir).await?;

        if let Err(e) = self.probe.start() {
            if self.config.require_probes {
                return Err(e.into());
            }
            tracing::warn!(error = %e, "Utilization probe unavailable, readings will be zero");
        }

        tracing::info!(
            endpoint = self.transport.endpoint(),
            total_stream_num = self.config.total_stream_num,
            cross_stream_num = self.config.cross_stream_num,
            primary_workers = plan.primary_workers,
            remainder_workers = plan.remainder_workers,
            pipeline_repeats = self.config.pipeline_repeats,
            warmup = self.config.warmup,
            inputs = self.inputs.len(),
            "Starting run"
        );

        let workers = match self.build_workers(&plan) {
            Ok(workers) => workers,
            Err(e) => {
                self.probe.stop();
                return Err(e);
            }
        };

        let started_at = Utc::now();
        let handles: Vec<_> = workers
            .into_iter()
            .map(|worker| (worker.id(), worker.pool(), tokio::spawn(worker.run())))
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        let mut worker_failures = 0;
        for (worker_id, pool, handle) in handles {
            match handle.await {
                Ok(Ok(result)) => {
                    tracing::debug!(
                        worker_id,
                        pool = ?pool,
                        frames = result.frames,
                        "Worker completed"
                    );
                    results.push(result);
                }
                Ok(Err(e)) => {
                    worker_failures += 1;
                    tracing::error!(worker_id, pool = ?pool, error = %e, "Worker returned error");
                }
                Err(e) => {
                    worker_failures += 1;
                    tracing::error!(worker_id, pool = ?pool, error = %e, "Worker task panicked");
                }
            }
        }
        let finished_at = Utc::now();
        self.probe.stop();

        if results.is_empty() && worker_failures > 0 {
            return Err(BenchError::orchestration(format!(
                "All {} workers failed to complete",
                worker_failures
            )));
        }

        let summary = summarize(
            &self.shared.snapshot(),
            results,
            worker_failures,
            &self.config,
            started_at,
            finished_at,
        );
        tracing::info!(
            total_frames = summary.total_frames,
            fps = ?summary.fps,
            average_latency = ?summary.average_latency,
            failed_workers = summary.failed_workers,
            "Run completed"
        );

        Ok(summary)
    }

    fn build_workers(&self, plan: &PoolPlan) -> BenchResult<Vec<Worker>> {
        let mut workers = Vec::with_capacity(plan.total_workers() as usize);

        let primary_uris = self
            .inputs
            .expand(self.config.repeats, plan.primary_streams);
        for index in 0..plan.primary_workers as usize {
            let report_path = self.config.report_dir.join(primary_report_file(index));
            let worker = self
                .worker_builder(index, WorkerPool::Primary, report_path)
                .pipeline_config(Arc::clone(&self.primary_config))
                .media_uris(Arc::clone(&primary_uris))
                .stream_num(plan.primary_streams)
                .build()?;
            workers.push(worker);
        }

        let remainder_uris = self
            .inputs
            .expand(self.config.repeats, PoolPlan::REMAINDER_STREAMS);
        for offset in 0..plan.remainder_workers as usize {
            let worker_id = plan.primary_workers as usize + offset;
            let report_path = self.config.report_dir.join(ADDITIONAL_REPORT_FILE);
            let worker = self
                .worker_builder(worker_id, WorkerPool::Remainder, report_path)
                .pipeline_config(Arc::clone(&self.additional_config))
                .media_uris(Arc::clone(&remainder_uris))
                .stream_num(PoolPlan::REMAINDER_STREAMS)
                .build()?;
            workers.push(worker);
        }

        Ok(workers)
    }

    fn worker_builder(&self, id: usize, pool: WorkerPool, report_path: PathBuf) -> WorkerBuilder {
        WorkerBuilder::new(id, pool)
            .transport(Arc::clone(&self.transport))
            .probe(Arc::clone(&self.probe))
            .shared_stats(Arc::clone(&self.shared))
            .pipeline_repeats(self.config.pipeline_repeats)
            .warmup(self.config.warmup)
            .report_path(report_path)
            .session_timeout(self.config.session_timeout)
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("endpoint", &self.transport.endpoint())
            .field("inputs", &self.inputs.len())
            .finish()
    }
}
