//! Run configuration types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Run configuration
///
/// Describes how the workload is split across workers and how each worker
/// drives its sessions. Echoed verbatim in the final summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Total number of logical streams across all workers
    pub total_stream_num: u32,

    /// Streams handled by each primary-pool worker
    pub cross_stream_num: u32,

    /// How many times the base input set is repeated per stream
    pub repeats: u32,

    /// Open-run-close cycles executed by every worker
    pub pipeline_repeats: u32,

    /// Send a `load_pipeline` handshake before the first run
    pub warmup: bool,

    /// Directory receiving PerformanceData reports
    pub report_dir: PathBuf,

    /// Optional deadline for one session iteration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_timeout: Option<Duration>,

    /// Treat a probe startup failure as fatal
    pub require_probes: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            total_stream_num: 1,
            cross_stream_num: 1,
            repeats: 1,
            pipeline_repeats: 1,
            warmup: true,
            report_dir: PathBuf::from("."),
            session_timeout: None,
            require_probes: false,
        }
    }
}

impl RunConfig {
    /// Create a config for the given stream split
    pub fn new(total_stream_num: u32, cross_stream_num: u32) -> Self {
        Self {
            total_stream_num,
            cross_stream_num,
            ..Default::default()
        }
    }

    /// Set the input repeat count
    pub fn with_repeats(mut self, repeats: u32) -> Self {
        self.repeats = repeats;
        self
    }

    /// Set the number of pipeline repeats per worker
    pub fn with_pipeline_repeats(mut self, pipeline_repeats: u32) -> Self {
        self.pipeline_repeats = pipeline_repeats;
        self
    }

    /// Enable or disable the warmup handshake
    pub fn with_warmup(mut self, warmup: bool) -> Self {
        self.warmup = warmup;
        self
    }

    /// Set the report directory
    pub fn with_report_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.report_dir = dir.into();
        self
    }

    /// Set the per-iteration session deadline
    pub fn with_session_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.session_timeout = timeout;
        self
    }

    /// Make probe startup failures fatal
    pub fn with_require_probes(mut self, require: bool) -> Self {
        self.require_probes = require;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.total_stream_num == 0 {
            return Err(ConfigError::InvalidStreams(
                "total stream number must be at least 1".into(),
            ));
        }

        if self.cross_stream_num == 0 {
            return Err(ConfigError::InvalidStreams(
                "cross stream number must be at least 1".into(),
            ));
        }

        if self.total_stream_num < self.cross_stream_num {
            return Err(ConfigError::InvalidStreams(format!(
                "total stream number ({}) should be no less than cross stream number ({})",
                self.total_stream_num, self.cross_stream_num
            )));
        }

        if self.repeats == 0 {
            return Err(ConfigError::InvalidRepeats(
                "input repeats must be at least 1".into(),
            ));
        }

        if self.pipeline_repeats == 0 {
            return Err(ConfigError::InvalidRepeats(
                "pipeline repeats must be at least 1".into(),
            ));
        }

        if let Some(timeout) = self.session_timeout {
            if timeout.is_zero() {
                return Err(ConfigError::InvalidTimeout(
                    "session timeout must be positive".into(),
                ));
            }
        }

        Ok(())
    }

    /// Split the total stream count into the two worker pools
    pub fn pool_plan(&self) -> PoolPlan {
        if self.cross_stream_num == 0 {
            return PoolPlan::default();
        }
        PoolPlan {
            primary_workers: self.total_stream_num / self.cross_stream_num,
            primary_streams: self.cross_stream_num,
            remainder_workers: self.total_stream_num % self.cross_stream_num,
        }
    }
}

/// Worker pool partition derived from a [`RunConfig`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolPlan {
    /// Workers using the primary configuration
    pub primary_workers: u32,
    /// Streams per primary worker
    pub primary_streams: u32,
    /// Workers using the additional configuration, one stream each
    pub remainder_workers: u32,
}

impl PoolPlan {
    /// Streams handled by every remainder worker
    pub const REMAINDER_STREAMS: u32 = 1;

    /// Total worker count
    pub fn total_workers(&self) -> u32 {
        self.primary_workers + self.remainder_workers
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Invalid stream split
    #[error("Invalid stream configuration: {0}")]
    InvalidStreams(String),

    /// Invalid repeat count
    #[error("Invalid repeats: {0}")]
    InvalidRepeats(String),

    /// Invalid session timeout
    #[error("Invalid session timeout: {0}")]
    InvalidTimeout(String),
}
