//! Request protocol data structures

use std::fmt;
use std::num::NonZeroU64;
use std::sync::Arc;

/// Server-issued identifier of a loaded pipeline
///
/// Zero is never a valid handle; a decoded zero means "no handle".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobHandle(NonZeroU64);

impl JobHandle {
    /// Wrap a raw handle, rejecting zero
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    /// Raw numeric value
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a run request identifies its pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineRef {
    /// Reuse a previously loaded pipeline
    Handle(JobHandle),
    /// Send the full configuration payload
    Config(Arc<str>),
}

impl PipelineRef {
    /// Prefer the handle when one is held
    pub fn select(handle: Option<JobHandle>, config: &Arc<str>) -> Self {
        match handle {
            Some(handle) => Self::Handle(handle),
            None => Self::Config(Arc::clone(config)),
        }
    }
}

/// A message written to a pipeline session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestEnvelope {
    /// Warm the remote pipeline and obtain a reusable handle
    LoadPipeline {
        /// Pipeline configuration payload
        config: Arc<str>,
        /// Scheduling weight hint
        suggested_weight: u32,
        /// Streams in this group
        stream_num: u32,
    },

    /// Process a batch of inputs
    Run {
        /// Streams in this group
        stream_num: u32,
        /// Ordered input identifiers
        media_uris: Arc<[String]>,
        /// Pipeline selection
        pipeline: PipelineRef,
    },
}

impl RequestEnvelope {
    /// Target name used on the wire
    pub fn target(&self) -> &'static str {
        match self {
            Self::LoadPipeline { .. } => "load_pipeline",
            Self::Run { .. } => "run",
        }
    }

    /// Build a handshake request
    pub fn load_pipeline(config: Arc<str>, stream_num: u32) -> Self {
        Self::LoadPipeline {
            config,
            suggested_weight: 0,
            stream_num,
        }
    }

    /// Build a run request
    pub fn run(stream_num: u32, media_uris: Arc<[String]>, pipeline: PipelineRef) -> Self {
        Self::Run {
            stream_num,
            media_uris,
            pipeline,
        }
    }

    /// Whether this request carries the full configuration payload
    pub fn carries_config(&self) -> bool {
        matches!(
            self,
            Self::LoadPipeline { .. }
                | Self::Run {
                    pipeline: PipelineRef::Config(_),
                    ..
                }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_handle_rejects_zero() {
        assert!(JobHandle::new(0).is_none());
        let handle = JobHandle::new(2_147_483_648).unwrap();
        assert_eq!(handle.get(), 2_147_483_648);
        assert_eq!(handle.to_string(), "2147483648");
    }

    #[test]
    fn test_pipeline_ref_prefers_handle() {
        let config: Arc<str> = Arc::from("{\"pipeline\":1}");
        let handle = JobHandle::new(7);

        assert_eq!(
            PipelineRef::select(handle, &config),
            PipelineRef::Handle(JobHandle::new(7).unwrap())
        );
        assert_eq!(
            PipelineRef::select(None, &config),
            PipelineRef::Config(config.clone())
        );
    }

    #[test]
    fn test_request_targets() {
        let config: Arc<str> = Arc::from("{}");
        let load = RequestEnvelope::load_pipeline(config.clone(), 4);
        assert_eq!(load.target(), "load_pipeline");
        assert!(load.carries_config());
        assert!(matches!(
            load,
            RequestEnvelope::LoadPipeline {
                suggested_weight: 0,
                stream_num: 4,
                ..
            }
        ));

        let inputs: Arc<[String]> = vec!["a.bin".to_string()].into();
        let run = RequestEnvelope::run(
            4,
            inputs.clone(),
            PipelineRef::Handle(JobHandle::new(1).unwrap()),
        );
        assert_eq!(run.target(), "run");
        assert!(!run.carries_config());

        let run = RequestEnvelope::run(4, inputs, PipelineRef::Config(config));
        assert!(run.carries_config());
    }
}
