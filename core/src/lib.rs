//! pipeline-bench-core: Workload engine for benchmarking streaming inference pipelines
//!
//! This crate provides everything between the command line and the wire:
//!
//! - Protocol data structures (requests, responses) and message decoding
//! - Core traits (PipelineTransport, UtilizationProbe)
//! - The RPC session wrapper, workers and their reader tasks
//! - Shared cross-worker statistics and the final summary
//! - Run configuration, input discovery and error handling

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod inputs;
pub mod orchestrator;
pub mod request;
pub mod response;
pub mod session;
pub mod stats;
pub mod traits;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use config::*;
pub use error::*;
pub use inputs::*;
pub use orchestrator::{Orchestrator, OrchestratorBuilder, Summary, ThreadBreakdown};
pub use request::*;
pub use response::*;
pub use session::Session;
pub use stats::*;
pub use traits::*;
pub use worker::{Worker, WorkerBuilder, WorkerPool, WorkerResult, WorkerStats};
