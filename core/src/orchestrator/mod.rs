//! Orchestrator for run lifecycle management
//!
//! The Orchestrator coordinates one complete benchmark run:
//! - Splitting the stream count into primary and remainder worker pools
//! - Starting the utilization probe (best-effort unless required)
//! - Spawning one worker task per stream-group and joining them all
//! - Summarizing the shared statistics
//!
//! # Example
//!
//! ```ignore
//! use pipeline_bench_core::{OrchestratorBuilder, RunConfig};
//!
//! let orchestrator = OrchestratorBuilder::new()
//!     .config(RunConfig::new(5, 4))
//!     .transport(transport)
//!     .inputs(inputs)
//!     .primary_config(primary)
//!     .additional_config(additional)
//!     .build()?;
//!
//! let summary = orchestrator.run().await?;
//! ```

mod aggregator;
mod builder;
mod executor;

pub use aggregator::{compute_fps, summarize, Summary, ThreadBreakdown};
pub use builder::OrchestratorBuilder;
pub use executor::{primary_report_file, Orchestrator, ADDITIONAL_REPORT_FILE};
