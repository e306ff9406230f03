//! gRPC transport for pipeline-bench
//!
//! Implements the core `PipelineTransport` trait on top of tonic, talking to
//! the `hce_ai.ai_inference/Run` bidirectional streaming method.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod proto;

pub use client::{completion_status, GrpcTransport, RUN_PATH};
pub use proto::{AiRequest, AiResponse, StreamResponse};
