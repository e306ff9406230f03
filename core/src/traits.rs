//! Core traits for pipeline transports and utilization probes
//!
//! These traits are defined in core so the worker engine stays independent of
//! the wire protocol. Implementations live in their own crates (transport/,
//! probes/); tests plug in in-process mocks.

use crate::request::RequestEnvelope;
use crate::response::ResponseEnvelope;
use async_trait::async_trait;
use std::fmt;

// ============================================================================
// Transport Traits
// ============================================================================

/// Opens bidirectional streaming sessions against the pipeline service
#[async_trait]
pub trait PipelineTransport: Send + Sync {
    /// Human-readable endpoint (e.g. "http://127.0.0.1:50052")
    fn endpoint(&self) -> &str;

    /// Start a new duplex session
    ///
    /// Opening is cheap and never waits for the server; connection problems
    /// surface as a non-ok [`Received::Closed`] on the first receive.
    async fn open(&self) -> Result<SessionHalves, TransportError>;
}

/// Write half of a session
#[async_trait]
pub trait SessionSink: Send {
    /// Send one request
    async fn send(&mut self, request: RequestEnvelope) -> Result<(), TransportError>;

    /// Gracefully half-close the write side
    async fn close_send(&mut self);
}

/// Read half of a session
#[async_trait]
pub trait SessionStream: Send {
    /// Wait for the next item
    ///
    /// Returns [`Received::Closed`] once the server has half-closed; every
    /// later call returns a `Closed` again.
    async fn receive(&mut self) -> Received;
}

/// Both halves of a freshly opened session
pub struct SessionHalves {
    /// Write half
    pub sink: Box<dyn SessionSink>,
    /// Read half
    pub stream: Box<dyn SessionStream>,
}

impl fmt::Debug for SessionHalves {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHalves").finish_non_exhaustive()
    }
}

/// One item read from a session
#[derive(Debug, Clone, PartialEq)]
pub enum Received {
    /// A response message
    Response(ResponseEnvelope),
    /// End of stream with the session's final status
    Closed(CompletionStatus),
}

/// Final status of a session, as gRPC (code, message)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionStatus {
    /// Status code, 0 on success
    pub code: i32,
    /// Status message
    pub message: String,
}

impl CompletionStatus {
    /// gRPC `CANCELLED`
    pub const CANCELLED: i32 = 1;
    /// gRPC `DEADLINE_EXCEEDED`
    pub const DEADLINE_EXCEEDED: i32 = 4;
    /// gRPC `UNAVAILABLE`
    pub const UNAVAILABLE: i32 = 14;

    /// Successful completion
    pub fn ok() -> Self {
        Self {
            code: 0,
            message: String::new(),
        }
    }

    /// Completion with an explicit code
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Session stopped waiting because its deadline elapsed
    pub fn deadline_exceeded() -> Self {
        Self::new(Self::DEADLINE_EXCEEDED, "session deadline exceeded")
    }

    /// Whether the session completed successfully
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }
}

impl fmt::Display for CompletionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Transport-level errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Endpoint could not be parsed or configured
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Session could not be started
    #[error("failed to open session: {0}")]
    Open(String),

    /// Write side is already closed
    #[error("session is closed for writing")]
    Closed,
}

// ============================================================================
// Utilization Probe
// ============================================================================

/// Pollable source of host utilization values
///
/// Readings are instantaneous and cheap; workers sample them once per
/// received frame.
pub trait UtilizationProbe: Send + Sync {
    /// Start background sampling. Called once by the orchestrator.
    fn start(&self) -> Result<(), ProbeError> {
        Ok(())
    }

    /// Stop background sampling
    fn stop(&self) {}

    /// CPU utilization in percent of one logical CPU (0..=100 * threads)
    fn cpu_utilization(&self) -> f64;

    /// GPU busy percentage (0..=100)
    fn gpu_utilization(&self) -> f64;

    /// Number of logical CPUs used to normalize CPU readings
    fn cpu_threads(&self) -> usize;
}

/// Probe startup errors
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// CPU sampler failed to start
    #[error("CPU probe failed: {0}")]
    Cpu(String),

    /// GPU sampler failed to start
    #[error("GPU probe failed: {0}")]
    Gpu(String),
}

/// Probe reporting zero utilization, used when sampling is disabled
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProbe;

impl UtilizationProbe for NullProbe {
    fn cpu_utilization(&self) -> f64 {
        0.0
    }

    fn gpu_utilization(&self) -> f64 {
        0.0
    }

    fn cpu_threads(&self) -> usize {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_status() {
        assert!(CompletionStatus::ok().is_ok());

        let status = CompletionStatus::new(CompletionStatus::UNAVAILABLE, "connection refused");
        assert!(!status.is_ok());
        assert_eq!(status.to_string(), "14: connection refused");

        let status = CompletionStatus::deadline_exceeded();
        assert_eq!(status.code, 4);
    }

    #[test]
    fn test_null_probe() {
        let probe = NullProbe;
        assert!(probe.start().is_ok());
        assert_eq!(probe.cpu_utilization(), 0.0);
        assert_eq!(probe.gpu_utilization(), 0.0);
        assert_eq!(probe.cpu_threads(), 1);
    }
}
