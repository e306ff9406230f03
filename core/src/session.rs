//! RPC session wrapper
//!
//! A [`Session`] owns both halves of one duplex call. The worker writes
//! through it, may read the handshake reply directly, then hands the read half
//! to a dedicated reader task with [`Session::take_reader`]. Once the reader
//! has observed end-of-stream the session is finished with the status the
//! reader saw.

use crate::request::RequestEnvelope;
use crate::traits::{
    CompletionStatus, PipelineTransport, Received, SessionSink, SessionStream, TransportError,
};

/// One open bidirectional streaming call
pub struct Session {
    sink: Box<dyn SessionSink>,
    stream: Option<Box<dyn SessionStream>>,
}

impl Session {
    /// Open a new session on the transport
    pub async fn open(transport: &dyn PipelineTransport) -> Result<Self, TransportError> {
        let halves = transport.open().await?;
        Ok(Self {
            sink: halves.sink,
            stream: Some(halves.stream),
        })
    }

    /// Send one request. Only the owning worker writes.
    pub async fn write(&mut self, request: RequestEnvelope) -> Result<(), TransportError> {
        self.sink.send(request).await
    }

    /// Read one item before the reader task takes over
    pub async fn receive(&mut self) -> Received {
        match self.stream.as_mut() {
            Some(stream) => stream.receive().await,
            None => Received::Closed(CompletionStatus::new(
                CompletionStatus::CANCELLED,
                "read half already handed to the reader",
            )),
        }
    }

    /// Hand the read half to a reader task
    pub fn take_reader(&mut self) -> Option<Box<dyn SessionStream>> {
        self.stream.take()
    }

    /// Half-close the write side and settle the final status
    ///
    /// `observed` is the status delivered with end-of-stream, if the reader
    /// got that far.
    pub async fn finish(mut self, observed: Option<CompletionStatus>) -> CompletionStatus {
        self.sink.close_send().await;
        match observed {
            Some(status) => status,
            None => match self.stream.as_mut() {
                Some(stream) => loop {
                    if let Received::Closed(status) = stream.receive().await {
                        break status;
                    }
                },
                None => CompletionStatus::new(
                    CompletionStatus::CANCELLED,
                    "session ended before completion status was received",
                ),
            },
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("reader_attached", &self.stream.is_some())
            .finish()
    }
}
