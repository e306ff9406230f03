//! Bidirectional streaming client for the pipeline service
//!
//! Uses tonic's low-level `Grpc` client with a prost codec, so no generated
//! stubs are needed. Every session is one `Run` call on a shared HTTP/2
//! channel:
//!
//! - requests flow through an mpsc channel wrapped in a [`Stream`];
//!   dropping the sender half-closes the call
//! - the call itself runs in a spawned task that forwards every reply and
//!   finally one [`Received::Closed`] carrying the gRPC status

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use tokio::sync::mpsc;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, Endpoint};
use tonic::{Request, Status, Streaming};

use pipeline_bench_core::{
    CompletionStatus, PipelineTransport, Received, RequestEnvelope, SessionHalves, SessionSink,
    SessionStream, TransportError,
};

use crate::proto::{AiRequest, AiResponse};

/// gRPC method path of `hce_ai.ai_inference/Run`
pub const RUN_PATH: &str = "/hce_ai.ai_inference/Run";

/// Time allowed for establishing the TCP connection
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Requests buffered before `send` waits
const REQUEST_BUFFER: usize = 16;

/// Replies buffered before the call task waits for the reader
const REPLY_BUFFER: usize = 256;

/// gRPC transport over one lazily connected channel
#[derive(Debug, Clone)]
pub struct GrpcTransport {
    endpoint: String,
    channel: Channel,
}

impl GrpcTransport {
    /// Create a transport for `host:port` without connecting yet
    ///
    /// Must be called inside a tokio runtime. Connection failures surface on
    /// the first session as a non-ok completion status.
    pub fn connect_lazy(host: &str, port: u16) -> Result<Self, TransportError> {
        let endpoint = format!("http://{host}:{port}");
        let channel = Endpoint::from_shared(endpoint.clone())
            .map_err(|e| TransportError::InvalidEndpoint(format!("{endpoint}: {e}")))?
            .connect_timeout(CONNECT_TIMEOUT)
            .tcp_nodelay(true)
            .connect_lazy();

        tracing::info!(endpoint = %endpoint, "gRPC channel configured");
        Ok(Self { endpoint, channel })
    }
}

#[async_trait]
impl PipelineTransport for GrpcTransport {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn open(&self) -> Result<SessionHalves, TransportError> {
        let (request_tx, request_rx) = mpsc::channel(REQUEST_BUFFER);
        let (reply_tx, reply_rx) = mpsc::channel(REPLY_BUFFER);

        tokio::spawn(run_call(
            self.channel.clone(),
            RequestStream { rx: request_rx },
            reply_tx,
        ));

        Ok(SessionHalves {
            sink: Box::new(GrpcSink {
                tx: Some(request_tx),
            }),
            stream: Box::new(GrpcStream {
                rx: reply_rx,
                closed: None,
            }),
        })
    }
}

/// Drive one call until the server ends it or the reader goes away
///
/// The reader can disappear while the server is silent, so the call is
/// raced against `replies.closed()`; dropping the call future cancels it.
async fn run_call(channel: Channel, requests: RequestStream, replies: mpsc::Sender<Received>) {
    let status = tokio::select! {
        status = forward_replies(channel, requests, &replies) => status,
        _ = replies.closed() => {
            tracing::debug!("Session reader went away, cancelling call");
            return;
        }
    };

    tracing::debug!(code = status.code, message = %status.message, "Call finished");
    let _ = replies.send(Received::Closed(status)).await;
}

/// Forward every reply of the call and return its final status
async fn forward_replies(
    channel: Channel,
    requests: RequestStream,
    replies: &mpsc::Sender<Received>,
) -> CompletionStatus {
    let mut stream = match start_call(channel, requests).await {
        Ok(stream) => stream,
        Err(status) => return completion_status(&status),
    };

    loop {
        match stream.message().await {
            Ok(Some(reply)) => {
                if replies.send(Received::Response(reply.into())).await.is_err() {
                    return CompletionStatus::new(
                        CompletionStatus::CANCELLED,
                        "session reader went away",
                    );
                }
            }
            Ok(None) => return CompletionStatus::ok(),
            Err(status) => return completion_status(&status),
        }
    }
}

/// Perform the Run call using tonic's low-level Grpc client
async fn start_call(
    channel: Channel,
    requests: RequestStream,
) -> Result<Streaming<AiResponse>, Status> {
    let mut grpc = tonic::client::Grpc::new(channel);

    grpc.ready()
        .await
        .map_err(|e| Status::unavailable(format!("Service not ready: {e}")))?;

    let codec = tonic::codec::ProstCodec::<AiRequest, AiResponse>::default();
    let path = PathAndQuery::from_static(RUN_PATH);

    let response = grpc.streaming(Request::new(requests), path, codec).await?;
    Ok(response.into_inner())
}

/// Map a gRPC status onto the core completion status
pub fn completion_status(status: &Status) -> CompletionStatus {
    CompletionStatus::new(status.code() as i32, status.message())
}

/// Stream adapter feeding queued requests into the call
struct RequestStream {
    rx: mpsc::Receiver<AiRequest>,
}

impl Stream for RequestStream {
    type Item = AiRequest;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Write half of a gRPC session
struct GrpcSink {
    tx: Option<mpsc::Sender<AiRequest>>,
}

#[async_trait]
impl SessionSink for GrpcSink {
    async fn send(&mut self, request: RequestEnvelope) -> Result<(), TransportError> {
        let Some(tx) = &self.tx else {
            return Err(TransportError::Closed);
        };
        tracing::debug!(target_name = request.target(), "Writing request");
        tx.send(AiRequest::from(&request))
            .await
            .map_err(|_| TransportError::Closed)
    }

    async fn close_send(&mut self) {
        self.tx = None;
    }
}

/// Read half of a gRPC session
struct GrpcStream {
    rx: mpsc::Receiver<Received>,
    closed: Option<CompletionStatus>,
}

#[async_trait]
impl SessionStream for GrpcStream {
    async fn receive(&mut self) -> Received {
        if let Some(status) = &self.closed {
            return Received::Closed(status.clone());
        }
        let status = match self.rx.recv().await {
            Some(Received::Response(reply)) => return Received::Response(reply),
            Some(Received::Closed(status)) => status,
            None => CompletionStatus::new(CompletionStatus::CANCELLED, "call task ended"),
        };
        self.closed = Some(status.clone());
        Received::Closed(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_completion_status_mapping() {
        let status = completion_status(&Status::unavailable("connection refused"));
        assert_eq!(status.code, CompletionStatus::UNAVAILABLE);
        assert_eq!(status.message, "connection refused");

        let status = completion_status(&Status::deadline_exceeded("slow"));
        assert_eq!(status.code, CompletionStatus::DEADLINE_EXCEEDED);

        assert!(completion_status(&Status::ok("")).is_ok());
    }

    #[tokio::test]
    async fn test_invalid_endpoint() {
        let result = GrpcTransport::connect_lazy("bad host", 50052);
        assert!(matches!(result, Err(TransportError::InvalidEndpoint(_))));
    }

    #[tokio::test]
    async fn test_grpc_stream_repeats_final_status() {
        let (tx, rx) = mpsc::channel(4);
        let mut stream = GrpcStream { rx, closed: None };

        tx.send(Received::Closed(CompletionStatus::new(13, "internal")))
            .await
            .unwrap();
        drop(tx);

        for _ in 0..2 {
            match stream.receive().await {
                Received::Closed(status) => assert_eq!(status.code, 13),
                Received::Response(_) => panic!("Expected end of stream"),
            }
        }
    }

    #[tokio::test]
    async fn test_sink_rejects_writes_after_close() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut sink = GrpcSink { tx: Some(tx) };

        let request = RequestEnvelope::load_pipeline(Arc::from("{}"), 1);
        sink.send(request.clone()).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().target, "load_pipeline");

        sink.close_send().await;
        assert!(matches!(sink.send(request).await, Err(TransportError::Closed)));
        // Closing drops the only sender, which ends the request stream
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_service_reports_error_status() {
        // Nothing listens on the discard port
        let transport = GrpcTransport::connect_lazy("127.0.0.1", 9).unwrap();
        let halves = transport.open().await.unwrap();
        let mut sink = halves.sink;
        let mut stream = halves.stream;

        let _ = sink
            .send(RequestEnvelope::load_pipeline(Arc::from("{}"), 1))
            .await;

        let received = tokio::time::timeout(Duration::from_secs(30), stream.receive())
            .await
            .expect("Call did not fail in time");
        match received {
            Received::Closed(status) => assert!(!status.is_ok()),
            Received::Response(_) => panic!("Unexpected response from unreachable service"),
        }
    }

    #[tokio::test]
    async fn test_call_ends_when_reader_drops_on_silent_server() {
        // Accepts connections but never speaks HTTP/2
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let mut sockets = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                sockets.push(socket);
            }
        });

        let transport = GrpcTransport::connect_lazy("127.0.0.1", port).unwrap();
        let (request_tx, request_rx) = mpsc::channel(REQUEST_BUFFER);
        let (reply_tx, reply_rx) = mpsc::channel(REPLY_BUFFER);
        let call = tokio::spawn(run_call(
            transport.channel.clone(),
            RequestStream { rx: request_rx },
            reply_tx,
        ));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!call.is_finished(), "Call ended although the server is only silent");

        drop(reply_rx);
        tokio::time::timeout(Duration::from_secs(5), call)
            .await
            .expect("Call task outlived its reader")
            .unwrap();

        drop(request_tx);
        server.abort();
    }
}
