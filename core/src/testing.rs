//! In-process pipeline service used by worker and orchestrator tests

use crate::request::RequestEnvelope;
use crate::response::ResponseEnvelope;
use crate::traits::{
    CompletionStatus, PipelineTransport, Received, SessionHalves, SessionSink, SessionStream,
    TransportError,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// How the mock service answers
#[derive(Debug, Clone)]
pub(crate) struct MockBehavior {
    /// Message returned to `load_pipeline`
    pub(crate) load_reply: String,
    /// Latency frames sent per run
    pub(crate) frames_per_run: usize,
    /// Latency value in every frame
    pub(crate) latency: f64,
    /// Frames whose message is not JSON, sent after the latency frames
    pub(crate) malformed_frames: usize,
    /// Frames with an error code that still carry a latency
    pub(crate) error_frames: usize,
    /// Send a PerformanceData report before closing
    pub(crate) performance_report: bool,
    /// Final status code
    pub(crate) close_code: i32,
    /// Never close the stream after the run frames
    pub(crate) hang: bool,
    /// Never answer `load_pipeline`
    pub(crate) ignore_load: bool,
    /// Refuse to open sessions
    pub(crate) fail_open: bool,
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self {
            load_reply: r#"{"handle":"42"}"#.to_string(),
            frames_per_run: 3,
            latency: 10.0,
            malformed_frames: 0,
            error_frames: 0,
            performance_report: false,
            close_code: 0,
            hang: false,
            ignore_load: false,
            fail_open: false,
        }
    }
}

/// Transport backed by a spawned task per session
#[derive(Debug, Default)]
pub(crate) struct MockPipeline {
    pub(crate) behavior: MockBehavior,
    pub(crate) requests: Arc<Mutex<Vec<RequestEnvelope>>>,
    pub(crate) opened: AtomicUsize,
}

impl MockPipeline {
    pub(crate) fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            ..Self::default()
        }
    }

    pub(crate) fn requests(&self) -> Vec<RequestEnvelope> {
        self.requests.lock().clone()
    }

    pub(crate) fn sessions(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PipelineTransport for MockPipeline {
    fn endpoint(&self) -> &str {
        "mock://pipeline"
    }

    async fn open(&self) -> Result<SessionHalves, TransportError> {
        if self.behavior.fail_open {
            return Err(TransportError::Open("connection refused".to_string()));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);

        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        tokio::spawn(serve(
            self.behavior.clone(),
            Arc::clone(&self.requests),
            request_rx,
            reply_tx,
        ));

        Ok(SessionHalves {
            sink: Box::new(MockSink {
                tx: Some(request_tx),
            }),
            stream: Box::new(MockStream {
                rx: reply_rx,
                last: None,
            }),
        })
    }
}

async fn serve(
    behavior: MockBehavior,
    log: Arc<Mutex<Vec<RequestEnvelope>>>,
    mut requests: mpsc::UnboundedReceiver<RequestEnvelope>,
    replies: mpsc::UnboundedSender<Received>,
) {
    while let Some(request) = requests.recv().await {
        log.lock().push(request.clone());
        match request {
            RequestEnvelope::LoadPipeline { .. } if behavior.ignore_load => {}
            RequestEnvelope::LoadPipeline { .. } => {
                let _ = replies.send(Received::Response(ResponseEnvelope::new(
                    0,
                    behavior.load_reply.clone(),
                )));
            }
            RequestEnvelope::Run { .. } => {
                for _ in 0..behavior.frames_per_run {
                    let message = format!(r#"{{"latency":"{}"}}"#, behavior.latency);
                    let _ = replies.send(Received::Response(ResponseEnvelope::new(0, message)));
                }
                for _ in 0..behavior.malformed_frames {
                    let _ = replies.send(Received::Response(ResponseEnvelope::new(0, "not json {")));
                }
                for _ in 0..behavior.error_frames {
                    let message = format!(r#"{{"latency":"{}"}}"#, behavior.latency * 100.0);
                    let _ = replies.send(Received::Response(ResponseEnvelope::new(3, message)));
                }
                if behavior.performance_report {
                    let report = r#"{"Type":"PerformanceData","fps":"29.9","latency":"999"}"#;
                    let _ = replies.send(Received::Response(ResponseEnvelope::new(0, report)));
                }
                if behavior.hang {
                    std::future::pending::<()>().await;
                }
                let _ = replies.send(Received::Closed(CompletionStatus::new(
                    behavior.close_code,
                    "",
                )));
                return;
            }
        }
    }
    let _ = replies.send(Received::Closed(CompletionStatus::ok()));
}

struct MockSink {
    tx: Option<mpsc::UnboundedSender<RequestEnvelope>>,
}

#[async_trait]
impl SessionSink for MockSink {
    async fn send(&mut self, request: RequestEnvelope) -> Result<(), TransportError> {
        match &self.tx {
            Some(tx) => tx.send(request).map_err(|_| TransportError::Closed),
            None => Err(TransportError::Closed),
        }
    }

    async fn close_send(&mut self) {
        self.tx = None;
    }
}

struct MockStream {
    rx: mpsc::UnboundedReceiver<Received>,
    last: Option<CompletionStatus>,
}

#[async_trait]
impl SessionStream for MockStream {
    async fn receive(&mut self) -> Received {
        if let Some(status) = &self.last {
            return Received::Closed(status.clone());
        }
        match self.rx.recv().await {
            Some(Received::Closed(status)) => {
                self.last = Some(status.clone());
                Received::Closed(status)
            }
            Some(item) => item,
            None => Received::Closed(CompletionStatus::new(
                CompletionStatus::CANCELLED,
                "mock service went away",
            )),
        }
    }
}
