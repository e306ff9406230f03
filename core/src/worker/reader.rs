//! Read-drain task for one session iteration

use crate::response::{decode_latency, Payload, ResponseEnvelope};
use crate::stats::SharedStats;
use crate::traits::{CompletionStatus, Received, SessionStream, UtilizationProbe};

use super::stats::instantaneous_fps;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Frames between progress log lines
const PROGRESS_INTERVAL: usize = 100;

/// Drains one session until end-of-stream
///
/// Owns everything it mutates except the shared stats; the worker moves its
/// counters in and gets them back through [`DrainOutcome`].
pub(crate) struct FrameReader {
    pub(crate) worker_id: usize,
    pub(crate) shared: Arc<SharedStats>,
    pub(crate) probe: Arc<dyn UtilizationProbe>,
    pub(crate) report_path: PathBuf,
    pub(crate) deadline: Option<tokio::time::Instant>,
    /// Frame count at the start of this iteration
    pub(crate) baseline: usize,
}

/// What one drained iteration produced
#[derive(Debug)]
pub(crate) struct DrainOutcome {
    /// Cumulative frame count after this iteration
    pub(crate) frames: usize,
    /// When the first response of this iteration arrived
    pub(crate) first_response: Option<Instant>,
    pub(crate) cpu_sum: f64,
    pub(crate) gpu_sum: f64,
    pub(crate) latency_samples: usize,
    pub(crate) performance_reports: usize,
    /// Status delivered with end-of-stream
    pub(crate) status: CompletionStatus,
}

impl FrameReader {
    /// Consume the stream until it closes or the deadline passes
    pub(crate) async fn drain(self, mut stream: Box<dyn SessionStream>) -> DrainOutcome {
        let mut outcome = DrainOutcome {
            frames: self.baseline,
            first_response: None,
            cpu_sum: 0.0,
            gpu_sum: 0.0,
            latency_samples: 0,
            performance_reports: 0,
            status: CompletionStatus::ok(),
        };

        let status = loop {
            let received = match self.deadline {
                Some(deadline) => {
                    match tokio::time::timeout_at(deadline, stream.receive()).await {
                        Ok(received) => received,
                        Err(_) => {
                            tracing::warn!(
                                worker_id = self.worker_id,
                                frames = outcome.frames,
                                "Session deadline exceeded, keeping partial counts"
                            );
                            break CompletionStatus::deadline_exceeded();
                        }
                    }
                }
                None => stream.receive().await,
            };

            match received {
                Received::Response(response) => self.on_response(response, &mut outcome).await,
                Received::Closed(status) => break status,
            }
        };

        outcome.status = status;
        outcome
    }

    async fn on_response(&self, response: ResponseEnvelope, outcome: &mut DrainOutcome) {
        let received_at = Instant::now();
        let first_response = *outcome.first_response.get_or_insert(received_at);

        match response.payload() {
            Payload::Performance(report) => {
                self.persist_report(&report).await;
                outcome.performance_reports += 1;
                return;
            }
            Payload::Document(doc) if response.is_success() => match decode_latency(&doc) {
                Ok(latency) => {
                    self.shared.record_latency(latency);
                    outcome.latency_samples += 1;
                }
                Err(miss) => {
                    tracing::debug!(
                        worker_id = self.worker_id,
                        error = %miss,
                        "Response carries no latency"
                    );
                }
            },
            Payload::Unstructured(error) if response.is_success() => {
                tracing::warn!(
                    worker_id = self.worker_id,
                    error = %error,
                    raw = %response.message,
                    "Malformed response message"
                );
            }
            Payload::Document(_) | Payload::Unstructured(_) => {}
        }

        tracing::debug!(
            worker_id = self.worker_id,
            frame_index = outcome.frames,
            code = response.code,
            message = %response.message,
            "Frame received"
        );
        for attachment in &response.attachments {
            tracing::debug!(
                worker_id = self.worker_id,
                frame_id = %attachment.frame_id,
                metadata = %attachment.metadata,
                size = attachment.size,
                "Received binary data"
            );
        }

        outcome.cpu_sum += self.probe.cpu_utilization();
        outcome.gpu_sum += self.probe.gpu_utilization();

        let frames_since_first = outcome.frames - self.baseline;
        outcome.frames += 1;
        let fps = instantaneous_fps(frames_since_first, received_at - first_response);
        tracing::debug!(
            worker_id = self.worker_id,
            fps,
            frames = outcome.frames,
            "Current throughput"
        );

        if outcome.frames % PROGRESS_INTERVAL == 0 {
            tracing::info!(
                worker_id = self.worker_id,
                frames = outcome.frames,
                "{} frames have been processed",
                outcome.frames
            );
        }
    }

    async fn persist_report(&self, report: &serde_json::Value) {
        let bytes = match serde_json::to_vec_pretty(report) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(worker_id = self.worker_id, error = %e, "Failed to encode performance report");
                return;
            }
        };

        match write_replacing(&self.report_path, self.worker_id, &bytes).await {
            Ok(()) => tracing::info!(
                worker_id = self.worker_id,
                path = %self.report_path.display(),
                "Saved performance report"
            ),
            Err(e) => tracing::warn!(
                worker_id = self.worker_id,
                path = %self.report_path.display(),
                error = %e,
                "Failed to save performance report"
            ),
        }
    }
}

/// Write `bytes` to a sibling temp file, then rename it over `path`
///
/// Several workers may share one report file; readers only ever see a
/// complete document from whichever worker renamed last.
pub(crate) async fn write_replacing(
    path: &Path,
    worker_id: usize,
    bytes: &[u8],
) -> std::io::Result<()> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{file_name}.{worker_id}.tmp"));

    tokio::fs::write(&tmp, bytes).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}
