//! GPU busy sampler on top of `intel_gpu_top -J`
//!
//! The tool prints one JSON object per sample period inside a never-closed
//! array. Each engine reports a `busy` percentage; the busiest engine of a
//! sample is published.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use pipeline_bench_core::ProbeError;
use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::Reading;

/// Bytes read from the tool per call
const READ_CHUNK: usize = 8 * 1024;

/// One sample period of `intel_gpu_top -J`
#[derive(Debug, Deserialize)]
struct Sample {
    #[serde(default)]
    engines: HashMap<String, Engine>,
}

#[derive(Debug, Deserialize)]
struct Engine {
    #[serde(default)]
    busy: Option<f64>,
}

impl Sample {
    fn busiest(&self) -> Option<f64> {
        self.engines
            .values()
            .filter_map(|engine| engine.busy)
            .reduce(f64::max)
    }
}

/// Incremental decoder for the tool's output
///
/// The output is one JSON array that only closes when the tool exits, so
/// objects are decoded one at a time as they complete. Array punctuation
/// between objects is skipped.
#[derive(Debug, Default)]
pub struct SampleDecoder {
    pending: Vec<u8>,
}

impl SampleDecoder {
    /// Create an empty decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Append output and return the busiest engine of every completed sample
    ///
    /// Malformed output is an error and discards everything buffered so far.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<f64>, serde_json::Error> {
        self.pending.extend_from_slice(chunk);
        let mut samples = Vec::new();

        loop {
            let skip = self
                .pending
                .iter()
                .take_while(|&&b| b.is_ascii_whitespace() || matches!(b, b'[' | b',' | b']'))
                .count();
            self.pending.drain(..skip);
            if self.pending.is_empty() {
                break;
            }

            let decoded = {
                let mut stream =
                    serde_json::Deserializer::from_slice(&self.pending).into_iter::<Sample>();
                stream
                    .next()
                    .map(|result| result.map(|sample| (sample, stream.byte_offset())))
            };
            match decoded {
                Some(Ok((sample, consumed))) => {
                    samples.extend(sample.busiest());
                    self.pending.drain(..consumed);
                }
                Some(Err(e)) if e.is_eof() => break,
                Some(Err(e)) => {
                    self.pending.clear();
                    return Err(e);
                }
                None => break,
            }
        }

        Ok(samples)
    }

    /// Bytes of an unfinished sample still buffered
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

pub(crate) fn spawn(
    handle: &Handle,
    command: &str,
    interval: Duration,
    reading: Arc<Reading>,
) -> Result<JoinHandle<()>, ProbeError> {
    let _guard = handle.enter();
    let mut child = Command::new(command)
        .arg("-J")
        .arg("-s")
        .arg(interval.as_millis().max(1).to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ProbeError::Gpu(format!("failed to start {command}: {e}")))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| ProbeError::Gpu(format!("{command} has no stdout")))?;

    Ok(handle.spawn(async move {
        // Held so aborting the task kills the tool
        let _child = child;
        read_samples(BufReader::new(stdout), &reading).await;
    }))
}

async fn read_samples<R: AsyncRead + Unpin>(mut reader: R, reading: &Reading) {
    let mut decoder = SampleDecoder::new();
    let mut chunk = vec![0u8; READ_CHUNK];

    loop {
        let read = match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(read) => read,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read GPU sampler output");
                break;
            }
        };
        match decoder.push(&chunk[..read]) {
            Ok(samples) => {
                if let Some(&busy) = samples.last() {
                    reading.store(busy);
                    tracing::trace!(gpu = busy, "GPU sample");
                }
            }
            Err(e) => tracing::warn!(error = %e, "Discarding malformed GPU sampler output"),
        }
    }

    if decoder.pending() > 0 {
        tracing::debug!(bytes = decoder.pending(), "GPU sampler ended mid-sample");
    }
    tracing::debug!("GPU sampler output ended");
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"[
{
	"period": {
		"duration": 1000.2,
		"unit": "ms"
	},
	"engines": {
		"Render/3D/0": {
			"busy": 12.5,
			"sema": 0.0,
			"wait": 0.0,
			"unit": "%"
		},
		"Video/0": {
			"busy": 63.25,
			"sema": 0.0,
			"unit": "%"
		}
	}
},
{
	"period": {
		"duration": 999.8,
		"unit": "ms"
	},
	"engines": {
		"Render/3D/0": {
			"busy": 4.0,
			"unit": "%"
		}
	}
}
]"#;

    #[test]
    fn test_decoder_publishes_busiest_engine() {
        let mut decoder = SampleDecoder::new();
        assert_eq!(decoder.push(SAMPLE.as_bytes()).unwrap(), vec![63.25, 4.0]);
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_decoder_handles_split_output() {
        let mut decoder = SampleDecoder::new();
        let mut samples = Vec::new();
        for chunk in SAMPLE.as_bytes().chunks(7) {
            samples.extend(decoder.push(chunk).unwrap());
        }
        assert_eq!(samples, vec![63.25, 4.0]);
    }

    #[test]
    fn test_decoder_waits_for_complete_sample() {
        let mut decoder = SampleDecoder::new();
        let (head, tail) = SAMPLE.split_at(SAMPLE.find("\"Video/0\"").unwrap());

        // The Render engine alone must not be published as the sample
        assert!(decoder.push(head.as_bytes()).unwrap().is_empty());
        assert!(decoder.pending() > 0);
        assert_eq!(decoder.push(tail.as_bytes()).unwrap(), vec![63.25, 4.0]);
    }

    #[test]
    fn test_decoder_skips_samples_without_busy() {
        let mut decoder = SampleDecoder::new();
        let output = r#"[{"period":{"duration":1000.0}},{"engines":{"Blitter/0":{"unit":"%"}}},"#;
        assert!(decoder.push(output.as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn test_decoder_recovers_after_malformed_output() {
        let mut decoder = SampleDecoder::new();
        assert!(decoder.push(b"[{\"engines\": nope}").is_err());
        assert_eq!(decoder.pending(), 0);

        let output = r#",{"engines":{"Video/0":{"busy":7.5}}}"#;
        assert_eq!(decoder.push(output.as_bytes()).unwrap(), vec![7.5]);
    }

    #[tokio::test]
    async fn test_read_samples_stores_latest() {
        let reading = Reading::default();
        read_samples(SAMPLE.as_bytes(), &reading).await;
        assert_eq!(reading.load(), 4.0);
    }

    #[tokio::test]
    async fn test_spawn_missing_command() {
        let result = spawn(
            &Handle::current(),
            "definitely-not-a-gpu-tool",
            Duration::from_millis(100),
            Arc::new(Reading::default()),
        );
        assert!(matches!(result, Err(ProbeError::Gpu(_))));
    }
}
