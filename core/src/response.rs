//! Response protocol data structures and message decoding
//!
//! The service answers every request with a status code and a JSON message.
//! Depending on the request the message carries a `handle`, a per-frame
//! `latency`, or a full performance report tagged `"Type": "PerformanceData"`.
//! The service renders most scalar values as strings, so numeric fields are
//! accepted either way.

use serde_json::Value;

use crate::request::JobHandle;

/// Application-level success code
pub const STATUS_SUCCESS: i32 = 0;

/// `Type` value marking a terminal performance report
pub const PERFORMANCE_DATA_TYPE: &str = "PerformanceData";

/// Binary payload attached to a response, keyed by frame id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryAttachment {
    /// Frame id as sent by the server
    pub frame_id: String,
    /// JSON metadata describing the payload (format, width, height)
    pub metadata: String,
    /// Payload size in bytes
    pub size: usize,
}

/// A message read from a pipeline session
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResponseEnvelope {
    /// Application status, 0 on success
    pub code: i32,
    /// Raw JSON message
    pub message: String,
    /// Binary payloads, if any
    pub attachments: Vec<BinaryAttachment>,
}

/// Decoded form of a response message
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Terminal server-side performance report
    Performance(Value),
    /// Regular structured message
    Document(Value),
    /// Message that is not valid JSON
    Unstructured(String),
}

/// Reason a field could not be extracted
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeMiss {
    /// Field is absent
    #[error("field `{0}` is missing")]
    Missing(&'static str),
    /// Field exists but has the wrong shape
    #[error("field `{field}` is not a valid {expected}: {found}")]
    Invalid {
        /// Field name
        field: &'static str,
        /// Expected kind
        expected: &'static str,
        /// Raw value found
        found: String,
    },
}

impl ResponseEnvelope {
    /// Create a response without attachments
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            attachments: Vec::new(),
        }
    }

    /// Whether the application status is success
    pub fn is_success(&self) -> bool {
        self.code == STATUS_SUCCESS
    }

    /// Decode the message
    pub fn payload(&self) -> Payload {
        match serde_json::from_str::<Value>(&self.message) {
            Ok(doc) if is_performance_report(&doc) => Payload::Performance(doc),
            Ok(doc) => Payload::Document(doc),
            Err(e) => Payload::Unstructured(e.to_string()),
        }
    }
}

fn is_performance_report(doc: &Value) -> bool {
    doc.get("Type").and_then(Value::as_str) == Some(PERFORMANCE_DATA_TYPE)
}

/// Extract the job handle from a `load_pipeline` reply
///
/// A zero handle is reported as invalid.
pub fn decode_handle(doc: &Value) -> Result<JobHandle, DecodeMiss> {
    let raw = doc.get("handle").ok_or(DecodeMiss::Missing("handle"))?;
    let invalid = || DecodeMiss::Invalid {
        field: "handle",
        expected: "non-zero integer",
        found: raw.to_string(),
    };
    let value = match raw {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    value.and_then(JobHandle::new).ok_or_else(invalid)
}

/// Extract the per-frame latency from a run reply
pub fn decode_latency(doc: &Value) -> Result<f64, DecodeMiss> {
    let raw = doc.get("latency").ok_or(DecodeMiss::Missing("latency"))?;
    let value = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    value
        .filter(|v| v.is_finite())
        .ok_or_else(|| DecodeMiss::Invalid {
            field: "latency",
            expected: "number",
            found: raw.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_performance_marker() {
        let resp = ResponseEnvelope::new(0, r#"{"Type":"PerformanceData","fps":"30"}"#);
        match resp.payload() {
            Payload::Performance(doc) => assert_eq!(doc["fps"], "30"),
            other => panic!("Expected Performance, got {:?}", other),
        }
    }

    #[test]
    fn test_payload_document_and_unstructured() {
        let resp = ResponseEnvelope::new(0, r#"{"latency": 12.5}"#);
        assert!(matches!(resp.payload(), Payload::Document(_)));

        let resp = ResponseEnvelope::new(0, "not json at all");
        assert!(matches!(resp.payload(), Payload::Unstructured(_)));

        let resp = ResponseEnvelope::new(0, r#"{"Type":"Other"}"#);
        assert!(matches!(resp.payload(), Payload::Document(_)));
    }

    #[test]
    fn test_decode_handle_string_and_number() {
        let doc = json!({"description": "Success", "request": "load_pipeline", "handle": "2147483648"});
        assert_eq!(decode_handle(&doc).unwrap().get(), 2_147_483_648);

        let doc = json!({"handle": 42});
        assert_eq!(decode_handle(&doc).unwrap().get(), 42);
    }

    #[test]
    fn test_decode_handle_misses() {
        assert_eq!(
            decode_handle(&json!({"description": "Success"})),
            Err(DecodeMiss::Missing("handle"))
        );
        assert!(matches!(
            decode_handle(&json!({"handle": "0"})),
            Err(DecodeMiss::Invalid { .. })
        ));
        assert!(matches!(
            decode_handle(&json!({"handle": "abc"})),
            Err(DecodeMiss::Invalid { .. })
        ));
        assert!(matches!(
            decode_handle(&json!({"handle": -3})),
            Err(DecodeMiss::Invalid { .. })
        ));
    }

    #[test]
    fn test_decode_latency() {
        assert_eq!(decode_latency(&json!({"latency": 12.5})), Ok(12.5));
        assert_eq!(decode_latency(&json!({"latency": "7.25"})), Ok(7.25));
        assert_eq!(
            decode_latency(&json!({"status_code": "0"})),
            Err(DecodeMiss::Missing("latency"))
        );
        assert!(matches!(
            decode_latency(&json!({"latency": [1, 2]})),
            Err(DecodeMiss::Invalid { .. })
        ));
    }

    #[test]
    fn test_is_success() {
        assert!(ResponseEnvelope::new(0, "{}").is_success());
        assert!(!ResponseEnvelope::new(-1, "{}").is_success());
    }
}
