//! Wire messages of the `hce_ai.ai_inference` service
//!
//! Hand-written prost messages, equivalent to:
//!
//! ```protobuf
//! package hce_ai;
//!
//! service ai_inference {
//!     rpc Run(stream AI_Request) returns (stream AI_Response);
//! }
//!
//! message AI_Request {
//!     string target = 1;
//!     string pipelineConfig = 2;
//!     uint32 suggestedWeight = 3;
//!     uint32 streamNum = 4;
//!     repeated string mediaUri = 5;
//!     uint64 jobHandle = 6;
//! }
//!
//! message AI_Response {
//!     int32 status = 1;
//!     string message = 2;
//!     map<string, Stream_Response> responses = 3;
//! }
//!
//! message Stream_Response {
//!     string jsonMessages = 1;
//!     optional bytes binary = 2;
//! }
//! ```

use std::collections::HashMap;

use pipeline_bench_core::{BinaryAttachment, PipelineRef, RequestEnvelope, ResponseEnvelope};

/// Request message
#[derive(Clone, PartialEq, prost::Message)]
pub struct AiRequest {
    /// `load_pipeline` or `run`
    #[prost(string, tag = "1")]
    pub target: String,
    /// Full pipeline configuration, empty when a job handle is used
    #[prost(string, tag = "2")]
    pub pipeline_config: String,
    /// Scheduling weight hint
    #[prost(uint32, tag = "3")]
    pub suggested_weight: u32,
    /// Streams in this group
    #[prost(uint32, tag = "4")]
    pub stream_num: u32,
    /// Ordered input identifiers
    #[prost(string, repeated, tag = "5")]
    pub media_uri: Vec<String>,
    /// Handle of a loaded pipeline, 0 when unset
    #[prost(uint64, tag = "6")]
    pub job_handle: u64,
}

/// Response message
#[derive(Clone, PartialEq, prost::Message)]
pub struct AiResponse {
    /// Application status, 0 on success
    #[prost(int32, tag = "1")]
    pub status: i32,
    /// JSON message
    #[prost(string, tag = "2")]
    pub message: String,
    /// Per-frame payloads keyed by frame id
    #[prost(map = "string, message", tag = "3")]
    pub responses: HashMap<String, StreamResponse>,
}

/// Per-frame payload of a response
#[derive(Clone, PartialEq, prost::Message)]
pub struct StreamResponse {
    /// JSON metadata describing `binary`
    #[prost(string, tag = "1")]
    pub json_messages: String,
    /// Raw payload
    #[prost(bytes = "vec", optional, tag = "2")]
    pub binary: Option<Vec<u8>>,
}

impl From<&RequestEnvelope> for AiRequest {
    fn from(envelope: &RequestEnvelope) -> Self {
        let target = envelope.target().to_string();
        match envelope {
            RequestEnvelope::LoadPipeline {
                config,
                suggested_weight,
                stream_num,
            } => Self {
                target,
                pipeline_config: config.to_string(),
                suggested_weight: *suggested_weight,
                stream_num: *stream_num,
                ..Self::default()
            },
            RequestEnvelope::Run {
                stream_num,
                media_uris,
                pipeline,
            } => {
                let mut request = Self {
                    target,
                    stream_num: *stream_num,
                    media_uri: media_uris.to_vec(),
                    ..Self::default()
                };
                match pipeline {
                    PipelineRef::Handle(handle) => request.job_handle = handle.get(),
                    PipelineRef::Config(config) => request.pipeline_config = config.to_string(),
                }
                request
            }
        }
    }
}

impl From<AiResponse> for ResponseEnvelope {
    fn from(response: AiResponse) -> Self {
        let mut attachments: Vec<BinaryAttachment> = response
            .responses
            .into_iter()
            .filter_map(|(frame_id, stream)| {
                stream.binary.map(|binary| BinaryAttachment {
                    frame_id,
                    metadata: stream.json_messages,
                    size: binary.len(),
                })
            })
            .collect();
        attachments.sort_by(|a, b| a.frame_id.cmp(&b.frame_id));

        Self {
            code: response.status,
            message: response.message,
            attachments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline_bench_core::JobHandle;
    use prost::Message;
    use std::sync::Arc;

    #[test]
    fn test_load_pipeline_request() {
        let envelope = RequestEnvelope::load_pipeline(Arc::from(r#"{"p":1}"#), 4);
        let request = AiRequest::from(&envelope);

        assert_eq!(request.target, "load_pipeline");
        assert_eq!(request.pipeline_config, r#"{"p":1}"#);
        assert_eq!(request.suggested_weight, 0);
        assert_eq!(request.stream_num, 4);
        assert!(request.media_uri.is_empty());
        assert_eq!(request.job_handle, 0);
    }

    #[test]
    fn test_run_request_with_handle_omits_config() {
        let uris: Arc<[String]> = Arc::from(vec!["a.bin".to_string(), "b.bin".to_string()]);
        let handle = JobHandle::new(9).unwrap();
        let envelope = RequestEnvelope::run(2, uris, PipelineRef::Handle(handle));
        let request = AiRequest::from(&envelope);

        assert_eq!(request.target, "run");
        assert_eq!(request.job_handle, 9);
        assert!(request.pipeline_config.is_empty());
        assert_eq!(request.media_uri, vec!["a.bin", "b.bin"]);

        // Unset config stays empty after a wire round trip
        let bytes = request.encode_to_vec();
        let decoded = AiRequest::decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_run_request_with_config() {
        let envelope = RequestEnvelope::run(
            1,
            Arc::from(Vec::<String>::new()),
            PipelineRef::Config(Arc::from("{}")),
        );
        let request = AiRequest::from(&envelope);
        assert_eq!(request.pipeline_config, "{}");
        assert_eq!(request.job_handle, 0);
    }

    #[test]
    fn test_response_attachments() {
        let mut responses = HashMap::new();
        responses.insert(
            "7".to_string(),
            StreamResponse {
                json_messages: r#"{"format":"bgr","width":4,"height":2}"#.to_string(),
                binary: Some(vec![0; 24]),
            },
        );
        responses.insert(
            "3".to_string(),
            StreamResponse {
                json_messages: "{}".to_string(),
                binary: Some(vec![1, 2]),
            },
        );
        responses.insert(
            "5".to_string(),
            StreamResponse {
                json_messages: "{}".to_string(),
                binary: None,
            },
        );

        let envelope = ResponseEnvelope::from(AiResponse {
            status: 0,
            message: r#"{"latency":"12.5"}"#.to_string(),
            responses,
        });

        assert!(envelope.is_success());
        assert_eq!(envelope.attachments.len(), 2);
        assert_eq!(envelope.attachments[0].frame_id, "3");
        assert_eq!(envelope.attachments[1].size, 24);
        assert!(envelope.attachments[1].metadata.contains("bgr"));
    }
}
