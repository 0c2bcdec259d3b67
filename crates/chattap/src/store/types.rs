//! Persisted interaction log types
//!
//! The on-disk layout is consumed by the report viewer and must stay stable:
//! `{extraction_time, prompts: [...], total_prompts, last_updated}`.

use chrono::Local;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::conversation::{ChatRequest, ConversationKey};

/// Capture timestamp format, e.g. `2025-01-31 14:02:11,482`
const CAPTURE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

/// Wall-clock capture timestamp in the log's display format
pub fn capture_timestamp() -> String {
    Local::now().format(CAPTURE_TIMESTAMP_FORMAT).to_string()
}

/// ISO-8601 timestamp used for document-level and update times
pub fn iso_now() -> String {
    Local::now().to_rfc3339()
}

/// Response body as captured from the upstream.
///
/// Serialized untagged so the log keeps the shapes the viewer branches on:
/// native JSON, a bare string, or `{"raw_stream": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum ResponsePayload {
    /// The upstream's JSON body
    Structured(Value),
    /// Accumulated text of a streamed response
    RawStream(String),
    /// Non-JSON body, kept as text
    PlainText(String),
}

impl ResponsePayload {
    /// Interpret a buffered response body, preferring JSON
    pub fn from_body(body: &[u8]) -> Self {
        let text = String::from_utf8_lossy(body);
        match serde_json::from_str::<Value>(&text) {
            Ok(value) => ResponsePayload::Structured(value),
            Err(_) => ResponsePayload::PlainText(text.into_owned()),
        }
    }

    /// Wrap the accumulated bytes of a streamed response
    pub fn from_stream(accumulated: &[u8]) -> Self {
        ResponsePayload::RawStream(String::from_utf8_lossy(accumulated).into_owned())
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, ResponsePayload::RawStream(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ResponsePayload::Structured(_) => "structured",
            ResponsePayload::RawStream(_) => "stream",
            ResponsePayload::PlainText(_) => "text",
        }
    }
}

impl Default for ResponsePayload {
    fn default() -> Self {
        ResponsePayload::Structured(Value::Null)
    }
}

impl From<Value> for ResponsePayload {
    fn from(value: Value) -> Self {
        if let Value::Object(map) = &value {
            if map.len() == 1 {
                if let Some(Value::String(raw)) = map.get("raw_stream") {
                    return ResponsePayload::RawStream(raw.clone());
                }
            }
        }

        match value {
            Value::String(text) => ResponsePayload::PlainText(text),
            other => ResponsePayload::Structured(other),
        }
    }
}

impl From<ResponsePayload> for Value {
    fn from(payload: ResponsePayload) -> Self {
        match payload {
            ResponsePayload::Structured(value) => value,
            ResponsePayload::RawStream(raw) => serde_json::json!({ "raw_stream": raw }),
            ResponsePayload::PlainText(text) => Value::String(text),
        }
    }
}

/// One captured request/response exchange
///
/// Scalar fields tolerate `null` and mistyped values so that one odd record
/// written by an older version never makes the whole log unreadable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    /// When this conversation was first captured
    #[serde(default, deserialize_with = "lenient_string")]
    pub timestamp: String,
    /// When this record was last replaced
    #[serde(default, deserialize_with = "lenient_string")]
    pub updated_at: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub model: String,
    /// Conversation identity, unique within a document
    #[serde(default, deserialize_with = "lenient_string")]
    pub conv_id: String,
    /// Preview of the opening user message
    #[serde(default, deserialize_with = "lenient_string")]
    pub first_user_message: String,
    #[serde(default, deserialize_with = "lenient_count")]
    pub messages_count: usize,
    #[serde(default)]
    pub full_request: Value,
    #[serde(default)]
    pub full_response: ResponsePayload,
}

impl InteractionRecord {
    /// Assemble a record for a freshly captured exchange
    pub fn new(
        request: &ChatRequest,
        full_request: Value,
        full_response: ResponsePayload,
        captured_at: String,
    ) -> Self {
        let key = ConversationKey::resolve(request);
        Self {
            updated_at: iso_now(),
            timestamp: captured_at,
            model: request.model().to_string(),
            conv_id: key.conv_id,
            first_user_message: key.first_user_message,
            messages_count: request.messages.len(),
            full_request,
            full_response,
        }
    }
}

/// The persisted interaction log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreDocument {
    #[serde(default, deserialize_with = "lenient_string")]
    pub extraction_time: String,
    /// Records in insertion order
    pub prompts: Vec<InteractionRecord>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub total_prompts: usize,
    #[serde(default, deserialize_with = "lenient_string")]
    pub last_updated: String,
}

impl StoreDocument {
    pub fn empty() -> Self {
        let now = iso_now();
        Self {
            extraction_time: now.clone(),
            prompts: Vec::new(),
            total_prompts: 0,
            last_updated: now,
        }
    }

    /// Slot holding the record for `conv_id`, if any
    pub fn position(&self, conv_id: &str) -> Option<usize> {
        self.prompts.iter().position(|p| p.conv_id == conv_id)
    }

    /// Recompute derived fields before a write
    pub fn stamp(&mut self) {
        self.total_prompts = self.prompts.len();
        self.last_updated = iso_now();
    }
}

impl Default for StoreDocument {
    fn default() -> Self {
        Self::empty()
    }
}

/// `null` reads as empty; numbers and other values keep their JSON text
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Non-negative integers, or numeric strings; anything else reads as 0
fn lenient_count<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let count = match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    Ok(count.and_then(|n| usize::try_from(n).ok()).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_from_json_body() {
        let payload = ResponsePayload::from_body(br#"{"id":"msg_1","content":[]}"#);
        assert_eq!(
            payload,
            ResponsePayload::Structured(json!({"id": "msg_1", "content": []}))
        );
    }

    #[test]
    fn test_payload_from_non_json_body() {
        let payload = ResponsePayload::from_body(b"upstream exploded");
        assert_eq!(
            payload,
            ResponsePayload::PlainText("upstream exploded".to_string())
        );
    }

    #[test]
    fn test_stream_payload_serializes_as_raw_stream_object() {
        let payload = ResponsePayload::from_stream(b"event: ping\ndata: {}\n\n");
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value, json!({"raw_stream": "event: ping\ndata: {}\n\n"}));

        let back: ResponsePayload = serde_json::from_value(value).unwrap();
        assert!(back.is_stream());
    }

    #[test]
    fn test_object_with_extra_keys_stays_structured() {
        let payload: ResponsePayload =
            serde_json::from_value(json!({"raw_stream": "x", "id": 1})).unwrap();
        assert_eq!(payload.kind(), "structured");
    }

    #[test]
    fn test_invalid_utf8_stream_is_replaced() {
        let payload = ResponsePayload::from_stream(&[b'o', b'k', 0xff]);
        match payload {
            ResponsePayload::RawStream(raw) => assert!(raw.starts_with("ok")),
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn test_record_from_request() {
        let body = json!({
            "model": "claude-sonnet-4",
            "metadata": {"user_id": "u1_session_abc"},
            "messages": [
                {"role": "user", "content": "Hello"},
                {"role": "assistant", "content": "Hi"}
            ]
        });
        let request = ChatRequest::from_value(&body).unwrap();
        let record = InteractionRecord::new(
            &request,
            body.clone(),
            ResponsePayload::PlainText("ok".into()),
            "2025-01-01 00:00:00,000".into(),
        );

        assert_eq!(record.model, "claude-sonnet-4");
        assert_eq!(record.messages_count, 2);
        assert_eq!(record.first_user_message, "Hello");
        assert_eq!(record.conv_id.len(), 64);
        assert_eq!(record.full_request, body);
        assert_eq!(record.timestamp, "2025-01-01 00:00:00,000");
    }

    #[test]
    fn test_legacy_record_loads_with_defaults() {
        let legacy = json!({
            "timestamp": "2024-12-01 10:00:00,000",
            "model": "claude-3-5-sonnet",
            "full_request": {"messages": []},
            "full_response": {"raw_stream": "data: {}"}
        });
        let record: InteractionRecord = serde_json::from_value(legacy).unwrap();
        assert_eq!(record.conv_id, "");
        assert_eq!(record.messages_count, 0);
        assert!(record.full_response.is_stream());
    }

    #[test]
    fn test_null_and_mistyped_fields_read_as_defaults() {
        let odd = json!({
            "timestamp": null,
            "model": null,
            "conv_id": 42,
            "messages_count": "3",
            "full_request": null,
            "full_response": null
        });
        let record: InteractionRecord = serde_json::from_value(odd).unwrap();
        assert_eq!(record.timestamp, "");
        assert_eq!(record.model, "");
        assert_eq!(record.conv_id, "42");
        assert_eq!(record.messages_count, 3);

        let negative: InteractionRecord =
            serde_json::from_value(json!({"messages_count": -1})).unwrap();
        assert_eq!(negative.messages_count, 0);
    }

    #[test]
    fn test_document_stamp_recomputes_total() {
        let mut doc = StoreDocument::empty();
        doc.total_prompts = 99;
        doc.stamp();
        assert_eq!(doc.total_prompts, 0);
    }
}
