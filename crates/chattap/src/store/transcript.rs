//! Readable assistant text from captured responses
//!
//! Handles native JSON bodies (Anthropic `content` blocks, OpenAI `choices`)
//! and raw SSE captures from streamed responses.

use serde_json::Value;

use super::types::ResponsePayload;

/// Assistant output recovered from a captured response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssistantText {
    /// Concatenated text output
    pub text: String,
    /// Concatenated extended-thinking output, if any
    pub thinking: String,
    /// Whether the stream reached its terminal event (always true for bodies)
    pub is_complete: bool,
    /// Number of SSE data events parsed
    pub event_count: usize,
}

impl ResponsePayload {
    /// Extract the assistant's text from this payload
    pub fn assistant_text(&self) -> AssistantText {
        match self {
            ResponsePayload::Structured(value) => parse_body(value),
            ResponsePayload::RawStream(raw) => parse_sse(raw),
            ResponsePayload::PlainText(text) => AssistantText {
                text: text.clone(),
                is_complete: true,
                ..Default::default()
            },
        }
    }
}

fn parse_body(value: &Value) -> AssistantText {
    let mut out = AssistantText {
        is_complete: true,
        ..Default::default()
    };

    if let Some(blocks) = value.get("content").and_then(Value::as_array) {
        for block in blocks {
            match block.get("type").and_then(Value::as_str) {
                Some("text") => push_str(&mut out.text, block.get("text")),
                Some("thinking") => push_str(&mut out.thinking, block.get("thinking")),
                _ => {}
            }
        }
    } else if let Some(content) = value
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
    {
        push_str(&mut out.text, Some(content));
    }

    out
}

/// Parse a raw SSE capture.
///
/// Each `data:` payload is decoded on its own; the event's `type` field
/// decides what it contributes, so `event:` lines are not required.
fn parse_sse(raw: &str) -> AssistantText {
    let mut out = AssistantText::default();

    for line in raw.lines() {
        let Some(data) = line.strip_prefix("data:") else {
            continue;
        };
        let data = data.trim();
        if data.is_empty() {
            continue;
        }
        if data == "[DONE]" {
            out.is_complete = true;
            continue;
        }

        let Ok(event) = serde_json::from_str::<Value>(data) else {
            continue;
        };
        out.event_count += 1;

        match event.get("type").and_then(Value::as_str) {
            Some("content_block_delta") => {
                let delta = event.get("delta");
                match delta.and_then(|d| d.get("type")).and_then(Value::as_str) {
                    Some("text_delta") => {
                        push_str(&mut out.text, delta.and_then(|d| d.get("text")))
                    }
                    Some("thinking_delta") => {
                        push_str(&mut out.thinking, delta.and_then(|d| d.get("thinking")))
                    }
                    _ => {}
                }
            }
            Some("message_stop") => out.is_complete = true,
            _ => {
                // OpenAI-style chunk
                let delta = event
                    .get("choices")
                    .and_then(|c| c.get(0))
                    .and_then(|c| c.get("delta"))
                    .and_then(|d| d.get("content"));
                push_str(&mut out.text, delta);
            }
        }
    }

    out
}

fn push_str(target: &mut String, value: Option<&Value>) {
    if let Some(text) = value.and_then(Value::as_str) {
        target.push_str(text);
    }
}
