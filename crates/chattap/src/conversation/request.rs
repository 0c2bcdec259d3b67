//! Typed view over an inbound chat-completion request body
//!
//! The raw JSON body is always forwarded and persisted verbatim; this view only
//! picks out the fields needed to identify a conversation.

use serde::Deserialize;
use serde_json::Value;

use crate::error::Result;

/// The subset of a chat-completion request that chattap inspects
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub metadata: Option<RequestMetadata>,
}

impl ChatRequest {
    /// Build the typed view from an already parsed body
    pub fn from_value(value: &Value) -> Result<Self> {
        Ok(Self::deserialize(value)?)
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or_default()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.metadata.as_ref()?.user_id.as_deref()
    }

    /// Text of the first message authored by the user, in original order
    pub fn first_user_text(&self) -> Option<String> {
        self.messages
            .iter()
            .find(|m| m.role.as_deref() == Some("user"))
            .map(|m| m.text())
    }
}

/// Request metadata block (`metadata.user_id` carries the session marker)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestMetadata {
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<MessageContent>,
}

impl ChatMessage {
    /// Plain text of the message; structured content keeps only `text` parts
    pub fn text(&self) -> String {
        match &self.content {
            Some(MessageContent::Text(text)) => text.clone(),
            Some(MessageContent::Parts(parts)) => parts
                .iter()
                .filter_map(ContentPart::plain_text)
                .collect::<Vec<_>>()
                .concat(),
            Some(MessageContent::Other(_)) | None => String::new(),
        }
    }
}

/// Message content is either a bare string or a list of typed parts
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
    Other(Value),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

impl ContentPart {
    fn plain_text(&self) -> Option<&str> {
        match self.kind.as_deref() {
            Some("text") => self.text.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parses_string_and_parts_content() {
        let request = ChatRequest::from_value(&json!({
            "model": "claude-sonnet-4",
            "stream": true,
            "messages": [
                {"role": "user", "content": "plain"},
                {"role": "user", "content": [
                    {"type": "text", "text": "Hello "},
                    {"type": "image", "source": {"type": "base64", "data": "..."}},
                    {"type": "text", "text": "there"}
                ]}
            ]
        }))
        .unwrap();

        assert_eq!(request.model(), "claude-sonnet-4");
        assert_eq!(request.messages[0].text(), "plain");
        assert_eq!(request.messages[1].text(), "Hello there");
    }

    #[test]
    fn test_first_user_text_skips_other_roles() {
        let request = ChatRequest::from_value(&json!({
            "messages": [
                {"role": "system", "content": "be brief"},
                {"role": "assistant", "content": "hi"},
                {"role": "user", "content": "first"},
                {"role": "user", "content": "second"}
            ]
        }))
        .unwrap();

        assert_eq!(request.first_user_text().as_deref(), Some("first"));
    }

    #[test]
    fn test_unexpected_content_shape_is_tolerated() {
        let request = ChatRequest::from_value(&json!({
            "messages": [{"role": "user", "content": 42}]
        }))
        .unwrap();

        assert_eq!(request.first_user_text().as_deref(), Some(""));
    }

    #[test]
    fn test_missing_fields_default() {
        let request = ChatRequest::from_value(&json!({})).unwrap();
        assert_eq!(request.model(), "");
        assert!(request.user_id().is_none());
        assert!(request.first_user_text().is_none());
    }

    #[test]
    fn test_stream_flag_of_any_type_is_ignored() {
        let request = ChatRequest::from_value(&json!({
            "stream": "true",
            "messages": [{"role": "user", "content": "hi"}]
        }))
        .unwrap();

        assert_eq!(request.first_user_text().as_deref(), Some("hi"));
    }

    #[test]
    fn test_non_object_body_is_error() {
        assert!(ChatRequest::from_value(&json!([1, 2, 3])).is_err());
    }
}
