//! Conversation identity derivation
//!
//! A conversation is identified by its session fragment plus the opening user
//! message. Appending turns never changes the identity, so successive captures
//! of the same conversation collapse onto one record.

use sha2::{Digest, Sha256};

use super::request::ChatRequest;

/// Marker inside `metadata.user_id` that precedes the session identifier
pub const SESSION_MARKER: &str = "_session_";

/// Characters of `user_id` used when no session marker is present
pub const USER_ID_PREFIX_LEN: usize = 32;

/// Characters of the first user message that take part in the identity
pub const FIRST_MESSAGE_LEN: usize = 200;

/// Identity and display data derived from one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationKey {
    /// Hex SHA-256 digest of `session:first_user_message`
    pub conv_id: String,
    /// Session fragment taken from request metadata (may be empty)
    pub session: String,
    /// First user message, truncated to [`FIRST_MESSAGE_LEN`] characters
    pub first_user_message: String,
}

impl ConversationKey {
    /// Derive the conversation key for a request.
    ///
    /// Requests without any user message still get a deterministic key built
    /// from an empty text segment.
    pub fn resolve(request: &ChatRequest) -> Self {
        let session = session_fragment(request.user_id());
        let first_user_message = truncate_chars(
            &request.first_user_text().unwrap_or_default(),
            FIRST_MESSAGE_LEN,
        );
        let conv_id = digest(&session, &first_user_message);

        Self {
            conv_id,
            session,
            first_user_message,
        }
    }
}

/// First 12 hex characters of a conversation id
pub fn short_id(conv_id: &str) -> &str {
    conv_id.get(..12).unwrap_or(conv_id)
}

fn session_fragment(user_id: Option<&str>) -> String {
    match user_id {
        Some(id) => match id.rfind(SESSION_MARKER) {
            Some(pos) => id[pos + SESSION_MARKER.len()..].to_string(),
            None => truncate_chars(id, USER_ID_PREFIX_LEN),
        },
        None => String::new(),
    }
}

fn digest(session: &str, first_user_message: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(session.as_bytes());
    hasher.update(b":");
    hasher.update(first_user_message.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub(crate) fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
