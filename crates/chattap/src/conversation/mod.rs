//! Conversation identification for captured requests

mod identity;
mod request;

pub use identity::{
    ConversationKey, FIRST_MESSAGE_LEN, SESSION_MARKER, USER_ID_PREFIX_LEN, short_id,
};
pub use request::{ChatMessage, ChatRequest, ContentPart, MessageContent, RequestMetadata};
