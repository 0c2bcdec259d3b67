//! Interaction log storage

mod interaction;
mod transcript;
mod types;

pub use interaction::{InteractionStore, MergeOutcome, read_document};
pub use transcript::AssistantText;
pub use types::{
    InteractionRecord, ResponsePayload, StoreDocument, capture_timestamp, iso_now,
};
