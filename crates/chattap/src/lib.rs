//! ChatTap - capturing proxy for chat-completion APIs
//!
//! This crate provides a daemon that relays chat-completion traffic to an
//! upstream server and records every conversation, one entry per
//! conversation, in a JSON log file.

pub mod config;
pub mod conversation;
pub mod error;
pub mod proxy;
pub mod store;

pub use error::ChatTapError;
