//! Shared types used across all echopost crates.

pub mod types;

pub use types::{ChannelPost, ReplyOutcome, ReplyTarget};
