//! Telegram collaborator for echopost.
//!
//! Supplies the two capabilities the reaction pipeline depends on: a
//! long-polling subscription to new posts in one channel, and a reply sink
//! that maps Telegram Bot API failures into classified outcomes. Built on
//! the teloxide library.

pub mod config;
pub mod error;
pub mod outbound;
pub mod source;

pub use {
    config::{ChannelRef, TelegramConfig},
    error::{Error, Result},
    outbound::TelegramReplySink,
    source::TelegramChannel,
};
