//! Reaction pipeline — the core that decides, for each new channel post,
//! whether to react, when to react, and how to absorb platform throttling.
//!
//! Flow: event source → dedup/staleness check → rate-limit check → random
//! delay → dispatch → record. Per-event workflows run concurrently; the
//! limiter and ledger sit behind a single shared gate.

pub mod dedup;
pub mod delay;
pub mod dispatch;
pub mod error;
pub mod limiter;
pub mod pipeline;

pub use {
    dedup::DedupLedger,
    dispatch::{ReplyDispatcher, ReplySink},
    error::{Error, Result},
    limiter::SlidingWindowLimiter,
    pipeline::{MonitorConfig, RATE_WINDOW, ReactionPipeline},
};
