use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
};

/// Where to send a reply: the chat the post lives in plus the message to
/// thread the reply under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyTarget {
    /// Chat/channel ID the post was published in.
    pub chat_id: i64,
    /// Message ID to reply to.
    pub message_id: i32,
}

/// A post observed in the monitored channel. Immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelPost {
    /// Message ID, unique within the channel.
    pub id: i64,
    /// Publication time as reported by the platform.
    pub date: DateTime<Utc>,
    /// Author ID, when the platform exposes one (channel posts often don't).
    pub sender_id: Option<i64>,
    /// Handle the dispatcher needs to address a reply.
    pub reply_target: ReplyTarget,
}

/// Classified result of one reply dispatch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// Exactly one reply was transmitted.
    Sent,
    /// The platform asked us to slow down for the given duration.
    ThrottledRetryAfter(std::time::Duration),
    /// No permission to write in the target chat. Terminal for the event.
    Forbidden,
    /// The platform refused the reply (e.g. restricted account). Terminal.
    Rejected(String),
    /// Any other unexpected transport failure. Terminal, never escalated.
    TransientFailure(String),
}

impl ReplyOutcome {
    /// True only for [`ReplyOutcome::Sent`] — the single outcome that
    /// consumes a rate-limiter slot.
    #[must_use]
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent)
    }
}
