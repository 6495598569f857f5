use std::sync::{Arc, Mutex};

use {
    async_trait::async_trait,
    rand::{Rng, rngs::StdRng},
    tracing::{error, info, warn},
};

use echopost_common::{ChannelPost, ReplyOutcome, ReplyTarget};

/// Transport-side reply capability, supplied by the channel collaborator.
///
/// Implementations map whatever the platform signals into a classified
/// [`ReplyOutcome`]; they never panic or propagate raw transport errors.
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn send_reply(&self, target: &ReplyTarget, text: &str) -> ReplyOutcome;
}

/// Executes reply attempts: picks a candidate text at random, sends it via
/// the sink, and absorbs throttle penalties before returning control.
pub struct ReplyDispatcher {
    sink: Arc<dyn ReplySink>,
    messages: Vec<String>,
    /// std Mutex: text selection is a synchronous index draw, never held
    /// across an await point.
    rng: Mutex<StdRng>,
}

impl ReplyDispatcher {
    /// `messages` is validated non-empty upstream.
    #[must_use]
    pub fn new(sink: Arc<dyn ReplySink>, messages: Vec<String>, rng: StdRng) -> Self {
        Self {
            sink,
            messages,
            rng: Mutex::new(rng),
        }
    }

    /// Attempt exactly one reply to `post`.
    ///
    /// On `ThrottledRetryAfter` the dispatcher sleeps out the penalty before
    /// returning, so the caller's natural pacing absorbs it; it never
    /// retries the same post itself. All other failures are logged and
    /// returned as-is.
    pub async fn dispatch(&self, post: &ChannelPost) -> ReplyOutcome {
        let Some(text) = self.pick_message() else {
            return ReplyOutcome::TransientFailure("no reply messages configured".into());
        };

        let outcome = self.sink.send_reply(&post.reply_target, &text).await;
        match &outcome {
            ReplyOutcome::Sent => {
                info!(post_id = post.id, text, "reply posted");
            },
            ReplyOutcome::ThrottledRetryAfter(wait) => {
                warn!(
                    post_id = post.id,
                    retry_after_secs = wait.as_secs(),
                    "platform throttled the reply, pausing"
                );
                tokio::time::sleep(*wait).await;
            },
            ReplyOutcome::Forbidden => {
                error!(post_id = post.id, "no permission to reply in target chat");
            },
            ReplyOutcome::Rejected(reason) => {
                error!(post_id = post.id, reason, "reply rejected by platform");
            },
            ReplyOutcome::TransientFailure(reason) => {
                warn!(post_id = post.id, reason, "reply failed");
            },
        }
        outcome
    }

    fn pick_message(&self) -> Option<String> {
        if self.messages.is_empty() {
            return None;
        }
        let idx = {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            rng.random_range(0..self.messages.len())
        };
        self.messages.get(idx).cloned()
    }
}
