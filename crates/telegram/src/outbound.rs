use {
    async_trait::async_trait,
    teloxide::{
        ApiError, Bot, RequestError,
        payloads::SendMessageSetters,
        prelude::*,
        types::{ChatId, MessageId, ReplyParameters},
    },
    tracing::debug,
};

use {
    echopost_common::{ReplyOutcome, ReplyTarget},
    echopost_pipeline::ReplySink,
};

/// Sends replies into the monitored channel's discussion thread.
pub struct TelegramReplySink {
    bot: Bot,
}

impl TelegramReplySink {
    #[must_use]
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ReplySink for TelegramReplySink {
    async fn send_reply(&self, target: &ReplyTarget, text: &str) -> ReplyOutcome {
        let request = self
            .bot
            .send_message(ChatId(target.chat_id), text)
            .reply_parameters(
                ReplyParameters::new(MessageId(target.message_id)).allow_sending_without_reply(),
            );

        match request.await {
            Ok(message) => {
                debug!(
                    chat_id = target.chat_id,
                    message_id = message.id.0,
                    "reply sent"
                );
                ReplyOutcome::Sent
            },
            Err(e) => classify_send_error(&e),
        }
    }
}

/// Map a Telegram request failure into the pipeline's outcome taxonomy.
fn classify_send_error(error: &RequestError) -> ReplyOutcome {
    match error {
        RequestError::RetryAfter(wait) => ReplyOutcome::ThrottledRetryAfter(wait.duration()),
        RequestError::Api(
            ApiError::BotBlocked
            | ApiError::BotKicked
            | ApiError::NotEnoughRightsToPostMessages
            | ApiError::ChatNotFound,
        ) => ReplyOutcome::Forbidden,
        RequestError::Api(api) => ReplyOutcome::Rejected(api.to_string()),
        other => ReplyOutcome::TransientFailure(other.to_string()),
    }
}
