use std::time::Duration;

use {
    secrecy::ExposeSecret,
    teloxide::{
        ApiError, Bot, RequestError,
        prelude::*,
        types::{AllowedUpdate, Message, UpdateKind},
    },
    tokio::sync::mpsc,
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use echopost_common::{ChannelPost, ReplyTarget};

use crate::{
    config::{ChannelRef, TelegramConfig},
    outbound::TelegramReplySink,
};

/// Queue depth between the polling loop and the reaction pipeline.
const EVENT_QUEUE_DEPTH: usize = 128;

/// Pause after a transient getUpdates failure before polling again.
const POLL_RETRY_PAUSE: Duration = Duration::from_secs(5);

/// A verified connection to the Telegram Bot API, scoped to one channel.
pub struct TelegramChannel {
    bot: Bot,
    channel: ChannelRef,
    bot_user_id: Option<i64>,
}

impl TelegramChannel {
    /// Verify credentials and prepare long polling for the configured
    /// channel.
    pub async fn connect(config: &TelegramConfig) -> crate::Result<Self> {
        let bot = Bot::new(config.token.expose_secret());

        let me = bot.get_me().await?;
        let bot_user_id = i64::try_from(me.id.0).ok();

        // Delete any existing webhook so long polling works.
        bot.delete_webhook().send().await?;

        info!(
            username = ?me.username,
            channel = %config.channel,
            "telegram bot connected (webhook cleared)"
        );

        Ok(Self {
            bot,
            channel: config.channel_ref(),
            bot_user_id,
        })
    }

    /// Identity of the acting account, used to filter self-authored posts.
    #[must_use]
    pub fn bot_user_id(&self) -> Option<i64> {
        self.bot_user_id
    }

    /// Reply sink bound to this connection.
    #[must_use]
    pub fn reply_sink(&self) -> TelegramReplySink {
        TelegramReplySink::new(self.bot.clone())
    }

    /// Subscribe to new posts in the configured channel.
    ///
    /// Spawns a long-polling loop that feeds the returned receiver until
    /// the token is cancelled or the subscription is lost; either way the
    /// sender is dropped and the stream ends — disconnection is
    /// end-of-sequence, not an error.
    #[must_use]
    pub fn subscribe(&self, cancel: CancellationToken) -> mpsc::Receiver<ChannelPost> {
        let (tx, rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let bot = self.bot.clone();
        let channel = self.channel.clone();
        tokio::spawn(poll_channel_posts(bot, channel, tx, cancel));
        rx
    }
}

async fn poll_channel_posts(
    bot: Bot,
    channel: ChannelRef,
    tx: mpsc::Sender<ChannelPost>,
    cancel: CancellationToken,
) {
    info!("starting telegram channel polling loop");
    let mut offset: i32 = 0;

    loop {
        if cancel.is_cancelled() {
            info!("telegram polling stopped");
            break;
        }

        let result = bot
            .get_updates()
            .offset(offset)
            .timeout(30)
            .allowed_updates(vec![AllowedUpdate::ChannelPost])
            .await;

        match result {
            Ok(updates) => {
                for update in updates {
                    offset = update.id.as_offset();
                    match update.kind {
                        UpdateKind::ChannelPost(msg) => {
                            if !channel.matches(msg.chat.id.0, msg.chat.username()) {
                                debug!(
                                    chat_id = msg.chat.id.0,
                                    "ignoring post from unmonitored chat"
                                );
                                continue;
                            }
                            debug!(post_id = msg.id.0, "new channel post");
                            if tx.send(map_post(&msg)).await.is_err() {
                                info!("event consumer gone, stopping polling");
                                return;
                            }
                        },
                        other => {
                            debug!("ignoring non-channel-post update: {other:?}");
                        },
                    }
                }
            },
            Err(e) => {
                // Conflict: another bot instance is polling with the same
                // token. Unrecoverable — end the subscription.
                if matches!(&e, RequestError::Api(ApiError::TerminatedByOtherGetUpdates)) {
                    warn!("another instance is already polling with this token, ending subscription");
                    break;
                }

                warn!(error = %e, "telegram getUpdates failed");
                tokio::time::sleep(POLL_RETRY_PAUSE).await;
            },
        }
    }
    // Dropping `tx` ends the event stream for the pipeline.
}

fn map_post(msg: &Message) -> ChannelPost {
    ChannelPost {
        id: i64::from(msg.id.0),
        date: msg.date,
        sender_id: msg.from.as_ref().and_then(|u| i64::try_from(u.id.0).ok()),
        reply_target: ReplyTarget {
            chat_id: msg.chat.id.0,
            message_id: msg.id.0,
        },
    }
}
