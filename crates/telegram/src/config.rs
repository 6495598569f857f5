use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Configuration for the monitored Telegram channel.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    #[serde(serialize_with = "serialize_secret")]
    pub token: Secret<String>,

    /// Target channel: `@username` or a numeric chat ID (e.g. `-100…`).
    pub channel: String,
}

impl TelegramConfig {
    /// Resolve the configured channel string into a matchable reference.
    #[must_use]
    pub fn channel_ref(&self) -> ChannelRef {
        ChannelRef::parse(&self.channel)
    }
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("token", &"[REDACTED]")
            .field("channel", &self.channel)
            .finish()
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: Secret::new(String::new()),
            channel: String::new(),
        }
    }
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

/// Parsed channel identifier used to filter incoming updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelRef {
    /// Public channel username, stored lowercase without the leading `@`.
    Username(String),
    /// Numeric chat ID.
    Id(i64),
}

impl ChannelRef {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Ok(id) = trimmed.parse::<i64>() {
            return Self::Id(id);
        }
        Self::Username(trimmed.trim_start_matches('@').to_lowercase())
    }

    /// True if a chat with this ID/username is the configured channel.
    /// Username comparison is case-insensitive.
    #[must_use]
    pub fn matches(&self, chat_id: i64, chat_username: Option<&str>) -> bool {
        match self {
            Self::Id(id) => *id == chat_id,
            Self::Username(name) => {
                chat_username.is_some_and(|u| u.eq_ignore_ascii_case(name))
            },
        }
    }
}
