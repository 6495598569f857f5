use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Top-level configuration file schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EchopostConfig {
    pub telegram: TelegramSection,
    pub monitor: MonitorSection,
}

/// `[telegram]` section: credentials and target channel.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramSection {
    /// Bot token, usually supplied as `${ECHOPOST_BOT_TOKEN}`.
    pub token: String,
    /// Target channel: `@username` or numeric chat ID.
    pub channel: String,
}

impl std::fmt::Debug for TelegramSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramSection")
            .field("token", &"[REDACTED]")
            .field("channel", &self.channel)
            .finish()
    }
}

/// `[monitor]` section: reaction pacing and candidate replies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSection {
    /// Rate-limiter capacity over the trailing hour.
    pub max_replies_per_hour: u32,
    /// Lower bound of the random pre-reply delay, in seconds.
    pub reply_delay_min_secs: u64,
    /// Upper bound of the random pre-reply delay, in seconds.
    pub reply_delay_max_secs: u64,
    /// Candidate reply texts; one is picked at random per reaction.
    pub reply_messages: Vec<String>,
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            max_replies_per_hour: 10,
            reply_delay_min_secs: 5,
            reply_delay_max_secs: 15,
            reply_messages: Vec::new(),
        }
    }
}

impl EchopostConfig {
    /// Trim reply messages and drop blank entries.
    pub fn normalize(&mut self) {
        self.monitor.reply_messages = self
            .monitor
            .reply_messages
            .iter()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
    }

    /// Check everything the pipeline and the Telegram collaborator assume.
    ///
    /// Collects all problems into one error so a broken file is reported in
    /// a single pass.
    pub fn validate(&self) -> Result<()> {
        let mut issues = Vec::new();

        if self.telegram.token.trim().is_empty() {
            issues.push("telegram.token is required".to_string());
        } else if self.telegram.token.contains("${") {
            issues.push("telegram.token references an unset environment variable".to_string());
        }
        if self.telegram.channel.trim().is_empty() {
            issues.push("telegram.channel is required".to_string());
        }
        if self.monitor.max_replies_per_hour < 1 {
            issues.push("monitor.max_replies_per_hour must be at least 1".to_string());
        }
        if self.monitor.reply_delay_min_secs < 1 {
            issues.push("monitor.reply_delay_min_secs must be at least 1".to_string());
        }
        if self.monitor.reply_delay_max_secs < self.monitor.reply_delay_min_secs {
            issues.push(
                "monitor.reply_delay_max_secs must not be below reply_delay_min_secs".to_string(),
            );
        }
        if self.monitor.reply_messages.is_empty() {
            issues.push("monitor.reply_messages needs at least one entry".to_string());
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(Error::Invalid(issues.join("; ")))
        }
    }
}
