//! Access notifications.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::NotifyConfig;
use crate::store::Settings;

/// What an access notification reports.
#[derive(Debug, Clone, Default)]
pub struct AccessMessage {
    pub title: String,
    pub client_ip: String,
    pub domain: String,
    pub user_agent: String,
    pub format: String,
    pub subscription: String,
}

impl AccessMessage {
    /// Markdown body sent to chat notifiers.
    pub fn render(&self) -> String {
        format!(
            "{}\n\n*IP:* `{}`\n*Domain:* `{}`\n*Client:* `{}`\n*Format:* `{}`\n*Subscription:* `{}`",
            self.title, self.client_ip, self.domain, self.user_agent, self.format, self.subscription
        )
    }
}

/// Delivers access notifications. Implementations swallow their own errors.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_access(&self, settings: &Settings, message: &AccessMessage);
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: String,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

/// Telegram Bot API notifier; active only when the settings carry a bot token and chat id.
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    client: reqwest::Client,
    api_base: String,
    timeout: Duration,
}

impl TelegramNotifier {
    pub fn new(client: reqwest::Client, config: &NotifyConfig) -> Self {
        Self {
            client,
            api_base: config.telegram_api.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify_access(&self, settings: &Settings, message: &AccessMessage) {
        if settings.bot_token.is_empty() || settings.chat_id.is_empty() {
            return;
        }

        let url = format!("{}/bot{}/sendMessage", self.api_base, settings.bot_token);
        let payload = SendMessage {
            chat_id: &settings.chat_id,
            text: message.render(),
            parse_mode: "Markdown",
            disable_web_page_preview: true,
        };

        match self
            .client
            .post(&url)
            .json(&payload)
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => {
                tracing::debug!(subscription = %message.subscription, "Access notification sent");
            }
            Ok(resp) => {
                tracing::warn!(status = resp.status().as_u16(), "Telegram rejected access notification");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to send access notification");
            }
        }
    }
}
