use std::time::Duration;

use log::debug;
use teloxide::prelude::*;
use teloxide::types::{ChatId, LinkPreviewOptions, Recipient};
use url::Url;

use crate::config::Config;
use crate::error::{RadarError, Result};
use crate::notify::Notifier;

/// Sends announcements through the Telegram Bot API.
///
/// Credentials are only checked when something is actually sent, so runs that
/// find nothing new work without them.
pub struct TelegramNotifier {
    bot_token: Option<String>,
    chat_id: Option<String>,
    api_url: Option<Url>,
    timeout: Duration,
}

impl TelegramNotifier {
    pub fn from_config(cfg: &Config) -> Self {
        TelegramNotifier {
            bot_token: cfg.telegram_bot_token.clone(),
            chat_id: cfg.telegram_chat_id.clone(),
            api_url: cfg.telegram_api_url.clone(),
            timeout: cfg.send_timeout,
        }
    }

    fn bot(&self, token: &str) -> Result<Bot> {
        let client = teloxide::net::default_reqwest_settings()
            .timeout(self.timeout)
            .build()
            .map_err(|e| RadarError::NotificationSendFailed(format!("cannot build client: {e}")))?;

        let bot = Bot::with_client(token, client);
        Ok(match &self.api_url {
            Some(url) => bot.set_api_url(url.clone()),
            None => bot,
        })
    }
}

impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) -> Result<()> {
        let token = self
            .bot_token
            .as_deref()
            .ok_or(RadarError::ConfigurationMissing("telegram bot token (TG_BOT_TOKEN)"))?;
        let chat = self
            .chat_id
            .as_deref()
            .ok_or(RadarError::ConfigurationMissing("telegram chat id (TG_CHAT_ID)"))?;

        let bot = self.bot(token)?;
        bot.send_message(recipient(chat), text)
            .link_preview_options(LinkPreviewOptions {
                is_disabled: true,
                url: None,
                prefer_small_media: false,
                prefer_large_media: false,
                show_above_text: false,
            })
            .await
            .map_err(|e| RadarError::NotificationSendFailed(e.to_string()))?;

        debug!("Telegram message delivered to {chat}");
        Ok(())
    }
}

/// Numeric ids address users and groups; anything else is a `@channel` name.
fn recipient(chat: &str) -> Recipient {
    match chat.parse::<i64>() {
        Ok(id) => Recipient::Id(ChatId(id)),
        Err(_) => Recipient::ChannelUsername(chat.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn notifier(token: Option<&str>, chat: Option<&str>, api_url: Option<Url>) -> TelegramNotifier {
        TelegramNotifier {
            bot_token: token.map(String::from),
            chat_id: chat.map(String::from),
            api_url,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_recipient_parsing() {
        assert_eq!(recipient("-1001234"), Recipient::Id(ChatId(-1001234)));
        assert_eq!(
            recipient("@dramaradar"),
            Recipient::ChannelUsername("@dramaradar".to_string())
        );
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_at_send_time() {
        let err = notifier(None, Some("42"), None).send("hi").await.unwrap_err();
        assert!(matches!(err, RadarError::ConfigurationMissing(_)));

        let err = notifier(Some("token"), None, None).send("hi").await.unwrap_err();
        assert!(matches!(err, RadarError::ConfigurationMissing(_)));
    }

    #[tokio::test]
    async fn test_api_failure_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string(
                r#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#,
            ))
            .mount(&server)
            .await;

        let api_url = Url::parse(&server.uri()).unwrap();
        let err = notifier(Some("123:abc"), Some("42"), Some(api_url))
            .send("hi")
            .await
            .unwrap_err();

        assert!(matches!(err, RadarError::NotificationSendFailed(_)));
    }
}
