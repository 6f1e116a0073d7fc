use super::{render_text, NotificationChannel};
use crate::error::{Result, RuntimeError};
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use tracing::debug;

/// Discord rejects message content longer than this many characters
const MAX_CONTENT_CHARS: usize = 2000;

/// Posts alerts to one Discord channel as a bot
pub struct DiscordChannel {
    client: Client,
    api_base: String,
    bot_token: String,
    channel_id: String,
    name: String,
}

impl DiscordChannel {
    pub const DEFAULT_API_BASE: &'static str = "https://discord.com/api/v10";

    pub fn new(client: Client, bot_token: &str, channel_id: &str) -> Self {
        Self {
            client,
            api_base: Self::DEFAULT_API_BASE.to_string(),
            bot_token: bot_token.to_string(),
            channel_id: channel_id.to_string(),
            name: format!("discord:{}", channel_id),
        }
    }

    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }
}

fn truncate_content(text: &str) -> String {
    if text.chars().count() <= MAX_CONTENT_CHARS {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(MAX_CONTENT_CHARS - 3).collect();
    truncated.push_str("...");
    truncated
}

#[async_trait]
impl NotificationChannel for DiscordChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, subject: &str, message: &str) -> Result<()> {
        let url = format!("{}/channels/{}/messages", self.api_base, self.channel_id);
        debug!("POST {}", url);

        let payload = serde_json::json!({
            "content": truncate_content(&render_text(subject, message)),
        });

        let resp = self
            .client
            .post(&url)
            .header(AUTHORIZATION, format!("Bot {}", self.bot_token))
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                RuntimeError::notification_failed(&self.name, format!("HTTP request failed: {}", e))
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(RuntimeError::notification_failed(
                &self.name,
                format!("create message returned status {}: {}", status, body),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::HttpStub;

    #[tokio::test]
    async fn test_posts_message_as_bot() {
        let stub = HttpStub::start(200, r#"{"id":"1"}"#).await;
        let channel =
            DiscordChannel::new(Client::new(), "bot-secret", "9001").with_api_base(&stub.base_url);

        channel.send("subject", "message").await.unwrap();

        let requests = stub.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].path, "/channels/9001/messages");
        assert_eq!(requests[0].header("Authorization"), Some("Bot bot-secret"));

        let body: serde_json::Value = serde_json::from_str(&requests[0].body).unwrap();
        assert_eq!(body["content"], "subject\nmessage");
    }

    #[tokio::test]
    async fn test_forbidden_is_an_error() {
        let stub = HttpStub::start(403, r#"{"message":"Missing Access"}"#).await;
        let channel =
            DiscordChannel::new(Client::new(), "bot-secret", "1").with_api_base(&stub.base_url);

        let err = channel.send("s", "m").await.unwrap_err();
        assert!(err.to_string().contains("403"));
    }

    #[test]
    fn test_truncate_content() {
        assert_eq!(truncate_content("short"), "short");

        let long = "é".repeat(MAX_CONTENT_CHARS + 10);
        let truncated = truncate_content(&long);
        assert_eq!(truncated.chars().count(), MAX_CONTENT_CHARS);
        assert!(truncated.ends_with("..."));
    }
}
