use super::{render_text, NotificationChannel};
use crate::error::{Result, RuntimeError};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Posts alerts to one Slack channel through the Web API
pub struct SlackChannel {
    client: Client,
    api_base: String,
    token: String,
    channel_id: String,
    name: String,
}

impl SlackChannel {
    pub const DEFAULT_API_BASE: &'static str = "https://slack.com/api";

    pub fn new(client: Client, token: &str, channel_id: &str) -> Self {
        Self {
            client,
            api_base: Self::DEFAULT_API_BASE.to_string(),
            token: token.to_string(),
            channel_id: channel_id.to_string(),
            name: format!("slack:{}", channel_id),
        }
    }

    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl NotificationChannel for SlackChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, subject: &str, message: &str) -> Result<()> {
        let url = format!("{}/chat.postMessage", self.api_base);
        debug!("POST {}", url);

        let payload = serde_json::json!({
            "channel": self.channel_id,
            "text": render_text(subject, message),
        });

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
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
                format!("chat.postMessage returned status {}: {}", status, body),
            ));
        }

        // Slack reports most failures with HTTP 200 and ok=false
        let parsed: PostMessageResponse = resp.json().await.map_err(|e| {
            RuntimeError::notification_failed(&self.name, format!("unreadable response: {}", e))
        })?;
        if !parsed.ok {
            return Err(RuntimeError::notification_failed(
                &self.name,
                parsed.error.unwrap_or_else(|| "unknown_error".to_string()),
            ));
        }

        Ok(())
    }
}
