//! Failure alert fan-out to chat integrations.

pub mod discord;
pub mod slack;

use crate::error::{Result, RuntimeError};
use crate::traits::Notifier;
use async_trait::async_trait;
use futures_util::future::join_all;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

pub use discord::DiscordChannel;
pub use slack::SlackChannel;

/// One delivery target, e.g. a single Slack channel
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Label used in logs, e.g. `slack:C0123`
    fn name(&self) -> &str;

    async fn send(&self, subject: &str, message: &str) -> Result<()>;
}

/// Per-dispatch delivery counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

impl DispatchReport {
    pub fn attempted(&self) -> usize {
        self.delivered + self.failed
    }
}

/// Sends each alert to every configured channel independently.
///
/// A failing channel is logged and does not affect the others. Nothing is
/// retried.
#[derive(Default)]
pub struct NotificationEscalator {
    channels: Vec<Arc<dyn NotificationChannel>>,
}

impl NotificationEscalator {
    pub fn new(channels: Vec<Arc<dyn NotificationChannel>>) -> Self {
        Self { channels }
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

#[async_trait]
impl Notifier for NotificationEscalator {
    async fn send(&self, subject: &str, message: &str) -> DispatchReport {
        if self.channels.is_empty() {
            debug!(subject, "No notification channels configured, dropping alert");
            return DispatchReport::default();
        }

        let results = join_all(
            self.channels
                .iter()
                .map(|channel| async move { (channel.name(), channel.send(subject, message).await) }),
        )
        .await;

        let mut report = DispatchReport::default();
        for (name, result) in results {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    error!(
                        channel = name,
                        subject,
                        alert = message,
                        error = %e,
                        "Failed to send notification"
                    );
                }
            }
        }

        debug!(
            subject,
            delivered = report.delivered,
            failed = report.failed,
            "Notification dispatched"
        );
        report
    }
}

/// Slack Web API credentials and target channels
#[derive(Debug, Clone)]
pub struct SlackConfig {
    pub api_token: String,
    pub channel_ids: Vec<String>,
}

/// Discord bot credentials and target channels
#[derive(Debug, Clone)]
pub struct DiscordConfig {
    pub bot_token: String,
    pub channel_ids: Vec<String>,
}

/// Which integrations to alert through; either may be absent
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub slack: Option<SlackConfig>,
    pub discord: Option<DiscordConfig>,
    /// Timeout for each outbound API call
    pub request_timeout: Duration,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            slack: None,
            discord: None,
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl NotificationConfig {
    /// Build an escalator with one channel per configured channel id
    pub fn build(&self) -> Result<NotificationEscalator> {
        let client = Client::builder()
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| {
                RuntimeError::invalid_config(
                    format!("failed to build notification HTTP client: {}", e),
                    "Check the TLS configuration of the host",
                )
            })?;

        let mut channels: Vec<Arc<dyn NotificationChannel>> = Vec::new();

        if let Some(slack) = &self.slack {
            validate_section("Slack", &slack.api_token, &slack.channel_ids)?;
            for id in &slack.channel_ids {
                channels.push(Arc::new(SlackChannel::new(
                    client.clone(),
                    &slack.api_token,
                    id,
                )));
            }
        }

        if let Some(discord) = &self.discord {
            validate_section("Discord", &discord.bot_token, &discord.channel_ids)?;
            for id in &discord.channel_ids {
                channels.push(Arc::new(DiscordChannel::new(
                    client.clone(),
                    &discord.bot_token,
                    id,
                )));
            }
        }

        Ok(NotificationEscalator::new(channels))
    }
}

fn validate_section(service: &str, token: &str, channel_ids: &[String]) -> Result<()> {
    if token.trim().is_empty() {
        return Err(RuntimeError::invalid_config(
            format!("{} token is empty", service),
            format!("Provide a {} token or leave the {} section out", service, service),
        ));
    }
    if channel_ids.is_empty() || channel_ids.iter().any(|id| id.trim().is_empty()) {
        return Err(RuntimeError::invalid_config(
            format!("{} needs at least one non-empty channel id", service),
            "Pass channel ids as a comma-separated list",
        ));
    }
    Ok(())
}

/// Single text body used by every integration
pub(crate) fn render_text(subject: &str, message: &str) -> String {
    format!("{}\n{}", subject, message)
}
