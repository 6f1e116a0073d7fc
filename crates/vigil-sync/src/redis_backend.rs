use crate::channel::{EventStream, SyncChannel};
use crate::{Result, SyncError};
use async_trait::async_trait;
use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use redis::aio::MultiplexedConnection;
use redis::{Client, Msg};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Pause between attempts to re-establish a dropped subscription
const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(1);

/// Redis pub/sub transport.
///
/// Publishing goes over one multiplexed connection; each subscription gets
/// its own dedicated pub/sub connection and is re-established if the
/// server drops it. Payloads published while a subscription is down are
/// not recovered.
pub struct RedisChannel {
    client: Client,
    channel: String,
    publisher: MultiplexedConnection,
}

impl RedisChannel {
    /// Connect to `url` and bind to `channel`
    pub async fn connect(url: &str, channel: impl Into<String>) -> Result<Self> {
        let client = Client::open(url).map_err(|e| {
            SyncError::connection_failed(url, format!("invalid Redis URL: {}", e), Some(Box::new(e)))
        })?;

        let publisher = client.get_multiplexed_async_connection().await.map_err(|e| {
            SyncError::connection_failed(url, e.to_string(), Some(Box::new(e)))
        })?;

        let channel = channel.into();
        info!(channel = %channel, "Connected to Redis pub/sub");

        Ok(Self {
            client,
            channel,
            publisher,
        })
    }
}

/// Open a dedicated pub/sub connection subscribed to `channel`
async fn open_subscription(client: &Client, channel: &str) -> Result<BoxStream<'static, Msg>> {
    let mut pubsub = client
        .get_async_pubsub()
        .await
        .map_err(|e| SyncError::subscribe_failed(channel, e.to_string(), Some(Box::new(e))))?;

    pubsub
        .subscribe(channel)
        .await
        .map_err(|e| SyncError::subscribe_failed(channel, e.to_string(), Some(Box::new(e))))?;

    debug!(channel, "Subscribed to Redis channel");
    Ok(pubsub.into_on_message().boxed())
}

struct SubscriptionState {
    client: Client,
    channel: String,
    messages: Option<BoxStream<'static, Msg>>,
}

#[async_trait]
impl SyncChannel for RedisChannel {
    fn channel(&self) -> &str {
        &self.channel
    }

    async fn publish(&self, payload: &str) -> Result<()> {
        let mut conn = self.publisher.clone();
        let receivers: i64 = redis::cmd("PUBLISH")
            .arg(&self.channel)
            .arg(payload)
            .query_async(&mut conn)
            .await
            .map_err(|e| SyncError::publish_failed(&self.channel, e.to_string(), Some(Box::new(e))))?;

        debug!(channel = %self.channel, receivers, "Published event");
        Ok(())
    }

    async fn subscribe(&self) -> Result<EventStream> {
        // The first subscription must succeed; later drops are retried
        let messages = open_subscription(&self.client, &self.channel).await?;

        let state = SubscriptionState {
            client: self.client.clone(),
            channel: self.channel.clone(),
            messages: Some(messages),
        };

        let stream = stream::unfold(state, |mut state| async move {
            loop {
                match state.messages.as_mut() {
                    Some(messages) => match messages.next().await {
                        Some(msg) => match msg.get_payload::<String>() {
                            Ok(payload) => return Some((payload, state)),
                            Err(e) => {
                                warn!(channel = %state.channel, error = %e, "Dropping non-text payload");
                            }
                        },
                        None => {
                            warn!(channel = %state.channel, "Redis subscription closed, resubscribing");
                            state.messages = None;
                        }
                    },
                    None => {
                        tokio::time::sleep(RESUBSCRIBE_DELAY).await;
                        match open_subscription(&state.client, &state.channel).await {
                            Ok(messages) => {
                                info!(channel = %state.channel, "Redis subscription re-established");
                                state.messages = Some(messages);
                            }
                            Err(e) => warn!(error = %e, "Resubscribe attempt failed"),
                        }
                    }
                }
            }
        });

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_rejects_invalid_url() {
        let result = RedisChannel::connect("not a redis url", "vigil:test").await;
        assert!(matches!(result, Err(SyncError::ConnectionFailed { .. })));
    }
}
