use crate::channel::{EventStream, SyncChannel};
use crate::Result;
use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{debug, warn};
use vigil_core::SCHEDULE_CHANNEL;

/// In-process channel for single-instance deployments and tests
pub struct MemoryChannel {
    channel: String,
    tx: broadcast::Sender<String>,
}

impl MemoryChannel {
    /// Default capacity of the broadcast buffer
    pub const DEFAULT_CAPACITY: usize = 1024;

    pub fn new(channel: impl Into<String>, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            channel: channel.into(),
            tx,
        }
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for MemoryChannel {
    fn default() -> Self {
        Self::new(SCHEDULE_CHANNEL, Self::DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl SyncChannel for MemoryChannel {
    fn channel(&self) -> &str {
        &self.channel
    }

    async fn publish(&self, payload: &str) -> Result<()> {
        match self.tx.send(payload.to_string()) {
            Ok(receivers) => debug!(channel = %self.channel, receivers, "Published event"),
            // No subscribers yet; nothing to deliver
            Err(_) => debug!(channel = %self.channel, "Published event with no subscribers"),
        }
        Ok(())
    }

    async fn subscribe(&self) -> Result<EventStream> {
        let channel = self.channel.clone();
        let stream = BroadcastStream::new(self.tx.subscribe()).filter_map(move |item| match item {
            Ok(payload) => Some(payload),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(channel = %channel, skipped, "Subscriber lagged, events were dropped");
                None
            }
        });
        Ok(Box::pin(stream))
    }
}
