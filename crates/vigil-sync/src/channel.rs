use crate::Result;
use async_trait::async_trait;
use futures_util::Stream;
use std::pin::Pin;

/// Stream of raw payloads received on a channel
pub type EventStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Publish/subscribe transport shared by the fleet
#[async_trait]
pub trait SyncChannel: Send + Sync {
    /// Logical channel name
    fn channel(&self) -> &str;

    /// Broadcast `payload` to every current subscriber
    async fn publish(&self, payload: &str) -> Result<()>;

    /// Open a new subscription. Payloads published before this call are not
    /// replayed.
    async fn subscribe(&self) -> Result<EventStream>;
}
