// Allow unused assignments for diagnostic fields - they're used by the macros
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Synchronization channel error type
#[derive(Error, Debug, Diagnostic)]
pub enum SyncError {
    /// Could not reach the pub/sub backend
    #[error("Failed to connect to {target}: {message}")]
    #[diagnostic(
        code(sync::connection_failed),
        help("Check the Redis URL and that the server is reachable")
    )]
    ConnectionFailed {
        #[allow(unused)]
        target: String,
        #[allow(unused)]
        message: String,
        #[source]
        #[allow(unused)]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Publish was rejected or the connection dropped
    #[error("Failed to publish on channel {channel}: {message}")]
    #[diagnostic(
        code(sync::publish_failed),
        help("The definition change is saved; peers converge on the next change or restart")
    )]
    PublishFailed {
        #[allow(unused)]
        channel: String,
        #[allow(unused)]
        message: String,
        #[source]
        #[allow(unused)]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Subscription could not be established
    #[error("Failed to subscribe to channel {channel}: {message}")]
    #[diagnostic(
        code(sync::subscribe_failed),
        help("Check that the pub/sub backend accepts SUBSCRIBE for this channel")
    )]
    SubscribeFailed {
        #[allow(unused)]
        channel: String,
        #[allow(unused)]
        message: String,
        #[source]
        #[allow(unused)]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Result type for channel operations
pub type Result<T> = std::result::Result<T, SyncError>;

impl SyncError {
    /// Create a ConnectionFailed error
    pub fn connection_failed(
        target: impl Into<String>,
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::ConnectionFailed {
            target: target.into(),
            message: message.into(),
            source,
        }
    }

    /// Create a PublishFailed error
    pub fn publish_failed(
        channel: impl Into<String>,
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::PublishFailed {
            channel: channel.into(),
            message: message.into(),
            source,
        }
    }

    /// Create a SubscribeFailed error
    pub fn subscribe_failed(
        channel: impl Into<String>,
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::SubscribeFailed {
            channel: channel.into(),
            message: message.into(),
            source,
        }
    }
}
