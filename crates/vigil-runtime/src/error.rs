use miette::Diagnostic;
use thiserror::Error;

/// Runtime error type for the probe pipeline
#[derive(Error, Debug, Diagnostic)]
pub enum RuntimeError {
    /// The subsystem could not come up
    #[error("Startup failed: {message}")]
    #[diagnostic(
        code(vigil::runtime::startup_failed),
        help("The initial set of active probes must load before any schedule runs. Check the storage backend and the pub/sub connection")
    )]
    StartupFailed {
        #[allow(unused)]
        message: String,
        #[source]
        #[allow(unused)]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Start called on a job that is already running
    #[error("Probe job is already running")]
    #[diagnostic(
        code(vigil::runtime::already_running),
        help("Call stop() before starting the job again")
    )]
    AlreadyRunning,

    /// Probe definition not found
    #[error("Probe definition not found: {id}")]
    #[diagnostic(
        code(vigil::runtime::definition_not_found),
        help("List existing probes with `vigil probe list`")
    )]
    DefinitionNotFound {
        #[allow(unused)]
        id: u64,
    },

    /// Request rejected before touching storage
    #[error("Invalid request: {message}")]
    #[diagnostic(code(vigil::runtime::invalid_request), help("{suggestion}"))]
    InvalidRequest {
        #[allow(unused)]
        message: String,
        #[allow(unused)]
        suggestion: String,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    #[diagnostic(code(vigil::runtime::invalid_config), help("{suggestion}"))]
    InvalidConfig {
        #[allow(unused)]
        message: String,
        #[allow(unused)]
        suggestion: String,
    },

    /// A notification channel rejected a message
    #[error("Notification via {channel} failed: {message}")]
    #[diagnostic(
        code(vigil::runtime::notification_failed),
        help("Check the bot/API token and that the bot is a member of the target channel")
    )]
    NotificationFailed {
        #[allow(unused)]
        channel: String,
        #[allow(unused)]
        message: String,
    },

    /// Core library error
    #[error(transparent)]
    #[diagnostic(transparent)]
    CoreError(#[from] vigil_core::VigilError),

    /// Storage error
    #[error(transparent)]
    #[diagnostic(transparent)]
    StorageError(#[from] vigil_storage::StorageError),

    /// Scheduler error
    #[error(transparent)]
    #[diagnostic(transparent)]
    SchedulerError(#[from] vigil_scheduler::SchedulerError),

    /// Synchronization channel error
    #[error(transparent)]
    #[diagnostic(transparent)]
    SyncError(#[from] vigil_sync::SyncError),

    /// Internal error
    #[error("Internal error: {message}")]
    #[diagnostic(
        code(vigil::runtime::internal_error),
        help("This is likely a bug. Please report it with the full error details")
    )]
    InternalError {
        #[allow(unused)]
        message: String,
    },
}

/// Result type alias for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;

impl RuntimeError {
    pub fn startup_failed(message: impl Into<String>, source: RuntimeError) -> Self {
        Self::StartupFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn definition_not_found(id: u64) -> Self {
        Self::DefinitionNotFound { id }
    }

    pub fn invalid_request(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    pub fn invalid_config(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    pub fn notification_failed(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NotificationFailed {
            channel: channel.into(),
            message: message.into(),
        }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }
}
