//! Error types for the sync client.

use thiserror::Error;

/// Result type for client sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during a synchronization round.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the round can be retried.
        retryable: bool,
    },

    /// The server response was structurally invalid.
    ///
    /// Fatal to the round it answers; client state is rolled back exactly as
    /// for a transport failure.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// A round is already in flight. No state was mutated.
    #[error("synchronization already in progress")]
    SyncInProgress,

    /// Not connected to the server.
    #[error("not connected to server")]
    NotConnected,
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if the round can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::MalformedResponse(_) => true,
            SyncError::SyncInProgress => false,
            SyncError::NotConnected => false,
        }
    }
}
