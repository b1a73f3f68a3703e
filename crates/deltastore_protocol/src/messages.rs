//! Protocol messages for sync.

use crate::error::ProtocolError;
use crate::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single locally modified item as packaged into a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemChange {
    /// Time of the local write that produced this change.
    pub last_modified: Timestamp,
    /// The value written.
    pub value: String,
}

impl ItemChange {
    /// Creates a new change.
    pub fn new(last_modified: Timestamp, value: impl Into<String>) -> Self {
        Self {
            last_modified,
            value: value.into(),
        }
    }
}

/// One reconciliation request from a client.
///
/// Carries the client's last known server timestamp and every pending
/// local change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRequest {
    /// The client's last known server timestamp.
    pub timestamp: Timestamp,
    /// Pending local changes, keyed by item id.
    pub changes: HashMap<String, ItemChange>,
}

impl SyncRequest {
    /// Creates a request with no changes.
    pub fn new(timestamp: Timestamp) -> Self {
        Self {
            timestamp,
            changes: HashMap::new(),
        }
    }

    /// Creates a request carrying the given change set.
    pub fn with_changes(timestamp: Timestamp, changes: HashMap<String, ItemChange>) -> Self {
        Self { timestamp, changes }
    }

    /// Checks the request for structural validity.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.changes.keys().any(|id| id.is_empty()) {
            return Err(ProtocolError::EmptyItemId);
        }
        Ok(())
    }
}

/// The server's reply to a [`SyncRequest`].
///
/// Carries the server's global timestamp and the values of every entry the
/// client has not yet seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResponse {
    /// The server's global timestamp after the merge.
    pub timestamp: Timestamp,
    /// Entries changed since the requested timestamp, keyed by item id.
    pub changes: HashMap<String, String>,
}

impl SyncResponse {
    /// Creates a response with no changes.
    pub fn new(timestamp: Timestamp) -> Self {
        Self {
            timestamp,
            changes: HashMap::new(),
        }
    }

    /// Creates a response carrying the given changes.
    pub fn with_changes(timestamp: Timestamp, changes: HashMap<String, String>) -> Self {
        Self { timestamp, changes }
    }

    /// Checks the response for structural validity against the request it
    /// answers.
    ///
    /// The server's timestamp never moves backwards, so a response timestamp
    /// below the request timestamp means the reply is unusable.
    pub fn validate(&self, request_timestamp: Timestamp) -> Result<(), ProtocolError> {
        if self.timestamp < request_timestamp {
            return Err(ProtocolError::TimestampRegression {
                request: request_timestamp,
                response: self.timestamp,
            });
        }
        if self.changes.keys().any(|id| id.is_empty()) {
            return Err(ProtocolError::EmptyItemId);
        }
        Ok(())
    }
}
