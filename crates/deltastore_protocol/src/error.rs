//! Protocol validation errors.

use crate::Timestamp;
use thiserror::Error;

/// Errors arising from structurally invalid protocol data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// An item id in a change map was empty.
    #[error("item id must not be empty")]
    EmptyItemId,

    /// A response carried a timestamp behind the request it answers.
    #[error("response timestamp {response} is behind request timestamp {request}")]
    TimestampRegression {
        /// Timestamp the client sent.
        request: Timestamp,
        /// Timestamp the server returned.
        response: Timestamp,
    },
}
