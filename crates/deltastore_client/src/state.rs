//! Sync round state machine and statistics.

/// The state of the client's sync round.
///
/// A round moves `Idle → AwaitingResponse → (Applying | Aborted) → Idle`.
/// `AwaitingResponse` is the only suspension point; `Aborted` is observable
/// after a failed round and permits starting the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No round in flight.
    Idle,
    /// Waiting for the server's response.
    AwaitingResponse,
    /// Applying the server's response to the local store.
    Applying,
    /// The last round was abandoned without mutating persistent state.
    Aborted,
}

impl SyncState {
    /// Returns true if a round is in flight.
    pub fn is_active(&self) -> bool {
        matches!(self, SyncState::AwaitingResponse | SyncState::Applying)
    }

    /// Returns true if a new round can start.
    pub fn can_start_round(&self) -> bool {
        matches!(self, SyncState::Idle | SyncState::Aborted)
    }
}

/// Statistics about sync rounds.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Rounds that completed successfully.
    pub rounds_completed: u64,
    /// Rounds abandoned on transport failure or malformed response.
    pub rounds_aborted: u64,
    /// Changes sent to the server.
    pub changes_pushed: u64,
    /// Changes applied from server responses.
    pub changes_pulled: u64,
    /// Retries performed by `synchronize_with_retry`.
    pub retries: u64,
    /// Last error message, cleared on the next successful round.
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_predicates() {
        assert!(SyncState::Idle.can_start_round());
        assert!(SyncState::Aborted.can_start_round());
        assert!(!SyncState::AwaitingResponse.can_start_round());
        assert!(!SyncState::Applying.can_start_round());

        assert!(SyncState::AwaitingResponse.is_active());
        assert!(SyncState::Applying.is_active());
        assert!(!SyncState::Idle.is_active());
        assert!(!SyncState::Aborted.is_active());
    }
}
