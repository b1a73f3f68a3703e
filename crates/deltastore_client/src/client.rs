//! The client replica and its synchronization rounds.

use crate::clock::{Clock, SystemClock};
use crate::config::ClientConfig;
use crate::error::{SyncError, SyncResult};
use crate::state::{SyncState, SyncStats};
use crate::transport::SyncTransport;
use deltastore_protocol::{
    Item, ItemChange, ReplicaStore, StoreEntry, SyncRequest, SyncResponse, Timestamp,
};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Result of one successful synchronization round.
#[derive(Debug, Clone)]
pub struct RoundReport {
    /// Pending changes sent to the server.
    pub pushed: usize,
    /// Changes applied from the server's response.
    pub pulled: usize,
    /// Duration of the round.
    pub duration: Duration,
}

/// Local replica state: the store plus pending-change markers.
///
/// Invariant: every pending id has an entry in the store.
#[derive(Debug, Default)]
struct LocalState {
    store: ReplicaStore,
    pending: HashMap<String, Timestamp>,
}

/// A client replica of the keyed store.
///
/// Buffers local writes via [`update`] and reconciles with the server via
/// [`synchronize`]. Local writes may race with an in-flight round; the
/// snapshot taken at round start makes the race safe without holding the
/// store lock across the network call.
///
/// [`update`]: SyncClient::update
/// [`synchronize`]: SyncClient::synchronize
pub struct SyncClient<T: SyncTransport, C: Clock> {
    config: ClientConfig,
    transport: T,
    clock: C,
    local: Mutex<LocalState>,
    state: Mutex<SyncState>,
    stats: RwLock<SyncStats>,
}

impl<T: SyncTransport> SyncClient<T, SystemClock> {
    /// Creates a client using the system wall clock.
    pub fn with_system_clock(config: ClientConfig, transport: T) -> Self {
        Self::new(config, transport, SystemClock)
    }
}

impl<T: SyncTransport, C: Clock> SyncClient<T, C> {
    /// Creates a new client.
    pub fn new(config: ClientConfig, transport: T, clock: C) -> Self {
        Self {
            config,
            transport,
            clock,
            local: Mutex::new(LocalState::default()),
            state: Mutex::new(SyncState::Idle),
            stats: RwLock::new(SyncStats::default()),
        }
    }

    /// Writes or overwrites the local entry for `id` and marks it pending.
    ///
    /// No network effect; the write is transmitted on the next round.
    pub fn update(&self, id: impl Into<String>, value: impl Into<String>) {
        let id = id.into();
        let now = self.clock.now_millis();

        let mut local = self.local.lock();
        local
            .store
            .upsert(StoreEntry::new(Item::new(id.clone(), value.into()), now));
        local.pending.insert(id, now);
    }

    /// Returns the local value for `id`, if present.
    pub fn get(&self, id: &str) -> Option<String> {
        self.local.lock().store.value(id).map(str::to_string)
    }

    /// Returns the local entry for `id`, if present.
    pub fn entry(&self, id: &str) -> Option<StoreEntry> {
        self.local.lock().store.get(id).cloned()
    }

    /// Returns the client's last known server timestamp.
    pub fn timestamp(&self) -> Timestamp {
        self.local.lock().store.timestamp()
    }

    /// Returns the number of local entries.
    pub fn len(&self) -> usize {
        self.local.lock().store.len()
    }

    /// Returns true if the local store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.local.lock().store.is_empty()
    }

    /// Returns the number of changes not yet acknowledged by the server.
    pub fn pending_count(&self) -> usize {
        self.local.lock().pending.len()
    }

    /// Returns the current round state.
    pub fn state(&self) -> SyncState {
        *self.state.lock()
    }

    /// Returns a snapshot of the sync statistics.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Performs one reconciliation round.
    ///
    /// On failure the round is abandoned: pending changes and the store
    /// timestamp are left exactly as they were, and the error is surfaced
    /// to the caller. Concurrent callers are rejected with
    /// [`SyncError::SyncInProgress`].
    pub fn synchronize(&self) -> SyncResult<RoundReport> {
        let start = Instant::now();
        self.begin_round()?;

        let (request, snapshot) = self.snapshot_changes();
        let pushed = request.changes.len();

        debug!(
            client = %self.config.client_id,
            pending = pushed,
            timestamp = request.timestamp,
            "starting sync round"
        );

        let response = match self.transport.exchange(&request) {
            Ok(response) => response,
            Err(e) => return Err(self.abort_round(e)),
        };

        if let Err(e) = response.validate(request.timestamp) {
            return Err(self.abort_round(SyncError::MalformedResponse(e.to_string())));
        }

        self.set_state(SyncState::Applying);
        let pulled = self.apply_response(&snapshot, &response);
        self.set_state(SyncState::Idle);

        {
            let mut stats = self.stats.write();
            stats.rounds_completed += 1;
            stats.changes_pushed += pushed as u64;
            stats.changes_pulled += pulled as u64;
            stats.last_error = None;
        }

        debug!(
            client = %self.config.client_id,
            pulled,
            timestamp = response.timestamp,
            "sync round applied"
        );

        Ok(RoundReport {
            pushed,
            pulled,
            duration: start.elapsed(),
        })
    }

    /// Performs a round, retrying transient failures per the retry config.
    pub fn synchronize_with_retry(&self) -> SyncResult<RoundReport> {
        let retry = self.config.retry.clone();
        let mut last_error = None;

        for attempt in 0..retry.max_attempts {
            if attempt > 0 {
                std::thread::sleep(retry.delay_for_attempt(attempt));
                self.stats.write().retries += 1;
            }

            match self.synchronize() {
                Ok(report) => return Ok(report),
                Err(e) => {
                    if e.is_retryable() && attempt + 1 < retry.max_attempts {
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| SyncError::transport_fatal("no sync attempts made")))
    }

    /// Marks the round started, rejecting concurrent callers.
    fn begin_round(&self) -> SyncResult<()> {
        let mut state = self.state.lock();
        if !state.can_start_round() {
            return Err(SyncError::SyncInProgress);
        }
        *state = SyncState::AwaitingResponse;
        Ok(())
    }

    fn set_state(&self, next: SyncState) {
        *self.state.lock() = next;
    }

    /// Packages the pending change set and captures the per-id pending
    /// timestamps the apply phase compares against.
    fn snapshot_changes(&self) -> (SyncRequest, HashMap<String, Timestamp>) {
        let local = self.local.lock();

        let mut changes = HashMap::with_capacity(local.pending.len());
        for id in local.pending.keys() {
            if let Some(entry) = local.store.get(id) {
                changes.insert(
                    id.clone(),
                    ItemChange::new(entry.last_modified, entry.value()),
                );
            }
        }

        (
            SyncRequest::with_changes(local.store.timestamp(), changes),
            local.pending.clone(),
        )
    }

    /// Applies a validated response under the store lock.
    fn apply_response(&self, snapshot: &HashMap<String, Timestamp>, response: &SyncResponse) -> usize {
        let mut local = self.local.lock();

        // The server acknowledged the round that included the snapshot. A
        // pending marker is cleared only if no newer local write replaced
        // it while the round was in flight.
        for (id, snapshot_ts) in snapshot {
            if local.pending.get(id) == Some(snapshot_ts) {
                local.pending.remove(id);
            }
        }

        // The server is authoritative for everything it reports, except
        // ids that picked up a newer local write during the round; those
        // keep the local value and stay pending for the next round.
        let mut pulled = 0;
        for (id, value) in &response.changes {
            if local.pending.contains_key(id) {
                continue;
            }
            local.store.upsert(StoreEntry::new(
                Item::new(id.clone(), value.clone()),
                response.timestamp,
            ));
            pulled += 1;
        }

        local.store.advance_timestamp(response.timestamp);
        pulled
    }

    /// Abandons the round, restoring the pre-round state exactly.
    fn abort_round(&self, error: SyncError) -> SyncError {
        self.set_state(SyncState::Aborted);

        {
            let mut stats = self.stats.write();
            stats.rounds_aborted += 1;
            stats.last_error = Some(error.to_string());
        }

        warn!(
            client = %self.config.client_id,
            error = %error,
            "sync round abandoned"
        );

        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::transport::MockTransport;
    use std::sync::mpsc;
    use std::sync::Arc;

    fn make_client(
        transport: MockTransport,
        clock: ManualClock,
    ) -> SyncClient<MockTransport, ManualClock> {
        SyncClient::new(ClientConfig::new("test"), transport, clock)
    }

    #[test]
    fn update_buffers_locally() {
        let transport = MockTransport::new();
        let clock = ManualClock::new(100);
        let client = make_client(transport.clone(), clock);

        client.update("x", "1");

        assert_eq!(client.get("x"), Some("1".to_string()));
        assert_eq!(client.entry("x").map(|e| e.last_modified), Some(100));
        assert_eq!(client.pending_count(), 1);
        assert_eq!(client.timestamp(), 0);
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn update_overwrites_previous_write() {
        let transport = MockTransport::new();
        let clock = ManualClock::new(100);
        let client = make_client(transport, clock.clone());

        client.update("x", "1");
        clock.advance(10);
        client.update("x", "2");

        assert_eq!(client.get("x"), Some("2".to_string()));
        assert_eq!(client.entry("x").map(|e| e.last_modified), Some(110));
        assert_eq!(client.pending_count(), 1);
    }

    #[test]
    fn synchronize_sends_pending_and_clears() {
        let transport = MockTransport::new();
        let clock = ManualClock::new(500);
        let client = make_client(transport.clone(), clock);

        client.update("x", "1");
        transport.push_response(SyncResponse::new(600));

        let report = client.synchronize().unwrap();

        assert_eq!(report.pushed, 1);
        assert_eq!(report.pulled, 0);
        assert_eq!(client.pending_count(), 0);
        assert_eq!(client.timestamp(), 600);
        assert_eq!(client.state(), SyncState::Idle);

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        let change = &requests[0].changes["x"];
        assert_eq!(change.last_modified, 500);
        assert_eq!(change.value, "1");
    }

    #[test]
    fn synchronize_applies_server_changes() {
        let transport = MockTransport::new();
        let client = make_client(transport.clone(), ManualClock::new(0));

        let mut changes = HashMap::new();
        changes.insert("y".to_string(), "remote".to_string());
        transport.push_response(SyncResponse::with_changes(700, changes));

        let report = client.synchronize().unwrap();

        assert_eq!(report.pulled, 1);
        assert_eq!(client.get("y"), Some("remote".to_string()));
        assert_eq!(client.entry("y").map(|e| e.last_modified), Some(700));
        assert_eq!(client.timestamp(), 700);
    }

    #[test]
    fn failed_round_is_a_no_op() {
        let transport = MockTransport::new();
        let clock = ManualClock::new(500);
        let client = make_client(transport.clone(), clock);

        client.update("x", "1");
        transport.fail_next();

        let err = client.synchronize().unwrap_err();
        assert!(err.is_retryable());

        assert_eq!(client.pending_count(), 1);
        assert_eq!(client.timestamp(), 0);
        assert_eq!(client.get("x"), Some("1".to_string()));
        assert_eq!(client.state(), SyncState::Aborted);
        assert_eq!(client.stats().rounds_aborted, 1);

        // The next round is allowed to start.
        transport.push_response(SyncResponse::new(600));
        client.synchronize().unwrap();
        assert_eq!(client.pending_count(), 0);
    }

    #[test]
    fn regressing_response_is_malformed() {
        let transport = MockTransport::new();
        let client = make_client(transport.clone(), ManualClock::new(0));

        transport.push_response(SyncResponse::new(100));
        client.synchronize().unwrap();
        assert_eq!(client.timestamp(), 100);

        // The server can never report a timestamp behind the request.
        transport.push_response(SyncResponse::new(50));
        let err = client.synchronize().unwrap_err();

        assert!(matches!(err, SyncError::MalformedResponse(_)));
        assert_eq!(client.timestamp(), 100);
        assert_eq!(client.state(), SyncState::Aborted);
    }

    #[test]
    fn retry_recovers_from_transient_failure() {
        let transport = MockTransport::new();
        let clock = ManualClock::new(500);
        let config = ClientConfig::new("test").with_retry(
            crate::RetryConfig::new(3).with_initial_delay(Duration::from_millis(1)),
        );
        let client = SyncClient::new(config, transport.clone(), clock);

        client.update("x", "1");
        transport.fail_next();
        transport.push_response(SyncResponse::new(600));

        let report = client.synchronize_with_retry().unwrap();

        assert_eq!(report.pushed, 1);
        assert_eq!(client.stats().retries, 1);
        assert_eq!(client.stats().rounds_aborted, 1);
        assert_eq!(client.stats().rounds_completed, 1);
    }

    /// Transport that parks inside `exchange` until released, so tests can
    /// observe the `AwaitingResponse` state from another thread.
    struct GateTransport {
        entered: mpsc::Sender<()>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl SyncTransport for GateTransport {
        fn exchange(&self, _request: &SyncRequest) -> SyncResult<SyncResponse> {
            self.entered.send(()).ok();
            self.release
                .lock()
                .recv()
                .map_err(|_| SyncError::transport_retryable("gate closed"))?;
            Ok(SyncResponse::new(0))
        }

        fn is_connected(&self) -> bool {
            true
        }

        fn close(&self) -> SyncResult<()> {
            Ok(())
        }
    }

    #[test]
    fn concurrent_rounds_are_rejected() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let transport = GateTransport {
            entered: entered_tx,
            release: Mutex::new(release_rx),
        };
        let client = Arc::new(SyncClient::new(
            ClientConfig::new("test"),
            transport,
            ManualClock::new(0),
        ));

        let worker = {
            let client = Arc::clone(&client);
            std::thread::spawn(move || client.synchronize())
        };

        entered_rx.recv().unwrap();
        assert_eq!(client.state(), SyncState::AwaitingResponse);

        let err = client.synchronize().unwrap_err();
        assert!(matches!(err, SyncError::SyncInProgress));

        // Local writes are still allowed while the round is in flight.
        client.update("x", "1");
        assert_eq!(client.pending_count(), 1);

        release_tx.send(()).unwrap();
        worker.join().unwrap().unwrap();
        assert_eq!(client.state(), SyncState::Idle);
    }
}
