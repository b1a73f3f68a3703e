//! Authoritative store with atomic merge-and-diff.

use deltastore_protocol::{
    Item, ReplicaStore, StoreEntry, SyncRequest, SyncResponse, Timestamp,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

/// Counts describing how a request was merged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Incoming changes that won the merge.
    pub accepted: usize,
    /// Incoming changes that lost to a newer server entry.
    pub rejected: usize,
    /// Entries returned to the client in the diff.
    pub diffed: usize,
}

/// Server state guarded by one mutex.
///
/// `merged_at` records the global timestamp at which each entry was last
/// accepted. Conflict resolution compares the writers' wall-clock times,
/// but the delta a client is missing must be bounded by merge order: a
/// write with an old wall clock accepted late would otherwise fall behind
/// cursors that were issued before it arrived, and no client past that
/// cursor would ever see it.
struct ServerState {
    store: ReplicaStore,
    merged_at: HashMap<String, Timestamp>,
}

/// The server's single mutable ground truth.
///
/// The entries map and the global timestamp live behind one mutex. Merge and
/// diff for a request execute inside a single critical section; requests from
/// different clients serialize through it and never hold the lock across I/O.
pub struct AuthoritativeStore {
    state: Mutex<ServerState>,
}

impl AuthoritativeStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ServerState {
                store: ReplicaStore::new(),
                merged_at: HashMap::new(),
            }),
        }
    }

    /// Creates a store seeded with existing state.
    ///
    /// Seeded entries are treated as merged at their own write times.
    pub fn with_store(store: ReplicaStore) -> Self {
        let merged_at = store
            .iter()
            .map(|(id, entry)| (id.clone(), entry.last_modified))
            .collect();
        Self {
            state: Mutex::new(ServerState { store, merged_at }),
        }
    }

    /// Returns the server's global timestamp.
    pub fn timestamp(&self) -> Timestamp {
        self.state.lock().store.timestamp()
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.state.lock().store.len()
    }

    /// Returns true if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.state.lock().store.is_empty()
    }

    /// Returns the value for `id`, if present.
    pub fn value(&self, id: &str) -> Option<String> {
        self.state.lock().store.value(id).map(str::to_string)
    }

    /// Merges a request and computes the client's missing delta.
    ///
    /// Merge rule: an incoming change wins if its write time is greater than
    /// or equal to the stored entry's (a missing entry always loses to the
    /// incoming write). The tie resolves in favor of the incoming client
    /// write so the merge stays deterministic. Every accepted change
    /// advances the global timestamp past its previous value, and the entry
    /// is recorded as merged at that position.
    ///
    /// The diff contains every entry merged after `request.timestamp`,
    /// except the ones just accepted from this request: the requesting
    /// client already holds those values. Changes merged from other clients
    /// between rounds are included.
    pub fn synchronize(&self, request: &SyncRequest) -> (SyncResponse, MergeOutcome) {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let mut accepted: HashSet<&str> = HashSet::new();
        let mut rejected = 0usize;

        for (id, change) in &request.changes {
            let wins = state
                .store
                .get(id)
                .map_or(true, |entry| change.last_modified >= entry.last_modified);

            if wins {
                let stamp = (state.store.timestamp() + 1).max(change.last_modified);
                state.store.upsert(StoreEntry::new(
                    Item::new(id.clone(), change.value.clone()),
                    change.last_modified,
                ));
                state.store.advance_timestamp(stamp);
                state.merged_at.insert(id.clone(), stamp);
                accepted.insert(id.as_str());
            } else {
                rejected += 1;
            }
        }

        let changes: HashMap<String, String> = state
            .store
            .iter()
            .filter(|(id, _)| !accepted.contains(id.as_str()))
            .filter(|(id, _)| {
                state.merged_at.get(id.as_str()).copied().unwrap_or(0) > request.timestamp
            })
            .map(|(id, entry)| (id.clone(), entry.value().to_string()))
            .collect();

        let outcome = MergeOutcome {
            accepted: accepted.len(),
            rejected,
            diffed: changes.len(),
        };

        (
            SyncResponse::with_changes(state.store.timestamp(), changes),
            outcome,
        )
    }
}

impl Default for AuthoritativeStore {
    fn default() -> Self {
        Self::new()
    }
}
