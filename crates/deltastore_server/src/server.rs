//! Main sync server.

use crate::config::ServerConfig;
use crate::handler::RequestHandler;
use crate::store::AuthoritativeStore;
use deltastore_protocol::{SyncRequest, SyncResponse, Timestamp};
use std::sync::Arc;

/// The sync server.
///
/// Owns the authoritative store and serves reconciliation requests from any
/// number of concurrent clients. Integrators expose [`SyncServer::handle_sync`]
/// over whatever transport they choose.
///
/// # Example
///
/// ```
/// use deltastore_server::{ServerConfig, SyncServer};
/// use deltastore_protocol::SyncRequest;
///
/// let server = SyncServer::new(ServerConfig::default());
/// let response = server.handle_sync(&SyncRequest::new(0)).unwrap();
/// assert!(response.changes.is_empty());
/// ```
pub struct SyncServer {
    handler: RequestHandler,
    store: Arc<AuthoritativeStore>,
}

impl SyncServer {
    /// Creates a new sync server with an empty store.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_store(config, Arc::new(AuthoritativeStore::new()))
    }

    /// Creates a sync server sharing an existing store.
    pub fn with_store(config: ServerConfig, store: Arc<AuthoritativeStore>) -> Self {
        let handler = RequestHandler::new(config, Arc::clone(&store));
        Self { handler, store }
    }

    /// Handles one sync request.
    pub fn handle_sync(&self, request: &SyncRequest) -> Result<SyncResponse, String> {
        self.handler.handle_sync(request).map_err(|e| e.to_string())
    }

    /// Returns the server's global timestamp.
    pub fn timestamp(&self) -> Timestamp {
        self.store.timestamp()
    }

    /// Returns the number of entries in the authoritative store.
    pub fn entry_count(&self) -> usize {
        self.store.len()
    }
}
