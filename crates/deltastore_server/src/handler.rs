//! Request handling for the sync endpoint.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::store::AuthoritativeStore;
use deltastore_protocol::{SyncRequest, SyncResponse};
use std::sync::Arc;
use tracing::debug;

/// Validates and executes sync requests against the authoritative store.
pub struct RequestHandler {
    config: ServerConfig,
    store: Arc<AuthoritativeStore>,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(config: ServerConfig, store: Arc<AuthoritativeStore>) -> Self {
        Self { config, store }
    }

    /// Handles one sync request.
    ///
    /// Validation happens before the store is touched; a rejected request
    /// mutates no state.
    pub fn handle_sync(&self, request: &SyncRequest) -> ServerResult<SyncResponse> {
        if request.changes.len() > self.config.max_request_changes {
            return Err(ServerError::InvalidRequest(format!(
                "too many changes: {} > {}",
                request.changes.len(),
                self.config.max_request_changes
            )));
        }

        request
            .validate()
            .map_err(|e| ServerError::InvalidRequest(e.to_string()))?;

        let (response, outcome) = self.store.synchronize(request);

        debug!(
            accepted = outcome.accepted,
            rejected = outcome.rejected,
            diffed = outcome.diffed,
            timestamp = response.timestamp,
            "merged sync request"
        );

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deltastore_protocol::ItemChange;
    use std::collections::HashMap;

    fn create_handler(config: ServerConfig) -> RequestHandler {
        RequestHandler::new(config, Arc::new(AuthoritativeStore::new()))
    }

    #[test]
    fn rejects_oversized_request() {
        let handler = create_handler(ServerConfig::default().with_max_request_changes(1));

        let mut changes = HashMap::new();
        changes.insert("a".to_string(), ItemChange::new(1, "1"));
        changes.insert("b".to_string(), ItemChange::new(2, "2"));
        let request = SyncRequest::with_changes(0, changes);

        let err = handler.handle_sync(&request).unwrap_err();
        assert!(matches!(err, ServerError::InvalidRequest(_)));
    }

    #[test]
    fn rejects_empty_item_id() {
        let handler = create_handler(ServerConfig::default());

        let mut changes = HashMap::new();
        changes.insert(String::new(), ItemChange::new(1, "1"));
        let request = SyncRequest::with_changes(0, changes);

        let err = handler.handle_sync(&request).unwrap_err();
        assert!(matches!(err, ServerError::InvalidRequest(_)));
    }

    #[test]
    fn rejected_request_mutates_nothing() {
        let store = Arc::new(AuthoritativeStore::new());
        let handler = RequestHandler::new(
            ServerConfig::default().with_max_request_changes(0),
            Arc::clone(&store),
        );

        let mut changes = HashMap::new();
        changes.insert("x".to_string(), ItemChange::new(1, "1"));
        let request = SyncRequest::with_changes(0, changes);

        assert!(handler.handle_sync(&request).is_err());
        assert!(store.is_empty());
        assert_eq!(store.timestamp(), 0);
    }

    #[test]
    fn accepts_valid_request() {
        let handler = create_handler(ServerConfig::default());

        let mut changes = HashMap::new();
        changes.insert("x".to_string(), ItemChange::new(100, "1"));
        let request = SyncRequest::with_changes(0, changes);

        let response = handler.handle_sync(&request).unwrap();
        assert_eq!(response.timestamp, 100);
    }
}
