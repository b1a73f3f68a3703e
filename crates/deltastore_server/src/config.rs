//! Server configuration.

/// Configuration for the sync server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Maximum number of changes accepted in one request.
    pub max_request_changes: usize,
}

impl ServerConfig {
    /// Creates a configuration with the given request change limit.
    pub fn new(max_request_changes: usize) -> Self {
        Self {
            max_request_changes,
        }
    }

    /// Sets the maximum number of changes per request.
    pub fn with_max_request_changes(mut self, max: usize) -> Self {
        self.max_request_changes = max;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(1000)
    }
}
