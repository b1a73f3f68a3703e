//! Transport layer abstraction for sync rounds.

use crate::error::{SyncError, SyncResult};
use deltastore_protocol::{SyncRequest, SyncResponse};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A sync transport carries one request/response exchange to the server.
///
/// This trait abstracts the network layer, allowing different
/// implementations (HTTP, RPC, in-process call, mock for testing). Timeouts
/// are the transport's policy; the sync core treats "no response" and
/// "error response" identically.
pub trait SyncTransport: Send + Sync {
    /// Performs one exchange with the server, blocking until the response
    /// arrives or the transport gives up.
    fn exchange(&self, request: &SyncRequest) -> SyncResult<SyncResponse>;

    /// Checks if the transport is connected.
    fn is_connected(&self) -> bool;

    /// Closes the transport connection.
    fn close(&self) -> SyncResult<()>;
}

#[derive(Debug, Default)]
struct MockInner {
    connected: AtomicBool,
    responses: Mutex<VecDeque<SyncResponse>>,
    fail_next: AtomicBool,
    requests: Mutex<Vec<SyncRequest>>,
}

/// A mock transport for testing.
///
/// Responses are scripted in FIFO order; clones share state so a test can
/// keep scripting after handing the transport to a client.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    inner: Arc<MockInner>,
}

impl MockTransport {
    /// Creates a new connected mock transport.
    pub fn new() -> Self {
        let inner = MockInner {
            connected: AtomicBool::new(true),
            ..Default::default()
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Queues a response for a future exchange.
    pub fn push_response(&self, response: SyncResponse) {
        self.inner.responses.lock().push_back(response);
    }

    /// Makes the next exchange fail with a retryable transport error.
    pub fn fail_next(&self) {
        self.inner.fail_next.store(true, Ordering::SeqCst);
    }

    /// Sets the connected state.
    pub fn set_connected(&self, connected: bool) {
        self.inner.connected.store(connected, Ordering::SeqCst);
    }

    /// Returns every request seen so far.
    pub fn requests(&self) -> Vec<SyncRequest> {
        self.inner.requests.lock().clone()
    }
}

impl SyncTransport for MockTransport {
    fn exchange(&self, request: &SyncRequest) -> SyncResult<SyncResponse> {
        if !self.is_connected() {
            return Err(SyncError::NotConnected);
        }
        if self.inner.fail_next.swap(false, Ordering::SeqCst) {
            return Err(SyncError::transport_retryable("injected failure"));
        }

        self.inner.requests.lock().push(request.clone());

        self.inner
            .responses
            .lock()
            .pop_front()
            .ok_or_else(|| SyncError::transport_fatal("no scripted response"))
    }

    fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    fn close(&self) -> SyncResult<()> {
        self.inner.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_transport_connection() {
        let transport = MockTransport::new();
        assert!(transport.is_connected());

        transport.set_connected(false);
        assert!(!transport.is_connected());

        transport.set_connected(true);
        transport.close().unwrap();
        assert!(!transport.is_connected());
    }

    #[test]
    fn mock_transport_not_connected_error() {
        let transport = MockTransport::new();
        transport.set_connected(false);

        let result = transport.exchange(&SyncRequest::new(0));
        assert!(matches!(result, Err(SyncError::NotConnected)));
    }

    #[test]
    fn mock_transport_scripted_responses() {
        let transport = MockTransport::new();
        transport.push_response(SyncResponse::new(5));
        transport.push_response(SyncResponse::new(10));

        assert_eq!(transport.exchange(&SyncRequest::new(0)).unwrap().timestamp, 5);
        assert_eq!(transport.exchange(&SyncRequest::new(5)).unwrap().timestamp, 10);
        assert!(transport.exchange(&SyncRequest::new(10)).is_err());
    }

    #[test]
    fn mock_transport_failure_injection() {
        let transport = MockTransport::new();
        transport.push_response(SyncResponse::new(5));
        transport.fail_next();

        let err = transport.exchange(&SyncRequest::new(0)).unwrap_err();
        assert!(err.is_retryable());

        // The scripted response survives the injected failure.
        assert_eq!(transport.exchange(&SyncRequest::new(0)).unwrap().timestamp, 5);
    }

    #[test]
    fn mock_transport_records_requests() {
        let transport = MockTransport::new();
        let handle = transport.clone();
        transport.push_response(SyncResponse::new(5));

        transport.exchange(&SyncRequest::new(3)).unwrap();

        let seen = handle.requests();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].timestamp, 3);
    }
}
