//! Mock transport for testing.
//!
//! [`MockTransport`] answers requests from a responder closure, optionally
//! after a delay, and records every request it sees along with how many
//! attempts were aborted before they finished. Clones share the same
//! recording, so a test can keep one handle while the coordinator owns another.
//!
//! # Example
//!
//! ```rust
//! use inflight::transport::TransportResponse;
//! use inflight::transport::mock::MockTransport;
//! use serde_json::json;
//!
//! let mock = MockTransport::new(|request| {
//!     Ok(TransportResponse::json(200, json!({ "message": request.payload })))
//! });
//! assert_eq!(mock.call_count(), 0);
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;

use super::{Transport, TransportError, TransportRequest, TransportResponse};

type Responder =
    dyn Fn(&TransportRequest) -> Result<TransportResponse, TransportError> + Send + Sync;

struct Shared {
    responder: Box<Responder>,
    delay: Duration,
    requests: Mutex<Vec<TransportRequest>>,
    aborted: AtomicUsize,
}

/// A scripted transport that records what it was asked to do.
#[derive(Clone)]
pub struct MockTransport {
    shared: Arc<Shared>,
}

impl MockTransport {
    /// Creates a mock that answers every request with `responder`.
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&TransportRequest) -> Result<TransportResponse, TransportError>
            + Send
            + Sync
            + 'static,
    {
        Self::with_delay(Duration::ZERO, responder)
    }

    /// Creates a mock that waits `delay` before answering.
    pub fn with_delay<F>(delay: Duration, responder: F) -> Self
    where
        F: Fn(&TransportRequest) -> Result<TransportResponse, TransportError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            shared: Arc::new(Shared {
                responder: Box::new(responder),
                delay,
                requests: Mutex::new(Vec::new()),
                aborted: AtomicUsize::new(0),
            }),
        }
    }

    /// Creates a mock that always answers with the same status and JSON body.
    #[must_use]
    pub fn always(status: u16, body: serde_json::Value) -> Self {
        Self::new(move |_| Ok(TransportResponse::json(status, body.clone())))
    }

    /// Creates a mock that plays `responses` in order and repeats the last one.
    #[must_use]
    pub fn sequence(responses: Vec<Result<TransportResponse, TransportError>>) -> Self {
        let calls = AtomicUsize::new(0);
        Self::new(move |_| {
            let index = calls.fetch_add(1, Ordering::SeqCst);
            responses
                .get(index)
                .or_else(|| responses.last())
                .cloned()
                .unwrap_or_else(|| Ok(TransportResponse::empty(200)))
        })
    }

    /// Number of attempts started.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.shared.requests.lock().len()
    }

    /// Every request received, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<TransportRequest> {
        self.shared.requests.lock().clone()
    }

    /// Number of attempts dropped before they produced a response.
    #[must_use]
    pub fn aborted_count(&self) -> usize {
        self.shared.aborted.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("delay", &self.shared.delay)
            .field("calls", &self.call_count())
            .field("aborted", &self.aborted_count())
            .finish_non_exhaustive()
    }
}

impl Transport for MockTransport {
    fn execute(
        &self,
        request: TransportRequest,
    ) -> BoxFuture<'static, Result<TransportResponse, TransportError>> {
        self.shared.requests.lock().push(request.clone());
        let shared = self.shared.clone();
        let guard = AbortGuard {
            shared: shared.clone(),
            finished: false,
        };

        Box::pin(async move {
            let mut guard = guard;
            if !shared.delay.is_zero() {
                tokio::time::sleep(shared.delay).await;
            }
            let result = (shared.responder)(&request);
            guard.finished = true;
            result
        })
    }
}

/// Counts the attempt as aborted if its future is dropped early.
struct AbortGuard {
    shared: Arc<Shared>,
    finished: bool,
}

impl Drop for AbortGuard {
    fn drop(&mut self) {
        if !self.finished {
            self.shared.aborted.fetch_add(1, Ordering::SeqCst);
        }
    }
}
