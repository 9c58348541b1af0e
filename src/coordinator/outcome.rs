use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinHandle;

use crate::entities::Entities;
use crate::key::QueryKey;
use crate::query::Headers;

/// What a finished attempt returned.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResponse {
    pub status: u16,
    pub body: Option<Value>,
    pub text: String,
    pub headers: Headers,
    /// Entities written by the updaters. Empty on failure.
    pub entities: Entities,
    /// Output of the transform. Empty on failure.
    pub transformed: Entities,
    /// Wall time from the first attempt to the final response, backoff included.
    pub duration: Duration,
}

/// How a dispatched read or write settled.
///
/// Failures are values: a 404 or an exhausted retry budget resolves as
/// [`QueryOutcome::Failure`] rather than an error.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// The call finished with a 2xx status.
    Success(QueryResponse),
    /// The call finished with any other status, or never reached the server.
    Failure(QueryResponse),
    /// The attempt was cancelled, reset, or superseded by a forced read.
    Cancelled,
}

impl QueryOutcome {
    /// Returns the response if the call finished.
    #[must_use]
    pub const fn response(&self) -> Option<&QueryResponse> {
        match self {
            Self::Success(response) | Self::Failure(response) => Some(response),
            Self::Cancelled => None,
        }
    }

    /// Consumes the outcome, returning the response if the call finished.
    #[must_use]
    pub fn into_response(self) -> Option<QueryResponse> {
        match self {
            Self::Success(response) | Self::Failure(response) => Some(response),
            Self::Cancelled => None,
        }
    }

    /// Returns the final status if the call finished.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self.response() {
            Some(response) => Some(response.status),
            None => None,
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// A dispatched call that is running in the background.
///
/// Awaiting it yields the [`QueryOutcome`]. Dropping it does not stop the
/// call; use [`Coordinator::cancel`](super::Coordinator::cancel) for that.
#[derive(Debug)]
pub struct PendingQuery {
    key: QueryKey,
    handle: JoinHandle<QueryOutcome>,
}

impl PendingQuery {
    pub(super) const fn new(key: QueryKey, handle: JoinHandle<QueryOutcome>) -> Self {
        Self { key, handle }
    }

    /// The key this call is tracked under.
    #[must_use]
    pub const fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Returns `true` once the call has settled.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Future for PendingQuery {
    type Output = QueryOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.handle).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(err)) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            // The runtime shut down underneath the task
            Poll::Ready(Err(_)) => Poll::Ready(QueryOutcome::Cancelled),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Result of asking for a read.
///
/// A read is skipped when its key already has state and neither `force` nor
/// a permitted `retry` applies. Skipped reads make no network call and have
/// nothing to await.
#[derive(Debug)]
#[must_use]
pub enum Dispatched {
    Issued(PendingQuery),
    Skipped,
}

impl Dispatched {
    #[must_use]
    pub const fn is_issued(&self) -> bool {
        matches!(self, Self::Issued(_))
    }

    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }

    /// Returns the running call, if one was issued.
    #[must_use]
    pub fn into_pending(self) -> Option<PendingQuery> {
        match self {
            Self::Issued(pending) => Some(pending),
            Self::Skipped => None,
        }
    }

    /// Waits for the call if one was issued.
    pub async fn settled(self) -> Option<QueryOutcome> {
        match self {
            Self::Issued(pending) => Some(pending.await),
            Self::Skipped => None,
        }
    }
}
