//! The network boundary.
//!
//! A [`Transport`] turns one [`TransportRequest`] into one future that
//! resolves exactly once. The coordinator calls [`Transport::execute`] again
//! for every retry, and aborts an attempt by dropping its future, so a
//! transport must not deliver anything on its own after the future is gone.
//!
//! # Example
//!
//! Any `Fn(TransportRequest) -> BoxFuture<..>` closure is a transport:
//!
//! ```rust
//! use futures::future::BoxFuture;
//! use inflight::transport::{Transport, TransportError, TransportRequest, TransportResponse};
//! use serde_json::json;
//!
//! let echo = |request: TransportRequest| -> BoxFuture<'static, Result<TransportResponse, TransportError>> {
//!     Box::pin(async move { Ok(TransportResponse::json(200, json!({ "echo": request.payload }))) })
//! };
//!
//! fn assert_transport(_: &impl Transport) {}
//! assert_transport(&echo);
//! ```

pub mod mock;

#[cfg(feature = "http")]
pub mod http;

use futures::future::BoxFuture;
use serde_json::Value;
use thiserror::Error;

use crate::config::status;
use crate::query::{Credentials, Headers, Method, OperationKind, QueryConfig};

/// Error reported by a transport when no HTTP status was produced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,
}

impl TransportError {
    /// Status recorded for this error in query state.
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::Network(_) => status::UNKNOWN,
            Self::Timeout => status::REQUEST_TIMEOUT,
        }
    }
}

/// One attempt's worth of request data.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub target: String,
    pub method: Method,
    pub payload: Option<Value>,
    pub headers: Headers,
    pub credentials: Credentials,
}

impl TransportRequest {
    /// Builds the request for a config dispatched as `kind`.
    #[must_use]
    pub fn from_config(config: &QueryConfig, kind: OperationKind) -> Self {
        Self {
            target: config.target.clone(),
            method: config.method_for(kind),
            payload: config.payload.clone(),
            headers: config.options.headers.clone(),
            credentials: config.options.credentials,
        }
    }
}

/// A response with an HTTP status.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    /// Parsed body, when the text was valid JSON.
    pub body: Option<Value>,
    pub text: String,
    pub headers: Headers,
}

impl TransportResponse {
    /// Creates a response from raw text, parsing it as JSON when possible.
    #[must_use]
    pub fn from_text(status: u16, text: impl Into<String>, headers: Headers) -> Self {
        let text = text.into();
        let body = serde_json::from_str(&text).ok();
        Self {
            status,
            body,
            text,
            headers,
        }
    }

    /// Creates a JSON response.
    #[must_use]
    pub fn json(status: u16, body: Value) -> Self {
        let mut headers = Headers::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        Self {
            status,
            text: body.to_string(),
            body: Some(body),
            headers,
        }
    }

    /// Creates a response with no body.
    #[must_use]
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// Normalizes a transport result, mapping errors to a status-only response.
    #[must_use]
    pub fn from_result(result: Result<Self, TransportError>) -> Self {
        match result {
            Ok(response) => response,
            Err(err) => Self {
                status: err.status(),
                text: err.to_string(),
                ..Self::default()
            },
        }
    }
}

/// Executes requests on behalf of the coordinator.
pub trait Transport: Send + Sync + 'static {
    /// Starts one attempt. Dropping the returned future aborts it.
    fn execute(
        &self,
        request: TransportRequest,
    ) -> BoxFuture<'static, Result<TransportResponse, TransportError>>;
}

impl<F> Transport for F
where
    F: Fn(TransportRequest) -> BoxFuture<'static, Result<TransportResponse, TransportError>>
        + Send
        + Sync
        + 'static,
{
    fn execute(
        &self,
        request: TransportRequest,
    ) -> BoxFuture<'static, Result<TransportResponse, TransportError>> {
        self(request)
    }
}
