//! HTTP transport backed by `reqwest`.
//!
//! # Feature Flag
//!
//! This module is only available when the `http` feature is enabled:
//!
//! ```toml
//! [dependencies]
//! inflight = { version = "0.1", features = ["http"] }
//! ```
//!
//! Targets are resolved against an optional base URL. Payloads are sent as
//! JSON bodies. The credential policy only has meaning for browser fetch and
//! is not forwarded.

use futures::future::BoxFuture;

use super::{Transport, TransportError, TransportRequest, TransportResponse};
use crate::query::{Headers, Method};

/// A [`Transport`] that performs real HTTP requests.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Option<String>,
}

impl HttpTransport {
    /// Creates a transport with a default `reqwest` client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport around an existing client.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: None,
        }
    }

    /// Prefixes every relative target with `base_url`.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    fn url_for(&self, target: &str) -> String {
        match &self.base_url {
            Some(base) if !target.starts_with("http://") && !target.starts_with("https://") => {
                format!(
                    "{}/{}",
                    base.trim_end_matches('/'),
                    target.trim_start_matches('/')
                )
            }
            _ => target.to_string(),
        }
    }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
        Method::Head => reqwest::Method::HEAD,
    }
}

fn to_transport_error(err: &reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Network(err.to_string())
    }
}

impl Transport for HttpTransport {
    fn execute(
        &self,
        request: TransportRequest,
    ) -> BoxFuture<'static, Result<TransportResponse, TransportError>> {
        let client = self.client.clone();
        let url = self.url_for(&request.target);

        Box::pin(async move {
            let mut builder = client.request(to_reqwest_method(request.method), url);
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let Some(payload) = &request.payload {
                builder = builder.json(payload);
            }

            let response = builder.send().await.map_err(|e| to_transport_error(&e))?;
            let status = response.status().as_u16();
            let headers: Headers = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|value| (name.as_str().to_string(), value.to_string()))
                })
                .collect();
            let text = response.text().await.map_err(|e| to_transport_error(&e))?;

            Ok(TransportResponse::from_text(status, text, headers))
        })
    }
}
