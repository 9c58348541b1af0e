//! Per-dispatch request description.
//!
//! A [`QueryConfig`] says what to call, how to derive its identity, and how a
//! response (or a failure) maps onto entities. It is an immutable value; the
//! coordinator clones what it needs for the lifetime of one dispatch.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::entities::{
    Entities, OptimisticUpdaters, Rollbacks, Updaters, optimistic_fn, rollback_fn, updater_fn,
};
use crate::key::{QueryKey, derive_key_for};

/// Request or response headers.
pub type Headers = BTreeMap<String, String>;

/// Maps a raw response body and text onto named entity fields.
pub type Transform = Arc<dyn Fn(Option<&Value>, &str) -> Entities + Send + Sync>;

/// Synchronous hook fired right before a terminal transition is dispatched.
pub type PreDispatch = Arc<dyn Fn() + Send + Sync>;

/// HTTP method used by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

impl Method {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Credential policy forwarded to the transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Credentials {
    Omit,
    #[default]
    SameOrigin,
    Include,
}

/// Whether a dispatch is a read or a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Request,
    Mutation,
}

impl OperationKind {
    #[must_use]
    pub const fn is_mutation(self) -> bool {
        matches!(self, Self::Mutation)
    }

    /// Method used when the config does not name one.
    #[must_use]
    pub const fn default_method(self) -> Method {
        match self {
            Self::Request => Method::Get,
            Self::Mutation => Method::Post,
        }
    }
}

/// Transport options for a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Overrides the default method for the operation kind.
    pub method: Option<Method>,
    pub headers: Headers,
    pub credentials: Credentials,
}

/// Describes one read or write.
///
/// # Example
///
/// ```rust
/// use inflight::query::QueryConfig;
/// use serde_json::json;
///
/// let config = QueryConfig::new("/echo")
///     .payload(json!({ "value": "Ryan" }))
///     .updater("message", |_, next| next.cloned().unwrap_or_default());
///
/// assert_eq!(config.target, "/echo");
/// assert!(config.updaters.contains_key("message"));
/// ```
#[derive(Clone, Default)]
pub struct QueryConfig {
    pub target: String,
    pub payload: Option<Value>,
    /// Overrides the derived key when non-empty.
    pub explicit_key: Option<String>,
    pub updaters: Updaters,
    pub optimistic_updaters: OptimisticUpdaters,
    pub rollbacks: Rollbacks,
    /// Defaults to splitting a JSON object body into its fields.
    pub transform: Option<Transform>,
    pub options: RequestOptions,
    /// Issue a read even if the key already has state.
    pub force: bool,
    /// Re-issue a read whose last attempt finished with a non-2xx status.
    pub retry: bool,
    pub meta: Option<Value>,
    pub pre_dispatch: Option<PreDispatch>,
}

impl QueryConfig {
    /// Creates a config for the given target with everything else defaulted.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Sets an explicit query key. Configs sharing a key share dedup and
    /// cancellation.
    #[must_use]
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.explicit_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn updater<F>(mut self, entity: impl Into<String>, f: F) -> Self
    where
        F: Fn(Option<&Value>, Option<&Value>) -> Value + Send + Sync + 'static,
    {
        self.updaters.insert(entity.into(), updater_fn(f));
        self
    }

    #[must_use]
    pub fn optimistic_updater<F>(mut self, entity: impl Into<String>, f: F) -> Self
    where
        F: Fn(Option<&Value>) -> Value + Send + Sync + 'static,
    {
        self.optimistic_updaters
            .insert(entity.into(), optimistic_fn(f));
        self
    }

    #[must_use]
    pub fn rollback<F>(mut self, entity: impl Into<String>, f: F) -> Self
    where
        F: Fn(Option<&Value>, Option<&Value>) -> Option<Value> + Send + Sync + 'static,
    {
        self.rollbacks.insert(entity.into(), rollback_fn(f));
        self
    }

    #[must_use]
    pub fn transform<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<&Value>, &str) -> Entities + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.options.method = Some(method);
        self
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.headers.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.options.credentials = credentials;
        self
    }

    #[must_use]
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    #[must_use]
    pub fn retry(mut self, retry: bool) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Sets a hook that runs once the final response has arrived, just before
    /// its terminal transition is applied. It is skipped when the call was
    /// already aborted. A cancel issued while it runs, including from the
    /// hook itself, still suppresses the terminal transition.
    #[must_use]
    pub fn pre_dispatch<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.pre_dispatch = Some(Arc::new(f));
        self
    }

    /// Returns the key identifying this config.
    #[must_use]
    pub fn query_key(&self) -> QueryKey {
        derive_key_for(self)
    }

    /// Returns the method for the given operation kind.
    #[must_use]
    pub fn method_for(&self, kind: OperationKind) -> Method {
        self.options.method.unwrap_or(kind.default_method())
    }

    /// Runs the configured transform, or the identity transform.
    #[must_use]
    pub fn transform_response(&self, body: Option<&Value>, text: &str) -> Entities {
        match &self.transform {
            Some(transform) => transform(body, text),
            None => match body {
                Some(Value::Object(fields)) => fields
                    .iter()
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect(),
                _ => Entities::new(),
            },
        }
    }
}

impl fmt::Debug for QueryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryConfig")
            .field("target", &self.target)
            .field("payload", &self.payload)
            .field("explicit_key", &self.explicit_key)
            .field("updaters", &self.updaters.keys().collect::<Vec<_>>())
            .field(
                "optimistic_updaters",
                &self.optimistic_updaters.keys().collect::<Vec<_>>(),
            )
            .field("rollbacks", &self.rollbacks.keys().collect::<Vec<_>>())
            .field("options", &self.options)
            .field("force", &self.force)
            .field("retry", &self.retry)
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}
