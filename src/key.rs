//! Query identity.
//!
//! A [`QueryKey`] is either the explicit key a caller set on a config or the
//! canonical JSON text of `{payload, target}`. Canonical means object keys are
//! sorted at every depth, so two payloads that are deeply equal always map to
//! the same key no matter how they were built.

use std::borrow::Borrow;
use std::fmt::{self, Write as _};

use serde::Serialize;
use serde_json::Value;

use crate::query::QueryConfig;

/// Stable identity of a logical request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct QueryKey(String);

impl QueryKey {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for QueryKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for QueryKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for QueryKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for QueryKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// Derives the key for a config, or `None` when there is no config.
///
/// # Example
///
/// ```rust
/// use inflight::key::derive_key;
/// use inflight::query::QueryConfig;
/// use serde_json::json;
///
/// let a = QueryConfig::new("/users").payload(json!({ "page": 1, "size": 20 }));
/// let b = QueryConfig::new("/users").payload(json!({ "size": 20, "page": 1 }));
/// assert_eq!(derive_key(Some(&a)), derive_key(Some(&b)));
/// assert_eq!(derive_key(None), None);
/// ```
#[must_use]
pub fn derive_key(config: Option<&QueryConfig>) -> Option<QueryKey> {
    config.map(derive_key_for)
}

/// Derives the key for a config that is known to be present.
#[must_use]
pub fn derive_key_for(config: &QueryConfig) -> QueryKey {
    match config.explicit_key.as_deref() {
        Some(key) if !key.is_empty() => QueryKey::new(key),
        _ => QueryKey(request_identity(&config.target, config.payload.as_ref())),
    }
}

fn request_identity(target: &str, payload: Option<&Value>) -> String {
    let mut out = String::from("{");
    if let Some(payload) = payload {
        out.push_str("\"payload\":");
        write_canonical(&mut out, payload);
        out.push(',');
    }
    out.push_str("\"target\":");
    write_string(&mut out, target);
    out.push('}');
    out
}

/// Serializes a value as compact JSON with object keys sorted recursively.
#[must_use]
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(&mut out, value);
    out
}

fn write_canonical(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => {
            let _ = write!(out, "{n}");
        }
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(out, item);
            }
            out.push(']');
        }
        Value::Object(fields) => {
            let mut entries: Vec<_> = fields.iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));

            out.push('{');
            for (i, (name, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(out, name);
                out.push(':');
                write_canonical(out, item);
            }
            out.push('}');
        }
    }
}

fn write_string(out: &mut String, s: &str) {
    // Display for a string Value yields its JSON literal, escapes included.
    let _ = write!(out, "{}", Value::from(s));
}
