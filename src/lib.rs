//! # Inflight - request and mutation coordination
//!
//! Inflight sits between an application and a network transport. It decides
//! whether a read actually needs a network call, issues reads and writes,
//! retries transient failures with exponential backoff, and keeps a shared
//! state projection in step with every call.
//!
//! ## Architecture
//!
//! 1. **Config**: a [`QueryConfig`](query::QueryConfig) describes one read or write
//! 2. **Key**: every config maps to a stable [`QueryKey`](key::QueryKey)
//! 3. **Coordinator**: dedups, dispatches, retries, cancels and resets
//! 4. **Transitions**: every state change is a [`Transition`](transition::Transition)
//! 5. **Store**: applies transitions to query, error and entity projections
//!
//! ## Core Components
//!
//! - [`Coordinator`](coordinator::Coordinator): issues calls and tracks them by key
//! - [`Store`](state::Store): shared state, fed only by transitions
//! - [`Transport`](transport::Transport): the seam to the network
//! - [`MockTransport`](transport::mock::MockTransport): scripted transport for tests
//!
//! ## Example
//!
//! ```rust
//! use inflight::prelude::*;
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> inflight::error::Result<()> {
//! let transport = MockTransport::always(200, json!({ "user": { "name": "Ryan" } }));
//! let coordinator = Coordinator::new(transport);
//!
//! let config = QueryConfig::new("/users/1")
//!     .updater("user", |_, next| next.cloned().unwrap_or_default());
//!
//! coordinator.request_async(&config)?.settled().await;
//! assert_eq!(
//!     coordinator.store().entity("user"),
//!     Some(json!({ "name": "Ryan" }))
//! );
//!
//! // The key already has state, so this is answered from the store
//! assert!(coordinator.request_async(&config)?.is_skipped());
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - `http`: enables [`HttpTransport`](transport::http::HttpTransport), backed by reqwest

pub mod backoff;
pub mod config;
pub mod coordinator;
pub mod entities;
pub mod error;
pub mod key;
pub mod prelude;
pub mod query;
pub mod state;
pub mod transition;
pub mod transport;
