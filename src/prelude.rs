//! Prelude module for convenient imports.
//!
//! ```
//! use inflight::prelude::*;
//! ```
//!
//! # What's included
//!
//! - [`Coordinator`] - Issues and tracks reads and writes
//! - [`QueryConfig`] - Describes one read or write
//! - [`QueryOutcome`] - How a call settled
//! - [`Store`] - Shared state projections
//! - [`Transition`] - State change records
//! - [`Transport`] - The network seam
//! - [`MockTransport`] - Scripted transport for tests

pub use crate::config::{BackoffConfig, CoordinatorConfig};
pub use crate::coordinator::{Coordinator, Dispatched, PendingQuery, QueryOutcome, QueryResponse};
pub use crate::entities::{Entities, EntityPatch};
pub use crate::error::{Error, Result};
pub use crate::key::QueryKey;
pub use crate::query::{Credentials, Method, QueryConfig};
pub use crate::state::{Store, StoreState, error_selector, query_selector};
pub use crate::transition::Transition;
pub use crate::transport::mock::MockTransport;
pub use crate::transport::{Transport, TransportError, TransportRequest, TransportResponse};

#[cfg(feature = "http")]
pub use crate::transport::http::HttpTransport;
