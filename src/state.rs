//! State projections: query metadata, error details and entities.
//!
//! [`StoreState`] holds the three slices and changes only through
//! [`StoreState::apply`]. [`Store`] is the shared, application-owned handle
//! the coordinator dispatches into; it also fans every applied transition out
//! to watchers.

mod reducers;
pub mod selectors;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use futures::stream::BoxStream;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::entities::Entities;
use crate::key::QueryKey;
use crate::query::Headers;
use crate::transition::Transition;

pub use selectors::{QueryView, error_selector, query_selector};

/// Metadata for one query key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryState {
    pub target: String,
    pub is_pending: bool,
    pub is_finished: bool,
    pub is_mutation: bool,
    pub status: Option<u16>,
    pub headers: Option<Headers>,
    pub last_updated: Option<DateTime<Utc>>,
    /// Attempts started for this key, retries excluded.
    pub query_count: u32,
}

impl QueryState {
    #[must_use]
    pub fn new(target: impl Into<String>, is_mutation: bool) -> Self {
        Self {
            target: target.into(),
            is_pending: false,
            is_finished: false,
            is_mutation,
            status: None,
            headers: None,
            last_updated: None,
            query_count: 0,
        }
    }
}

/// Failure details for the last attempt of one query key.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ErrorState {
    pub response_body: Option<Value>,
    pub response_text: Option<String>,
    pub response_headers: Option<Headers>,
}

/// Snapshot of all projections.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreState {
    queries: HashMap<QueryKey, QueryState>,
    errors: HashMap<QueryKey, ErrorState>,
    entities: Entities,
}

impl StoreState {
    /// Creates an empty state seeded with `entities`.
    #[must_use]
    pub fn with_entities(entities: Entities) -> Self {
        Self {
            entities,
            ..Self::default()
        }
    }

    /// Applies one transition to every slice.
    pub fn apply(&mut self, transition: &Transition) {
        reducers::reduce_queries(&mut self.queries, transition);
        reducers::reduce_errors(&mut self.errors, transition);
        reducers::reduce_entities(&mut self.entities, transition);
    }

    #[must_use]
    pub fn query(&self, key: &QueryKey) -> Option<&QueryState> {
        self.queries.get(key)
    }

    #[must_use]
    pub fn error(&self, key: &QueryKey) -> Option<&ErrorState> {
        self.errors.get(key)
    }

    #[must_use]
    pub fn entity(&self, name: &str) -> Option<&Value> {
        self.entities.get(name)
    }

    #[must_use]
    pub const fn queries(&self) -> &HashMap<QueryKey, QueryState> {
        &self.queries
    }

    #[must_use]
    pub const fn errors(&self) -> &HashMap<QueryKey, ErrorState> {
        &self.errors
    }

    #[must_use]
    pub const fn entities(&self) -> &Entities {
        &self.entities
    }
}

/// Shared handle to the projections.
///
/// Cloning is cheap and every clone sees the same state.
#[derive(Debug, Clone)]
pub struct Store {
    state: Arc<RwLock<StoreState>>,
    transitions: broadcast::Sender<Transition>,
}

impl Store {
    #[must_use]
    pub fn new() -> Self {
        Self::with_state(StoreState::default())
    }

    #[must_use]
    pub fn with_state(state: StoreState) -> Self {
        let (transitions, _) = broadcast::channel(256);
        Self {
            state: Arc::new(RwLock::new(state)),
            transitions,
        }
    }

    /// Applies a transition and notifies watchers.
    pub fn dispatch(&self, transition: Transition) {
        self.state.write().apply(&transition);
        // No watchers is fine
        let _ = self.transitions.send(transition);
    }

    /// Runs `f` against the current state under a read lock.
    pub fn read<R>(&self, f: impl FnOnce(&StoreState) -> R) -> R {
        f(&self.state.read())
    }

    /// Returns a copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> StoreState {
        self.state.read().clone()
    }

    #[must_use]
    pub fn query(&self, key: &QueryKey) -> Option<QueryState> {
        self.read(|state| state.query(key).cloned())
    }

    #[must_use]
    pub fn error(&self, key: &QueryKey) -> Option<ErrorState> {
        self.read(|state| state.error(key).cloned())
    }

    #[must_use]
    pub fn entity(&self, name: &str) -> Option<Value> {
        self.read(|state| state.entity(name).cloned())
    }

    #[must_use]
    pub fn entities(&self) -> Entities {
        self.read(|state| state.entities().clone())
    }

    /// Subscribes to transitions applied from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Transition> {
        self.transitions.subscribe()
    }

    /// Streams transitions applied from now on. Lagged items are skipped.
    #[must_use]
    pub fn watch(&self) -> BoxStream<'static, Transition> {
        BroadcastStream::new(self.subscribe())
            .filter_map(|result| async move { result.ok() })
            .boxed()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}
