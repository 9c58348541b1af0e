//! Request coordination: dedup, dispatch, retry, cancel and reset.
//!
//! [`Coordinator`] decides whether a read needs a network call, issues it
//! through a [`Transport`], retries transient failures with backoff, and
//! dispatches the resulting [`Transition`]s into a [`Store`]. Writes always
//! issue and may apply optimistic entities that are rolled back on failure.
//!
//! Each issued call runs on its own tokio task and is tracked by key until it
//! settles. Cancelling or resetting aborts the tracked call, and the aborted
//! call never dispatches a terminal transition.
//!
//! # Example
//!
//! ```rust
//! use inflight::coordinator::Coordinator;
//! use inflight::query::QueryConfig;
//! use inflight::transport::TransportResponse;
//! use inflight::transport::mock::MockTransport;
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> inflight::error::Result<()> {
//! let transport = MockTransport::new(|request| {
//!     Ok(TransportResponse::json(200, json!({ "message": request.payload })))
//! });
//! let coordinator = Coordinator::new(transport);
//!
//! let config = QueryConfig::new("/echo")
//!     .payload(json!("hello"))
//!     .updater("message", |_, next| next.cloned().unwrap_or_default());
//!
//! let outcome = coordinator.request_async(&config)?.settled().await;
//! assert!(outcome.is_some_and(|outcome| outcome.is_success()));
//! assert_eq!(coordinator.store().entity("message"), Some(json!("hello")));
//! # Ok(())
//! # }
//! ```

mod attempt;
mod outcome;

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::config::{CoordinatorConfig, status};
use crate::entities::{self, Entities, EntityPatch};
use crate::error::{Error, Result};
use crate::key::QueryKey;
use crate::query::{OperationKind, QueryConfig};
use crate::state::{QueryState, Store};
use crate::transition::Transition;
use crate::transport::Transport;

use attempt::{Attempt, Tracker};

pub use outcome::{Dispatched, PendingQuery, QueryOutcome, QueryResponse};

struct Inner {
    store: Store,
    transport: Arc<dyn Transport>,
    config: CoordinatorConfig,
    // Lock order: tracker, then store
    tracker: Mutex<Tracker>,
}

/// Issues reads and writes and keeps a [`Store`] in step with them.
///
/// Cloning is cheap; clones share the store, transport and in-flight calls.
/// Methods that issue calls spawn tokio tasks and must run inside a runtime.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

impl Coordinator {
    /// Creates a coordinator with an empty store and the default config.
    pub fn new(transport: impl Transport) -> Self {
        Self::with_config(transport, CoordinatorConfig::default())
    }

    /// Creates a coordinator with an empty store and a custom config.
    pub fn with_config(transport: impl Transport, config: CoordinatorConfig) -> Self {
        Self::with_store(Store::new(), transport, config)
    }

    /// Creates a coordinator that dispatches into an existing store.
    pub fn with_store(store: Store, transport: impl Transport, config: CoordinatorConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                transport: Arc::new(transport),
                config,
                tracker: Mutex::new(Tracker::default()),
            }),
        }
    }

    #[must_use]
    pub fn store(&self) -> &Store {
        &self.inner.store
    }

    #[must_use]
    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    /// Issues a read unless its key already has state.
    ///
    /// A read is issued when the key has never been seen, when `force` is set,
    /// or when `retry` is set and the last attempt finished with a non-2xx
    /// status and nothing is pending. A forced read aborts any read still
    /// running under the same key; writes on that key keep running.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingTarget`] if the config has an empty target.
    pub fn request_async(&self, config: &QueryConfig) -> Result<Dispatched> {
        ensure_target(config)?;
        let key = config.query_key();

        let mut tracker = self.inner.tracker.lock();
        let prior = self.inner.store.query(&key);
        if !should_issue(config, prior.as_ref()) {
            debug!(key = %key, "request skipped");
            return Ok(Dispatched::Skipped);
        }
        for previous in tracker.supersede_reads(&key) {
            debug!(key = %key, attempt = previous.id, "aborting superseded request");
            previous.token.cancel();
        }
        let attempt = self.begin(&mut tracker, key, config, OperationKind::Request, None, None);
        drop(tracker);

        Ok(Dispatched::Issued(self.spawn(attempt)))
    }

    /// Issues every read in order, returning one [`Dispatched`] per config.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingTarget`] if any config has an empty target, in
    /// which case nothing is dispatched.
    pub fn request_all(&self, configs: &[QueryConfig]) -> Result<Vec<Dispatched>> {
        configs.iter().try_for_each(ensure_target)?;
        configs
            .iter()
            .map(|config| self.request_async(config))
            .collect()
    }

    /// Issues a write.
    ///
    /// Optimistic updaters run against the current entities and their results
    /// are applied with the Start transition. If the write fails, every entity
    /// they touched is restored through its rollback, or to its prior value
    /// when it has none. Overlapping writes on the same key all run to
    /// completion and are all reached by [`cancel`](Self::cancel) and
    /// [`reset`](Self::reset).
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingTarget`] if the config has an empty target.
    pub fn mutate_async(&self, config: &QueryConfig) -> Result<PendingQuery> {
        ensure_target(config)?;
        let key = config.query_key();

        let mut tracker = self.inner.tracker.lock();
        let (optimistic, initial) = if config.optimistic_updaters.is_empty() {
            (None, None)
        } else {
            let (optimistic, initial) = self.inner.store.read(|state| {
                let optimistic =
                    entities::optimistic_update(&config.optimistic_updaters, state.entities());
                let initial = entities::snapshot(state.entities(), optimistic.keys());
                (optimistic, initial)
            });
            (Some(optimistic), Some(initial))
        };
        if tracker.contains(&key) {
            debug!(key = %key, "write overlaps an in-flight call");
        }
        let attempt = self.begin(
            &mut tracker,
            key,
            config,
            OperationKind::Mutation,
            optimistic,
            initial,
        );
        drop(tracker);

        Ok(self.spawn(attempt))
    }

    /// Aborts every call running under `key` and dispatches one Cancel.
    ///
    /// Returns `false` when nothing is tracked under `key`. Optimistic
    /// entities of a cancelled write are left in place.
    pub fn cancel(&self, key: &QueryKey) -> bool {
        let mut tracker = self.inner.tracker.lock();
        let aborted = tracker.untrack(key);
        if aborted.is_empty() {
            warn!(key = %key, "no pending request to cancel");
            return false;
        }
        for tracked in &aborted {
            tracked.token.cancel();
        }
        self.inner.store.dispatch(Transition::Cancel { key: key.clone() });
        debug!(key = %key, aborted = aborted.len(), "request cancelled");
        true
    }

    /// Cancels the call for the key derived from `config`.
    pub fn cancel_config(&self, config: &QueryConfig) -> bool {
        self.cancel(&config.query_key())
    }

    /// Aborts every tracked call, clears all query and error state, and
    /// replaces the entities with `entities`, or empties them.
    pub fn reset(&self, entities: Option<Entities>) {
        let mut tracker = self.inner.tracker.lock();
        let aborted = tracker.len();
        for tracked in tracker.drain() {
            tracked.token.cancel();
        }
        self.inner.store.dispatch(Transition::Reset { entities });
        debug!(aborted, "coordinator reset");
    }

    /// Returns `true` if a call is tracked under `key`.
    #[must_use]
    pub fn is_in_flight(&self, key: &QueryKey) -> bool {
        self.inner.tracker.lock().contains(key)
    }

    /// Keys with a tracked call, in no particular order.
    #[must_use]
    pub fn in_flight(&self) -> Vec<QueryKey> {
        self.inner.tracker.lock().keys().cloned().collect()
    }

    fn begin(
        &self,
        tracker: &mut Tracker,
        key: QueryKey,
        config: &QueryConfig,
        kind: OperationKind,
        optimistic: Option<Entities>,
        initial: Option<EntityPatch>,
    ) -> Attempt {
        let (id, token) = tracker.track(key.clone(), kind);
        self.inner.store.dispatch(Transition::Start {
            key: key.clone(),
            target: config.target.clone(),
            kind,
            optimistic_entities: optimistic,
            meta: config.meta.clone(),
        });
        debug!(key = %key, ?kind, attempt = id, "dispatched");

        Attempt {
            id,
            key,
            kind,
            config: config.clone(),
            token,
            initial,
        }
    }

    fn spawn(&self, attempt: Attempt) -> PendingQuery {
        let key = attempt.key.clone();
        let handle = tokio::spawn(attempt.run(Arc::clone(&self.inner)));
        PendingQuery::new(key, handle)
    }
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("config", &self.inner.config)
            .field("in_flight", &self.inner.tracker.lock().len())
            .finish_non_exhaustive()
    }
}

fn ensure_target(config: &QueryConfig) -> Result<()> {
    if config.target.is_empty() {
        return Err(Error::MissingTarget);
    }
    Ok(())
}

fn should_issue(config: &QueryConfig, prior: Option<&QueryState>) -> bool {
    if config.force {
        return true;
    }
    prior.is_none_or(|prior| {
        config.retry && !prior.is_pending && !prior.status.is_some_and(status::is_success)
    })
}
