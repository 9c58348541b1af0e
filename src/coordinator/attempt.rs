use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::backoff::Backoff;
use crate::config::status;
use crate::entities::{self, Entities, EntityPatch};
use crate::key::QueryKey;
use crate::query::{OperationKind, QueryConfig};
use crate::transition::Transition;
use crate::transport::{TransportRequest, TransportResponse};

use super::Inner;
use super::outcome::{QueryOutcome, QueryResponse};

/// The abortable handle held for one running attempt.
#[derive(Debug)]
pub(super) struct Tracked {
    pub(super) id: u64,
    pub(super) kind: OperationKind,
    pub(super) token: CancellationToken,
}

/// In-flight attempts by key.
///
/// A key holds at most one read but may hold several overlapping writes.
/// Every attempt stays here until it settles or is aborted, so cancel and
/// reset reach all of them. Every Start and terminal transition is dispatched
/// while this is locked, so a cancel observed here can never be overtaken by
/// a late terminal.
#[derive(Debug, Default)]
pub(super) struct Tracker {
    requests: HashMap<QueryKey, Vec<Tracked>>,
    next_id: u64,
}

impl Tracker {
    /// Registers a new attempt for `key`.
    pub(super) fn track(&mut self, key: QueryKey, kind: OperationKind) -> (u64, CancellationToken) {
        self.next_id += 1;
        let id = self.next_id;
        let token = CancellationToken::new();
        self.requests.entry(key).or_default().push(Tracked {
            id,
            kind,
            token: token.clone(),
        });
        (id, token)
    }

    /// Removes the reads tracked under `key`, leaving its writes in place.
    pub(super) fn supersede_reads(&mut self, key: &QueryKey) -> Vec<Tracked> {
        let Some(attempts) = self.requests.get_mut(key) else {
            return Vec::new();
        };
        let (reads, writes): (Vec<Tracked>, Vec<Tracked>) = std::mem::take(attempts)
            .into_iter()
            .partition(|tracked| !tracked.kind.is_mutation());
        *attempts = writes;
        if attempts.is_empty() {
            self.requests.remove(key);
        }
        reads
    }

    /// Removes every attempt tracked under `key`.
    pub(super) fn untrack(&mut self, key: &QueryKey) -> Vec<Tracked> {
        self.requests.remove(key).unwrap_or_default()
    }

    /// Drops attempt `id` once it has settled.
    pub(super) fn release(&mut self, key: &QueryKey, id: u64) {
        if let Some(attempts) = self.requests.get_mut(key) {
            attempts.retain(|tracked| tracked.id != id);
            if attempts.is_empty() {
                self.requests.remove(key);
            }
        }
    }

    pub(super) fn drain(&mut self) -> impl Iterator<Item = Tracked> + '_ {
        self.requests.drain().flat_map(|(_, attempts)| attempts)
    }

    pub(super) fn contains(&self, key: &QueryKey) -> bool {
        self.requests.contains_key(key)
    }

    pub(super) fn keys(&self) -> impl Iterator<Item = &QueryKey> {
        self.requests.keys()
    }

    /// Number of running attempts across all keys.
    pub(super) fn len(&self) -> usize {
        self.requests.values().map(Vec::len).sum()
    }
}

/// One issued read or write, from its first transport call to its terminal
/// transition.
pub(super) struct Attempt {
    pub(super) id: u64,
    pub(super) key: QueryKey,
    pub(super) kind: OperationKind,
    pub(super) config: QueryConfig,
    pub(super) token: CancellationToken,
    /// Pre-optimistic values of every entity the write touched.
    pub(super) initial: Option<EntityPatch>,
}

impl Attempt {
    pub(super) async fn run(self, inner: Arc<Inner>) -> QueryOutcome {
        let started = Instant::now();
        let mut backoff = Backoff::new(inner.config.backoff.clone());

        let response = loop {
            let request = TransportRequest::from_config(&self.config, self.kind);
            let result = tokio::select! {
                biased;
                () = self.token.cancelled() => return self.cancelled(),
                result = inner.transport.execute(request) => result,
            };
            let response = TransportResponse::from_result(result);

            let delay = if inner.config.is_retryable(response.status) {
                backoff.next_delay()
            } else {
                None
            };
            if let Some(delay) = delay {
                debug!(
                    key = %self.key,
                    status = response.status,
                    attempt = backoff.attempts(),
                    ?delay,
                    "retrying"
                );
                tokio::select! {
                    biased;
                    () = self.token.cancelled() => return self.cancelled(),
                    () = tokio::time::sleep(delay) => {}
                }
                continue;
            }
            break response;
        };

        self.settle(&inner, response, started.elapsed())
    }

    fn settle(self, inner: &Inner, response: TransportResponse, duration: Duration) -> QueryOutcome {
        if self.token.is_cancelled() {
            return self.cancelled();
        }
        // Runs unlocked so the hook may call back into the coordinator. A
        // cancel issued from here or racing it still drops the terminal below.
        if let Some(pre_dispatch) = &self.config.pre_dispatch {
            pre_dispatch();
        }

        let mut tracker = inner.tracker.lock();
        if self.token.is_cancelled() {
            return self.cancelled();
        }
        tracker.release(&self.key, self.id);

        let TransportResponse {
            status,
            body,
            text,
            headers,
        } = response;
        let at = Utc::now();

        if status::is_success(status) {
            let transformed = self.config.transform_response(body.as_ref(), &text);
            let entities = inner.store.read(|state| {
                entities::update(&self.config.updaters, state.entities(), &transformed)
            });
            inner.store.dispatch(Transition::Success {
                key: self.key.clone(),
                target: self.config.target.clone(),
                kind: self.kind,
                status,
                headers: headers.clone(),
                entities: entities.clone(),
                duration,
                at,
                meta: self.config.meta.clone(),
            });
            debug!(key = %self.key, status, ?duration, "query succeeded");

            QueryOutcome::Success(QueryResponse {
                status,
                body,
                text,
                headers,
                entities,
                transformed,
                duration,
            })
        } else {
            let rolled_back = self.initial.as_ref().map(|initial| {
                inner.store.read(|state| {
                    entities::rollback(&self.config.rollbacks, initial, state.entities())
                })
            });
            inner.store.dispatch(Transition::Failure {
                key: self.key.clone(),
                target: self.config.target.clone(),
                kind: self.kind,
                status,
                body: body.clone(),
                text: text.clone(),
                headers: headers.clone(),
                rolled_back,
                duration,
                at,
                meta: self.config.meta.clone(),
            });
            debug!(key = %self.key, status, ?duration, "query failed");

            QueryOutcome::Failure(QueryResponse {
                status,
                body,
                text,
                headers,
                entities: Entities::new(),
                transformed: Entities::new(),
                duration,
            })
        }
    }

    fn cancelled(&self) -> QueryOutcome {
        trace!(key = %self.key, attempt = self.id, "attempt aborted, dropping terminal transition");
        QueryOutcome::Cancelled
    }
}
