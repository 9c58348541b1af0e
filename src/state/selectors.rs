//! Read accessors keyed by [`QueryConfig`].
//!
//! These derive the key from the config, so callers never handle keys
//! directly. Unknown keys read as an idle, never-run query.

use chrono::{DateTime, Utc};

use crate::query::{Headers, QueryConfig};

use super::{ErrorState, StoreState};

/// The caller-facing part of a query's metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryView {
    pub is_pending: bool,
    pub is_finished: bool,
    pub status: Option<u16>,
    pub headers: Option<Headers>,
    pub last_updated: Option<DateTime<Utc>>,
    pub query_count: u32,
}

#[must_use]
pub fn query_selector(state: &StoreState, config: &QueryConfig) -> QueryView {
    state
        .query(&config.query_key())
        .map(|query| QueryView {
            is_pending: query.is_pending,
            is_finished: query.is_finished,
            status: query.status,
            headers: query.headers.clone(),
            last_updated: query.last_updated,
            query_count: query.query_count,
        })
        .unwrap_or_default()
}

#[must_use]
pub fn error_selector(state: &StoreState, config: &QueryConfig) -> ErrorState {
    state
        .error(&config.query_key())
        .cloned()
        .unwrap_or_default()
}

#[must_use]
pub fn is_pending(state: &StoreState, config: &QueryConfig) -> bool {
    state
        .query(&config.query_key())
        .is_some_and(|query| query.is_pending)
}

#[must_use]
pub fn is_finished(state: &StoreState, config: &QueryConfig) -> bool {
    state
        .query(&config.query_key())
        .is_some_and(|query| query.is_finished)
}

#[must_use]
pub fn status(state: &StoreState, config: &QueryConfig) -> Option<u16> {
    state
        .query(&config.query_key())
        .and_then(|query| query.status)
}

#[must_use]
pub fn headers(state: &StoreState, config: &QueryConfig) -> Option<Headers> {
    state
        .query(&config.query_key())
        .and_then(|query| query.headers.clone())
}

#[must_use]
pub fn last_updated(state: &StoreState, config: &QueryConfig) -> Option<DateTime<Utc>> {
    state
        .query(&config.query_key())
        .and_then(|query| query.last_updated)
}

#[must_use]
pub fn query_count(state: &StoreState, config: &QueryConfig) -> u32 {
    state
        .query(&config.query_key())
        .map_or(0, |query| query.query_count)
}
