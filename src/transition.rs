//! Records the coordinator emits when a query changes state.
//!
//! State projections are updated only by applying these records, in the
//! order they were dispatched.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::entities::{Entities, EntityPatch};
use crate::key::QueryKey;
use crate::query::{Headers, OperationKind};

/// A state transition for one query key, or for the whole store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Transition {
    /// A new attempt started for `key`.
    Start {
        key: QueryKey,
        target: String,
        kind: OperationKind,
        /// Entities written before the call was issued (writes only).
        optimistic_entities: Option<Entities>,
        meta: Option<Value>,
    },
    /// The attempt finished with a 2xx status.
    Success {
        key: QueryKey,
        target: String,
        kind: OperationKind,
        status: u16,
        headers: Headers,
        /// Entities produced by the updaters.
        entities: Entities,
        duration: Duration,
        at: DateTime<Utc>,
        meta: Option<Value>,
    },
    /// The attempt failed after any retries were spent.
    Failure {
        key: QueryKey,
        target: String,
        kind: OperationKind,
        status: u16,
        body: Option<Value>,
        text: String,
        headers: Headers,
        /// Reverted optimistic entities (writes only).
        rolled_back: Option<EntityPatch>,
        duration: Duration,
        at: DateTime<Utc>,
        meta: Option<Value>,
    },
    /// The tracked attempt for `key` was aborted.
    Cancel { key: QueryKey },
    /// Every query was dropped; entities are replaced by the seed, or emptied.
    Reset { entities: Option<Entities> },
}

impl Transition {
    /// Returns the key this transition applies to, if any.
    #[must_use]
    pub const fn key(&self) -> Option<&QueryKey> {
        match self {
            Self::Start { key, .. }
            | Self::Success { key, .. }
            | Self::Failure { key, .. }
            | Self::Cancel { key } => Some(key),
            Self::Reset { .. } => None,
        }
    }

    /// Short name for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::Success { .. } => "success",
            Self::Failure { .. } => "failure",
            Self::Cancel { .. } => "cancel",
            Self::Reset { .. } => "reset",
        }
    }

    /// Returns `true` for success and failure.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Success { .. } | Self::Failure { .. })
    }
}
