use std::collections::HashMap;

use crate::entities::{Entities, apply_patch};
use crate::key::QueryKey;
use crate::transition::Transition;

use super::{ErrorState, QueryState};

pub(super) fn reduce_queries(queries: &mut HashMap<QueryKey, QueryState>, transition: &Transition) {
    match transition {
        Transition::Start {
            key, target, kind, ..
        } => {
            let query = queries
                .entry(key.clone())
                .or_insert_with(|| QueryState::new(target.clone(), kind.is_mutation()));
            query.target.clone_from(target);
            query.is_mutation = kind.is_mutation();
            query.is_pending = true;
            query.is_finished = false;
            query.query_count += 1;
        }
        Transition::Success {
            key,
            status,
            headers,
            at,
            ..
        }
        | Transition::Failure {
            key,
            status,
            headers,
            at,
            ..
        } => {
            if let Some(query) = queries.get_mut(key) {
                query.is_pending = false;
                query.is_finished = true;
                query.status = Some(*status);
                query.headers = Some(headers.clone());
                query.last_updated = Some(*at);
            }
        }
        Transition::Cancel { key } => {
            if let Some(query) = queries.get_mut(key) {
                query.is_pending = false;
            }
        }
        Transition::Reset { .. } => queries.clear(),
    }
}

pub(super) fn reduce_errors(errors: &mut HashMap<QueryKey, ErrorState>, transition: &Transition) {
    match transition {
        Transition::Start { key, .. } => {
            errors.remove(key);
        }
        Transition::Failure {
            key,
            body,
            text,
            headers,
            ..
        } => {
            errors.insert(
                key.clone(),
                ErrorState {
                    response_body: body.clone(),
                    response_text: Some(text.clone()),
                    response_headers: Some(headers.clone()),
                },
            );
        }
        Transition::Reset { .. } => errors.clear(),
        Transition::Success { .. } | Transition::Cancel { .. } => {}
    }
}

pub(super) fn reduce_entities(entities: &mut Entities, transition: &Transition) {
    match transition {
        Transition::Start {
            optimistic_entities: Some(optimistic),
            ..
        } => entities.extend(optimistic.clone()),
        Transition::Success { entities: next, .. } => entities.extend(next.clone()),
        Transition::Failure {
            rolled_back: Some(patch),
            ..
        } => apply_patch(entities, patch),
        Transition::Reset { entities: seed } => {
            *entities = seed.clone().unwrap_or_default();
        }
        _ => {}
    }
}
