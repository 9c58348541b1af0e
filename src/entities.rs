//! Entity merging for confirmed, optimistic and rolled-back writes.
//!
//! Every function here returns only the entities it touched. Merging the
//! result into the full entity store is the reducer's job, not the merger's.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

/// Application-owned entity cache, addressed by entity name.
pub type Entities = BTreeMap<String, Value>;

/// A set of entity replacements where `None` removes the entity.
pub type EntityPatch = BTreeMap<String, Option<Value>>;

/// Computes a new entity value from the current one and the transformed
/// response field with the same name.
pub type Updater = Arc<dyn Fn(Option<&Value>, Option<&Value>) -> Value + Send + Sync>;

/// Computes an optimistic entity value from the current one.
pub type OptimisticUpdater = Arc<dyn Fn(Option<&Value>) -> Value + Send + Sync>;

/// Reconciles an entity after a failed write, given its pre-write value and
/// its current value. Returning `None` removes the entity.
pub type Rollback = Arc<dyn Fn(Option<&Value>, Option<&Value>) -> Option<Value> + Send + Sync>;

pub type Updaters = BTreeMap<String, Updater>;
pub type OptimisticUpdaters = BTreeMap<String, OptimisticUpdater>;
pub type Rollbacks = BTreeMap<String, Rollback>;

/// Boxes a closure as an [`Updater`].
pub fn updater_fn<F>(f: F) -> Updater
where
    F: Fn(Option<&Value>, Option<&Value>) -> Value + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Boxes a closure as an [`OptimisticUpdater`].
pub fn optimistic_fn<F>(f: F) -> OptimisticUpdater
where
    F: Fn(Option<&Value>) -> Value + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Boxes a closure as a [`Rollback`].
pub fn rollback_fn<F>(f: F) -> Rollback
where
    F: Fn(Option<&Value>, Option<&Value>) -> Option<Value> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Applies `updaters` to `entities` using the matching fields of `transformed`.
///
/// Entities without an updater are not part of the result.
#[must_use]
pub fn update(updaters: &Updaters, entities: &Entities, transformed: &Entities) -> Entities {
    updaters
        .iter()
        .map(|(name, updater)| {
            let value = updater(entities.get(name), transformed.get(name));
            (name.clone(), value)
        })
        .collect()
}

/// Applies single-argument optimistic updaters to `entities`.
#[must_use]
pub fn optimistic_update(updaters: &OptimisticUpdaters, entities: &Entities) -> Entities {
    updaters
        .iter()
        .map(|(name, updater)| (name.clone(), updater(entities.get(name))))
        .collect()
}

/// Captures the current value of each named entity, recording absence as `None`.
#[must_use]
pub fn snapshot<'a>(entities: &Entities, names: impl IntoIterator<Item = &'a String>) -> EntityPatch {
    names
        .into_iter()
        .map(|name| (name.clone(), entities.get(name).cloned()))
        .collect()
}

/// Reverts the entities recorded in `initial`.
///
/// Iterates the keys of `initial`, not of `rollbacks`. A key with a rollback
/// function gets `rollback(initial, current)`; any other key is restored to
/// its initial value verbatim.
#[must_use]
pub fn rollback(rollbacks: &Rollbacks, initial: &EntityPatch, current: &Entities) -> EntityPatch {
    initial
        .iter()
        .map(|(name, initial_value)| {
            let value = match rollbacks.get(name) {
                Some(rollback) => rollback(initial_value.as_ref(), current.get(name)),
                None => initial_value.clone(),
            };
            (name.clone(), value)
        })
        .collect()
}

/// Writes every entry of `patch` into `entities`, removing `None` entries.
pub fn apply_patch(entities: &mut Entities, patch: &EntityPatch) {
    for (name, value) in patch {
        match value {
            Some(value) => {
                entities.insert(name.clone(), value.clone());
            }
            None => {
                entities.remove(name);
            }
        }
    }
}
