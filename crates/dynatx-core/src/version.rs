//! Optimistic locking through a numeric version attribute.
//!
//! A write guarded by version `n` only succeeds while the stored item still
//! holds `n` (or holds no version at all when the model has never been
//! written) and leaves `n + 1` behind.

use serde_json::Value;

use crate::expression::{AttributePath, Condition, UpdateAction};
use crate::schema::TableSchema;

/// The condition a write must carry for a model at `current`.
///
/// `None` when the table has no version attribute.
#[must_use]
pub fn guard_condition(schema: &TableSchema, current: Option<u64>) -> Option<Condition> {
    let path = AttributePath::new(&schema.version_attribute()?.name);
    Some(match current {
        None => path.does_not_exist(),
        Some(version) => path.eq(version),
    })
}

/// The version a write leaves behind.
#[must_use]
pub fn next_version(current: Option<u64>) -> u64 {
    current.map_or(1, |version| version.saturating_add(1))
}

/// `caller AND guard`, or whichever side is present.
#[must_use]
pub fn merge_conditions(caller: Option<Condition>, guard: Option<Condition>) -> Option<Condition> {
    match (caller, guard) {
        (Some(caller), Some(guard)) => Some(caller.and(guard)),
        (caller, None) => caller,
        (None, guard) => guard,
    }
}

/// `SET version = next`, appended after the caller's update actions.
#[must_use]
pub fn version_action(schema: &TableSchema, next: u64) -> Option<UpdateAction> {
    let attribute = schema.version_attribute()?;
    Some(AttributePath::new(&attribute.name).set(Value::from(next)))
}
