//! Operation descriptors and the constructors that build them from models.
//!
//! Each constructor is pure: it resolves the table schema from the [`Model`],
//! serializes the key or item, applies the version guard and compiles the
//! condition (and update) against one shared [`Placeholders`] table. Nothing
//! here touches the network.

use std::fmt;

use dynatx_model::input::{ConditionCheck, Delete, Get, Put, TransactGetItem, TransactWriteItem, Update};
use dynatx_model::types::{Key, ReturnValuesOnConditionCheckFailure};
use serde_json::Value;

use crate::error::{TransactionError, UsageError};
use crate::expression::{
    AttributePath, Condition, Placeholders, UpdateAction, compile_condition, compile_projection,
    compile_update,
};
use crate::schema::{Model, TableSchema};
use crate::serializer;
use crate::version::{guard_condition, merge_conditions, next_version, version_action};

/// Whether an operation reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// A transactional get.
    Read,
    /// A condition check, delete, put or update.
    Write,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
            Self::Write => f.write_str("write"),
        }
    }
}

/// One fully compiled member of a transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationDescriptor {
    /// Read one item.
    Get(Get),
    /// Assert a condition on one item.
    ConditionCheck(ConditionCheck),
    /// Delete one item.
    Delete(Delete),
    /// Create or replace one item.
    Put(Put),
    /// Update attributes of one item.
    Update(Update),
}

impl OperationDescriptor {
    /// Whether this operation belongs in a read or a write transaction.
    #[must_use]
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Get(_) => OperationKind::Read,
            _ => OperationKind::Write,
        }
    }

    /// The table this operation targets.
    #[must_use]
    pub fn table_name(&self) -> &str {
        match self {
            Self::Get(op) => &op.table_name,
            Self::ConditionCheck(op) => &op.table_name,
            Self::Delete(op) => &op.table_name,
            Self::Put(op) => &op.table_name,
            Self::Update(op) => &op.table_name,
        }
    }

    /// The wire member name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Get(_) => "Get",
            Self::ConditionCheck(_) => "ConditionCheck",
            Self::Delete(_) => "Delete",
            Self::Put(_) => "Put",
            Self::Update(_) => "Update",
        }
    }

    /// The read member, if this is a get.
    #[must_use]
    pub fn into_get_item(self) -> Option<TransactGetItem> {
        match self {
            Self::Get(get) => Some(TransactGetItem { get }),
            _ => None,
        }
    }

    /// The write member, if this is not a get.
    #[must_use]
    pub fn into_write_item(self) -> Option<TransactWriteItem> {
        match self {
            Self::Get(_) => None,
            Self::ConditionCheck(op) => Some(op.into()),
            Self::Delete(op) => Some(op.into()),
            Self::Put(op) => Some(op.into()),
            Self::Update(op) => Some(op.into()),
        }
    }
}

/// A put or update together with the version the model moves to once the
/// operation is accepted into a transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedWrite {
    /// The compiled operation.
    pub descriptor: OperationDescriptor,
    /// The model's next version, `None` for tables without one.
    pub next_version: Option<u64>,
}

/// Compiled condition expression plus its placeholder maps.
struct Compiled {
    condition: Option<String>,
    placeholders: Placeholders,
}

fn compile_guarded(
    schema: &TableSchema,
    condition: Option<Condition>,
    guard: Option<Condition>,
) -> Result<Compiled, TransactionError> {
    let mut placeholders = Placeholders::new();
    let condition = merge_conditions(condition, guard)
        .map(|c| compile_condition(&c, schema, &mut placeholders))
        .transpose()?;
    Ok(Compiled {
        condition,
        placeholders,
    })
}

fn key_of<M: Model>(model: &M) -> Result<Key, TransactionError> {
    let raw = serializer::to_raw(model)?;
    Ok(serializer::model_key(M::schema(), &raw)?)
}

/// Read the item of `M` with the given key.
pub fn get<M: Model>(
    hash_key: impl Into<Value>,
    range_key: Option<Value>,
) -> Result<OperationDescriptor, TransactionError> {
    let schema = M::schema();
    let key = serializer::serialize_key(schema, &hash_key.into(), range_key.as_ref())?;
    Ok(OperationDescriptor::Get(Get {
        table_name: schema.table_name().to_owned(),
        key,
        ..Default::default()
    }))
}

/// Read only `attributes` of the item of `M` with the given key.
pub fn get_with_projection<M: Model>(
    hash_key: impl Into<Value>,
    range_key: Option<Value>,
    attributes: &[AttributePath],
) -> Result<OperationDescriptor, TransactionError> {
    let schema = M::schema();
    let key = serializer::serialize_key(schema, &hash_key.into(), range_key.as_ref())?;
    let mut placeholders = Placeholders::new();
    let projection = compile_projection(attributes, schema, &mut placeholders)?;
    let (names, _) = placeholders.finish();
    Ok(OperationDescriptor::Get(Get {
        table_name: schema.table_name().to_owned(),
        key,
        projection_expression: Some(projection),
        expression_attribute_names: names,
    }))
}

/// Assert `condition` on the item of `M` with the given key.
pub fn condition_check<M: Model>(
    hash_key: impl Into<Value>,
    range_key: Option<Value>,
    condition: Option<Condition>,
    return_values: Option<ReturnValuesOnConditionCheckFailure>,
) -> Result<OperationDescriptor, TransactionError> {
    let condition = condition.ok_or(UsageError::MissingCondition)?;
    let schema = M::schema();
    let key = serializer::serialize_key(schema, &hash_key.into(), range_key.as_ref())?;
    let mut placeholders = Placeholders::new();
    let condition_expression = compile_condition(&condition, schema, &mut placeholders)?;
    let (names, values) = placeholders.finish();
    Ok(OperationDescriptor::ConditionCheck(ConditionCheck {
        table_name: schema.table_name().to_owned(),
        key,
        condition_expression,
        expression_attribute_names: names,
        expression_attribute_values: values,
        return_values_on_condition_check_failure: return_values,
    }))
}

/// Delete `model`'s item, guarded by its current version.
pub fn delete<M: Model>(
    model: &M,
    condition: Option<Condition>,
    return_values: Option<ReturnValuesOnConditionCheckFailure>,
) -> Result<OperationDescriptor, TransactionError> {
    let schema = M::schema();
    let key = key_of(model)?;
    let compiled = compile_guarded(schema, condition, guard_condition(schema, model.version()))?;
    let (names, values) = compiled.placeholders.finish();
    Ok(OperationDescriptor::Delete(Delete {
        table_name: schema.table_name().to_owned(),
        key,
        condition_expression: compiled.condition,
        expression_attribute_names: names,
        expression_attribute_values: values,
        return_values_on_condition_check_failure: return_values,
    }))
}

/// Write `model` as a whole item carrying its next version.
pub fn put<M: Model>(
    model: &M,
    condition: Option<Condition>,
    return_values: Option<ReturnValuesOnConditionCheckFailure>,
) -> Result<PreparedWrite, TransactionError> {
    let schema = M::schema();
    let current = model.version();
    let mut raw = serializer::to_raw(model)?;

    let next = schema.version_attribute().map(|attr| {
        let next = next_version(current);
        if let Some(object) = raw.as_object_mut() {
            object.insert(attr.name.clone(), Value::from(next));
        }
        next
    });
    let item = serializer::serialize_item(schema, &raw)?;

    let compiled = compile_guarded(schema, condition, guard_condition(schema, current))?;
    let (names, values) = compiled.placeholders.finish();
    Ok(PreparedWrite {
        descriptor: OperationDescriptor::Put(Put {
            table_name: schema.table_name().to_owned(),
            item,
            condition_expression: compiled.condition,
            expression_attribute_names: names,
            expression_attribute_values: values,
            return_values_on_condition_check_failure: return_values,
        }),
        next_version: next,
    })
}

/// Apply `actions` to `model`'s item and advance its version.
///
/// The condition is compiled before the update so it takes the lowest
/// placeholders; the version increment is the last `SET` action.
pub fn update<M: Model>(
    model: &M,
    actions: &[UpdateAction],
    condition: Option<Condition>,
    return_values: Option<ReturnValuesOnConditionCheckFailure>,
) -> Result<PreparedWrite, TransactionError> {
    let schema = M::schema();
    let current = model.version();
    let key = key_of(model)?;

    let mut compiled = compile_guarded(schema, condition, guard_condition(schema, current))?;

    let next = schema.version_attribute().map(|_| next_version(current));
    let mut all_actions = actions.to_vec();
    if let Some(action) = next.and_then(|next| version_action(schema, next)) {
        all_actions.push(action);
    }
    let update_expression = compile_update(&all_actions, schema, &mut compiled.placeholders)?;

    let (names, values) = compiled.placeholders.finish();
    Ok(PreparedWrite {
        descriptor: OperationDescriptor::Update(Update {
            table_name: schema.table_name().to_owned(),
            key,
            update_expression,
            condition_expression: compiled.condition,
            expression_attribute_names: names,
            expression_attribute_values: values,
            return_values_on_condition_check_failure: return_values,
        }),
        next_version: next,
    })
}
