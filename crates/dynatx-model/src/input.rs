//! DynamoDB input types for the transactional operations.
//!
//! All input structs use `PascalCase` JSON field naming to match the DynamoDB
//! wire protocol (`awsJson1_0`). Optional fields are omitted when `None`,
//! empty maps and `Vec`s are omitted to produce minimal JSON payloads.

use serde::{Deserialize, Serialize};

use crate::types::{
    ExpressionAttributeNames, ExpressionAttributeValues, Item, Key, ReturnConsumedCapacity,
    ReturnItemCollectionMetrics, ReturnValuesOnConditionCheckFailure,
};

// ---------------------------------------------------------------------------
// TransactGetItems
// ---------------------------------------------------------------------------

/// Input for the `TransactGetItems` operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransactGetItemsInput {
    /// The items to read, in order. Responses come back in the same order.
    pub transact_items: Vec<TransactGetItem>,

    /// Determines the level of detail about provisioned throughput consumption.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_consumed_capacity: Option<ReturnConsumedCapacity>,
}

/// A single member of a `TransactGetItems` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransactGetItem {
    /// The item lookup.
    pub get: Get,
}

/// Reads one item by primary key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Get {
    /// The table holding the item.
    pub table_name: String,

    /// The primary key of the item.
    pub key: Key,

    /// Attributes to retrieve. All attributes when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection_expression: Option<String>,

    /// Substitution tokens for attribute names in the projection.
    #[serde(default, skip_serializing_if = "ExpressionAttributeNames::is_empty")]
    pub expression_attribute_names: ExpressionAttributeNames,
}

// ---------------------------------------------------------------------------
// TransactWriteItems
// ---------------------------------------------------------------------------

/// Input for the `TransactWriteItems` operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransactWriteItemsInput {
    /// The write members, applied all-or-nothing.
    pub transact_items: Vec<TransactWriteItem>,

    /// Idempotency token. Retries with the same token within ten minutes are
    /// not applied twice.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_request_token: Option<String>,

    /// Determines the level of detail about provisioned throughput consumption.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_consumed_capacity: Option<ReturnConsumedCapacity>,

    /// Determines whether item collection metrics are returned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_item_collection_metrics: Option<ReturnItemCollectionMetrics>,
}

/// A single member of a `TransactWriteItems` request.
///
/// Exactly one of the four fields is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransactWriteItem {
    /// Asserts a condition on an item without writing it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition_check: Option<ConditionCheck>,

    /// Deletes an item.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<Delete>,

    /// Creates or replaces an item.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub put: Option<Put>,

    /// Updates attributes of an item.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update: Option<Update>,
}

impl From<ConditionCheck> for TransactWriteItem {
    fn from(check: ConditionCheck) -> Self {
        Self {
            condition_check: Some(check),
            ..Default::default()
        }
    }
}

impl From<Delete> for TransactWriteItem {
    fn from(delete: Delete) -> Self {
        Self {
            delete: Some(delete),
            ..Default::default()
        }
    }
}

impl From<Put> for TransactWriteItem {
    fn from(put: Put) -> Self {
        Self {
            put: Some(put),
            ..Default::default()
        }
    }
}

impl From<Update> for TransactWriteItem {
    fn from(update: Update) -> Self {
        Self {
            update: Some(update),
            ..Default::default()
        }
    }
}

/// Condition-only member of a write transaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConditionCheck {
    /// The table holding the item.
    pub table_name: String,

    /// The primary key of the item.
    pub key: Key,

    /// The condition that must hold for the transaction to succeed.
    pub condition_expression: String,

    /// Substitution tokens for attribute names in an expression.
    #[serde(default, skip_serializing_if = "ExpressionAttributeNames::is_empty")]
    pub expression_attribute_names: ExpressionAttributeNames,

    /// Substitution tokens for attribute values in an expression.
    #[serde(default, skip_serializing_if = "ExpressionAttributeValues::is_empty")]
    pub expression_attribute_values: ExpressionAttributeValues,

    /// What to return if the condition fails.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_values_on_condition_check_failure: Option<ReturnValuesOnConditionCheckFailure>,
}

/// Delete member of a write transaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Delete {
    /// The table holding the item.
    pub table_name: String,

    /// The primary key of the item to delete.
    pub key: Key,

    /// A condition that must be satisfied for the delete to succeed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition_expression: Option<String>,

    /// Substitution tokens for attribute names in an expression.
    #[serde(default, skip_serializing_if = "ExpressionAttributeNames::is_empty")]
    pub expression_attribute_names: ExpressionAttributeNames,

    /// Substitution tokens for attribute values in an expression.
    #[serde(default, skip_serializing_if = "ExpressionAttributeValues::is_empty")]
    pub expression_attribute_values: ExpressionAttributeValues,

    /// What to return if the condition fails.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_values_on_condition_check_failure: Option<ReturnValuesOnConditionCheckFailure>,
}

/// Put member of a write transaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Put {
    /// The table to write to.
    pub table_name: String,

    /// A map of attribute name to attribute value, representing the item.
    pub item: Item,

    /// A condition that must be satisfied for the put to succeed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition_expression: Option<String>,

    /// Substitution tokens for attribute names in an expression.
    #[serde(default, skip_serializing_if = "ExpressionAttributeNames::is_empty")]
    pub expression_attribute_names: ExpressionAttributeNames,

    /// Substitution tokens for attribute values in an expression.
    #[serde(default, skip_serializing_if = "ExpressionAttributeValues::is_empty")]
    pub expression_attribute_values: ExpressionAttributeValues,

    /// What to return if the condition fails.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_values_on_condition_check_failure: Option<ReturnValuesOnConditionCheckFailure>,
}

/// Update member of a write transaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Update {
    /// The table holding the item.
    pub table_name: String,

    /// The primary key of the item to update.
    pub key: Key,

    /// The update expression (`SET ... REMOVE ... ADD ... DELETE ...`).
    pub update_expression: String,

    /// A condition that must be satisfied for the update to succeed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition_expression: Option<String>,

    /// Substitution tokens for attribute names in an expression.
    #[serde(default, skip_serializing_if = "ExpressionAttributeNames::is_empty")]
    pub expression_attribute_names: ExpressionAttributeNames,

    /// Substitution tokens for attribute values in an expression.
    #[serde(default, skip_serializing_if = "ExpressionAttributeValues::is_empty")]
    pub expression_attribute_values: ExpressionAttributeValues,

    /// What to return if the condition fails.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_values_on_condition_check_failure: Option<ReturnValuesOnConditionCheckFailure>,
}
