//! DynamoDB output types for the transactional operations.
//!
//! All output structs use `PascalCase` JSON field naming to match the DynamoDB
//! wire protocol (`awsJson1_0`). Missing collections deserialize as empty.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{ConsumedCapacity, Item, ItemCollectionMetrics};

/// Output for the `TransactGetItems` operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransactGetItemsOutput {
    /// One response per requested item, in request order.
    #[serde(default)]
    pub responses: Vec<ItemResponse>,

    /// The capacity units consumed by the operation for each table.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub consumed_capacity: Vec<ConsumedCapacity>,
}

/// The item returned for one `Get` member, if it exists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemResponse {
    /// The item, or `None` when no item has the requested key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<Item>,
}

/// Output for the `TransactWriteItems` operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransactWriteItemsOutput {
    /// The capacity units consumed by the operation for each table.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub consumed_capacity: Vec<ConsumedCapacity>,

    /// A map of tables to item collection metrics for the tables that were
    /// affected by the operation.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub item_collection_metrics: BTreeMap<String, Vec<ItemCollectionMetrics>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AttributeValue;

    #[test]
    fn test_should_deserialize_get_responses_in_order() {
        let json = r#"{"Responses":[{"Item":{"pk":{"N":"1"}}},{}]}"#;
        let output: TransactGetItemsOutput =
            serde_json::from_str(json).expect("deserialize TransactGetItemsOutput");
        assert_eq!(output.responses.len(), 2);
        assert_eq!(
            output.responses[0]
                .item
                .as_ref()
                .and_then(|item| item.get("pk")),
            Some(&AttributeValue::N("1".to_owned()))
        );
        assert!(output.responses[1].item.is_none());
        assert!(output.consumed_capacity.is_empty());
    }

    #[test]
    fn test_should_deserialize_empty_write_output() {
        let output: TransactWriteItemsOutput =
            serde_json::from_str("{}").expect("deserialize TransactWriteItemsOutput");
        assert_eq!(output, TransactWriteItemsOutput::default());
    }
}
