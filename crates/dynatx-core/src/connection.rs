//! The store boundary.
//!
//! A [`Connection`] carries the two transactional requests to DynamoDB (or
//! anything that speaks its wire format) and returns the raw responses.
//! Commits make exactly one call per transaction and never retry.

use std::sync::Arc;

use dynatx_model::error::DynamoDBError;
use dynatx_model::input::{TransactGetItemsInput, TransactWriteItemsInput};
use dynatx_model::output::{TransactGetItemsOutput, TransactWriteItemsOutput};

/// Client capable of issuing `TransactGetItems` and `TransactWriteItems`.
///
/// Uses `#[async_trait]` so transactions can hold a `&dyn Connection`.
#[async_trait::async_trait]
pub trait Connection: Send + Sync {
    /// Read a set of items atomically.
    async fn transact_get_items(
        &self,
        input: TransactGetItemsInput,
    ) -> Result<TransactGetItemsOutput, DynamoDBError>;

    /// Apply a set of writes atomically.
    async fn transact_write_items(
        &self,
        input: TransactWriteItemsInput,
    ) -> Result<TransactWriteItemsOutput, DynamoDBError>;
}

#[async_trait::async_trait]
impl<C: Connection + ?Sized> Connection for Arc<C> {
    async fn transact_get_items(
        &self,
        input: TransactGetItemsInput,
    ) -> Result<TransactGetItemsOutput, DynamoDBError> {
        (**self).transact_get_items(input).await
    }

    async fn transact_write_items(
        &self,
        input: TransactWriteItemsInput,
    ) -> Result<TransactWriteItemsOutput, DynamoDBError> {
        (**self).transact_write_items(input).await
    }
}
