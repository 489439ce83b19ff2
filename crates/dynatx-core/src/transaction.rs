//! Transaction contexts.
//!
//! A [`Transaction`] collects operation descriptors of a single kind and
//! tracks its lifecycle:
//!
//! ```text
//! Open --commit--> Committing --ok--> Committed
//!   |                   |
//!   |                   +--error / dropped--> Failed
//!   +--discard / dropped--> Discarded
//! ```
//!
//! [`TransactGet`] and [`TransactWrite`] wrap it with the typed operation
//! methods and the single network call made on commit. Their `run` helpers
//! commit only when the body returns `Ok` and never call the store otherwise.

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::mem;

use dynatx_model::DynamoDBOperation;
use dynatx_model::error::DynamoDBError;
use dynatx_model::input::{TransactGetItemsInput, TransactWriteItem, TransactWriteItemsInput};
use dynatx_model::types::{
    ConsumedCapacity, Item, ItemCollectionMetrics, ReturnValuesOnConditionCheckFailure,
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::TransactionConfig;
use crate::connection::Connection;
use crate::error::{TransactionError, UsageError};
use crate::expression::{AttributePath, Condition, UpdateAction};
use crate::operation::{self, OperationDescriptor, OperationKind, PreparedWrite};
use crate::schema::{Model, TableSchema};
use crate::serializer::{self, SerializeError};

/// Lifecycle state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Accepting operations.
    Open,
    /// The store call is in flight.
    Committing,
    /// The store accepted the transaction.
    Committed,
    /// The store rejected the transaction, or the commit was abandoned.
    Failed,
    /// Abandoned before commit; nothing was sent.
    Discarded,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Open => "open",
            Self::Committing => "committing",
            Self::Committed => "committed",
            Self::Failed => "failed",
            Self::Discarded => "discarded",
        })
    }
}

/// Ordered operations of one kind plus lifecycle state.
#[derive(Debug)]
pub struct Transaction {
    kind: OperationKind,
    state: TransactionState,
    operations: Vec<OperationDescriptor>,
}

impl Transaction {
    /// Create an open transaction accepting `kind` operations.
    #[must_use]
    pub fn new(kind: OperationKind) -> Self {
        Self {
            kind,
            state: TransactionState::Open,
            operations: Vec::new(),
        }
    }

    /// The kind of operations this transaction accepts.
    #[must_use]
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// The current lifecycle state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// The operations appended so far.
    #[must_use]
    pub fn operations(&self) -> &[OperationDescriptor] {
        &self.operations
    }

    /// Number of operations appended so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Returns `true` if nothing has been appended.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    fn ensure_open(&self) -> Result<(), UsageError> {
        if self.state == TransactionState::Open {
            Ok(())
        } else {
            Err(UsageError::NotOpen { state: self.state })
        }
    }

    /// Append a compiled operation.
    ///
    /// Fails if the transaction is not open or the operation is of the other
    /// kind.
    pub fn append(&mut self, descriptor: OperationDescriptor) -> Result<(), TransactionError> {
        self.ensure_open()?;
        if descriptor.kind() != self.kind {
            return Err(UsageError::MixedOperationKinds {
                expected: self.kind,
                found: descriptor.kind(),
            }
            .into());
        }
        debug!(
            table = descriptor.table_name(),
            operation = descriptor.name(),
            position = self.operations.len(),
            "appended operation to transaction"
        );
        self.operations.push(descriptor);
        Ok(())
    }

    /// Abandon the transaction. No-op unless open.
    pub fn discard(&mut self) {
        if self.state == TransactionState::Open {
            debug!(kind = %self.kind, operations = self.operations.len(), "discarded transaction");
            self.state = TransactionState::Discarded;
        }
    }

    fn begin_commit(&mut self) -> Result<Vec<OperationDescriptor>, TransactionError> {
        self.ensure_open()?;
        self.state = TransactionState::Committing;
        Ok(mem::take(&mut self.operations))
    }

    fn finish_commit(&mut self, succeeded: bool) {
        self.state = if succeeded {
            TransactionState::Committed
        } else {
            TransactionState::Failed
        };
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        match self.state {
            TransactionState::Open => {
                if !self.operations.is_empty() {
                    debug!(
                        kind = %self.kind,
                        operations = self.operations.len(),
                        "transaction dropped without commit, discarding"
                    );
                }
                self.state = TransactionState::Discarded;
            }
            TransactionState::Committing => {
                warn!(kind = %self.kind, "transaction dropped while committing, outcome unknown");
                self.state = TransactionState::Failed;
            }
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Reference to an item requested in a [`TransactGet`], resolved against
/// its [`TransactGetResult`].
pub struct ItemHandle<M> {
    index: usize,
    _model: PhantomData<fn() -> M>,
}

impl<M> ItemHandle<M> {
    fn new(index: usize) -> Self {
        Self {
            index,
            _model: PhantomData,
        }
    }

    /// Position of the request within the transaction.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }
}

impl<M> Clone for ItemHandle<M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M> Copy for ItemHandle<M> {}

impl<M> fmt::Debug for ItemHandle<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemHandle").field("index", &self.index).finish()
    }
}

/// Items returned by a committed [`TransactGet`], in request order.
#[derive(Debug, Clone, Default)]
pub struct TransactGetResult {
    items: Vec<Option<Item>>,
    consumed_capacity: Vec<ConsumedCapacity>,
}

impl TransactGetResult {
    /// Hydrate the model behind `handle`. Fails with `DoesNotExist` when no
    /// item has the requested key.
    pub fn get<M: Model>(&self, handle: ItemHandle<M>) -> Result<M, TransactionError> {
        self.try_get(handle)?
            .ok_or_else(|| TransactionError::DoesNotExist {
                table: M::schema().table_name().to_owned(),
            })
    }

    /// Hydrate the model behind `handle`, `None` when it does not exist.
    pub fn try_get<M: Model>(&self, handle: ItemHandle<M>) -> Result<Option<M>, TransactionError> {
        let Some(item) = self.items.get(handle.index).and_then(Option::as_ref) else {
            return Ok(None);
        };
        hydrate::<M>(item).map(Some)
    }

    /// Raw items in request order.
    #[must_use]
    pub fn items(&self) -> &[Option<Item>] {
        &self.items
    }

    /// Capacity reported by the store, if requested.
    #[must_use]
    pub fn consumed_capacity(&self) -> &[ConsumedCapacity] {
        &self.consumed_capacity
    }
}

fn hydrate<M: Model>(item: &Item) -> Result<M, TransactionError> {
    let schema = M::schema();
    let raw = serializer::deserialize_item(schema, item).map_err(|e| hydrate_error(schema, e))?;
    serde_json::from_value(raw).map_err(|e| hydrate_error(schema, SerializeError::Model(e)))
}

fn hydrate_error(schema: &TableSchema, source: SerializeError) -> TransactionError {
    TransactionError::Hydrate {
        table: schema.table_name().to_owned(),
        source,
    }
}

/// A read transaction.
pub struct TransactGet<'c> {
    connection: &'c dyn Connection,
    config: TransactionConfig,
    transaction: Transaction,
}

impl fmt::Debug for TransactGet<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactGet")
            .field("config", &self.config)
            .field("transaction", &self.transaction)
            .finish_non_exhaustive()
    }
}

impl<'c> TransactGet<'c> {
    /// Open a read transaction on `connection`.
    #[must_use]
    pub fn new(connection: &'c dyn Connection, config: TransactionConfig) -> Self {
        Self {
            connection,
            config,
            transaction: Transaction::new(OperationKind::Read),
        }
    }

    /// Run `body` against a new read transaction and commit it if the body
    /// succeeds. On error the transaction is discarded without a store call.
    pub async fn run<T, F>(
        connection: &'c dyn Connection,
        config: TransactionConfig,
        body: F,
    ) -> Result<(T, TransactGetResult), TransactionError>
    where
        F: FnOnce(&mut Self) -> Result<T, TransactionError>,
    {
        let mut tx = Self::new(connection, config);
        match body(&mut tx) {
            Ok(value) => Ok((value, tx.commit().await?)),
            Err(err) => {
                tx.discard();
                Err(err)
            }
        }
    }

    /// The current lifecycle state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.transaction.state()
    }

    /// The operations appended so far.
    #[must_use]
    pub fn operations(&self) -> &[OperationDescriptor] {
        self.transaction.operations()
    }

    /// Request the item of `M` with the given key.
    pub fn get<M: Model>(
        &mut self,
        hash_key: impl Into<Value>,
        range_key: Option<Value>,
    ) -> Result<ItemHandle<M>, TransactionError> {
        let descriptor = operation::get::<M>(hash_key, range_key)?;
        self.push(descriptor)
    }

    /// Request only `attributes` of the item of `M` with the given key.
    pub fn get_with_projection<M: Model>(
        &mut self,
        hash_key: impl Into<Value>,
        range_key: Option<Value>,
        attributes: &[AttributePath],
    ) -> Result<ItemHandle<M>, TransactionError> {
        let descriptor = operation::get_with_projection::<M>(hash_key, range_key, attributes)?;
        self.push(descriptor)
    }

    fn push<M: Model>(&mut self, descriptor: OperationDescriptor) -> Result<ItemHandle<M>, TransactionError> {
        let index = self.transaction.len();
        self.transaction.append(descriptor)?;
        Ok(ItemHandle::new(index))
    }

    /// Append a hand-built descriptor.
    pub fn append(&mut self, descriptor: OperationDescriptor) -> Result<(), TransactionError> {
        self.transaction.append(descriptor)
    }

    /// Abandon the transaction without contacting the store.
    pub fn discard(mut self) {
        self.transaction.discard();
    }

    /// Send all requests in one `TransactGetItems` call.
    pub async fn commit(mut self) -> Result<TransactGetResult, TransactionError> {
        let operations = self.transaction.begin_commit()?;
        if operations.is_empty() {
            self.transaction.finish_commit(true);
            return Ok(TransactGetResult::default());
        }

        let expected = operations.len();
        let input = TransactGetItemsInput {
            transact_items: operations
                .into_iter()
                .filter_map(OperationDescriptor::into_get_item)
                .collect(),
            return_consumed_capacity: self.config.consumed_capacity_flag(),
        };
        debug!(
            operation = %DynamoDBOperation::TransactGetItems,
            items = expected,
            "committing transaction"
        );

        let output = match self.connection.transact_get_items(input).await {
            Ok(output) => output,
            Err(err) => {
                debug!(
                    operation = %DynamoDBOperation::TransactGetItems,
                    error = %err,
                    "transaction failed"
                );
                self.transaction.finish_commit(false);
                return Err(err.into());
            }
        };
        if output.responses.len() != expected {
            self.transaction.finish_commit(false);
            return Err(DynamoDBError::internal_error(format!(
                "expected {expected} responses, got {}",
                output.responses.len()
            ))
            .into());
        }

        self.transaction.finish_commit(true);
        debug!(
            operation = %DynamoDBOperation::TransactGetItems,
            items = expected,
            "transaction committed"
        );
        Ok(TransactGetResult {
            items: output.responses.into_iter().map(|r| r.item).collect(),
            consumed_capacity: output.consumed_capacity,
        })
    }
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Store metadata returned by a committed [`TransactWrite`].
#[derive(Debug, Clone, Default)]
pub struct TransactWriteResult {
    /// Capacity reported by the store, if requested.
    pub consumed_capacity: Vec<ConsumedCapacity>,
    /// Item collection metrics per table, if requested.
    pub item_collection_metrics: BTreeMap<String, Vec<ItemCollectionMetrics>>,
}

/// A write transaction.
pub struct TransactWrite<'c> {
    connection: &'c dyn Connection,
    config: TransactionConfig,
    transaction: Transaction,
}

impl fmt::Debug for TransactWrite<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactWrite")
            .field("config", &self.config)
            .field("transaction", &self.transaction)
            .finish_non_exhaustive()
    }
}

impl<'c> TransactWrite<'c> {
    /// Open a write transaction on `connection`.
    #[must_use]
    pub fn new(connection: &'c dyn Connection, config: TransactionConfig) -> Self {
        Self {
            connection,
            config,
            transaction: Transaction::new(OperationKind::Write),
        }
    }

    /// Run `body` against a new write transaction and commit it if the body
    /// succeeds. On error the transaction is discarded without a store call.
    pub async fn run<T, F>(
        connection: &'c dyn Connection,
        config: TransactionConfig,
        body: F,
    ) -> Result<(T, TransactWriteResult), TransactionError>
    where
        F: FnOnce(&mut Self) -> Result<T, TransactionError>,
    {
        let mut tx = Self::new(connection, config);
        match body(&mut tx) {
            Ok(value) => Ok((value, tx.commit().await?)),
            Err(err) => {
                tx.discard();
                Err(err)
            }
        }
    }

    /// The current lifecycle state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.transaction.state()
    }

    /// The operations appended so far.
    #[must_use]
    pub fn operations(&self) -> &[OperationDescriptor] {
        self.transaction.operations()
    }

    /// Require `condition` to hold on the item of `M` with the given key.
    pub fn condition_check<M: Model>(
        &mut self,
        hash_key: impl Into<Value>,
        range_key: Option<Value>,
        condition: Option<Condition>,
        return_values: Option<ReturnValuesOnConditionCheckFailure>,
    ) -> Result<(), TransactionError> {
        let descriptor = operation::condition_check::<M>(hash_key, range_key, condition, return_values)?;
        self.transaction.append(descriptor)
    }

    /// Delete `model`'s item.
    pub fn delete<M: Model>(
        &mut self,
        model: &M,
        condition: Option<Condition>,
        return_values: Option<ReturnValuesOnConditionCheckFailure>,
    ) -> Result<(), TransactionError> {
        let descriptor = operation::delete(model, condition, return_values)?;
        self.transaction.append(descriptor)
    }

    /// Write `model` and advance its version.
    ///
    /// The version stays advanced if the transaction is later discarded or
    /// fails, so reload `model` before retrying.
    pub fn put<M: Model>(
        &mut self,
        model: &mut M,
        condition: Option<Condition>,
        return_values: Option<ReturnValuesOnConditionCheckFailure>,
    ) -> Result<(), TransactionError> {
        let prepared = operation::put(&*model, condition, return_values)?;
        self.accept(prepared, model)
    }

    /// Apply `actions` to `model`'s item and advance its version.
    ///
    /// The actions are not applied to `model` itself. As with [`Self::put`],
    /// the version is not rolled back if the write never commits.
    pub fn update<M: Model>(
        &mut self,
        model: &mut M,
        actions: &[UpdateAction],
        condition: Option<Condition>,
        return_values: Option<ReturnValuesOnConditionCheckFailure>,
    ) -> Result<(), TransactionError> {
        let prepared = operation::update(&*model, actions, condition, return_values)?;
        self.accept(prepared, model)
    }

    fn accept<M: Model>(&mut self, prepared: PreparedWrite, model: &mut M) -> Result<(), TransactionError> {
        self.transaction.append(prepared.descriptor)?;
        if let Some(version) = prepared.next_version {
            model.set_version(version);
        }
        Ok(())
    }

    /// Append a hand-built descriptor.
    pub fn append(&mut self, descriptor: OperationDescriptor) -> Result<(), TransactionError> {
        self.transaction.append(descriptor)
    }

    /// Abandon the transaction without contacting the store.
    pub fn discard(mut self) {
        self.transaction.discard();
    }

    /// Send all writes in one `TransactWriteItems` call.
    ///
    /// Members are grouped as condition checks, deletes, puts, then updates,
    /// each group in append order.
    pub async fn commit(mut self) -> Result<TransactWriteResult, TransactionError> {
        let operations = self.transaction.begin_commit()?;
        if operations.is_empty() {
            self.transaction.finish_commit(true);
            return Ok(TransactWriteResult::default());
        }

        let count = operations.len();
        let input = TransactWriteItemsInput {
            transact_items: bucket(operations),
            client_request_token: self.config.request_token(),
            return_consumed_capacity: self.config.consumed_capacity_flag(),
            return_item_collection_metrics: self.config.item_collection_metrics_flag(),
        };
        debug!(
            operation = %DynamoDBOperation::TransactWriteItems,
            items = count,
            "committing transaction"
        );

        match self.connection.transact_write_items(input).await {
            Ok(output) => {
                self.transaction.finish_commit(true);
                debug!(
                    operation = %DynamoDBOperation::TransactWriteItems,
                    items = count,
                    "transaction committed"
                );
                Ok(TransactWriteResult {
                    consumed_capacity: output.consumed_capacity,
                    item_collection_metrics: output.item_collection_metrics,
                })
            }
            Err(err) => {
                debug!(
                    error = %err,
                    operation = %DynamoDBOperation::TransactWriteItems,
                    reasons = err.cancellation_reasons.len(),
                    "transaction failed"
                );
                self.transaction.finish_commit(false);
                Err(err.into())
            }
        }
    }
}

fn bucket(operations: Vec<OperationDescriptor>) -> Vec<TransactWriteItem> {
    let mut checks = Vec::new();
    let mut deletes = Vec::new();
    let mut puts = Vec::new();
    let mut updates = Vec::new();
    for operation in operations {
        match operation {
            OperationDescriptor::ConditionCheck(op) => checks.push(op.into()),
            OperationDescriptor::Delete(op) => deletes.push(op.into()),
            OperationDescriptor::Put(op) => puts.push(op.into()),
            OperationDescriptor::Update(op) => updates.push(op.into()),
            OperationDescriptor::Get(_) => {}
        }
    }
    checks
        .into_iter()
        .chain(deletes)
        .chain(puts)
        .chain(updates)
        .collect()
}
