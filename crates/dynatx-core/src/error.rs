//! Error types for transaction building and commit.

use dynatx_model::error::DynamoDBError;

use crate::expression::ExpressionError;
use crate::operation::OperationKind;
use crate::schema::SchemaError;
use crate::serializer::SerializeError;
use crate::transaction::TransactionState;

/// Misuse of the transaction API, detected before any network call.
#[derive(Debug, thiserror::Error)]
pub enum UsageError {
    /// `condition_check` was called without a condition.
    #[error("condition_check requires a condition")]
    MissingCondition,
    /// A read was added to a write transaction or the other way round.
    #[error("cannot add a {found} operation to a {expected} transaction")]
    MixedOperationKinds {
        /// The transaction's kind.
        expected: OperationKind,
        /// The rejected operation's kind.
        found: OperationKind,
    },
    /// The transaction was already committed, failed or discarded.
    #[error("transaction is {state}, not open")]
    NotOpen {
        /// The transaction's current state.
        state: TransactionState,
    },
}

/// Errors returned by transaction operations and commits.
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    /// The API was used incorrectly.
    #[error(transparent)]
    Usage(#[from] UsageError),
    /// A model or key could not be serialized.
    #[error(transparent)]
    Serialize(#[from] SerializeError),
    /// A condition, update or projection could not be compiled.
    #[error(transparent)]
    Expression(#[from] ExpressionError),
    /// Table metadata is malformed.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// The store rejected the transaction.
    #[error("store error: {0}")]
    Store(#[from] DynamoDBError),
    /// A get handle resolved to an item that does not exist.
    #[error("item does not exist in table {table}")]
    DoesNotExist {
        /// The table that was read.
        table: String,
    },
    /// A returned item could not be turned back into a model.
    #[error("failed to hydrate item from table {table}: {source}")]
    Hydrate {
        /// The table that was read.
        table: String,
        /// The underlying conversion error.
        #[source]
        source: SerializeError,
    },
}

impl TransactionError {
    /// Returns `true` for API misuse.
    #[must_use]
    pub fn is_usage_error(&self) -> bool {
        matches!(self, Self::Usage(_))
    }

    /// Returns `true` for errors reported by the store.
    #[must_use]
    pub fn is_store_error(&self) -> bool {
        matches!(self, Self::Store(_))
    }

    /// Returns `true` when the store cancelled the transaction because a
    /// condition did not hold.
    #[must_use]
    pub fn is_conditional_check_failed(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_conditional_check_failed())
    }

    /// The store error, if this is one.
    #[must_use]
    pub fn store_error(&self) -> Option<&DynamoDBError> {
        match self {
            Self::Store(e) => Some(e),
            _ => None,
        }
    }
}
