//! Transactional reads and writes for DynamoDB-style stores.
//!
//! Models declare their table through [`Model`] and a [`TableSchema`].
//! Operations on them are compiled into wire descriptors (key or item,
//! condition and update expressions with placeholders, optimistic-lock
//! guard) and collected by a [`TransactGet`] or [`TransactWrite`], which
//! submits them in a single call on commit.
#![allow(clippy::doc_markdown, clippy::module_name_repetitions)]

pub mod config;
pub mod connection;
pub mod error;
pub mod expression;
pub mod operation;
pub mod schema;
pub mod serializer;
pub mod transaction;
pub mod version;

pub use config::TransactionConfig;
pub use connection::Connection;
pub use error::{TransactionError, UsageError};
pub use expression::{Condition, ExpressionError, UpdateAction, attr};
pub use operation::{OperationDescriptor, OperationKind};
pub use schema::{AttributeType, Model, SchemaError, TableSchema};
pub use serializer::SerializeError;
pub use transaction::{
    ItemHandle, TransactGet, TransactGetResult, TransactWrite, TransactWriteResult, Transaction,
    TransactionState,
};
