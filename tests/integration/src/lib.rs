//! End-to-end tests for dynatx transactions.
//!
//! Transactions are committed against a [`RecordingConnection`] that keeps
//! every request it receives and answers with scripted responses, so the
//! exact wire payloads can be asserted without a running store.
//!
//! ```text
//! cargo test -p dynatx-integration
//! ```

use std::collections::VecDeque;
use std::sync::{LazyLock, Once};

use dynatx_core::{AttributeType, Connection, Model, TableSchema};
use dynatx_model::error::DynamoDBError;
use dynatx_model::input::{TransactGetItemsInput, TransactWriteItemsInput};
use dynatx_model::output::{ItemResponse, TransactGetItemsOutput, TransactWriteItemsOutput};
use dynatx_model::types::Item;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

static INIT: Once = Once::new();

/// Initialize tracing (once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// A [`Connection`] that records requests and replays scripted answers.
#[derive(Debug, Default)]
pub struct RecordingConnection {
    gets: Mutex<Vec<TransactGetItemsInput>>,
    writes: Mutex<Vec<TransactWriteItemsInput>>,
    items: Mutex<VecDeque<Option<Item>>>,
    failure: Mutex<Option<DynamoDBError>>,
}

impl RecordingConnection {
    /// Create a connection with nothing scripted.
    #[must_use]
    pub fn new() -> Self {
        init_tracing();
        Self::default()
    }

    /// Answer the next read with `items`, one per requested key.
    #[must_use]
    pub fn with_items(self, items: impl IntoIterator<Item = Option<Item>>) -> Self {
        self.items.lock().extend(items);
        self
    }

    /// Fail the next call with `error`.
    #[must_use]
    pub fn with_failure(self, error: DynamoDBError) -> Self {
        *self.failure.lock() = Some(error);
        self
    }

    /// Every `TransactGetItems` request received so far.
    #[must_use]
    pub fn get_calls(&self) -> Vec<TransactGetItemsInput> {
        self.gets.lock().clone()
    }

    /// Every `TransactWriteItems` request received so far.
    #[must_use]
    pub fn write_calls(&self) -> Vec<TransactWriteItemsInput> {
        self.writes.lock().clone()
    }

    /// Total number of store calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.gets.lock().len() + self.writes.lock().len()
    }
}

#[async_trait::async_trait]
impl Connection for RecordingConnection {
    async fn transact_get_items(
        &self,
        input: TransactGetItemsInput,
    ) -> Result<TransactGetItemsOutput, DynamoDBError> {
        let requested = input.transact_items.len();
        self.gets.lock().push(input);
        if let Some(err) = self.failure.lock().take() {
            return Err(err);
        }
        let mut items = self.items.lock();
        let responses = (0..requested)
            .map(|_| ItemResponse {
                item: items.pop_front().flatten(),
            })
            .collect();
        Ok(TransactGetItemsOutput {
            responses,
            consumed_capacity: Vec::new(),
        })
    }

    async fn transact_write_items(
        &self,
        input: TransactWriteItemsInput,
    ) -> Result<TransactWriteItemsOutput, DynamoDBError> {
        self.writes.lock().push(input);
        match self.failure.lock().take() {
            Some(err) => Err(err),
            None => Ok(TransactWriteItemsOutput::default()),
        }
    }
}

/// Versioned model keyed by two numbers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MockModel {
    /// Hash key.
    pub mock_hash: u64,
    /// Range key.
    pub mock_range: u64,
    /// Free-form payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mock_toot: Option<String>,
    /// Optimistic-lock version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mock_version: Option<u64>,
}

impl MockModel {
    /// A model that was never written.
    #[must_use]
    pub fn new(mock_hash: u64, mock_range: u64) -> Self {
        Self {
            mock_hash,
            mock_range,
            ..Default::default()
        }
    }
}

static MOCK_SCHEMA: LazyLock<TableSchema> = LazyLock::new(|| {
    TableSchema::builder("mock")
        .hash_key("mock_hash", AttributeType::Number)
        .range_key("mock_range", AttributeType::Number)
        .nullable("mock_toot", AttributeType::String)
        .version("mock_version")
        .build()
        .expect("mock schema is valid")
});

impl Model for MockModel {
    fn schema() -> &'static TableSchema {
        &MOCK_SCHEMA
    }

    fn version(&self) -> Option<u64> {
        self.mock_version
    }

    fn set_version(&mut self, version: u64) {
        self.mock_version = Some(version);
    }
}

/// Unversioned model with a string hash key and richer attribute types.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Hash key.
    pub user_id: String,
    /// Display name.
    pub name: String,
    /// Tag set.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Login counter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logins: Option<i64>,
    /// Whether the account is active.
    #[serde(default)]
    pub active: bool,
}

static PROFILE_SCHEMA: LazyLock<TableSchema> = LazyLock::new(|| {
    TableSchema::builder("profiles")
        .hash_key("user_id", AttributeType::String)
        .attribute("name", AttributeType::String)
        .nullable("tags", AttributeType::StringSet)
        .nullable("logins", AttributeType::Number)
        .nullable("active", AttributeType::Boolean)
        .build()
        .expect("profile schema is valid")
});

impl Model for Profile {
    fn schema() -> &'static TableSchema {
        &PROFILE_SCHEMA
    }
}

mod test_read;
mod test_write;
