//! Transaction configuration.

use std::env;

use dynatx_model::types::{ReturnConsumedCapacity, ReturnItemCollectionMetrics};

/// Per-transaction request options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionConfig {
    /// Capacity reporting requested from the store.
    pub return_consumed_capacity: ReturnConsumedCapacity,
    /// Item collection metrics requested for writes.
    pub return_item_collection_metrics: ReturnItemCollectionMetrics,
    /// Idempotency token sent with writes.
    pub client_request_token: Option<String>,
    /// Generate a random token for writes that have none.
    pub generate_request_token: bool,
}

impl TransactionConfig {
    /// Create configuration from environment variables.
    ///
    /// Unparseable values fall back to the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            return_consumed_capacity: env_parse("DYNATX_RETURN_CONSUMED_CAPACITY"),
            return_item_collection_metrics: env_parse("DYNATX_RETURN_ITEM_COLLECTION_METRICS"),
            client_request_token: None,
            generate_request_token: env_bool("DYNATX_GENERATE_REQUEST_TOKEN", false),
        }
    }

    /// Request consumed capacity reporting.
    #[must_use]
    pub fn with_return_consumed_capacity(mut self, value: ReturnConsumedCapacity) -> Self {
        self.return_consumed_capacity = value;
        self
    }

    /// Request item collection metrics on writes.
    #[must_use]
    pub fn with_return_item_collection_metrics(mut self, value: ReturnItemCollectionMetrics) -> Self {
        self.return_item_collection_metrics = value;
        self
    }

    /// Send `token` as the write idempotency token.
    #[must_use]
    pub fn with_client_request_token(mut self, token: impl Into<String>) -> Self {
        self.client_request_token = Some(token.into());
        self
    }

    /// Generate a random idempotency token when none is set.
    #[must_use]
    pub fn with_generated_request_token(mut self, enabled: bool) -> Self {
        self.generate_request_token = enabled;
        self
    }

    /// The token to send with a write, generating one if configured.
    #[must_use]
    pub fn request_token(&self) -> Option<String> {
        self.client_request_token.clone().or_else(|| {
            self.generate_request_token
                .then(|| uuid::Uuid::new_v4().to_string())
        })
    }

    pub(crate) fn consumed_capacity_flag(&self) -> Option<ReturnConsumedCapacity> {
        self.return_consumed_capacity
            .should_report()
            .then_some(self.return_consumed_capacity)
    }

    pub(crate) fn item_collection_metrics_flag(&self) -> Option<ReturnItemCollectionMetrics> {
        self.return_item_collection_metrics
            .should_report()
            .then_some(self.return_item_collection_metrics)
    }
}

fn env_parse<T: std::str::FromStr + Default>(key: &str) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or_default()
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key).map_or(default, |v| {
        matches!(v.as_str(), "1" | "true" | "yes" | "TRUE" | "YES")
    })
}
