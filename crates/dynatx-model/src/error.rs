//! DynamoDB error types.
//!
//! DynamoDB errors use JSON format with a `__type` field containing the
//! fully-qualified error type name. A canceled transaction additionally
//! carries one `CancellationReason` per transact item, in request order.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::Item;

const DYNAMODB: &str = "com.amazonaws.dynamodb.v20120810#";

macro_rules! error_codes {
    ($($(#[$doc:meta])* $code:ident => $namespace:expr,)+) => {
        /// Well-known DynamoDB error codes.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        #[non_exhaustive]
        pub enum DynamoDBErrorCode {
            $($(#[$doc])* $code,)+
        }

        impl DynamoDBErrorCode {
            const ALL: &'static [(Self, &'static str, &'static str)] =
                &[$((Self::$code, stringify!($code), $namespace),)+];

            // ALL is in declaration order, so the discriminant is the index.
            fn entry(self) -> (Self, &'static str, &'static str) {
                Self::ALL[self as usize]
            }
        }
    };
}

error_codes! {
    /// Table not found.
    ResourceNotFoundException => DYNAMODB,
    /// Condition check failed.
    ConditionalCheckFailedException => DYNAMODB,
    /// Transaction canceled.
    TransactionCanceledException => DYNAMODB,
    /// Transaction conflict.
    TransactionConflictException => DYNAMODB,
    /// Transaction in progress.
    TransactionInProgressException => DYNAMODB,
    /// Idempotent parameter mismatch.
    IdempotentParameterMismatchException => DYNAMODB,
    /// Item collection size limit exceeded.
    ItemCollectionSizeLimitExceededException => DYNAMODB,
    /// Provisioned throughput exceeded.
    ProvisionedThroughputExceededException => DYNAMODB,
    /// Request limit exceeded.
    RequestLimitExceeded => DYNAMODB,
    /// Validation error.
    #[default]
    ValidationException => "com.amazon.coral.validate#",
    /// Serialization error.
    SerializationException => DYNAMODB,
    /// Internal server error.
    InternalServerError => DYNAMODB,
    /// Access denied.
    AccessDeniedException => DYNAMODB,
    /// The request never reached the service or its response was lost.
    TransportError => "",
}

impl DynamoDBErrorCode {
    /// The short error code, e.g. `TransactionCanceledException`.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        self.entry().1
    }

    /// The namespace-qualified `__type` value of an error response.
    #[must_use]
    pub fn error_type(&self) -> String {
        let (_, name, namespace) = self.entry();
        format!("{namespace}{name}")
    }

    /// Parse the `__type` field of an error response.
    ///
    /// Accepts both the qualified form and the bare code. Client-side codes
    /// are never parsed.
    #[must_use]
    pub fn from_error_type(error_type: &str) -> Option<Self> {
        let short = error_type.rsplit('#').next().unwrap_or(error_type);
        Self::ALL
            .iter()
            .find(|(_, name, namespace)| !namespace.is_empty() && *name == short)
            .map(|(code, _, _)| *code)
    }
}

impl fmt::Display for DynamoDBErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a single transact item caused a transaction to be canceled.
///
/// The code is `None` (wire value `"None"`) for items that did not fail.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CancellationReason {
    /// Reason code, e.g. `ConditionalCheckFailed` or `None`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Human-readable message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// The item as it was before the write, if `ALL_OLD` was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<Item>,
}

impl CancellationReason {
    /// Returns `true` if this item failed its condition expression.
    #[must_use]
    pub fn is_conditional_check_failed(&self) -> bool {
        self.code.as_deref() == Some("ConditionalCheckFailed")
    }
}

/// A DynamoDB error response.
#[derive(Debug)]
pub struct DynamoDBError {
    /// The error code.
    pub code: DynamoDBErrorCode,
    /// A human-readable error message.
    pub message: String,
    /// Per-item reasons of a `TransactionCanceledException`.
    pub cancellation_reasons: Vec<CancellationReason>,
    /// The underlying source error, if any.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for DynamoDBError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DynamoDBError({}): {}", self.code, self.message)
    }
}

impl std::error::Error for DynamoDBError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl DynamoDBError {
    /// Create a new `DynamoDBError` from an error code.
    #[must_use]
    pub fn new(code: DynamoDBErrorCode) -> Self {
        Self {
            message: code.as_str().to_owned(),
            code,
            cancellation_reasons: Vec::new(),
            source: None,
        }
    }

    /// Create a new `DynamoDBError` with a custom message.
    #[must_use]
    pub fn with_message(code: DynamoDBErrorCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code,
            cancellation_reasons: Vec::new(),
            source: None,
        }
    }

    /// Returns the `__type` string for the JSON error response.
    #[must_use]
    pub fn error_type(&self) -> String {
        self.code.error_type()
    }

    /// Returns `true` if any transact item failed its condition, or the error
    /// is itself a conditional check failure.
    #[must_use]
    pub fn is_conditional_check_failed(&self) -> bool {
        match self.code {
            DynamoDBErrorCode::ConditionalCheckFailedException => true,
            DynamoDBErrorCode::TransactionCanceledException => self
                .cancellation_reasons
                .iter()
                .any(CancellationReason::is_conditional_check_failed),
            _ => false,
        }
    }

    // -- Convenience constructors --

    /// Condition expression evaluated to false.
    #[must_use]
    pub fn conditional_check_failed(message: impl Into<String>) -> Self {
        Self::with_message(DynamoDBErrorCode::ConditionalCheckFailedException, message)
    }

    /// Transaction canceled, with one reason per transact item.
    #[must_use]
    pub fn transaction_canceled(
        message: impl Into<String>,
        reasons: Vec<CancellationReason>,
    ) -> Self {
        let mut err = Self::with_message(DynamoDBErrorCode::TransactionCanceledException, message);
        err.cancellation_reasons = reasons;
        err
    }

    /// Validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::with_message(DynamoDBErrorCode::ValidationException, message)
    }

    /// Internal server error.
    #[must_use]
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::with_message(DynamoDBErrorCode::InternalServerError, message)
    }

    /// The request could not be delivered.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::with_message(DynamoDBErrorCode::TransportError, message)
    }
}

/// Create a `DynamoDBError` from an error code.
///
/// # Examples
///
/// ```
/// use dynatx_model::dynamodb_error;
/// use dynatx_model::error::DynamoDBErrorCode;
///
/// let err = dynamodb_error!(ValidationException);
/// assert_eq!(err.code, DynamoDBErrorCode::ValidationException);
///
/// let err = dynamodb_error!(ResourceNotFoundException, "Table not found");
/// assert_eq!(err.message, "Table not found");
/// ```
#[macro_export]
macro_rules! dynamodb_error {
    ($code:ident) => {
        $crate::error::DynamoDBError::new($crate::error::DynamoDBErrorCode::$code)
    };
    ($code:ident, $msg:expr) => {
        $crate::error::DynamoDBError::with_message($crate::error::DynamoDBErrorCode::$code, $msg)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_parse_qualified_error_type() {
        let code = DynamoDBErrorCode::from_error_type(
            "com.amazonaws.dynamodb.v20120810#TransactionCanceledException",
        );
        assert_eq!(code, Some(DynamoDBErrorCode::TransactionCanceledException));
        assert_eq!(
            DynamoDBErrorCode::from_error_type("ValidationException"),
            Some(DynamoDBErrorCode::ValidationException)
        );
        assert_eq!(DynamoDBErrorCode::from_error_type("Bogus"), None);
        assert_eq!(DynamoDBErrorCode::from_error_type("TransportError"), None);
    }

    #[test]
    fn test_should_qualify_error_type_by_namespace() {
        assert_eq!(
            DynamoDBError::transaction_canceled("cancelled", Vec::new()).error_type(),
            "com.amazonaws.dynamodb.v20120810#TransactionCanceledException"
        );
        assert_eq!(
            DynamoDBErrorCode::ValidationException.error_type(),
            "com.amazon.coral.validate#ValidationException"
        );
        assert_eq!(DynamoDBErrorCode::TransportError.error_type(), "TransportError");
        assert_eq!(DynamoDBErrorCode::default(), DynamoDBErrorCode::ValidationException);
    }

    #[test]
    fn test_should_detect_conditional_failure_in_cancellation_reasons() {
        let err = DynamoDBError::transaction_canceled(
            "Transaction cancelled",
            vec![
                CancellationReason {
                    code: Some("None".to_owned()),
                    ..Default::default()
                },
                CancellationReason {
                    code: Some("ConditionalCheckFailed".to_owned()),
                    message: Some("The conditional request failed".to_owned()),
                    item: None,
                },
            ],
        );
        assert!(err.is_conditional_check_failed());
        assert!(!DynamoDBError::validation("bad").is_conditional_check_failed());
    }

    #[test]
    fn test_should_deserialize_cancellation_reason() {
        let reason: CancellationReason =
            serde_json::from_str(r#"{"Code":"ConditionalCheckFailed","Message":"failed"}"#)
                .unwrap();
        assert!(reason.is_conditional_check_failed());
        assert!(reason.item.is_none());
    }

    #[test]
    fn test_should_display_code_and_message() {
        let err = DynamoDBError::transport("connection reset");
        assert_eq!(err.to_string(), "DynamoDBError(TransportError): connection reset");
    }
}
