//! # Service Error Type
//!
//! Unified error type for every `AssetService` operation.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Keeper                                 │
//! │                                                                         │
//! │  AssetService::checkout(actor, id, ...)                                │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  Gate says no? ──────────── AuthorizationDenied ───────┐               │
//! │         │                                               │               │
//! │         ▼                                               │               │
//! │  CoreError::NotAvailable ── ServiceError::NotAvailable ─┤               │
//! │  CoreError::SelfCheckout ── ServiceError::Validation ───┤               │
//! │         │                                               │               │
//! │         ▼                                               ▼               │
//! │  DbError::UniqueViolation ─ ServiceError::Validation ── ApiResponse    │
//! │  DbError::QueryFailed ───── ServiceError::Store ──────► status: error  │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  Success ──────────────────────────────────────────────► status: success│
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;

use keeper_core::{CoreError, FieldErrors, ValidationError};
use keeper_db::DbError;
use serde::Serialize;
use thiserror::Error;

use crate::gate::Action;

/// How a missing asset was looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Id(String),
    Tag(String),
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookup::Id(id) => write!(f, "id {}", id),
            Lookup::Tag(tag) => write!(f, "tag {}", tag),
        }
    }
}

/// Errors returned by `AssetService`.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// One or more fields were rejected, by the rules or by a store
    /// constraint.
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    #[error("Asset not found by {0}")]
    NotFound(Lookup),

    /// Checkout precondition failed, including a lost checkout race.
    #[error("Asset {asset_tag} is not available for checkout")]
    NotAvailable { asset_tag: String },

    #[error("Asset {asset_tag} is already checked in")]
    AlreadyCheckedIn { asset_tag: String },

    /// The asset changed between loading it and writing the update.
    #[error("Asset {asset_tag} was changed by another request")]
    Conflict { asset_tag: String },

    /// The gate refused the operation. Nothing was changed.
    #[error("Not authorized to {action} assets")]
    AuthorizationDenied { action: Action },

    /// The store failed for a reason that is not the caller's fault.
    #[error("Store error: {0}")]
    Store(String),
}

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Input validation failed (422)
    ValidationError,

    /// Asset does not exist (404)
    NotFound,

    /// Asset cannot be checked out (409)
    NotAvailable,

    /// Asset is not checked out (409)
    AlreadyCheckedIn,

    /// Stale update (409)
    Conflict,

    /// Gate denied the operation (403)
    Forbidden,

    /// Store failure (500)
    StoreError,
}

impl ServiceError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ServiceError::Validation(_) => ErrorCode::ValidationError,
            ServiceError::NotFound(_) => ErrorCode::NotFound,
            ServiceError::NotAvailable { .. } => ErrorCode::NotAvailable,
            ServiceError::AlreadyCheckedIn { .. } => ErrorCode::AlreadyCheckedIn,
            ServiceError::Conflict { .. } => ErrorCode::Conflict,
            ServiceError::AuthorizationDenied { .. } => ErrorCode::Forbidden,
            ServiceError::Store(_) => ErrorCode::StoreError,
        }
    }

    /// A single-field validation error.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.add(field, message);
        ServiceError::Validation(errors)
    }
}

impl From<FieldErrors> for ServiceError {
    fn from(errors: FieldErrors) -> Self {
        ServiceError::Validation(errors)
    }
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        ServiceError::Validation(err.into())
    }
}

/// Converts database errors to service errors.
///
/// Constraint violations are the caller's fault and become field errors;
/// everything else is logged and surfaces with the store's message.
impl From<DbError> for ServiceError {
    fn from(err: DbError) -> Self {
        if let Some(errors) = err.field_errors() {
            return ServiceError::Validation(errors);
        }
        match err {
            DbError::NotFound { id, .. } => ServiceError::NotFound(Lookup::Id(id)),
            other => {
                tracing::error!(error = %other, "Store operation failed");
                ServiceError::Store(other.to_string())
            }
        }
    }
}

/// Converts lifecycle errors to service errors.
impl From<CoreError> for ServiceError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotAvailable { asset_tag } => ServiceError::NotAvailable { asset_tag },
            CoreError::AlreadyCheckedIn { asset_tag } => {
                ServiceError::AlreadyCheckedIn { asset_tag }
            }
            err @ CoreError::SelfCheckout { .. } => ServiceError::invalid("target", err.to_string()),
            CoreError::Validation(errors) => ServiceError::Validation(errors),
        }
    }
}

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_tag_becomes_field_error() {
        let err: ServiceError = DbError::duplicate("asset_tag", "TAG-1").into();

        assert_eq!(err.code(), ErrorCode::ValidationError);
        match err {
            ServiceError::Validation(errors) => assert!(errors.get("asset_tag").is_some()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_store_failure_keeps_message() {
        let err: ServiceError = DbError::QueryFailed("disk I/O error".to_string()).into();

        assert_eq!(err.code(), ErrorCode::StoreError);
        assert!(err.to_string().contains("disk I/O error"));
    }

    #[test]
    fn test_self_checkout_is_validation() {
        let err: ServiceError = CoreError::SelfCheckout {
            asset_tag: "TAG-1".to_string(),
        }
        .into();

        match err {
            ServiceError::Validation(errors) => assert!(errors.get("target").is_some()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_error_code_serialization() {
        assert_eq!(
            serde_json::to_string(&ErrorCode::AlreadyCheckedIn).unwrap(),
            "\"ALREADY_CHECKED_IN\""
        );
    }
}
