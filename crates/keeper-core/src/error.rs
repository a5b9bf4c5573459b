//! # Error Types
//!
//! Domain-specific error types for keeper-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  keeper-core errors (this file)                                        │
//! │  ├── CoreError        - Lifecycle precondition failures                │
//! │  ├── ValidationError  - A single input rule failure                    │
//! │  └── FieldErrors      - Field-addressable collection of messages       │
//! │                                                                         │
//! │  keeper-db errors (separate crate)                                     │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  keeper-service errors                                                 │
//! │  └── ServiceError     - What the caller sees (envelope)                │
//! │                                                                         │
//! │  Flow: ValidationError → FieldErrors → CoreError → ServiceError        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

// =============================================================================
// Core Error
// =============================================================================

/// Lifecycle errors raised by the pure transition functions.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Checkout precondition failed.
    ///
    /// ## When This Occurs
    /// - Asset is already assigned to someone or something
    /// - Asset is archived
    /// - Asset is soft-deleted
    #[error("Asset {asset_tag} is not available for checkout")]
    NotAvailable { asset_tag: String },

    /// Checkin precondition failed: nothing is assigned.
    #[error("Asset {asset_tag} is already checked in")]
    AlreadyCheckedIn { asset_tag: String },

    /// An asset was offered as its own checkout target.
    #[error("Asset {asset_tag} cannot be checked out to itself")]
    SelfCheckout { asset_tag: String },

    /// One or more fields failed validation.
    #[error("Validation failed: {0}")]
    Validation(#[from] FieldErrors),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors for a single field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format (e.g., invalid UUID, invalid date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value (e.g., duplicate asset tag).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },

    /// Referenced record does not exist.
    #[error("The selected {field} is invalid")]
    UnknownReference { field: String },
}

impl ValidationError {
    /// The field this error is addressed to.
    pub fn field(&self) -> &str {
        match self {
            ValidationError::Required { field }
            | ValidationError::TooLong { field, .. }
            | ValidationError::OutOfRange { field, .. }
            | ValidationError::InvalidFormat { field, .. }
            | ValidationError::Duplicate { field, .. }
            | ValidationError::UnknownReference { field } => field,
        }
    }
}

// =============================================================================
// Field Errors
// =============================================================================

/// Field-addressable validation messages, `field -> [messages]`.
///
/// Serializes as a plain JSON object so the web layer can render it next to
/// the offending inputs:
/// ```json
/// { "asset_tag": ["asset_tag is required"] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        FieldErrors::default()
    }

    /// Adds a message under `field`.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    /// Records a validation error under its own field.
    pub fn push(&mut self, err: ValidationError) {
        let field = err.field().to_string();
        self.add(field, err.to_string());
    }

    /// Records the error of a validation result, if any.
    pub fn check<T>(&mut self, result: Result<T, ValidationError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.push(err);
                None
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Messages recorded for one field.
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// `Ok(())` when nothing was recorded, otherwise `Err(self)`.
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl From<ValidationError> for FieldErrors {
    fn from(err: ValidationError) -> Self {
        let mut errors = FieldErrors::new();
        errors.push(err);
        errors
    }
}

impl From<ValidationError> for CoreError {
    fn from(err: ValidationError) -> Self {
        CoreError::Validation(err.into())
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for messages in self.0.values() {
            for message in messages {
                if !first {
                    write!(f, "; ")?;
                }
                write!(f, "{}", message)?;
                first = false;
            }
        }
        Ok(())
    }
}

impl std::error::Error for FieldErrors {}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
