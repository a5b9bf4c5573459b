//! # Result Envelope
//!
//! Every mutating operation answers with the same shape:
//!
//! ```json
//! { "status": "success", "payload": { "asset": "LPT-00042" }, "messages": "Asset checked out successfully." }
//! { "status": "error",   "payload": null, "messages": { "asset_tag": ["asset_tag is required"] } }
//! ```

use keeper_core::{Asset, FieldErrors};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use ts_rs::TS;

use crate::error::{Lookup, ServiceError};
use crate::messages;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

/// A plain message, or validation messages keyed by field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(untagged)]
pub enum Messages {
    Text(String),
    Fields(FieldErrors),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub status: ResponseStatus,
    pub payload: Option<T>,
    pub messages: Messages,
}

impl<T> ApiResponse<T> {
    pub fn success(payload: T, message: impl Into<String>) -> Self {
        ApiResponse {
            status: ResponseStatus::Success,
            payload: Some(payload),
            messages: Messages::Text(message.into()),
        }
    }

    /// Success for a read; reads carry no message.
    pub fn data(payload: T) -> Self {
        ApiResponse {
            status: ResponseStatus::Success,
            payload: Some(payload),
            messages: Messages::Text(String::new()),
        }
    }

    /// Success without a payload.
    pub fn done(message: impl Into<String>) -> Self {
        ApiResponse {
            status: ResponseStatus::Success,
            payload: None,
            messages: Messages::Text(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }
}

impl From<ServiceError> for ApiResponse<Value> {
    fn from(err: ServiceError) -> Self {
        let (payload, messages) = match err {
            ServiceError::Validation(errors) => (None, Messages::Fields(errors)),
            ServiceError::NotFound(Lookup::Id(_)) => {
                (None, Messages::Text(messages::ASSET_DOES_NOT_EXIST.to_string()))
            }
            ServiceError::NotFound(Lookup::Tag(tag)) => {
                let text = messages::tag_not_found(&tag);
                (Some(json!({ "asset_tag": tag })), Messages::Text(text))
            }
            ServiceError::NotAvailable { asset_tag } => (
                Some(json!({ "asset": asset_tag })),
                Messages::Text(messages::CHECKOUT_NOT_AVAILABLE.to_string()),
            ),
            ServiceError::AlreadyCheckedIn { asset_tag } => (
                Some(json!({ "asset": asset_tag })),
                Messages::Text(messages::CHECKIN_ALREADY_CHECKED_IN.to_string()),
            ),
            ServiceError::Conflict { asset_tag } => (
                Some(json!({ "asset": asset_tag })),
                Messages::Text(messages::UPDATE_CONFLICT.to_string()),
            ),
            ServiceError::AuthorizationDenied { .. } => {
                (None, Messages::Text(messages::UNAUTHORIZED.to_string()))
            }
            ServiceError::Store(message) => (None, Messages::Text(message)),
        };

        ApiResponse {
            status: ResponseStatus::Error,
            payload,
            messages,
        }
    }
}

// =============================================================================
// Payloads
// =============================================================================

/// One page of a listing plus the total before paging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AssetPage {
    pub total: i64,
    pub rows: Vec<Asset>,
}

/// Names the asset a checkout or checkin was about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AssetTagPayload {
    pub asset: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AuditPayload {
    pub asset_tag: String,
    pub note: Option<String>,
    /// When the following audit falls due.
    #[ts(as = "String")]
    pub next_audit_date: chrono::NaiveDate,
}
