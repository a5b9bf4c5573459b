//! # Notification Dispatcher
//!
//! Delivery of the checkin confirmation mail. The service decides whether a
//! mail goes out and builds its payload; a dispatcher only delivers it.
//!
//! Dispatch happens after the checkin has been committed. A failed delivery
//! is logged and never undoes the checkin.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keeper_core::lifecycle::CheckinReceipt;
use keeper_core::User;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::messages;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Recipient {0} has no e-mail address")]
    NoAddress(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// Who receives a confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub email: String,
    pub name: String,
}

impl Recipient {
    pub fn for_user(user: &User) -> Result<Self, NotifyError> {
        let email = user
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| NotifyError::NoAddress(user.id.clone()))?;

        Ok(Recipient {
            email: email.to_string(),
            name: user.full_name(),
        })
    }
}

/// Template data for the checkin confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckinMail {
    pub subject: String,
    pub log_id: String,
    pub first_name: String,
    pub item_name: String,
    pub item_tag: String,
    pub item_serial: Option<String>,
    pub note: Option<String>,
    pub checkin_date: DateTime<Utc>,
}

impl From<&CheckinReceipt> for CheckinMail {
    fn from(receipt: &CheckinReceipt) -> Self {
        CheckinMail {
            subject: messages::CHECKIN_MAIL_SUBJECT.to_string(),
            log_id: receipt.log.id.clone(),
            first_name: receipt.first_name.clone(),
            item_name: receipt.item_name.clone(),
            item_tag: receipt.item_tag.clone(),
            item_serial: receipt.item_serial.clone(),
            note: receipt.note.clone(),
            checkin_date: receipt.checkin_date,
        }
    }
}

/// Delivers notifications produced by the service.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn send_checkin_confirmation(
        &self,
        recipient: &Recipient,
        mail: &CheckinMail,
    ) -> Result<(), NotifyError>;
}

/// Dispatcher that only writes a log event. Used where no mailer is wired.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDispatcher;

#[async_trait]
impl NotificationDispatcher for LogDispatcher {
    async fn send_checkin_confirmation(
        &self,
        recipient: &Recipient,
        mail: &CheckinMail,
    ) -> Result<(), NotifyError> {
        info!(
            to = %recipient.email,
            asset_tag = %mail.item_tag,
            log_id = %mail.log_id,
            "Checkin confirmation"
        );
        Ok(())
    }
}
