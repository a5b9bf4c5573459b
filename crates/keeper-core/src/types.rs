//! # Domain Types
//!
//! Core domain types used throughout Keeper.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Asset       │   │   AssetModel    │   │    LogEntry     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  asset_tag      │──►│  fieldset       │   │  action         │       │
//! │  │  assigned_to    │   │  checkin_email  │   │  item_id (FK)   │       │
//! │  │  custom_fields  │   └─────────────────┘   │  target         │       │
//! │  └─────────────────┘                         └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ CheckoutTarget  │   │  StatusLabel    │   │     Actor       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  User           │   │  deployable     │   │  id             │       │
//! │  │  Asset          │   │  pending        │   │  company_id     │       │
//! │  │  Location       │   │  archived       │   │  is_superuser   │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every asset has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - `asset_tag`: human-readable label printed on the sticker, used by audits

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Asset
// =============================================================================

/// A tracked piece of hardware.
///
/// `assigned_to`, `assigned_type` and `last_checkout` are either all set
/// (checked out) or all `None` (available).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Asset {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name; may be empty, in which case the tag is shown.
    pub name: Option<String>,

    /// Business identifier printed on the asset.
    pub asset_tag: String,

    pub serial: Option<String>,
    pub notes: Option<String>,
    pub order_number: Option<String>,

    pub model_id: String,
    pub status_id: String,
    pub company_id: Option<String>,
    pub supplier_id: Option<String>,

    /// Default ("ready to deploy") location the asset returns to on checkin.
    pub rtd_location_id: Option<String>,

    /// Where the asset currently is.
    pub location_id: Option<String>,

    /// Archived assets are never available for checkout.
    pub archived: bool,

    /// Whether end users may request this asset.
    pub requestable: bool,

    pub purchase_cost: Option<Money>,
    #[ts(as = "Option<String>")]
    pub purchase_date: Option<NaiveDate>,
    pub warranty_months: Option<i64>,

    /// Id of the current assignee (user, asset or location).
    pub assigned_to: Option<String>,
    pub assigned_type: Option<TargetKind>,

    /// Whether the assignee accepted the asset; reset on every transition.
    pub accepted: Option<bool>,

    #[ts(as = "Option<String>")]
    pub last_checkout: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub expected_checkin: Option<NaiveDate>,
    #[ts(as = "Option<String>")]
    pub next_audit_date: Option<NaiveDate>,

    /// Values for the model's fieldset, keyed by column name.
    pub custom_fields: BTreeMap<String, String>,

    /// Actor who created the record.
    pub created_by: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,

    /// Soft-delete marker. Deleted assets stay readable by id and tag.
    #[ts(as = "Option<String>")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Asset {
    /// Current position in the assignment state machine.
    pub fn assignment_state(&self) -> AssignmentState {
        if self.assigned_to.is_some() {
            AssignmentState::CheckedOut
        } else {
            AssignmentState::Available
        }
    }

    /// Not assigned, not archived and not deleted.
    pub fn is_available_for_checkout(&self) -> bool {
        self.assigned_to.is_none() && !self.archived && !self.is_deleted()
    }

    #[inline]
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// The current assignee, if any.
    pub fn assigned_target(&self) -> Option<TargetRef> {
        match (&self.assigned_to, self.assigned_type) {
            (Some(id), Some(kind)) => Some(TargetRef {
                kind,
                id: id.clone(),
            }),
            _ => None,
        }
    }

    /// Name shown to people: the name when set, otherwise the tag.
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.asset_tag,
        }
    }
}

// =============================================================================
// Assignment State
// =============================================================================

/// The two states of the assignment state machine.
///
/// ```text
///              check_out (guard: available)
///   Available ─────────────────────────────► CheckedOut
///       ▲                                         │
///       └──────────────────────────────────────────┘
///              check_in (guard: has target)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentState {
    Available,
    CheckedOut,
}

// =============================================================================
// Checkout Targets
// =============================================================================

/// Which kind of thing an asset is assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    User,
    Asset,
    Location,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::User => write!(f, "user"),
            TargetKind::Asset => write!(f, "asset"),
            TargetKind::Location => write!(f, "location"),
        }
    }
}

/// An unresolved reference to a checkout target: kind plus id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TargetRef {
    pub kind: TargetKind,
    pub id: String,
}

/// A person assets can be checked out to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct User {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub company_id: Option<String>,
    pub location_id: Option<String>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// A physical place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Location {
    pub id: String,
    pub name: String,
}

/// The parent asset in an asset-to-asset checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ParentAsset {
    pub id: String,
    pub asset_tag: String,
    pub location_id: Option<String>,
}

/// A fully loaded checkout target.
///
/// Lifecycle operations take the target as a value so they never need to
/// fetch anything on their own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CheckoutTarget {
    User(User),
    Asset(ParentAsset),
    Location(Location),
}

impl CheckoutTarget {
    pub fn kind(&self) -> TargetKind {
        match self {
            CheckoutTarget::User(_) => TargetKind::User,
            CheckoutTarget::Asset(_) => TargetKind::Asset,
            CheckoutTarget::Location(_) => TargetKind::Location,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            CheckoutTarget::User(user) => &user.id,
            CheckoutTarget::Asset(asset) => &asset.id,
            CheckoutTarget::Location(location) => &location.id,
        }
    }

    pub fn to_ref(&self) -> TargetRef {
        TargetRef {
            kind: self.kind(),
            id: self.id().to_string(),
        }
    }

    /// Where a checked-out asset ends up: the location itself, the user's
    /// location, or the parent asset's location.
    pub fn implied_location_id(&self) -> Option<&str> {
        match self {
            CheckoutTarget::User(user) => user.location_id.as_deref(),
            CheckoutTarget::Asset(asset) => asset.location_id.as_deref(),
            CheckoutTarget::Location(location) => Some(&location.id),
        }
    }
}

// =============================================================================
// Models & Custom Fields
// =============================================================================

/// A custom attribute declared by a fieldset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CustomFieldDef {
    pub id: String,
    /// Label shown in forms.
    pub name: String,
    /// Key used in `Asset::custom_fields`, the query filter and sort.
    pub column: String,
    pub required: bool,
}

/// Ordered list of custom fields an asset model exposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Fieldset {
    pub id: String,
    pub name: String,
    pub fields: Vec<CustomFieldDef>,
}

/// The make/model an asset is an instance of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AssetModel {
    pub id: String,
    pub name: String,
    pub model_number: Option<String>,
    pub category_id: Option<String>,
    pub manufacturer_id: Option<String>,
    /// Send a confirmation mail to the user when an asset is checked in.
    pub checkin_email: bool,
    pub fieldset: Option<Fieldset>,
}

impl AssetModel {
    /// Custom fields of the model's fieldset, empty when it has none.
    pub fn custom_fields(&self) -> &[CustomFieldDef] {
        self.fieldset
            .as_ref()
            .map(|f| f.fields.as_slice())
            .unwrap_or(&[])
    }
}

// =============================================================================
// Status Labels
// =============================================================================

/// A named status. The three flags drive the status buckets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StatusLabel {
    pub id: String,
    pub name: String,
    pub deployable: bool,
    pub pending: bool,
    pub archived: bool,
}

// =============================================================================
// Action Log
// =============================================================================

/// What happened to an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum LogAction {
    Create,
    Update,
    Checkout,
    Checkin,
    Audit,
    Delete,
}

/// An immutable row of the asset's history.
///
/// Entries are only ever appended. The audit variant carries the location
/// the asset was seen at and the next audit date that was scheduled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct LogEntry {
    pub id: String,
    pub action: LogAction,
    /// The asset this entry is about.
    pub item_id: String,
    pub target_type: Option<TargetKind>,
    pub target_id: Option<String>,
    pub actor_id: Option<String>,
    pub note: Option<String>,
    pub location_id: Option<String>,
    #[ts(as = "Option<String>")]
    pub next_audit_date: Option<NaiveDate>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Actor
// =============================================================================

/// Who is performing an operation. Passed explicitly to every operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Actor {
    pub id: String,
    pub company_id: Option<String>,
    pub is_superuser: bool,
}

impl Actor {
    pub fn new(id: impl Into<String>) -> Self {
        Actor {
            id: id.into(),
            company_id: None,
            is_superuser: false,
        }
    }

    pub fn superuser(id: impl Into<String>) -> Self {
        Actor {
            id: id.into(),
            company_id: None,
            is_superuser: true,
        }
    }

    pub fn with_company(mut self, company_id: impl Into<String>) -> Self {
        self.company_id = Some(company_id.into());
        self
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
