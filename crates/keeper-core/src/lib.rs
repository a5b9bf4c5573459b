//! # keeper-core: Pure Business Logic for Keeper
//!
//! This crate holds the asset lifecycle rules of Keeper as pure functions
//! with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Keeper Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Web layer (outside this workspace)              │   │
//! │  │    routes, forms, templates, mail transport                     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 keeper-service (orchestration)                  │   │
//! │  │    authorize ──► load ──► transition ──► store ──► notify       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ keeper-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │ lifecycle │  │   query   │  │ validation│  │   │
//! │  │   │   Asset   │  │ check_out │  │  buckets  │  │   rules   │  │   │
//! │  │   │ LogEntry  │  │ check_in  │  │   sort    │  │ sanitize  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    keeper-db (Database Layer)                   │   │
//! │  │              SQLite queries, migrations, repositories           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Asset, AssetModel, LogEntry, CheckoutTarget, ...)
//! - [`lifecycle`] - Create, update, checkout, checkin, audit and delete transitions
//! - [`query`] - Listing parameters resolved into an [`query::AssetListQuery`]
//! - [`company`] - Multi-company scoping rules
//! - [`money`] - Purchase cost in integer cents
//! - [`error`] - Domain error types
//! - [`validation`] - Field rules and sanitizing
//!
//! ## Example Usage
//!
//! ```rust
//! use keeper_core::lifecycle::AssignmentRequest;
//! use keeper_core::TargetKind;
//!
//! // User wins over asset and location when several targets are given
//! let request = AssignmentRequest {
//!     assigned_user: Some("user-1".to_string()),
//!     assigned_asset: None,
//!     assigned_location: Some("loc-1".to_string()),
//! };
//! assert_eq!(request.resolve().unwrap().kind, TargetKind::User);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod company;
pub mod error;
pub mod lifecycle;
pub mod money;
pub mod query;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use company::CompanyScope;
pub use error::{CoreError, CoreResult, FieldErrors, ValidationError};
pub use money::Money;
pub use query::{AssetListQuery, ListParams, StatusBucket};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Page size when a listing does not ask for one.
pub const DEFAULT_LIST_LIMIT: i64 = 50;

/// Months between audits when the site does not configure an interval.
pub const DEFAULT_AUDIT_INTERVAL_MONTHS: u32 = 12;

/// Longest warranty accepted, in months (20 years).
pub const MAX_WARRANTY_MONTHS: i64 = 240;
