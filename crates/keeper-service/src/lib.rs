//! # keeper-service: Orchestration Layer for Keeper
//!
//! Runs each asset operation on behalf of an explicit actor: authorize,
//! load, apply the lifecycle rule, persist, notify, answer.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Keeper Request Flow                              │
//! │                                                                         │
//! │  caller (HTTP layer, CLI, job)  ── Actor + input ──┐                   │
//! │                                                     ▼                   │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  keeper-service (THIS CRATE)                    │   │
//! │  │                                                                 │   │
//! │  │   AuthorizationGate ──► AssetService ──► NotificationDispatcher │   │
//! │  │        (gate.rs)        (service.rs)          (notify.rs)       │   │
//! │  │                              │                                  │   │
//! │  │                              ▼                                  │   │
//! │  │                    ApiResponse (envelope.rs)                    │   │
//! │  └──────────────────────────────┬──────────────────────────────────┘   │
//! │                                 │                                       │
//! │              ┌──────────────────┴──────────────────┐                    │
//! │              ▼                                     ▼                    │
//! │        keeper-core                            keeper-db                 │
//! │   lifecycle rules, queries               SQLite store, action log       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`service`] - `AssetService`, one method per operation
//! - [`gate`] - Authorization seam and a static permission table
//! - [`notify`] - Checkin confirmation dispatch
//! - [`envelope`] - `{status, payload, messages}` result shape
//! - [`error`] - Service errors and their codes
//! - [`config`] - Site settings from the environment
//! - [`messages`] - User-facing message strings

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod envelope;
pub mod error;
pub mod gate;
pub mod messages;
pub mod notify;
pub mod service;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ConfigError, ServiceConfig};
pub use envelope::{ApiResponse, AssetPage, AssetTagPayload, AuditPayload, Messages, ResponseStatus};
pub use error::{ErrorCode, Lookup, ServiceError, ServiceResult};
pub use gate::{Action, AuthorizationGate, PermissionTable, Resource};
pub use notify::{CheckinMail, LogDispatcher, NotificationDispatcher, NotifyError, Recipient};
pub use service::{AssetService, AuditInput};
