//! # Repository Module
//!
//! Database repositories for Keeper.
//!
//! ## Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Repositories                                    │
//! │                                                                         │
//! │  keeper-service                                                        │
//! │       │                                                                 │
//! │       │  db.assets().check_out(&asset, &log)                           │
//! │       ▼                                                                 │
//! │  AssetRepository ──── writes state + log entry in one transaction      │
//! │       │                        │                                        │
//! │       │                        ▼                                        │
//! │       │               log::append (action_logs, append-only)           │
//! │       ▼                                                                 │
//! │  CatalogRepository ── models, fieldsets, users, locations, labels      │
//! │  LogRepository ────── history reads                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`asset::AssetRepository`] - Asset reads, guarded transitions and listing
//! - [`catalog::CatalogRepository`] - Reference data and checkout targets
//! - [`log::LogRepository`] - Action log reads

pub mod asset;
pub mod catalog;
pub mod log;
