//! # keeper-db: Database Layer for Keeper
//!
//! SQLite storage for assets, their reference data and the action log,
//! using sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Keeper Data Flow                                 │
//! │                                                                         │
//! │  keeper-service (AssetService::checkout)                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     keeper-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ AssetRepo     │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ CatalogRepo   │    │ 001_initial  │  │   │
//! │  │   │ WAL, FKs on   │    │ LogRepo       │    │ _schema.sql  │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │   KEEPER_DB_PATH (default ./keeper.db)                          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Asset, catalog and action log repositories
//!
//! ## Usage
//!
//! ```rust,ignore
//! use keeper_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/keeper.db")).await?;
//!
//! let query = AssetListQuery::from_params(&params, &db.catalog().custom_columns().await?, 50)?;
//! let (page, total) = db.assets().list(&query).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::asset::AssetRepository;
pub use repository::catalog::{CatalogRepository, NamedTable};
pub use repository::log::LogRepository;
