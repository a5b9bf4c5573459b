//! # Asset Repository
//!
//! Persistence for assets. Every state change is written together with its
//! log entry in one transaction, and the lifecycle transitions re-check their
//! precondition inside the `UPDATE` itself.
//!
//! ## Guarded Transitions
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Check-then-act inside SQLite                         │
//! │                                                                         │
//! │  Request A ─┐                                                           │
//! │             ├─► UPDATE assets SET assigned_to = ?                       │
//! │  Request B ─┘     WHERE id = ? AND assigned_to IS NULL                  │
//! │                     AND archived = 0 AND deleted_at IS NULL             │
//! │                                                                         │
//! │  rows_affected = 1  → append log entry, COMMIT, Ok(true)                │
//! │  rows_affected = 0  → ROLLBACK, Ok(false)  (someone else won)           │
//! │                                                                         │
//! │  Only one of two concurrent checkouts can ever succeed.                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Edits go through `update()`, which only writes when `updated_at` still
//! holds the value the caller loaded. A checkout or checkin that commits in
//! between wins, and the edit reports `false`.
//!
//! ## Listing
//! `list()` compiles a [`keeper_core::AssetListQuery`] with
//! [`sqlx::QueryBuilder`]. Column names only ever come from fixed
//! allow-lists; every user value, custom column JSON paths included, is a
//! bound parameter.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool, Transaction};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::log as action_log;
use keeper_core::query::{
    ColumnRef, JoinColumn, ScalarFilters, TextMatch, FILTERABLE_COLUMNS, SORTABLE_COLUMNS,
};
use keeper_core::{Asset, AssetListQuery, LogAction, LogEntry, Money, StatusBucket, TargetKind};

/// Column list for `assets` SELECT queries; the table is always aliased `a`.
const COLUMNS: &str = "\
    a.id, a.name, a.asset_tag, a.serial, a.notes, a.order_number, \
    a.model_id, a.status_id, a.company_id, a.supplier_id, \
    a.rtd_location_id, a.location_id, a.archived, a.requestable, \
    a.purchase_cost_cents, a.purchase_date, a.warranty_months, \
    a.assigned_to, a.assigned_type, a.accepted, a.last_checkout, \
    a.expected_checkin, a.next_audit_date, a.custom_fields, \
    a.created_by, a.created_at, a.updated_at, a.deleted_at";

/// Joins needed by search, join filters and join sorts.
const LIST_FROM: &str = " \
    FROM assets a \
    LEFT JOIN asset_models m ON m.id = a.model_id \
    LEFT JOIN categories c ON c.id = m.category_id \
    LEFT JOIN manufacturers mf ON mf.id = m.manufacturer_id \
    LEFT JOIN status_labels s ON s.id = a.status_id \
    LEFT JOIN locations l ON l.id = a.location_id \
    LEFT JOIN companies co ON co.id = a.company_id \
    LEFT JOIN suppliers sp ON sp.id = a.supplier_id \
    LEFT JOIN users u ON u.id = a.assigned_to AND a.assigned_type = 'user'";

/// Columns a free-text search term is tried against.
const SEARCH_COLUMNS: &[&str] = &[
    "a.name",
    "a.asset_tag",
    "a.serial",
    "a.order_number",
    "a.notes",
    "m.name",
    "m.model_number",
    "c.name",
    "mf.name",
    "s.name",
    "l.name",
    "co.name",
    "sp.name",
];

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct AssetRow {
    id: String,
    name: Option<String>,
    asset_tag: String,
    serial: Option<String>,
    notes: Option<String>,
    order_number: Option<String>,
    model_id: String,
    status_id: String,
    company_id: Option<String>,
    supplier_id: Option<String>,
    rtd_location_id: Option<String>,
    location_id: Option<String>,
    archived: bool,
    requestable: bool,
    purchase_cost_cents: Option<i64>,
    purchase_date: Option<NaiveDate>,
    warranty_months: Option<i64>,
    assigned_to: Option<String>,
    assigned_type: Option<TargetKind>,
    accepted: Option<bool>,
    last_checkout: Option<DateTime<Utc>>,
    expected_checkin: Option<NaiveDate>,
    next_audit_date: Option<NaiveDate>,
    custom_fields: String,
    created_by: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<AssetRow> for Asset {
    type Error = DbError;

    fn try_from(row: AssetRow) -> Result<Self, Self::Error> {
        let custom_fields: BTreeMap<String, String> = serde_json::from_str(&row.custom_fields)
            .map_err(|e| DbError::CorruptRow {
                column: "custom_fields".to_string(),
                id: row.id.clone(),
                reason: e.to_string(),
            })?;

        Ok(Asset {
            id: row.id,
            name: row.name,
            asset_tag: row.asset_tag,
            serial: row.serial,
            notes: row.notes,
            order_number: row.order_number,
            model_id: row.model_id,
            status_id: row.status_id,
            company_id: row.company_id,
            supplier_id: row.supplier_id,
            rtd_location_id: row.rtd_location_id,
            location_id: row.location_id,
            archived: row.archived,
            requestable: row.requestable,
            purchase_cost: row.purchase_cost_cents.map(Money::from_cents),
            purchase_date: row.purchase_date,
            warranty_months: row.warranty_months,
            assigned_to: row.assigned_to,
            assigned_type: row.assigned_type,
            accepted: row.accepted,
            last_checkout: row.last_checkout,
            expected_checkin: row.expected_checkin,
            next_audit_date: row.next_audit_date,
            custom_fields,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}

fn custom_fields_json(asset: &Asset) -> DbResult<String> {
    serde_json::to_string(&asset.custom_fields).map_err(|e| DbError::Internal(e.to_string()))
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for asset database operations.
///
/// ## Usage
/// ```rust,ignore
/// let mut asset = db.assets().get_by_id(id).await?.ok_or(...)?;
/// let log = lifecycle::check_out(&mut asset, &target, &actor, &request, CheckoutGuard::Available)?;
/// if !db.assets().check_out(&asset, &log).await? {
///     // lost the race, asset no longer available
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AssetRepository {
    pool: SqlitePool,
}

impl AssetRepository {
    /// Creates a new AssetRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AssetRepository { pool }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Gets an asset by id, soft-deleted rows included.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Asset>> {
        let query = format!("SELECT {COLUMNS} FROM assets a WHERE a.id = ?");
        let row = sqlx::query_as::<_, AssetRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Asset::try_from).transpose()
    }

    /// Gets an asset by tag.
    ///
    /// With `include_deleted`, a live asset still wins over a deleted one that
    /// carried the same tag; among deleted ones the most recent wins.
    pub async fn get_by_tag(&self, tag: &str, include_deleted: bool) -> DbResult<Option<Asset>> {
        let query = if include_deleted {
            format!(
                "SELECT {COLUMNS} FROM assets a WHERE a.asset_tag = ? \
                 ORDER BY a.deleted_at IS NOT NULL, a.deleted_at DESC LIMIT 1"
            )
        } else {
            format!("SELECT {COLUMNS} FROM assets a WHERE a.asset_tag = ? AND a.deleted_at IS NULL")
        };

        let row = sqlx::query_as::<_, AssetRow>(&query)
            .bind(tag.trim())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Asset::try_from).transpose()
    }

    /// Counts live assets (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM assets WHERE deleted_at IS NULL")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Inserts a new asset and its creation entry.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - a live asset already has the tag
    pub async fn insert(&self, asset: &Asset, log: &LogEntry) -> DbResult<()> {
        debug!(id = %asset.id, asset_tag = %asset.asset_tag, "Inserting asset");

        let custom_fields = custom_fields_json(asset)?;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO assets (\
                id, name, asset_tag, serial, notes, order_number, \
                model_id, status_id, company_id, supplier_id, \
                rtd_location_id, location_id, archived, requestable, \
                purchase_cost_cents, purchase_date, warranty_months, \
                assigned_to, assigned_type, accepted, last_checkout, \
                expected_checkin, next_audit_date, custom_fields, \
                created_by, created_at, updated_at, deleted_at\
             ) VALUES (\
                ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, \
                ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?\
             )",
        )
        .bind(&asset.id)
        .bind(&asset.name)
        .bind(&asset.asset_tag)
        .bind(&asset.serial)
        .bind(&asset.notes)
        .bind(&asset.order_number)
        .bind(&asset.model_id)
        .bind(&asset.status_id)
        .bind(&asset.company_id)
        .bind(&asset.supplier_id)
        .bind(&asset.rtd_location_id)
        .bind(&asset.location_id)
        .bind(asset.archived)
        .bind(asset.requestable)
        .bind(asset.purchase_cost.map(|c| c.cents()))
        .bind(asset.purchase_date)
        .bind(asset.warranty_months)
        .bind(&asset.assigned_to)
        .bind(asset.assigned_type)
        .bind(asset.accepted)
        .bind(asset.last_checkout)
        .bind(asset.expected_checkin)
        .bind(asset.next_audit_date)
        .bind(&custom_fields)
        .bind(&asset.created_by)
        .bind(asset.created_at)
        .bind(asset.updated_at)
        .bind(asset.deleted_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| with_tag(e.into(), &asset.asset_tag))?;

        action_log::append(&mut *tx, log).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Writes an edited asset plus its log entries, provided the stored row
    /// is unchanged since it was loaded.
    ///
    /// `loaded_at` is the `updated_at` the caller read. The assignment and
    /// location columns are only written when `logs` carries a checkout
    /// entry; a plain edit never touches them.
    ///
    /// ## Returns
    /// * `Ok(false)` - the row was changed or deleted in between
    /// * `Err(DbError::UniqueViolation)` - the new tag is taken
    pub async fn update(
        &self,
        asset: &Asset,
        loaded_at: DateTime<Utc>,
        logs: &[LogEntry],
    ) -> DbResult<bool> {
        let reassigned = logs.iter().any(|entry| entry.action == LogAction::Checkout);
        debug!(id = %asset.id, entries = logs.len(), reassigned, "Updating asset");

        let custom_fields = custom_fields_json(asset)?;
        let mut tx = self.pool.begin().await?;

        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE assets SET ");
        {
            let mut set = qb.separated(", ");
            set.push("name = ").push_bind_unseparated(asset.name.clone());
            set.push("asset_tag = ").push_bind_unseparated(asset.asset_tag.clone());
            set.push("serial = ").push_bind_unseparated(asset.serial.clone());
            set.push("notes = ").push_bind_unseparated(asset.notes.clone());
            set.push("order_number = ").push_bind_unseparated(asset.order_number.clone());
            set.push("model_id = ").push_bind_unseparated(asset.model_id.clone());
            set.push("status_id = ").push_bind_unseparated(asset.status_id.clone());
            set.push("company_id = ").push_bind_unseparated(asset.company_id.clone());
            set.push("supplier_id = ").push_bind_unseparated(asset.supplier_id.clone());
            set.push("rtd_location_id = ").push_bind_unseparated(asset.rtd_location_id.clone());
            set.push("archived = ").push_bind_unseparated(asset.archived);
            set.push("requestable = ").push_bind_unseparated(asset.requestable);
            set.push("purchase_cost_cents = ")
                .push_bind_unseparated(asset.purchase_cost.map(|c| c.cents()));
            set.push("purchase_date = ").push_bind_unseparated(asset.purchase_date);
            set.push("warranty_months = ").push_bind_unseparated(asset.warranty_months);
            set.push("custom_fields = ").push_bind_unseparated(custom_fields);
            set.push("updated_at = ").push_bind_unseparated(asset.updated_at);
            if reassigned {
                set.push("location_id = ").push_bind_unseparated(asset.location_id.clone());
                set.push("assigned_to = ").push_bind_unseparated(asset.assigned_to.clone());
                set.push("assigned_type = ").push_bind_unseparated(asset.assigned_type);
                set.push("accepted = ").push_bind_unseparated(asset.accepted);
                set.push("last_checkout = ").push_bind_unseparated(asset.last_checkout);
                set.push("expected_checkin = ").push_bind_unseparated(asset.expected_checkin);
            }
        }
        qb.push(" WHERE id = ")
            .push_bind(asset.id.clone())
            .push(" AND updated_at = ")
            .push_bind(loaded_at)
            .push(" AND deleted_at IS NULL");

        let result = qb
            .build()
            .execute(&mut *tx)
            .await
            .map_err(|e| with_tag(e.into(), &asset.asset_tag))?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        for entry in logs {
            action_log::append(&mut *tx, entry).await?;
        }
        tx.commit().await?;
        Ok(true)
    }

    /// Persists a checkout produced by `lifecycle::check_out`.
    ///
    /// Returns `false` when the asset was no longer available.
    pub async fn check_out(&self, asset: &Asset, log: &LogEntry) -> DbResult<bool> {
        debug!(id = %asset.id, assigned_to = ?asset.assigned_to, "Checking out asset");

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE assets SET \
                assigned_to = ?, assigned_type = ?, last_checkout = ?, \
                expected_checkin = ?, accepted = NULL, location_id = ?, \
                name = ?, updated_at = ? \
             WHERE id = ? AND assigned_to IS NULL AND archived = 0 AND deleted_at IS NULL",
        )
        .bind(&asset.assigned_to)
        .bind(asset.assigned_type)
        .bind(asset.last_checkout)
        .bind(asset.expected_checkin)
        .bind(&asset.location_id)
        .bind(&asset.name)
        .bind(asset.updated_at)
        .bind(&asset.id)
        .execute(&mut *tx)
        .await?;

        finish(tx, result.rows_affected(), log).await
    }

    /// Persists a checkin produced by `lifecycle::check_in`.
    ///
    /// Returns `false` when the asset was not checked out any more.
    pub async fn check_in(&self, asset: &Asset, log: &LogEntry) -> DbResult<bool> {
        debug!(id = %asset.id, "Checking in asset");

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE assets SET \
                assigned_to = NULL, assigned_type = NULL, last_checkout = NULL, \
                expected_checkin = NULL, accepted = NULL, location_id = ?, \
                status_id = ?, name = ?, updated_at = ? \
             WHERE id = ? AND assigned_to IS NOT NULL AND deleted_at IS NULL",
        )
        .bind(&asset.location_id)
        .bind(&asset.status_id)
        .bind(&asset.name)
        .bind(asset.updated_at)
        .bind(&asset.id)
        .execute(&mut *tx)
        .await?;

        finish(tx, result.rows_affected(), log).await
    }

    /// Persists an audit: the scheduled date plus the audit entry.
    pub async fn record_audit(&self, asset: &Asset, log: &LogEntry) -> DbResult<bool> {
        debug!(id = %asset.id, next_audit_date = ?asset.next_audit_date, "Recording audit");

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE assets SET next_audit_date = ?, updated_at = ? \
             WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(asset.next_audit_date)
        .bind(asset.updated_at)
        .bind(&asset.id)
        .execute(&mut *tx)
        .await?;

        finish(tx, result.rows_affected(), log).await
    }

    /// Clears the assignment and marks the asset deleted, in one transaction.
    ///
    /// Returns `false` when the asset was already deleted.
    pub async fn soft_delete(&self, asset: &Asset, log: &LogEntry) -> DbResult<bool> {
        debug!(id = %asset.id, "Soft-deleting asset");

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE assets SET \
                assigned_to = NULL, assigned_type = NULL, last_checkout = NULL, \
                expected_checkin = NULL, accepted = NULL, \
                deleted_at = ?, updated_at = ? \
             WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(asset.deleted_at)
        .bind(asset.updated_at)
        .bind(&asset.id)
        .execute(&mut *tx)
        .await?;

        finish(tx, result.rows_affected(), log).await
    }

    // =========================================================================
    // Listing
    // =========================================================================

    /// Runs a listing query.
    ///
    /// ## Returns
    /// The requested page and the total number of matches before paging.
    pub async fn list(&self, query: &AssetListQuery) -> DbResult<(Vec<Asset>, i64)> {
        debug!(
            status = ?query.status,
            sort = ?query.sort,
            offset = query.offset,
            limit = query.limit,
            "Listing assets"
        );

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*)");
        count.push(LIST_FROM);
        push_conditions(&mut count, query);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut page = QueryBuilder::<Sqlite>::new(format!("SELECT {COLUMNS}"));
        page.push(LIST_FROM);
        push_conditions(&mut page, query);
        push_order(&mut page, query);
        page.push(" LIMIT ")
            .push_bind(query.limit)
            .push(" OFFSET ")
            .push_bind(query.offset);

        let rows = page.build_query_as::<AssetRow>().fetch_all(&self.pool).await?;
        let assets = rows
            .into_iter()
            .map(Asset::try_from)
            .collect::<DbResult<Vec<_>>>()?;

        debug!(count = assets.len(), total, "Listing returned assets");
        Ok((assets, total))
    }
}

/// Appends the log entry and commits when the guarded update hit a row,
/// otherwise rolls back.
async fn finish(mut tx: Transaction<'_, Sqlite>, rows: u64, log: &LogEntry) -> DbResult<bool> {
    if rows == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    action_log::append(&mut *tx, log).await?;
    tx.commit().await?;
    Ok(true)
}

/// Fills in the offending tag on a unique violation.
fn with_tag(err: DbError, tag: &str) -> DbError {
    match err {
        DbError::UniqueViolation { field, .. } if field == "asset_tag" => {
            DbError::duplicate(field, tag)
        }
        other => other,
    }
}

// =============================================================================
// Query Compilation
// =============================================================================

fn like_pattern(value: &str) -> String {
    let escaped = value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn asset_column(name: &str) -> &'static str {
    let known = SORTABLE_COLUMNS
        .iter()
        .chain(FILTERABLE_COLUMNS)
        .find(|c| **c == name)
        .copied()
        .unwrap_or("created_at");

    match known {
        "id" => "a.id",
        "name" => "a.name",
        "asset_tag" => "a.asset_tag",
        "serial" => "a.serial",
        "last_checkout" => "a.last_checkout",
        "notes" => "a.notes",
        "expected_checkin" => "a.expected_checkin",
        "order_number" => "a.order_number",
        "updated_at" => "a.updated_at",
        "purchase_date" => "a.purchase_date",
        "purchase_cost" => "a.purchase_cost_cents",
        _ => "a.created_at",
    }
}

fn join_column(join: JoinColumn) -> &'static str {
    match join {
        JoinColumn::Model => "m.name",
        JoinColumn::ModelNumber => "m.model_number",
        JoinColumn::Category => "c.name",
        JoinColumn::Manufacturer => "mf.name",
        JoinColumn::Company => "co.name",
        JoinColumn::Location => "l.name",
        JoinColumn::StatusLabel => "s.name",
        JoinColumn::Supplier => "sp.name",
        JoinColumn::AssignedTo => "u.first_name",
    }
}

/// JSON path of a custom column inside `assets.custom_fields`.
fn custom_path(column: &str) -> String {
    format!("$.\"{}\"", column.replace('"', ""))
}

fn push_column(qb: &mut QueryBuilder<'_, Sqlite>, column: &ColumnRef) {
    match column {
        ColumnRef::Asset(name) => {
            qb.push(asset_column(name));
        }
        ColumnRef::Join(join) => {
            qb.push(join_column(*join));
        }
        ColumnRef::Custom(name) => {
            qb.push("json_extract(a.custom_fields, ")
                .push_bind(custom_path(name))
                .push(")");
        }
    }
}

fn push_conditions(qb: &mut QueryBuilder<'_, Sqlite>, query: &AssetListQuery) {
    if query.includes_deleted() {
        qb.push(" WHERE a.deleted_at IS NOT NULL");
    } else {
        qb.push(" WHERE a.deleted_at IS NULL");
    }

    match query.status {
        Some(StatusBucket::Rtd) => {
            qb.push(" AND a.assigned_to IS NULL AND s.deployable = 1");
        }
        Some(StatusBucket::Pending) => {
            qb.push(" AND s.pending = 1");
        }
        Some(StatusBucket::Undeployable) => {
            qb.push(" AND s.deployable = 0 AND s.pending = 0 AND s.archived = 0");
        }
        Some(StatusBucket::Archived) => {
            qb.push(" AND s.archived = 1");
        }
        Some(StatusBucket::Requestable) => {
            qb.push(" AND a.requestable = 1 AND s.archived = 0 AND (s.deployable = 1 OR s.pending = 1)");
        }
        Some(StatusBucket::Deployed) => {
            qb.push(" AND a.assigned_to IS NOT NULL");
        }
        Some(StatusBucket::Deleted) | None => {}
    }

    match &query.company_restriction {
        Some(Some(company_id)) => {
            qb.push(" AND a.company_id = ").push_bind(company_id.clone());
        }
        Some(None) => {
            qb.push(" AND a.company_id IS NULL");
        }
        None => {}
    }

    push_scalars(qb, &query.scalars);

    match &query.text {
        TextMatch::None => {}
        TextMatch::Search(terms) => {
            for term in terms {
                let pattern = like_pattern(term);
                qb.push(" AND (");
                let mut any = qb.separated(" OR ");
                for column in SEARCH_COLUMNS {
                    any.push(format!("{column} LIKE "));
                    any.push_bind_unseparated(pattern.clone());
                    any.push_unseparated(" ESCAPE '\\'");
                }
                qb.push(")");
            }
        }
        TextMatch::Filter(pairs) => {
            for (column, value) in pairs {
                qb.push(" AND ");
                push_column(qb, column);
                qb.push(" LIKE ")
                    .push_bind(like_pattern(value))
                    .push(" ESCAPE '\\'");
            }
        }
    }
}

fn push_scalars(qb: &mut QueryBuilder<'_, Sqlite>, scalars: &ScalarFilters) {
    let exact = [
        ("a.status_id", &scalars.status_id),
        ("m.category_id", &scalars.category_id),
        ("a.location_id", &scalars.location_id),
        ("a.supplier_id", &scalars.supplier_id),
        ("a.company_id", &scalars.company_id),
        ("m.manufacturer_id", &scalars.manufacturer_id),
        ("a.order_number", &scalars.order_number),
    ];
    for (column, value) in exact {
        if let Some(value) = value {
            qb.push(format!(" AND {column} = ")).push_bind(value.clone());
        }
    }

    if !scalars.model_ids.is_empty() {
        qb.push(" AND a.model_id IN (");
        let mut ids = qb.separated(", ");
        for id in &scalars.model_ids {
            ids.push_bind(id.clone());
        }
        qb.push(")");
    }
}

fn push_order(qb: &mut QueryBuilder<'_, Sqlite>, query: &AssetListQuery) {
    let dir = query.sort.order.as_sql();

    qb.push(" ORDER BY ");
    match &query.sort.column {
        ColumnRef::Join(JoinColumn::AssignedTo) => {
            qb.push(format!("u.first_name {dir}, u.last_name {dir}"));
        }
        column => {
            push_column(qb, column);
            qb.push(format!(" {dir}"));
        }
    }

    // Insertion order breaks ties so pages never overlap.
    qb.push(format!(", a.rowid {dir}"));
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::catalog::NamedTable;
    use crate::{Database, DbConfig};
    use chrono::{Duration, TimeZone};
    use keeper_core::lifecycle::{
        self, AssetUpdate, CheckinRequest, CheckoutGuard, CheckoutRequest,
    };
    use keeper_core::query::{ListParams, Sort};
    use keeper_core::{
        Actor, AssetModel, CheckoutTarget, CompanyScope, CustomFieldDef, Fieldset, LogAction,
        Location, StatusLabel, User,
    };

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap()
    }

    fn actor() -> Actor {
        Actor::new("admin")
    }

    fn label(id: &str, deployable: bool, pending: bool, archived: bool) -> StatusLabel {
        StatusLabel {
            id: id.to_string(),
            name: id.to_string(),
            deployable,
            pending,
            archived,
        }
    }

    fn grace() -> User {
        User {
            id: "user-1".to_string(),
            first_name: "Grace".to_string(),
            last_name: "Hopper".to_string(),
            email: Some("grace@example.com".to_string()),
            company_id: None,
            location_id: Some("loc-remote".to_string()),
        }
    }

    async fn setup() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let catalog = db.catalog();

        for (id, name) in [("loc-hq", "Headquarters"), ("loc-remote", "Remote")] {
            catalog
                .insert_location(&Location {
                    id: id.to_string(),
                    name: name.to_string(),
                })
                .await
                .unwrap();
        }
        catalog
            .insert_named(NamedTable::Manufacturers, "mf-1", "Lenovo")
            .await
            .unwrap();
        catalog
            .insert_named(NamedTable::Companies, "acme", "Acme")
            .await
            .unwrap();
        for l in [
            label("ready", true, false, false),
            label("pending", false, true, false),
            label("broken", false, false, false),
            label("archived", false, false, true),
        ] {
            catalog.insert_status_label(&l).await.unwrap();
        }

        let fieldset = Fieldset {
            id: "fs-1".to_string(),
            name: "Laptops".to_string(),
            fields: vec![CustomFieldDef {
                id: "cf-mac".to_string(),
                name: "MAC Address".to_string(),
                column: "_cf_mac_address".to_string(),
                required: false,
            }],
        };
        catalog.insert_fieldset(&fieldset).await.unwrap();
        for (id, name) in [("model-a", "Alpha"), ("model-z", "Zeta")] {
            catalog
                .insert_model(&AssetModel {
                    id: id.to_string(),
                    name: name.to_string(),
                    model_number: None,
                    category_id: None,
                    manufacturer_id: Some("mf-1".to_string()),
                    checkin_email: false,
                    fieldset: Some(fieldset.clone()),
                })
                .await
                .unwrap();
        }
        catalog.insert_user(&grace()).await.unwrap();

        db
    }

    fn asset(tag: &str, created_at: DateTime<Utc>) -> Asset {
        Asset {
            id: uuid::Uuid::new_v4().to_string(),
            name: None,
            asset_tag: tag.to_string(),
            serial: None,
            notes: None,
            order_number: None,
            model_id: "model-a".to_string(),
            status_id: "ready".to_string(),
            company_id: None,
            supplier_id: None,
            rtd_location_id: Some("loc-hq".to_string()),
            location_id: Some("loc-hq".to_string()),
            archived: false,
            requestable: false,
            purchase_cost: None,
            purchase_date: None,
            warranty_months: None,
            assigned_to: None,
            assigned_type: None,
            accepted: None,
            last_checkout: None,
            expected_checkin: None,
            next_audit_date: None,
            custom_fields: BTreeMap::new(),
            created_by: Some("admin".to_string()),
            created_at,
            updated_at: created_at,
            deleted_at: None,
        }
    }

    async fn insert(db: &Database, asset: &Asset) {
        let log = LogEntry::new(LogAction::Create, asset, &actor(), asset.created_at);
        db.assets().insert(asset, &log).await.unwrap();
    }

    async fn check_out_to_grace(db: &Database, asset: &mut Asset) -> bool {
        let log = lifecycle::check_out(
            asset,
            &CheckoutTarget::User(grace()),
            &actor(),
            &CheckoutRequest::at(t0() + Duration::days(1)),
            CheckoutGuard::Available,
        )
        .unwrap();
        db.assets().check_out(asset, &log).await.unwrap()
    }

    fn edit_serial(asset: &mut Asset, at: DateTime<Utc>) -> LogEntry {
        let update = AssetUpdate {
            serial: Some("SN-EDIT".to_string()),
            ..Default::default()
        };
        lifecycle::apply_update(asset, &update, None, &actor(), CompanyScope::default(), at).unwrap()
    }

    fn query(params: ListParams) -> AssetListQuery {
        AssetListQuery::from_params(&params, &["_cf_mac_address".to_string()], 50).unwrap()
    }

    fn tags(assets: &[Asset]) -> Vec<&str> {
        assets.iter().map(|a| a.asset_tag.as_str()).collect()
    }

    #[tokio::test]
    async fn test_insert_and_read_back() {
        let db = setup().await;
        let mut a = asset("TAG-1", t0());
        a.purchase_cost = Some(Money::from_cents(129_999));
        a.purchase_date = NaiveDate::from_ymd_opt(2023, 12, 1);
        a.custom_fields
            .insert("_cf_mac_address".to_string(), "aa:bb:cc".to_string());
        insert(&db, &a).await;

        let by_id = db.assets().get_by_id(&a.id).await.unwrap().unwrap();
        assert_eq!(by_id, a);
        let by_tag = db.assets().get_by_tag("TAG-1", false).await.unwrap().unwrap();
        assert_eq!(by_tag.id, a.id);
        assert_eq!(db.logs().count_for_item(&a.id, LogAction::Create).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_tag_is_reported_with_value() {
        let db = setup().await;
        insert(&db, &asset("TAG-1", t0())).await;

        let dup = asset("TAG-1", t0());
        let log = LogEntry::new(LogAction::Create, &dup, &actor(), t0());
        let err = db.assets().insert(&dup, &log).await.unwrap_err();
        match err {
            DbError::UniqueViolation { field, value } => {
                assert_eq!(field, "asset_tag");
                assert_eq!(value, "TAG-1");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(db.logs().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_checkout_is_guarded() {
        let db = setup().await;
        let original = asset("TAG-1", t0());
        insert(&db, &original).await;

        let mut first = original.clone();
        let mut second = original.clone();
        assert!(check_out_to_grace(&db, &mut first).await);
        // Second request still holds the stale "available" snapshot.
        assert!(!check_out_to_grace(&db, &mut second).await);

        let stored = db.assets().get_by_id(&original.id).await.unwrap().unwrap();
        assert_eq!(stored.assigned_to.as_deref(), Some("user-1"));
        assert_eq!(stored.assigned_type, Some(TargetKind::User));
        assert_eq!(stored.location_id.as_deref(), Some("loc-remote"));
        assert_eq!(
            db.logs().count_for_item(&original.id, LogAction::Checkout).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_checkout_then_checkin_appends_two_entries() {
        let db = setup().await;
        let mut a = asset("TAG-1", t0());
        insert(&db, &a).await;
        let before = db.logs().for_item(&a.id).await.unwrap().len();

        assert!(check_out_to_grace(&db, &mut a).await);
        let receipt = lifecycle::check_in(
            &mut a,
            Some(&grace()),
            &actor(),
            &CheckinRequest::at(t0() + Duration::days(2)),
        )
        .unwrap();
        assert!(db.assets().check_in(&a, &receipt.log).await.unwrap());

        let history = db.logs().for_item(&a.id).await.unwrap();
        assert_eq!(history.len(), before + 2);
        assert_eq!(history[history.len() - 2].action, LogAction::Checkout);
        assert_eq!(history[history.len() - 1].action, LogAction::Checkin);

        let stored = db.assets().get_by_id(&a.id).await.unwrap().unwrap();
        assert!(stored.assigned_to.is_none());
        assert!(stored.last_checkout.is_none());
        assert_eq!(stored.location_id.as_deref(), Some("loc-hq"));

        // Replaying the checkin against the stored row finds nothing to release.
        assert!(!db.assets().check_in(&a, &receipt.log).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_loses_to_checkout_committed_after_load() {
        let db = setup().await;
        let mut a = asset("TAG-1", t0());
        insert(&db, &a).await;

        let mut stale = db.assets().get_by_id(&a.id).await.unwrap().unwrap();
        let loaded_at = stale.updated_at;
        assert!(check_out_to_grace(&db, &mut a).await);

        let log = edit_serial(&mut stale, t0() + Duration::days(2));
        assert!(!db.assets().update(&stale, loaded_at, &[log]).await.unwrap());

        let stored = db.assets().get_by_id(&a.id).await.unwrap().unwrap();
        assert_eq!(stored.assigned_to.as_deref(), Some("user-1"));
        assert!(stored.serial.is_none());
        assert_eq!(db.logs().count_for_item(&a.id, LogAction::Checkout).await.unwrap(), 1);
        assert_eq!(db.logs().count_for_item(&a.id, LogAction::Update).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_loses_to_checkin_committed_after_load() {
        let db = setup().await;
        let mut a = asset("TAG-1", t0());
        insert(&db, &a).await;
        assert!(check_out_to_grace(&db, &mut a).await);

        let mut stale = db.assets().get_by_id(&a.id).await.unwrap().unwrap();
        let loaded_at = stale.updated_at;
        let receipt = lifecycle::check_in(
            &mut a,
            Some(&grace()),
            &actor(),
            &CheckinRequest::at(t0() + Duration::days(2)),
        )
        .unwrap();
        assert!(db.assets().check_in(&a, &receipt.log).await.unwrap());

        let log = edit_serial(&mut stale, t0() + Duration::days(3));
        assert!(!db.assets().update(&stale, loaded_at, &[log]).await.unwrap());

        let stored = db.assets().get_by_id(&a.id).await.unwrap().unwrap();
        assert!(stored.assigned_to.is_none());
        assert_eq!(stored.location_id.as_deref(), Some("loc-hq"));
        assert_eq!(db.logs().count_for_item(&a.id, LogAction::Checkin).await.unwrap(), 1);
        assert_eq!(db.logs().count_for_item(&a.id, LogAction::Update).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_plain_update_never_writes_assignment() {
        let db = setup().await;
        let mut a = asset("TAG-1", t0());
        insert(&db, &a).await;
        assert!(check_out_to_grace(&db, &mut a).await);

        let mut fresh = db.assets().get_by_id(&a.id).await.unwrap().unwrap();
        let loaded_at = fresh.updated_at;
        let log = edit_serial(&mut fresh, t0() + Duration::days(2));
        // Only a checkout entry may move the assignment.
        fresh.assigned_to = None;
        fresh.location_id = None;
        assert!(db.assets().update(&fresh, loaded_at, &[log]).await.unwrap());

        let stored = db.assets().get_by_id(&a.id).await.unwrap().unwrap();
        assert_eq!(stored.serial.as_deref(), Some("SN-EDIT"));
        assert_eq!(stored.assigned_to.as_deref(), Some("user-1"));
        assert_eq!(stored.location_id.as_deref(), Some("loc-remote"));
        assert_eq!(db.logs().count_for_item(&a.id, LogAction::Update).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_pagination_counts_before_paging() {
        let db = setup().await;
        for i in 0..120 {
            insert(&db, &asset(&format!("TAG-{i:03}"), t0() + Duration::minutes(i))).await;
        }

        let (page, total) = db
            .assets()
            .list(&query(ListParams {
                limit: Some(50),
                ..Default::default()
            }))
            .await
            .unwrap();
        assert_eq!(page.len(), 50);
        assert_eq!(total, 120);

        let (page, total) = db
            .assets()
            .list(&query(ListParams {
                offset: Some(100),
                limit: Some(50),
                ..Default::default()
            }))
            .await
            .unwrap();
        assert_eq!(page.len(), 20);
        assert_eq!(total, 120);
    }

    #[tokio::test]
    async fn test_unknown_sort_falls_back_to_newest_first() {
        let db = setup().await;
        insert(&db, &asset("OLD", t0())).await;
        insert(&db, &asset("NEW", t0() + Duration::days(3))).await;
        insert(&db, &asset("MID", t0() + Duration::days(1))).await;

        let q = query(ListParams {
            sort: Some("definitely_not_a_column".to_string()),
            order: Some("asc".to_string()),
            ..Default::default()
        });
        assert_eq!(q.sort, Sort::default());
        let (page, _) = db.assets().list(&q).await.unwrap();
        assert_eq!(tags(&page), vec!["NEW", "MID", "OLD"]);
    }

    #[tokio::test]
    async fn test_sorts_by_join_and_custom_columns() {
        let db = setup().await;
        let mut a = asset("A", t0());
        a.model_id = "model-z".to_string();
        a.custom_fields.insert("_cf_mac_address".to_string(), "02".to_string());
        let mut b = asset("B", t0());
        b.custom_fields.insert("_cf_mac_address".to_string(), "01".to_string());
        insert(&db, &a).await;
        insert(&db, &b).await;

        let (page, _) = db
            .assets()
            .list(&query(ListParams {
                sort: Some("model".to_string()),
                order: Some("asc".to_string()),
                ..Default::default()
            }))
            .await
            .unwrap();
        assert_eq!(tags(&page), vec!["B", "A"]);

        let (page, _) = db
            .assets()
            .list(&query(ListParams {
                sort: Some("_cf_mac_address".to_string()),
                order: Some("desc".to_string()),
                ..Default::default()
            }))
            .await
            .unwrap();
        assert_eq!(tags(&page), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_search_terms_are_anded() {
        let db = setup().await;
        let mut a = asset("LAP-1", t0());
        a.name = Some("Design laptop".to_string());
        a.model_id = "model-z".to_string();
        let mut b = asset("LAP-2", t0());
        b.name = Some("Design monitor".to_string());
        insert(&db, &a).await;
        insert(&db, &b).await;

        let (page, total) = db
            .assets()
            .list(&query(ListParams {
                search: Some("design zeta".to_string()),
                ..Default::default()
            }))
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(tags(&page), vec!["LAP-1"]);

        // Matches the manufacturer through the model join.
        let (_, total) = db
            .assets()
            .list(&query(ListParams {
                search: Some("lenovo".to_string()),
                ..Default::default()
            }))
            .await
            .unwrap();
        assert_eq!(total, 2);

        // LIKE wildcards in user input are literal.
        let (_, total) = db
            .assets()
            .list(&query(ListParams {
                search: Some("%".to_string()),
                ..Default::default()
            }))
            .await
            .unwrap();
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn test_structured_filter_on_custom_column() {
        let db = setup().await;
        let mut a = asset("A", t0());
        a.custom_fields
            .insert("_cf_mac_address".to_string(), "aa:bb".to_string());
        insert(&db, &a).await;
        insert(&db, &asset("B", t0())).await;

        let (page, total) = db
            .assets()
            .list(&query(ListParams {
                search: Some("B".to_string()),
                filter: Some(r#"{"_cf_mac_address":"aa:"}"#.to_string()),
                ..Default::default()
            }))
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(tags(&page), vec!["A"]);
    }

    #[tokio::test]
    async fn test_status_buckets() {
        let db = setup().await;
        let ready = asset("READY", t0());
        let mut deployed = asset("DEPLOYED", t0());
        let mut pending = asset("PENDING", t0());
        pending.status_id = "pending".to_string();
        pending.requestable = true;
        let mut broken = asset("BROKEN", t0());
        broken.status_id = "broken".to_string();
        let mut archived = asset("ARCHIVED", t0());
        archived.status_id = "archived".to_string();
        archived.requestable = true;
        let mut gone = asset("GONE", t0());

        for a in [&ready, &deployed, &pending, &broken, &archived, &gone] {
            insert(&db, a).await;
        }
        assert!(check_out_to_grace(&db, &mut deployed).await);
        let log = lifecycle::mark_deleted(&mut gone, &actor(), t0() + Duration::days(5));
        assert!(db.assets().soft_delete(&gone, &log).await.unwrap());

        let bucket = |name: &str| {
            query(ListParams {
                status: Some(name.to_string()),
                sort: Some("asset_tag".to_string()),
                order: Some("asc".to_string()),
                ..Default::default()
            })
        };

        let cases = [
            ("RTD", vec!["READY"]),
            ("Deployed", vec!["DEPLOYED"]),
            ("Pending", vec!["PENDING"]),
            ("Undeployable", vec!["BROKEN"]),
            ("Archived", vec!["ARCHIVED"]),
            ("Requestable", vec!["PENDING"]),
            ("Deleted", vec!["GONE"]),
        ];
        for (name, expected) in cases {
            let (page, _) = db.assets().list(&bucket(name)).await.unwrap();
            assert_eq!(tags(&page), expected, "bucket {name}");
        }

        let (_, total) = db.assets().list(&query(ListParams::default())).await.unwrap();
        assert_eq!(total, 5);
    }

    #[tokio::test]
    async fn test_soft_delete_keeps_record_readable() {
        let db = setup().await;
        let mut a = asset("TAG-1", t0());
        insert(&db, &a).await;
        assert!(check_out_to_grace(&db, &mut a).await);

        let log = lifecycle::mark_deleted(&mut a, &actor(), t0() + Duration::days(3));
        assert!(db.assets().soft_delete(&a, &log).await.unwrap());
        assert!(!db.assets().soft_delete(&a, &log).await.unwrap());

        let stored = db.assets().get_by_id(&a.id).await.unwrap().unwrap();
        assert!(stored.deleted_at.is_some());
        assert!(stored.assigned_to.is_none());
        assert!(db.assets().get_by_tag("TAG-1", false).await.unwrap().is_none());
        assert!(db.assets().get_by_tag("TAG-1", true).await.unwrap().is_some());
        assert_eq!(db.assets().count().await.unwrap(), 0);

        // The tag is free again for a live asset.
        insert(&db, &asset("TAG-1", t0())).await;
    }

    #[tokio::test]
    async fn test_company_restriction_and_scalar_filters() {
        let db = setup().await;
        let mut a = asset("ACME-1", t0());
        a.company_id = Some("acme".to_string());
        let mut b = asset("NONE-1", t0());
        b.model_id = "model-z".to_string();
        insert(&db, &a).await;
        insert(&db, &b).await;

        let scoped = query(ListParams::default()).restrict_to_company(Some(Some("acme".to_string())));
        let (page, _) = db.assets().list(&scoped).await.unwrap();
        assert_eq!(tags(&page), vec!["ACME-1"]);

        let unscoped = query(ListParams::default()).restrict_to_company(Some(None));
        let (page, _) = db.assets().list(&unscoped).await.unwrap();
        assert_eq!(tags(&page), vec!["NONE-1"]);

        let (page, _) = db
            .assets()
            .list(&query(ListParams {
                model_ids: vec!["model-z".to_string()],
                ..Default::default()
            }))
            .await
            .unwrap();
        assert_eq!(tags(&page), vec!["NONE-1"]);

        let (_, total) = db
            .assets()
            .list(&query(ListParams {
                manufacturer_id: Some("mf-1".to_string()),
                ..Default::default()
            }))
            .await
            .unwrap();
        assert_eq!(total, 2);
    }
}
