//! # Asset Query Description
//!
//! Turns loosely typed listing parameters into an [`AssetListQuery`]: a
//! closed description of what to match, how to sort and which page to
//! return. The store compiles it to SQL; nothing in here touches a database.
//!
//! ## Resolution Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       ListParams → AssetListQuery                       │
//! │                                                                         │
//! │  filter (JSON object)   non-empty?  ──yes──► TextMatch::Filter         │
//! │          │                                   (unknown keys dropped)     │
//! │          no                                                             │
//! │          ▼                                                              │
//! │  search (free text)     non-empty?  ──yes──► TextMatch::Search(terms)  │
//! │                                                                         │
//! │  sort    allow-listed column / custom column / join  ──► Sort          │
//! │          anything else                               ──► created_at ↓  │
//! │  order   "asc" ──► Asc, anything else ──► Desc                         │
//! │  status  bucket name (case-insensitive), unknown ──► no bucket         │
//! │  offset  default 0      limit  default 50                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::FieldErrors;
use crate::validation::{sanitize, validate_search_query};
use crate::DEFAULT_LIST_LIMIT;

/// Plain asset columns that can be sorted on.
pub const SORTABLE_COLUMNS: &[&str] = &[
    "id",
    "name",
    "asset_tag",
    "serial",
    "last_checkout",
    "notes",
    "expected_checkin",
    "order_number",
    "created_at",
    "updated_at",
    "purchase_date",
    "purchase_cost",
];

/// Plain asset columns the structured filter accepts.
pub const FILTERABLE_COLUMNS: &[&str] = &["name", "asset_tag", "serial", "order_number", "notes"];

// =============================================================================
// Status Buckets
// =============================================================================

/// Named predicates over an asset's assignment and its status label flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum StatusBucket {
    /// Ready to deploy: unassigned, status deployable.
    #[serde(rename = "RTD")]
    Rtd,
    Pending,
    /// Status neither deployable, pending nor archived.
    Undeployable,
    Archived,
    /// Requestable flag set, status not archived and deployable or pending.
    Requestable,
    /// Assigned to anything.
    Deployed,
    /// Soft-deleted rows only.
    Deleted,
}

impl StatusBucket {
    /// Parses a bucket name, ignoring case. Unknown names yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "rtd" => Some(StatusBucket::Rtd),
            "pending" => Some(StatusBucket::Pending),
            "undeployable" => Some(StatusBucket::Undeployable),
            "archived" => Some(StatusBucket::Archived),
            "requestable" => Some(StatusBucket::Requestable),
            "deployed" => Some(StatusBucket::Deployed),
            "deleted" => Some(StatusBucket::Deleted),
            _ => None,
        }
    }
}

// =============================================================================
// Columns & Sorting
// =============================================================================

/// Columns that live on a related table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum JoinColumn {
    Model,
    ModelNumber,
    Category,
    Manufacturer,
    Company,
    Location,
    StatusLabel,
    Supplier,
    /// Sort only: the assigned user's name.
    AssignedTo,
}

impl JoinColumn {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "model" => Some(JoinColumn::Model),
            "model_number" => Some(JoinColumn::ModelNumber),
            "category" => Some(JoinColumn::Category),
            "manufacturer" => Some(JoinColumn::Manufacturer),
            "company" => Some(JoinColumn::Company),
            "location" => Some(JoinColumn::Location),
            "status_label" => Some(JoinColumn::StatusLabel),
            "supplier" => Some(JoinColumn::Supplier),
            "assigned_to" => Some(JoinColumn::AssignedTo),
            _ => None,
        }
    }
}

/// A resolved, allow-listed column reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum ColumnRef {
    /// A column of the assets table. Always one of the allow-list constants.
    Asset(String),
    Join(JoinColumn),
    /// A custom field column stored in the asset's JSON map.
    Custom(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// Ascending only for the literal `asc`.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("asc") => SortOrder::Asc,
            _ => SortOrder::Desc,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Sort {
    pub column: ColumnRef,
    pub order: SortOrder,
}

impl Default for Sort {
    fn default() -> Self {
        Sort {
            column: ColumnRef::Asset("created_at".to_string()),
            order: SortOrder::Desc,
        }
    }
}

impl Sort {
    /// Resolves a requested sort against the allow-list and the registered
    /// custom columns. Anything unrecognized sorts by newest first.
    pub fn resolve(sort: Option<&str>, order: Option<&str>, custom_columns: &[String]) -> Sort {
        let Some(sort) = sort.map(str::trim).filter(|s| !s.is_empty()) else {
            return Sort {
                order: SortOrder::parse(order),
                ..Sort::default()
            };
        };

        let column = if let Some(col) = SORTABLE_COLUMNS.iter().find(|c| **c == sort) {
            ColumnRef::Asset(col.to_string())
        } else if let Some(join) = JoinColumn::parse(sort) {
            ColumnRef::Join(join)
        } else if custom_columns.iter().any(|c| c == sort) {
            ColumnRef::Custom(sort.to_string())
        } else {
            return Sort::default();
        };

        Sort {
            column,
            order: SortOrder::parse(order),
        }
    }
}

// =============================================================================
// Text Matching
// =============================================================================

/// How free text narrows the listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum TextMatch {
    #[default]
    None,
    /// Every term must match somewhere; each term is tried on all columns.
    Search(Vec<String>),
    /// Each `(column, value)` pair must match its column.
    Filter(Vec<(ColumnRef, String)>),
}

/// Resolves one structured filter key.
fn filter_column(key: &str, custom_columns: &[String]) -> Option<ColumnRef> {
    if let Some(col) = FILTERABLE_COLUMNS.iter().find(|c| **c == key) {
        return Some(ColumnRef::Asset(col.to_string()));
    }
    match JoinColumn::parse(key) {
        Some(JoinColumn::AssignedTo) => None,
        Some(join) => Some(ColumnRef::Join(join)),
        None if custom_columns.iter().any(|c| c == key) => Some(ColumnRef::Custom(key.to_string())),
        None => None,
    }
}

/// Parses the structured filter parameter.
///
/// Anything that is not a JSON object is treated as no filter. String,
/// number and boolean values are matched by their text; other values and
/// unknown keys are dropped.
pub fn parse_filter(raw: &str, custom_columns: &[String]) -> Vec<(ColumnRef, String)> {
    let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(raw) else {
        return Vec::new();
    };

    map.into_iter()
        .filter_map(|(key, value)| {
            let column = filter_column(&key, custom_columns)?;
            let value = match value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            let value = value.trim().to_string();
            (!value.is_empty()).then_some((column, value))
        })
        .collect()
}

// =============================================================================
// Parameters & Query
// =============================================================================

/// Listing parameters as they arrive from a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ListParams {
    pub search: Option<String>,
    /// JSON object of `column -> value`.
    pub filter: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
    /// Status bucket name.
    pub status: Option<String>,
    pub status_id: Option<String>,
    #[serde(default)]
    pub model_ids: Vec<String>,
    pub category_id: Option<String>,
    pub location_id: Option<String>,
    pub supplier_id: Option<String>,
    pub company_id: Option<String>,
    pub manufacturer_id: Option<String>,
    pub order_number: Option<String>,
}

/// Id-valued filters, each an exact match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ScalarFilters {
    pub status_id: Option<String>,
    pub model_ids: Vec<String>,
    pub category_id: Option<String>,
    pub location_id: Option<String>,
    pub supplier_id: Option<String>,
    pub company_id: Option<String>,
    pub manufacturer_id: Option<String>,
    /// Stored sanitized, so matched sanitized.
    pub order_number: Option<String>,
}

/// A fully resolved listing request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AssetListQuery {
    pub text: TextMatch,
    pub scalars: ScalarFilters,
    pub status: Option<StatusBucket>,
    /// `Some(None)` limits to assets without a company.
    pub company_restriction: Option<Option<String>>,
    pub sort: Sort,
    pub offset: i64,
    pub limit: i64,
}

impl Default for AssetListQuery {
    fn default() -> Self {
        AssetListQuery {
            text: TextMatch::None,
            scalars: ScalarFilters::default(),
            status: None,
            company_restriction: None,
            sort: Sort::default(),
            offset: 0,
            limit: DEFAULT_LIST_LIMIT,
        }
    }
}

impl AssetListQuery {
    /// Resolves request parameters.
    ///
    /// `custom_columns` are all registered custom field columns; they extend
    /// the filter and sort allow-lists. A non-positive `limit` falls back to
    /// `default_limit`, a negative `offset` to 0.
    pub fn from_params(
        params: &ListParams,
        custom_columns: &[String],
        default_limit: i64,
    ) -> Result<Self, FieldErrors> {
        let mut errors = FieldErrors::new();

        let filter = params
            .filter
            .as_deref()
            .map(|raw| parse_filter(raw, custom_columns))
            .unwrap_or_default();

        let text = if !filter.is_empty() {
            TextMatch::Filter(filter)
        } else {
            match params.search.as_deref() {
                Some(raw) => match errors.check(validate_search_query(raw)) {
                    Some(query) if !query.is_empty() => {
                        TextMatch::Search(query.split_whitespace().map(str::to_string).collect())
                    }
                    _ => TextMatch::None,
                },
                None => TextMatch::None,
            }
        };

        errors.into_result()?;

        let scalars = ScalarFilters {
            status_id: non_blank(&params.status_id),
            model_ids: params
                .model_ids
                .iter()
                .map(|id| id.trim())
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect(),
            category_id: non_blank(&params.category_id),
            location_id: non_blank(&params.location_id),
            supplier_id: non_blank(&params.supplier_id),
            company_id: non_blank(&params.company_id),
            manufacturer_id: non_blank(&params.manufacturer_id),
            order_number: non_blank(&params.order_number).map(|n| sanitize(&n)),
        };

        let limit = match params.limit {
            Some(limit) if limit > 0 => limit,
            _ => default_limit,
        };

        Ok(AssetListQuery {
            text,
            scalars,
            status: params.status.as_deref().and_then(StatusBucket::parse),
            company_restriction: None,
            sort: Sort::resolve(params.sort.as_deref(), params.order.as_deref(), custom_columns),
            offset: params.offset.unwrap_or(0).max(0),
            limit,
        })
    }

    /// Applies a company scope restriction.
    pub fn restrict_to_company(mut self, restriction: Option<Option<String>>) -> Self {
        self.company_restriction = restriction;
        self
    }

    /// Whether soft-deleted rows take part in the listing.
    pub fn includes_deleted(&self) -> bool {
        self.status == Some(StatusBucket::Deleted)
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// =============================================================================
// Unit Tests
// =============================================================================
