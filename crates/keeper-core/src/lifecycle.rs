//! # Asset Lifecycle
//!
//! Pure state transitions for assets. Every function here takes the asset
//! plus whatever related records it needs as plain values, mutates the asset
//! in memory and returns the log entry to append. Persisting both atomically
//! is the store's job.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Asset Lifecycle                                   │
//! │                                                                         │
//! │  build_asset() ──► Available ──check_out()──► CheckedOut               │
//! │                        ▲                          │                     │
//! │                        └────────check_in()────────┘                     │
//! │                                                                         │
//! │  audit()        any state, schedules the next audit                     │
//! │  apply_update() any state, may re-run check_out (Reassign guard)        │
//! │  mark_deleted() any state, clears the assignment, sets deleted_at       │
//! │                                                                         │
//! │  Every transition appends exactly one immutable LogEntry.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::company::CompanyScope;
use crate::error::{CoreError, CoreResult, FieldErrors, ValidationError};
use crate::types::{
    Actor, Asset, AssetModel, CheckoutTarget, LogAction, LogEntry, TargetKind, TargetRef, User,
};
use crate::validation::{
    parse_date, sanitize, sanitize_opt, validate_asset_tag, validate_length,
    validate_purchase_cost, validate_required_id, validate_warranty_months,
};

/// Note recorded when an asset is checked out as part of its creation.
pub const CHECKOUT_NOTE_ON_CREATE: &str = "Checked out on asset creation";

/// Note recorded when an update re-runs checkout.
pub const CHECKOUT_NOTE_ON_UPDATE: &str = "Checked out on asset update";

// =============================================================================
// Inputs
// =============================================================================

/// The three mutually exclusive ways a request can name a checkout target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AssignmentRequest {
    pub assigned_user: Option<String>,
    pub assigned_asset: Option<String>,
    pub assigned_location: Option<String>,
}

impl AssignmentRequest {
    pub fn user(id: impl Into<String>) -> Self {
        AssignmentRequest {
            assigned_user: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn asset(id: impl Into<String>) -> Self {
        AssignmentRequest {
            assigned_asset: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn location(id: impl Into<String>) -> Self {
        AssignmentRequest {
            assigned_location: Some(id.into()),
            ..Default::default()
        }
    }

    /// Picks the target, first match wins: user, then asset, then location.
    /// Blank ids count as absent.
    pub fn resolve(&self) -> Option<TargetRef> {
        let candidates = [
            (TargetKind::User, &self.assigned_user),
            (TargetKind::Asset, &self.assigned_asset),
            (TargetKind::Location, &self.assigned_location),
        ];

        candidates.into_iter().find_map(|(kind, id)| {
            id.as_deref()
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(|id| TargetRef {
                    kind,
                    id: id.to_string(),
                })
        })
    }
}

/// Fields for a new asset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewAsset {
    pub name: Option<String>,
    pub asset_tag: String,
    pub serial: Option<String>,
    pub notes: Option<String>,
    pub order_number: Option<String>,
    pub model_id: String,
    pub status_id: String,
    pub company_id: Option<String>,
    pub supplier_id: Option<String>,
    pub rtd_location_id: Option<String>,
    pub requestable: bool,
    /// Free-text cost, e.g. `"1,299.00"`.
    pub purchase_cost: Option<String>,
    /// `YYYY-MM-DD`.
    pub purchase_date: Option<String>,
    pub warranty_months: Option<i64>,
    /// Raw custom values keyed by column. Only fieldset columns are read.
    pub custom_fields: BTreeMap<String, String>,
    pub assignment: AssignmentRequest,
}

/// A partial update. `None` and blank strings leave the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AssetUpdate {
    pub name: Option<String>,
    pub asset_tag: Option<String>,
    pub serial: Option<String>,
    pub notes: Option<String>,
    pub order_number: Option<String>,
    pub model_id: Option<String>,
    pub status_id: Option<String>,
    pub company_id: Option<String>,
    pub supplier_id: Option<String>,
    pub rtd_location_id: Option<String>,
    pub archived: Option<bool>,
    pub requestable: Option<bool>,
    pub purchase_cost: Option<String>,
    pub purchase_date: Option<String>,
    pub warranty_months: Option<i64>,
    /// Merged only when `model_id` is part of the update.
    pub custom_fields: BTreeMap<String, String>,
    pub assignment: AssignmentRequest,
}

/// Checkout parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub checkout_at: DateTime<Utc>,
    pub expected_checkin: Option<NaiveDate>,
    pub note: Option<String>,
    /// Renames the asset as part of the checkout.
    pub name: Option<String>,
}

impl CheckoutRequest {
    pub fn at(checkout_at: DateTime<Utc>) -> Self {
        CheckoutRequest {
            checkout_at,
            expected_checkin: None,
            note: None,
            name: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// How strict the checkout precondition is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutGuard {
    /// Explicit checkout: the asset must be available.
    Available,
    /// Re-checkout triggered by an update. Only archived or deleted assets
    /// are refused; an existing assignment is overwritten.
    Reassign,
}

/// Checkin parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckinRequest {
    pub checkin_at: DateTime<Utc>,
    pub note: Option<String>,
    pub status_id: Option<String>,
    pub name: Option<String>,
}

impl CheckinRequest {
    pub fn at(checkin_at: DateTime<Utc>) -> Self {
        CheckinRequest {
            checkin_at,
            note: None,
            status_id: None,
            name: None,
        }
    }
}

/// Audit parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRequest {
    pub audited_at: DateTime<Utc>,
    pub note: Option<String>,
    pub location_id: Option<String>,
    pub next_audit_date: Option<NaiveDate>,
}

// =============================================================================
// Outputs
// =============================================================================

/// Everything the caller needs after a checkin, including what it takes to
/// decide on and build the confirmation mail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CheckinReceipt {
    pub log: LogEntry,
    pub prior_target: TargetRef,
    /// First name of the prior assignee when it was a person, else empty.
    pub first_name: String,
    pub item_name: String,
    pub item_tag: String,
    pub item_serial: Option<String>,
    pub note: Option<String>,
    #[ts(as = "String")]
    pub checkin_date: DateTime<Utc>,
}

/// Result of an audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AuditReceipt {
    pub log: LogEntry,
    #[ts(as = "String")]
    pub next_audit_due: NaiveDate,
}

// =============================================================================
// Log Entries
// =============================================================================

impl LogEntry {
    /// Starts a new entry for `asset`.
    pub fn new(action: LogAction, asset: &Asset, actor: &Actor, at: DateTime<Utc>) -> Self {
        LogEntry {
            id: Uuid::new_v4().to_string(),
            action,
            item_id: asset.id.clone(),
            target_type: None,
            target_id: None,
            actor_id: Some(actor.id.clone()),
            note: None,
            location_id: None,
            next_audit_date: None,
            created_at: at,
        }
    }

    fn with_target(mut self, target: &TargetRef) -> Self {
        self.target_type = Some(target.kind);
        self.target_id = Some(target.id.clone());
        self
    }

    /// When the next audit is due: this entry's date plus `interval_months`.
    pub fn calc_next_audit_date(&self, interval_months: u32) -> NaiveDate {
        let date = self.created_at.date_naive();
        date.checked_add_months(Months::new(interval_months))
            .unwrap_or(NaiveDate::MAX)
    }
}

// =============================================================================
// Create
// =============================================================================

/// Builds a new asset bound to `model` and its creation log entry.
///
/// Custom values are read only for columns declared by the model's fieldset,
/// HTML-escaped, and required columns must be present. All problems are
/// collected into one `FieldErrors`.
pub fn build_asset(
    input: &NewAsset,
    model: &AssetModel,
    actor: &Actor,
    scope: CompanyScope,
    now: DateTime<Utc>,
) -> Result<(Asset, LogEntry), FieldErrors> {
    let mut errors = FieldErrors::new();

    errors.check(validate_asset_tag(&input.asset_tag));
    errors.check(validate_required_id("model_id", &input.model_id));
    errors.check(validate_required_id("status_id", &input.status_id));
    if input.model_id.trim() != model.id {
        errors.push(ValidationError::UnknownReference {
            field: "model_id".to_string(),
        });
    }
    for (field, value) in [
        ("name", &input.name),
        ("serial", &input.serial),
        ("order_number", &input.order_number),
    ] {
        if let Some(value) = value {
            errors.check(validate_length(field, value));
        }
    }
    if let Some(months) = input.warranty_months {
        errors.check(validate_warranty_months(months));
    }
    let purchase_cost = input
        .purchase_cost
        .as_deref()
        .and_then(|raw| errors.check(validate_purchase_cost(raw)))
        .flatten();
    let purchase_date = present(&input.purchase_date)
        .and_then(|raw| errors.check(parse_date("purchase_date", raw)));

    let custom_fields = collect_custom_fields(model, &input.custom_fields, true, &mut errors);

    errors.into_result()?;

    let rtd_location_id = present(&input.rtd_location_id).map(str::to_string);
    let asset = Asset {
        id: Uuid::new_v4().to_string(),
        name: present(&input.name).map(str::to_string),
        asset_tag: input.asset_tag.trim().to_string(),
        serial: present(&input.serial).map(str::to_string),
        notes: present(&input.notes).map(str::to_string),
        order_number: present(&input.order_number).map(sanitize),
        model_id: model.id.clone(),
        status_id: input.status_id.trim().to_string(),
        company_id: scope.id_for_actor(actor, input.company_id.as_deref()),
        supplier_id: present(&input.supplier_id).map(str::to_string),
        location_id: rtd_location_id.clone(),
        rtd_location_id,
        archived: false,
        requestable: input.requestable,
        purchase_cost,
        purchase_date,
        warranty_months: input.warranty_months,
        assigned_to: None,
        assigned_type: None,
        accepted: None,
        last_checkout: None,
        expected_checkin: None,
        next_audit_date: None,
        custom_fields,
        created_by: Some(actor.id.clone()),
        created_at: now,
        updated_at: now,
        deleted_at: None,
    };

    let log = LogEntry::new(LogAction::Create, &asset, actor, now);
    Ok((asset, log))
}

// =============================================================================
// Update
// =============================================================================

/// Applies a partial update in place and returns the update log entry.
///
/// `new_model` must be the record for `update.model_id` when that is set;
/// custom values are merged only in that case. On error the asset is left
/// untouched.
pub fn apply_update(
    asset: &mut Asset,
    update: &AssetUpdate,
    new_model: Option<&AssetModel>,
    actor: &Actor,
    scope: CompanyScope,
    now: DateTime<Utc>,
) -> Result<LogEntry, FieldErrors> {
    let mut errors = FieldErrors::new();
    let mut next = asset.clone();

    if let Some(tag) = present(&update.asset_tag) {
        if errors.check(validate_asset_tag(tag)).is_some() {
            next.asset_tag = tag.to_string();
        }
    }
    for (field, value, slot) in [
        ("name", &update.name, &mut next.name),
        ("serial", &update.serial, &mut next.serial),
        ("order_number", &update.order_number, &mut next.order_number),
        ("notes", &update.notes, &mut next.notes),
    ] {
        if let Some(value) = present(value) {
            if field == "notes" || errors.check(validate_length(field, value)).is_some() {
                *slot = Some(match field {
                    "order_number" => sanitize(value),
                    _ => value.to_string(),
                });
            }
        }
    }
    if let Some(model_id) = present(&update.model_id) {
        match new_model {
            Some(model) if model.id == model_id => {
                next.model_id = model.id.clone();
                let merged = collect_custom_fields(model, &update.custom_fields, false, &mut errors);
                next.custom_fields.extend(merged);
            }
            _ => errors.push(ValidationError::UnknownReference {
                field: "model_id".to_string(),
            }),
        }
    }
    if let Some(status_id) = present(&update.status_id) {
        next.status_id = status_id.to_string();
    }
    if let Some(supplier_id) = present(&update.supplier_id) {
        next.supplier_id = Some(supplier_id.to_string());
    }
    if let Some(rtd) = present(&update.rtd_location_id) {
        next.rtd_location_id = Some(rtd.to_string());
    }
    if let Some(archived) = update.archived {
        next.archived = archived;
    }
    if let Some(requestable) = update.requestable {
        next.requestable = requestable;
    }
    if let Some(months) = update.warranty_months {
        if errors.check(validate_warranty_months(months)).is_some() {
            next.warranty_months = Some(months);
        }
    }
    if let Some(raw) = present(&update.purchase_cost) {
        if let Some(cost) = errors.check(validate_purchase_cost(raw)) {
            next.purchase_cost = cost;
        }
    }
    if let Some(raw) = present(&update.purchase_date) {
        if let Some(date) = errors.check(parse_date("purchase_date", raw)) {
            next.purchase_date = Some(date);
        }
    }
    if let Some(company_id) = present(&update.company_id) {
        next.company_id = scope.id_for_actor(actor, Some(company_id));
    }

    errors.into_result()?;

    next.updated_at = now;
    *asset = next;
    Ok(LogEntry::new(LogAction::Update, asset, actor, now))
}

// =============================================================================
// Checkout
// =============================================================================

/// Assigns `asset` to `target`.
///
/// ## Preconditions
/// - `CheckoutGuard::Available`: unassigned, not archived, not deleted
/// - `CheckoutGuard::Reassign`: not archived, not deleted
/// - the target is not the asset itself
///
/// ## Effects
/// Sets the assignment, `last_checkout` and `expected_checkin`, clears
/// `accepted`, moves the asset to the target's location and optionally
/// renames it.
pub fn check_out(
    asset: &mut Asset,
    target: &CheckoutTarget,
    actor: &Actor,
    request: &CheckoutRequest,
    guard: CheckoutGuard,
) -> CoreResult<LogEntry> {
    let allowed = match guard {
        CheckoutGuard::Available => asset.is_available_for_checkout(),
        CheckoutGuard::Reassign => !asset.archived && !asset.is_deleted(),
    };
    if !allowed {
        return Err(CoreError::NotAvailable {
            asset_tag: asset.asset_tag.clone(),
        });
    }
    if target.kind() == TargetKind::Asset && target.id() == asset.id {
        return Err(CoreError::SelfCheckout {
            asset_tag: asset.asset_tag.clone(),
        });
    }

    let target_ref = target.to_ref();
    asset.assigned_to = Some(target_ref.id.clone());
    asset.assigned_type = Some(target_ref.kind);
    asset.last_checkout = Some(request.checkout_at);
    asset.expected_checkin = request.expected_checkin;
    asset.accepted = None;
    if let Some(location_id) = target.implied_location_id() {
        asset.location_id = Some(location_id.to_string());
    }
    if let Some(name) = present(&request.name) {
        asset.name = Some(sanitize(name));
    }
    asset.updated_at = request.checkout_at;

    let mut log = LogEntry::new(LogAction::Checkout, asset, actor, request.checkout_at)
        .with_target(&target_ref);
    log.note = sanitize_opt(request.note.as_deref());
    log.location_id = asset.location_id.clone();
    Ok(log)
}

// =============================================================================
// Checkin
// =============================================================================

/// Releases the current assignment.
///
/// `prior_user` is the pre-loaded assignee when the asset is checked out to
/// a person; it only feeds the receipt's first name.
pub fn check_in(
    asset: &mut Asset,
    prior_user: Option<&User>,
    actor: &Actor,
    request: &CheckinRequest,
) -> CoreResult<CheckinReceipt> {
    let prior_target = asset
        .assigned_target()
        .ok_or_else(|| CoreError::AlreadyCheckedIn {
            asset_tag: asset.asset_tag.clone(),
        })?;

    asset.assigned_to = None;
    asset.assigned_type = None;
    asset.last_checkout = None;
    asset.expected_checkin = None;
    asset.accepted = None;
    asset.location_id = asset.rtd_location_id.clone();
    if let Some(status_id) = present(&request.status_id) {
        asset.status_id = status_id.to_string();
    }
    if let Some(name) = present(&request.name) {
        asset.name = Some(sanitize(name));
    }
    asset.updated_at = request.checkin_at;

    let mut log = LogEntry::new(LogAction::Checkin, asset, actor, request.checkin_at)
        .with_target(&prior_target);
    log.note = sanitize_opt(request.note.as_deref());
    log.location_id = asset.location_id.clone();

    let first_name = match (prior_target.kind, prior_user) {
        (TargetKind::User, Some(user)) if user.id == prior_target.id => user.first_name.clone(),
        _ => String::new(),
    };

    Ok(CheckinReceipt {
        first_name,
        item_name: asset.display_name().to_string(),
        item_tag: asset.asset_tag.clone(),
        item_serial: asset.serial.clone(),
        note: log.note.clone(),
        checkin_date: log.created_at,
        prior_target,
        log,
    })
}

/// Whether a checkin confirmation mail goes out.
///
/// All three must hold: the model asks for checkin mails, the asset was
/// with a person, and the site is not in locked-down demo mode.
pub fn should_send_checkin_email(
    model: &AssetModel,
    prior_target: &TargetRef,
    lock_passwords: bool,
) -> bool {
    model.checkin_email && prior_target.kind == TargetKind::User && !lock_passwords
}

// =============================================================================
// Audit
// =============================================================================

/// Records a physical-presence audit.
///
/// `next_audit_date` is the requested date, or the computed due date when
/// none was given.
pub fn audit(
    asset: &mut Asset,
    actor: &Actor,
    request: &AuditRequest,
    interval_months: u32,
) -> AuditReceipt {
    let mut log = LogEntry::new(LogAction::Audit, asset, actor, request.audited_at);
    log.note = sanitize_opt(request.note.as_deref());
    log.location_id = present(&request.location_id).map(str::to_string);

    let next_audit_due = log.calc_next_audit_date(interval_months);
    let scheduled = request.next_audit_date.unwrap_or(next_audit_due);
    log.next_audit_date = Some(scheduled);

    asset.next_audit_date = Some(scheduled);
    asset.updated_at = request.audited_at;

    AuditReceipt {
        log,
        next_audit_due,
    }
}

// =============================================================================
// Delete
// =============================================================================

/// Clears any assignment and marks the asset deleted.
pub fn mark_deleted(asset: &mut Asset, actor: &Actor, at: DateTime<Utc>) -> LogEntry {
    let prior_target = asset.assigned_target();

    asset.assigned_to = None;
    asset.assigned_type = None;
    asset.last_checkout = None;
    asset.expected_checkin = None;
    asset.accepted = None;
    asset.deleted_at = Some(at);
    asset.updated_at = at;

    let log = LogEntry::new(LogAction::Delete, asset, actor, at);
    match prior_target {
        Some(target) => log.with_target(&target),
        None => log,
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Trimmed value of an optional input, `None` when absent or blank.
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Reads the fieldset's columns out of `raw`, sanitizing each value.
fn collect_custom_fields(
    model: &AssetModel,
    raw: &BTreeMap<String, String>,
    enforce_required: bool,
    errors: &mut FieldErrors,
) -> BTreeMap<String, String> {
    let mut values = BTreeMap::new();
    for field in model.custom_fields() {
        match raw.get(&field.column).map(|v| v.trim()).filter(|v| !v.is_empty()) {
            Some(value) => {
                values.insert(field.column.clone(), sanitize(value));
            }
            None if enforce_required && field.required => {
                errors.add(field.column.clone(), format!("{} is required", field.name));
            }
            None => {}
        }
    }
    values
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::tests::sample_asset;
    use crate::types::{CustomFieldDef, Fieldset, Location, ParentAsset};
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()
    }

    fn actor() -> Actor {
        Actor::new("admin")
    }

    fn user_target() -> CheckoutTarget {
        CheckoutTarget::User(User {
            id: "user-1".to_string(),
            first_name: "Grace".to_string(),
            last_name: "Hopper".to_string(),
            email: Some("grace@example.com".to_string()),
            company_id: None,
            location_id: Some("loc-remote".to_string()),
        })
    }

    fn model() -> AssetModel {
        AssetModel {
            id: "model-1".to_string(),
            name: "ThinkPad X1".to_string(),
            model_number: Some("20XW".to_string()),
            category_id: None,
            manufacturer_id: None,
            checkin_email: true,
            fieldset: Some(Fieldset {
                id: "fs-1".to_string(),
                name: "Laptops".to_string(),
                fields: vec![
                    CustomFieldDef {
                        id: "cf-1".to_string(),
                        name: "MAC Address".to_string(),
                        column: "_cf_mac_address".to_string(),
                        required: true,
                    },
                    CustomFieldDef {
                        id: "cf-2".to_string(),
                        name: "RAM".to_string(),
                        column: "_cf_ram".to_string(),
                        required: false,
                    },
                ],
            }),
        }
    }

    fn new_asset() -> NewAsset {
        let mut custom = BTreeMap::new();
        custom.insert("_cf_mac_address".to_string(), "<aa:bb>".to_string());
        custom.insert("_cf_not_in_fieldset".to_string(), "ignored".to_string());
        NewAsset {
            asset_tag: "TAG-100".to_string(),
            model_id: "model-1".to_string(),
            status_id: "status-ready".to_string(),
            rtd_location_id: Some("loc-hq".to_string()),
            purchase_cost: Some("1,200.50".to_string()),
            purchase_date: Some("2024-01-02".to_string()),
            warranty_months: Some(36),
            custom_fields: custom,
            ..Default::default()
        }
    }

    #[test]
    fn test_resolve_first_match_wins() {
        let request = AssignmentRequest {
            assigned_user: Some("u".to_string()),
            assigned_asset: Some("a".to_string()),
            assigned_location: Some("l".to_string()),
        };
        assert_eq!(request.resolve().unwrap().kind, TargetKind::User);

        let request = AssignmentRequest {
            assigned_user: Some(" ".to_string()),
            assigned_asset: None,
            assigned_location: Some("l".to_string()),
        };
        let target = request.resolve().unwrap();
        assert_eq!(target.kind, TargetKind::Location);
        assert_eq!(target.id, "l");

        assert!(AssignmentRequest::default().resolve().is_none());
    }

    #[test]
    fn test_build_asset_reads_only_fieldset_columns() {
        let (asset, log) =
            build_asset(&new_asset(), &model(), &actor(), CompanyScope::default(), at(1)).unwrap();

        assert_eq!(asset.custom_fields.len(), 1);
        assert_eq!(asset.custom_fields["_cf_mac_address"], "&lt;aa:bb&gt;");
        assert_eq!(asset.purchase_cost.unwrap().cents(), 120_050);
        assert_eq!(asset.location_id.as_deref(), Some("loc-hq"));
        assert_eq!(asset.assignment_state(), crate::AssignmentState::Available);
        assert_eq!(log.action, LogAction::Create);
        assert_eq!(log.item_id, asset.id);
    }

    #[test]
    fn test_build_asset_collects_field_errors() {
        let mut input = new_asset();
        input.asset_tag = String::new();
        input.warranty_months = Some(500);
        input.purchase_date = Some("yesterday".to_string());
        input.custom_fields.clear();

        let errors =
            build_asset(&input, &model(), &actor(), CompanyScope::default(), at(1)).unwrap_err();
        let fields: Vec<_> = errors.fields().collect();
        assert_eq!(
            fields,
            vec!["_cf_mac_address", "asset_tag", "purchase_date", "warranty_months"]
        );
    }

    #[test]
    fn test_checkout_sets_assignment() {
        let mut asset = sample_asset();
        asset.accepted = Some(true);
        let request = CheckoutRequest {
            checkout_at: at(2),
            expected_checkin: NaiveDate::from_ymd_opt(2024, 4, 1),
            note: Some("for <travel>".to_string()),
            name: Some("Grace's laptop".to_string()),
        };

        let log = check_out(&mut asset, &user_target(), &actor(), &request, CheckoutGuard::Available)
            .unwrap();

        assert_eq!(asset.assigned_to.as_deref(), Some("user-1"));
        assert_eq!(asset.assigned_type, Some(TargetKind::User));
        assert_eq!(asset.last_checkout, Some(at(2)));
        assert_eq!(asset.expected_checkin, NaiveDate::from_ymd_opt(2024, 4, 1));
        assert_eq!(asset.accepted, None);
        assert_eq!(asset.location_id.as_deref(), Some("loc-remote"));
        assert_eq!(asset.name.as_deref(), Some("Grace's laptop"));
        assert_eq!(log.action, LogAction::Checkout);
        assert_eq!(log.target_id.as_deref(), Some("user-1"));
        assert_eq!(log.note.as_deref(), Some("for &lt;travel&gt;"));
    }

    #[test]
    fn test_checkout_requires_availability() {
        let request = CheckoutRequest::at(at(2));

        let mut assigned = sample_asset();
        check_out(&mut assigned, &user_target(), &actor(), &request, CheckoutGuard::Available)
            .unwrap();
        let before = assigned.clone();
        let err = check_out(&mut assigned, &user_target(), &actor(), &request, CheckoutGuard::Available)
            .unwrap_err();
        assert!(matches!(err, CoreError::NotAvailable { .. }));
        assert_eq!(assigned, before);

        let mut archived = sample_asset();
        archived.archived = true;
        let err = check_out(&mut archived, &user_target(), &actor(), &request, CheckoutGuard::Available)
            .unwrap_err();
        assert!(matches!(err, CoreError::NotAvailable { .. }));
    }

    #[test]
    fn test_reassign_guard_overwrites_assignment() {
        let mut asset = sample_asset();
        let request = CheckoutRequest::at(at(2));
        check_out(&mut asset, &user_target(), &actor(), &request, CheckoutGuard::Available).unwrap();

        let lab = CheckoutTarget::Location(Location {
            id: "loc-lab".to_string(),
            name: "Lab".to_string(),
        });
        check_out(&mut asset, &lab, &actor(), &CheckoutRequest::at(at(3)), CheckoutGuard::Reassign)
            .unwrap();
        assert_eq!(asset.assigned_to.as_deref(), Some("loc-lab"));
        assert_eq!(asset.assigned_type, Some(TargetKind::Location));
        assert_eq!(asset.last_checkout, Some(at(3)));
    }

    #[test]
    fn test_checkout_to_self_is_rejected() {
        let mut asset = sample_asset();
        let itself = CheckoutTarget::Asset(ParentAsset {
            id: asset.id.clone(),
            asset_tag: asset.asset_tag.clone(),
            location_id: None,
        });
        let err = check_out(
            &mut asset,
            &itself,
            &actor(),
            &CheckoutRequest::at(at(2)),
            CheckoutGuard::Available,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::SelfCheckout { .. }));
        assert!(asset.assigned_to.is_none());
    }

    #[test]
    fn test_checkin_clears_assignment_and_returns_home() {
        let mut asset = sample_asset();
        check_out(
            &mut asset,
            &user_target(),
            &actor(),
            &CheckoutRequest::at(at(2)),
            CheckoutGuard::Available,
        )
        .unwrap();

        let prior = match user_target() {
            CheckoutTarget::User(user) => user,
            _ => unreachable!(),
        };
        let mut request = CheckinRequest::at(at(5));
        request.note = Some("returned".to_string());
        request.status_id = Some("status-repair".to_string());

        let receipt = check_in(&mut asset, Some(&prior), &actor(), &request).unwrap();

        assert!(asset.assigned_to.is_none());
        assert!(asset.assigned_type.is_none());
        assert!(asset.last_checkout.is_none());
        assert!(asset.expected_checkin.is_none());
        assert_eq!(asset.location_id.as_deref(), Some("loc-hq"));
        assert_eq!(asset.status_id, "status-repair");
        assert_eq!(receipt.first_name, "Grace");
        assert_eq!(receipt.prior_target.kind, TargetKind::User);
        assert_eq!(receipt.item_tag, "TAG-001");
        assert_eq!(receipt.note.as_deref(), Some("returned"));
        assert_eq!(receipt.log.action, LogAction::Checkin);
        assert_eq!(receipt.checkin_date, at(5));
    }

    #[test]
    fn test_checkin_requires_assignment() {
        let mut asset = sample_asset();
        let err = check_in(&mut asset, None, &actor(), &CheckinRequest::at(at(5))).unwrap_err();
        assert!(matches!(err, CoreError::AlreadyCheckedIn { .. }));
    }

    #[test]
    fn test_checkin_email_policy() {
        let user = TargetRef {
            kind: TargetKind::User,
            id: "u".to_string(),
        };
        let place = TargetRef {
            kind: TargetKind::Location,
            id: "l".to_string(),
        };
        let mut model = model();

        assert!(should_send_checkin_email(&model, &user, false));
        assert!(!should_send_checkin_email(&model, &user, true));
        assert!(!should_send_checkin_email(&model, &place, false));
        model.checkin_email = false;
        assert!(!should_send_checkin_email(&model, &user, false));
    }

    #[test]
    fn test_audit_schedules_next_date() {
        let mut asset = sample_asset();
        let request = AuditRequest {
            audited_at: at(31),
            note: Some("ok".to_string()),
            location_id: Some("loc-hq".to_string()),
            next_audit_date: None,
        };
        let receipt = audit(&mut asset, &actor(), &request, 12);

        let expected = NaiveDate::from_ymd_opt(2025, 3, 31).unwrap();
        assert_eq!(receipt.next_audit_due, expected);
        assert_eq!(asset.next_audit_date, Some(expected));
        assert_eq!(receipt.log.action, LogAction::Audit);
        assert_eq!(receipt.log.location_id.as_deref(), Some("loc-hq"));

        let explicit = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let request = AuditRequest {
            next_audit_date: Some(explicit),
            ..request
        };
        let receipt = audit(&mut asset, &actor(), &request, 6);
        assert_eq!(asset.next_audit_date, Some(explicit));
        assert_eq!(receipt.next_audit_due, NaiveDate::from_ymd_opt(2024, 9, 30).unwrap());
    }

    #[test]
    fn test_update_applies_only_present_fields() {
        let mut asset = sample_asset();
        asset.notes = Some("keep me".to_string());
        let update = AssetUpdate {
            name: Some("Renamed".to_string()),
            serial: Some("   ".to_string()),
            archived: Some(true),
            company_id: Some("acme".to_string()),
            ..Default::default()
        };

        let log =
            apply_update(&mut asset, &update, None, &actor(), CompanyScope::default(), at(4)).unwrap();
        assert_eq!(asset.name.as_deref(), Some("Renamed"));
        assert_eq!(asset.serial.as_deref(), Some("SN-1"));
        assert_eq!(asset.notes.as_deref(), Some("keep me"));
        assert!(asset.archived);
        assert_eq!(asset.company_id.as_deref(), Some("acme"));
        assert_eq!(log.action, LogAction::Update);
    }

    #[test]
    fn test_update_merges_custom_fields_with_model_change() {
        let mut asset = sample_asset();
        asset.custom_fields.insert("_cf_ram".to_string(), "8".to_string());
        let mut custom = BTreeMap::new();
        custom.insert("_cf_mac_address".to_string(), "aa:bb".to_string());

        let without_model = AssetUpdate {
            custom_fields: custom.clone(),
            ..Default::default()
        };
        apply_update(&mut asset, &without_model, None, &actor(), CompanyScope::default(), at(4))
            .unwrap();
        assert!(!asset.custom_fields.contains_key("_cf_mac_address"));

        let with_model = AssetUpdate {
            model_id: Some("model-1".to_string()),
            custom_fields: custom,
            ..Default::default()
        };
        apply_update(&mut asset, &with_model, Some(&model()), &actor(), CompanyScope::default(), at(4))
            .unwrap();
        assert_eq!(asset.custom_fields["_cf_mac_address"], "aa:bb");
        assert_eq!(asset.custom_fields["_cf_ram"], "8");
    }

    #[test]
    fn test_update_is_all_or_nothing() {
        let mut asset = sample_asset();
        let before = asset.clone();
        let update = AssetUpdate {
            name: Some("New name".to_string()),
            warranty_months: Some(-4),
            ..Default::default()
        };
        let errors = apply_update(&mut asset, &update, None, &actor(), CompanyScope::default(), at(4))
            .unwrap_err();
        assert!(errors.get("warranty_months").is_some());
        assert_eq!(asset, before);
    }

    #[test]
    fn test_blank_company_leaves_company_alone() {
        let mut asset = sample_asset();
        asset.company_id = Some("acme".to_string());
        let update = AssetUpdate {
            company_id: Some("  ".to_string()),
            serial: Some("SN-2".to_string()),
            ..Default::default()
        };

        apply_update(&mut asset, &update, None, &actor(), CompanyScope::default(), at(4)).unwrap();
        assert_eq!(asset.company_id.as_deref(), Some("acme"));
        assert_eq!(asset.serial.as_deref(), Some("SN-2"));
    }

    #[test]
    fn test_order_number_is_stored_escaped() {
        let mut input = new_asset();
        input.order_number = Some("PO&1".to_string());
        let (mut asset, _) =
            build_asset(&input, &model(), &actor(), CompanyScope::default(), at(1)).unwrap();
        assert_eq!(asset.order_number.as_deref(), Some("PO&amp;1"));

        let update = AssetUpdate {
            order_number: Some("<PO-2>".to_string()),
            ..Default::default()
        };
        apply_update(&mut asset, &update, None, &actor(), CompanyScope::default(), at(2)).unwrap();
        assert_eq!(asset.order_number.as_deref(), Some("&lt;PO-2&gt;"));
    }

    #[test]
    fn test_build_asset_trims_model_id() {
        let mut input = new_asset();
        input.model_id = "  model-1 ".to_string();

        let (asset, _) =
            build_asset(&input, &model(), &actor(), CompanyScope::default(), at(1)).unwrap();
        assert_eq!(asset.model_id, "model-1");
    }

    #[test]
    fn test_checkout_rename_is_escaped() {
        let mut asset = sample_asset();
        let mut request = CheckoutRequest::at(at(2));
        request.name = Some("<b>Loaner</b>".to_string());

        check_out(&mut asset, &user_target(), &actor(), &request, CheckoutGuard::Available).unwrap();
        assert_eq!(asset.name.as_deref(), Some("&lt;b&gt;Loaner&lt;/b&gt;"));
    }

    #[test]
    fn test_mark_deleted_clears_assignment() {
        let mut asset = sample_asset();
        check_out(
            &mut asset,
            &user_target(),
            &actor(),
            &CheckoutRequest::at(at(2)),
            CheckoutGuard::Available,
        )
        .unwrap();

        let log = mark_deleted(&mut asset, &actor(), at(9));
        assert!(asset.assigned_to.is_none());
        assert!(asset.last_checkout.is_none());
        assert_eq!(asset.deleted_at, Some(at(9)));
        assert_eq!(log.action, LogAction::Delete);
        assert_eq!(log.target_id.as_deref(), Some("user-1"));
    }
}
