//! # Asset Service
//!
//! Sequences every asset operation for an explicit actor.
//!
//! ## Operation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    AssetService::checkin(actor, id, request)            │
//! │                                                                         │
//! │  1. gate.authorize(actor, Checkin, AnyAsset)        deny → 403, no-op  │
//! │  2. db.assets().get_by_id(id)                       missing → NotFound │
//! │  3. gate.authorize(actor, Checkin, Asset(&asset))                      │
//! │  4. lifecycle::check_in(&mut asset, ...)            pure, no I/O       │
//! │  5. db.assets().check_in(&asset, &log)              one transaction,   │
//! │                                                     false → conflict   │
//! │  6. notifier.send_checkin_confirmation(...)         after commit,      │
//! │                                                     failure only warns │
//! │  7. ApiResponse { status: success, payload, messages }                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The guarded UPDATE in step 5 is the final word on availability: of two
//! concurrent checkouts of the same asset, exactly one commits.

use chrono::Utc;
use keeper_core::lifecycle::{
    self, AssetUpdate, AssignmentRequest, AuditRequest, CheckinReceipt, CheckinRequest,
    CheckoutGuard, CheckoutRequest, NewAsset, CHECKOUT_NOTE_ON_CREATE, CHECKOUT_NOTE_ON_UPDATE,
};
use keeper_core::validation::{parse_date, validate_required_id};
use keeper_core::{
    Actor, Asset, AssetListQuery, CheckoutTarget, FieldErrors, ListParams, TargetKind, User,
    ValidationError,
};
use keeper_db::Database;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ServiceConfig;
use crate::envelope::{ApiResponse, AssetPage, AssetTagPayload, AuditPayload};
use crate::error::{Lookup, ServiceError, ServiceResult};
use crate::gate::{Action, AuthorizationGate, Resource};
use crate::messages;
use crate::notify::{CheckinMail, NotificationDispatcher, Recipient};

/// Audit parameters as they arrive from a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditInput {
    pub asset_tag: String,
    pub note: Option<String>,
    pub location_id: Option<String>,
    /// `YYYY-MM-DD`; the computed due date is used when absent.
    pub next_audit_date: Option<String>,
}

/// Asset operations behind an authorization gate.
pub struct AssetService<G, N> {
    db: Database,
    gate: G,
    notifier: N,
    config: ServiceConfig,
}

impl<G, N> AssetService<G, N>
where
    G: AuthorizationGate,
    N: NotificationDispatcher,
{
    pub fn new(db: Database, gate: G, notifier: N, config: ServiceConfig) -> Self {
        AssetService {
            db,
            gate,
            notifier,
            config,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn gate(&self) -> &G {
        &self.gate
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Filtered, sorted, paginated listing.
    pub async fn list(
        &self,
        actor: &Actor,
        params: &ListParams,
    ) -> ServiceResult<ApiResponse<AssetPage>> {
        self.authorize(actor, Action::Index, Resource::AnyAsset)?;

        let custom_columns = self.db.catalog().custom_columns().await?;
        let query = AssetListQuery::from_params(params, &custom_columns, self.config.default_page_size)?
            .restrict_to_company(self.config.company_scope().listing_restriction(actor));

        let (rows, total) = self.db.assets().list(&query).await?;
        debug!(total, returned = rows.len(), "Listed assets");

        Ok(ApiResponse::data(AssetPage { total, rows }))
    }

    /// One asset by id, soft-deleted included.
    pub async fn show(&self, actor: &Actor, id: &str) -> ServiceResult<ApiResponse<Asset>> {
        let asset = self
            .db
            .assets()
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(Lookup::Id(id.to_string())))?;

        self.authorize(actor, Action::View, Resource::Asset(&asset))?;
        Ok(ApiResponse::data(asset))
    }

    // =========================================================================
    // Create & Update
    // =========================================================================

    /// Creates an asset and, when the input names a target that exists,
    /// checks it out right away.
    pub async fn create(&self, actor: &Actor, input: &NewAsset) -> ServiceResult<ApiResponse<Asset>> {
        self.authorize(actor, Action::Create, Resource::AnyAsset)?;

        validate_required_id("model_id", &input.model_id)?;
        let model = self
            .db
            .catalog()
            .get_model(input.model_id.trim())
            .await?
            .ok_or_else(|| unknown_reference("model_id"))?;
        self.require_status(&input.status_id).await?;

        let now = Utc::now();
        let (mut asset, log) =
            lifecycle::build_asset(input, &model, actor, self.config.company_scope(), now)?;
        self.db.assets().insert(&asset, &log).await?;

        info!(
            id = %asset.id,
            asset_tag = %asset.asset_tag,
            actor = %actor.id,
            "Asset created"
        );

        if let Some(target) = self.resolve_target(&input.assignment).await? {
            let mut request = CheckoutRequest::at(now).with_note(CHECKOUT_NOTE_ON_CREATE);
            request.name = input.name.clone();

            let log =
                lifecycle::check_out(&mut asset, &target, actor, &request, CheckoutGuard::Available)?;
            if !self.db.assets().check_out(&asset, &log).await? {
                return Err(ServiceError::NotAvailable {
                    asset_tag: asset.asset_tag,
                });
            }
            info!(
                asset_tag = %asset.asset_tag,
                target_kind = %target.kind(),
                target_id = %target.id(),
                "Asset checked out on creation"
            );
        }

        Ok(ApiResponse::success(asset, messages::CREATE_SUCCESS))
    }

    /// Applies a partial update.
    ///
    /// A target in the update checks the asset out again, replacing any
    /// current assignment, in the same transaction as the update. The write
    /// only lands if nobody changed the asset since it was loaded here.
    pub async fn update(
        &self,
        actor: &Actor,
        id: &str,
        update: &AssetUpdate,
    ) -> ServiceResult<ApiResponse<Asset>> {
        self.authorize(actor, Action::Update, Resource::AnyAsset)?;
        let mut asset = self.live_asset(id).await?;
        self.authorize(actor, Action::Update, Resource::Asset(&asset))?;
        let loaded_at = asset.updated_at;

        let new_model = match non_blank(&update.model_id) {
            Some(model_id) => self.db.catalog().get_model(model_id).await?,
            None => None,
        };
        if let Some(status_id) = non_blank(&update.status_id) {
            self.require_status(status_id).await?;
        }

        let now = Utc::now();
        let mut entries = vec![lifecycle::apply_update(
            &mut asset,
            update,
            new_model.as_ref(),
            actor,
            self.config.company_scope(),
            now,
        )?];

        if let Some(target) = self.resolve_target(&update.assignment).await? {
            let mut request = CheckoutRequest::at(now).with_note(CHECKOUT_NOTE_ON_UPDATE);
            request.name = update.name.clone();
            entries.push(lifecycle::check_out(
                &mut asset,
                &target,
                actor,
                &request,
                CheckoutGuard::Reassign,
            )?);
        }

        if !self.db.assets().update(&asset, loaded_at, &entries).await? {
            // Deleted in the meantime reads as NotFound, anything else as a conflict.
            self.live_asset(id).await?;
            warn!(asset_tag = %asset.asset_tag, "Asset changed while being updated");
            return Err(ServiceError::Conflict {
                asset_tag: asset.asset_tag,
            });
        }

        info!(
            id = %asset.id,
            asset_tag = %asset.asset_tag,
            actor = %actor.id,
            rechecked_out = entries.len() > 1,
            "Asset updated"
        );

        Ok(ApiResponse::success(asset, messages::UPDATE_SUCCESS))
    }

    // =========================================================================
    // Delete
    // =========================================================================

    /// Clears the assignment and soft-deletes the asset.
    pub async fn delete(&self, actor: &Actor, id: &str) -> ServiceResult<ApiResponse<()>> {
        self.authorize(actor, Action::Delete, Resource::AnyAsset)?;
        let mut asset = self.live_asset(id).await?;
        self.authorize(actor, Action::Delete, Resource::Asset(&asset))?;

        let log = lifecycle::mark_deleted(&mut asset, actor, Utc::now());
        if !self.db.assets().soft_delete(&asset, &log).await? {
            return Err(ServiceError::NotFound(Lookup::Id(id.to_string())));
        }

        info!(id = %asset.id, asset_tag = %asset.asset_tag, actor = %actor.id, "Asset deleted");
        Ok(ApiResponse::done(messages::DELETE_SUCCESS))
    }

    // =========================================================================
    // Checkout & Checkin
    // =========================================================================

    /// Assigns an available asset to a user, asset or location.
    pub async fn checkout(
        &self,
        actor: &Actor,
        id: &str,
        target: &AssignmentRequest,
        request: &CheckoutRequest,
    ) -> ServiceResult<ApiResponse<AssetTagPayload>> {
        self.authorize(actor, Action::Checkout, Resource::AnyAsset)?;
        let mut asset = self.live_asset(id).await?;

        if !asset.is_available_for_checkout() {
            return Err(ServiceError::NotAvailable {
                asset_tag: asset.asset_tag,
            });
        }
        self.authorize(actor, Action::Checkout, Resource::Asset(&asset))?;

        let target = self.resolve_target(target).await?.ok_or_else(|| {
            ServiceError::invalid("target", messages::no_checkout_target(&asset.asset_tag))
        })?;

        let log = lifecycle::check_out(&mut asset, &target, actor, request, CheckoutGuard::Available)?;
        if !self.db.assets().check_out(&asset, &log).await? {
            warn!(asset_tag = %asset.asset_tag, "Asset was checked out concurrently");
            return Err(ServiceError::NotAvailable {
                asset_tag: asset.asset_tag,
            });
        }

        info!(
            asset_tag = %asset.asset_tag,
            target_kind = %target.kind(),
            target_id = %target.id(),
            actor = %actor.id,
            "Asset checked out"
        );

        Ok(ApiResponse::success(
            AssetTagPayload {
                asset: asset.asset_tag,
            },
            messages::CHECKOUT_SUCCESS,
        ))
    }

    /// Releases the current assignment and, when the model asks for it,
    /// mails the person who had the asset.
    pub async fn checkin(
        &self,
        actor: &Actor,
        id: &str,
        request: &CheckinRequest,
    ) -> ServiceResult<ApiResponse<AssetTagPayload>> {
        self.authorize(actor, Action::Checkin, Resource::AnyAsset)?;
        let mut asset = self.live_asset(id).await?;
        self.authorize(actor, Action::Checkin, Resource::Asset(&asset))?;

        let prior_user = match asset.assigned_target() {
            Some(target) if target.kind == TargetKind::User => {
                self.db.catalog().get_user(&target.id).await?
            }
            _ => None,
        };

        let receipt = lifecycle::check_in(&mut asset, prior_user.as_ref(), actor, request)?;
        if !self.db.assets().check_in(&asset, &receipt.log).await? {
            return Err(ServiceError::AlreadyCheckedIn {
                asset_tag: asset.asset_tag,
            });
        }

        info!(
            asset_tag = %asset.asset_tag,
            prior_kind = %receipt.prior_target.kind,
            prior_id = %receipt.prior_target.id,
            actor = %actor.id,
            "Asset checked in"
        );

        self.notify_checkin(&asset, prior_user.as_ref(), &receipt).await;

        Ok(ApiResponse::success(
            AssetTagPayload {
                asset: asset.asset_tag,
            },
            messages::CHECKIN_SUCCESS,
        ))
    }

    // =========================================================================
    // Audit
    // =========================================================================

    /// Records that the asset with the given tag was physically seen.
    pub async fn audit(
        &self,
        actor: &Actor,
        input: &AuditInput,
    ) -> ServiceResult<ApiResponse<AuditPayload>> {
        self.authorize(actor, Action::Audit, Resource::AnyAsset)?;

        let mut errors = FieldErrors::new();
        let tag = input.asset_tag.trim();
        if tag.is_empty() {
            errors.push(ValidationError::Required {
                field: "asset_tag".to_string(),
            });
        }
        let location_id = non_blank(&input.location_id);
        if let Some(location_id) = location_id {
            if self.db.catalog().get_location(location_id).await?.is_none() {
                errors.push(ValidationError::UnknownReference {
                    field: "location_id".to_string(),
                });
            }
        }
        let next_audit_date = non_blank(&input.next_audit_date)
            .and_then(|raw| errors.check(parse_date("next_audit_date", raw)));
        errors.into_result()?;

        let mut asset = self
            .db
            .assets()
            .get_by_tag(tag, false)
            .await?
            .ok_or_else(|| ServiceError::NotFound(Lookup::Tag(tag.to_string())))?;

        let request = AuditRequest {
            audited_at: Utc::now(),
            note: input.note.clone(),
            location_id: location_id.map(str::to_string),
            next_audit_date,
        };
        let receipt = lifecycle::audit(&mut asset, actor, &request, self.config.audit_interval_months);

        if !self.db.assets().record_audit(&asset, &receipt.log).await? {
            return Err(ServiceError::NotFound(Lookup::Tag(tag.to_string())));
        }

        info!(
            asset_tag = %asset.asset_tag,
            next_audit_due = %receipt.next_audit_due,
            actor = %actor.id,
            "Asset audited"
        );

        Ok(ApiResponse::success(
            AuditPayload {
                asset_tag: asset.asset_tag,
                note: receipt.log.note,
                next_audit_date: receipt.next_audit_due,
            },
            messages::AUDIT_SUCCESS,
        ))
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn authorize(&self, actor: &Actor, action: Action, resource: Resource<'_>) -> ServiceResult<()> {
        if self.gate.authorize(actor, action, resource) {
            return Ok(());
        }
        warn!(actor = %actor.id, %action, "Authorization denied");
        Err(ServiceError::AuthorizationDenied { action })
    }

    /// Loads an asset that has not been deleted.
    async fn live_asset(&self, id: &str) -> ServiceResult<Asset> {
        match self.db.assets().get_by_id(id).await? {
            Some(asset) if !asset.is_deleted() => Ok(asset),
            _ => Err(ServiceError::NotFound(Lookup::Id(id.to_string()))),
        }
    }

    async fn require_status(&self, status_id: &str) -> ServiceResult<()> {
        validate_required_id("status_id", status_id)?;
        match self.db.catalog().get_status_label(status_id.trim()).await? {
            Some(_) => Ok(()),
            None => Err(unknown_reference("status_id")),
        }
    }

    /// Loads the first named target. A target that does not exist is
    /// skipped.
    async fn resolve_target(
        &self,
        assignment: &AssignmentRequest,
    ) -> ServiceResult<Option<CheckoutTarget>> {
        let Some(target_ref) = assignment.resolve() else {
            return Ok(None);
        };

        let target = self.db.catalog().find_target(&target_ref).await?;
        if target.is_none() {
            warn!(kind = %target_ref.kind, id = %target_ref.id, "Checkout target does not exist");
        }
        Ok(target)
    }

    async fn notify_checkin(&self, asset: &Asset, prior_user: Option<&User>, receipt: &CheckinReceipt) {
        let Some(user) = prior_user else {
            return;
        };

        let model = match self.db.catalog().get_model(&asset.model_id).await {
            Ok(Some(model)) => model,
            Ok(None) => return,
            Err(e) => {
                warn!(asset_tag = %asset.asset_tag, error = %e, "Could not load model for checkin mail");
                return;
            }
        };
        if !lifecycle::should_send_checkin_email(&model, &receipt.prior_target, self.config.lock_passwords) {
            return;
        }

        let recipient = match Recipient::for_user(user) {
            Ok(recipient) => recipient,
            Err(e) => {
                warn!(asset_tag = %asset.asset_tag, error = %e, "Checkin confirmation not sent");
                return;
            }
        };

        let mail = CheckinMail::from(receipt);
        if let Err(e) = self.notifier.send_checkin_confirmation(&recipient, &mail).await {
            warn!(asset_tag = %asset.asset_tag, error = %e, "Checkin confirmation failed");
        }
    }
}

fn unknown_reference(field: &str) -> ServiceError {
    ValidationError::UnknownReference {
        field: field.to_string(),
    }
    .into()
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

// =============================================================================
// Unit Tests
// =============================================================================
