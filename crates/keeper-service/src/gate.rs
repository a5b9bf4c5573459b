//! # Authorization Gate
//!
//! The seam through which every operation asks whether the actor may go on.
//!
//! ## Two-step checks
//! ```text
//!  operation      class-level (AnyAsset)    instance-level (Asset(&a))
//!  ───────────    ──────────────────────    ──────────────────────────
//!  list           index                     -
//!  show           -                         view
//!  create         create                    -
//!  update         update                    update
//!  delete         delete                    delete
//!  checkout       checkout                  checkout
//!  checkin        checkin                   checkin
//!  audit          audit                     -
//! ```
//!
//! A denial at either step ends the operation before anything is written.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use keeper_core::{Actor, Asset, CompanyScope};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// An operation the gate can approve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Index,
    View,
    Create,
    Update,
    Delete,
    Checkout,
    Checkin,
    Audit,
}

impl Action {
    pub const ALL: [Action; 8] = [
        Action::Index,
        Action::View,
        Action::Create,
        Action::Update,
        Action::Delete,
        Action::Checkout,
        Action::Checkin,
        Action::Audit,
    ];
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Index => "index",
            Action::View => "view",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Checkout => "checkout",
            Action::Checkin => "checkin",
            Action::Audit => "audit",
        };
        f.write_str(name)
    }
}

/// What an action is aimed at.
#[derive(Debug, Clone, Copy)]
pub enum Resource<'a> {
    /// Assets in general, before a specific record is loaded.
    AnyAsset,
    Asset(&'a Asset),
}

/// Approves or denies an operation for an actor.
pub trait AuthorizationGate: Send + Sync {
    fn authorize(&self, actor: &Actor, action: Action, resource: Resource<'_>) -> bool;
}

// =============================================================================
// Permission Table
// =============================================================================

/// A static table of granted actions per actor id.
///
/// Superusers pass every check. With full multiple companies support on,
/// instance-level checks also require the asset to belong to the actor's
/// company.
#[derive(Debug, Clone, Default)]
pub struct PermissionTable {
    scope: CompanyScope,
    grants: HashMap<String, BTreeSet<Action>>,
}

impl PermissionTable {
    pub fn new(scope: CompanyScope) -> Self {
        PermissionTable {
            scope,
            grants: HashMap::new(),
        }
    }

    pub fn grant(mut self, actor_id: impl Into<String>, actions: &[Action]) -> Self {
        self.grants
            .entry(actor_id.into())
            .or_default()
            .extend(actions.iter().copied());
        self
    }

    fn allows(&self, actor: &Actor, action: Action) -> bool {
        self.grants
            .get(&actor.id)
            .is_some_and(|actions| actions.contains(&action))
    }
}

impl AuthorizationGate for PermissionTable {
    fn authorize(&self, actor: &Actor, action: Action, resource: Resource<'_>) -> bool {
        if actor.is_superuser {
            return true;
        }
        if !self.allows(actor, action) {
            return false;
        }
        match resource {
            Resource::AnyAsset => true,
            Resource::Asset(asset) => {
                !self.scope.full_multiple_companies_support || asset.company_id == actor.company_id
            }
        }
    }
}
