//! # Company Scoping
//!
//! Multi-company rules. With full multiple companies support switched off,
//! company ids are stored as given and listings are not scoped. With it on:
//!
//! ```text
//!  Actor              company_id stored       listing shows
//!  ───────────────    ─────────────────────   ──────────────────────────
//!  superuser          as requested            everything
//!  member of C        always C                assets of C only
//!  no company         None                    assets without a company
//! ```

use serde::{Deserialize, Serialize};

use crate::types::Actor;

/// Tenant-scoping policy for one request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyScope {
    /// Site setting: enforce company boundaries.
    pub full_multiple_companies_support: bool,
}

impl CompanyScope {
    pub fn new(full_multiple_companies_support: bool) -> Self {
        CompanyScope {
            full_multiple_companies_support,
        }
    }

    /// The company id that is actually stored when `actor` asks for
    /// `requested`.
    pub fn id_for_actor(&self, actor: &Actor, requested: Option<&str>) -> Option<String> {
        let requested = requested.map(str::trim).filter(|s| !s.is_empty());

        if !self.full_multiple_companies_support || actor.is_superuser {
            return requested.map(str::to_string);
        }

        actor.company_id.clone()
    }

    /// The company a listing must be restricted to.
    ///
    /// `None` means "no restriction"; `Some(None)` means "only assets
    /// without a company".
    pub fn listing_restriction(&self, actor: &Actor) -> Option<Option<String>> {
        if !self.full_multiple_companies_support || actor.is_superuser {
            None
        } else {
            Some(actor.company_id.clone())
        }
    }
}
