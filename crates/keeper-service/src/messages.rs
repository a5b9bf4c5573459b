//! User-facing messages carried in the result envelope.

pub const ASSET_DOES_NOT_EXIST: &str = "Asset does not exist.";

pub const CREATE_SUCCESS: &str = "Asset created successfully.";
pub const UPDATE_SUCCESS: &str = "Asset updated successfully.";
pub const UPDATE_CONFLICT: &str = "The asset was changed by someone else. Reload it and try again.";
pub const DELETE_SUCCESS: &str = "The asset was deleted successfully.";

pub const CHECKOUT_SUCCESS: &str = "Asset checked out successfully.";
pub const CHECKOUT_NOT_AVAILABLE: &str = "That asset is not available for checkout!";

pub const CHECKIN_SUCCESS: &str = "Asset checked in successfully.";
pub const CHECKIN_ALREADY_CHECKED_IN: &str = "That asset is already checked in.";

pub const AUDIT_SUCCESS: &str = "Asset audit successfully logged.";

pub const UNAUTHORIZED: &str = "You are not authorized to perform this action.";

/// Subject line of the checkin confirmation mail.
pub const CHECKIN_MAIL_SUBJECT: &str = "Confirm Asset Checkin";

pub fn no_checkout_target(asset_tag: &str) -> String {
    format!("No valid checkout target specified for asset {}.", asset_tag)
}

pub fn tag_not_found(asset_tag: &str) -> String {
    format!("Asset with tag {} not found", asset_tag)
}
