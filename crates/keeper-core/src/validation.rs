//! # Validation Module
//!
//! Input validation and sanitizing for Keeper.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Web layer (outside this workspace)                           │
//! │  └── Type validation (deserialization)                                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: keeper-core                                                  │
//! │  └── THIS MODULE: field rules, sanitizing, custom field checks         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── UNIQUE asset_tag                                                  │
//! │  └── Foreign keys (model, status, location, ...)                       │
//! │                                                                         │
//! │  Errors from every layer end up in one FieldErrors map                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use keeper_core::validation::{sanitize, validate_asset_tag};
//!
//! validate_asset_tag("TAG-001").unwrap();
//! assert_eq!(sanitize("<b>x</b>"), "&lt;b&gt;x&lt;/b&gt;");
//! ```

use chrono::NaiveDate;

use crate::error::ValidationError;
use crate::money::Money;
use crate::MAX_WARRANTY_MONTHS;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest value accepted for free-text string columns.
pub const MAX_STRING_LEN: usize = 255;

// =============================================================================
// Sanitizing
// =============================================================================

/// HTML-escapes a raw value before it is stored.
///
/// Applied to every custom field value, to checkout/checkin/audit notes and
/// to the exact-match `order_number` filter.
pub fn sanitize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

/// Sanitizes an optional value, mapping blank input to `None`.
pub fn sanitize_opt(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(sanitize)
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates an asset tag.
///
/// ## Rules
/// - Must not be empty
/// - At most 255 characters
///
/// ```rust
/// use keeper_core::validation::validate_asset_tag;
///
/// assert!(validate_asset_tag("LAPTOP-0042").is_ok());
/// assert!(validate_asset_tag("  ").is_err());
/// ```
pub fn validate_asset_tag(tag: &str) -> ValidationResult<()> {
    let tag = tag.trim();

    if tag.is_empty() {
        return Err(ValidationError::Required {
            field: "asset_tag".to_string(),
        });
    }

    validate_length("asset_tag", tag)
}

/// Validates the length of a free-text field.
pub fn validate_length(field: &str, value: &str) -> ValidationResult<()> {
    if value.chars().count() > MAX_STRING_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_STRING_LEN,
        });
    }
    Ok(())
}

/// Validates a required reference id (model, status).
pub fn validate_required_id(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a search query.
///
/// ## Rules
/// - Can be empty (no text search)
/// - Maximum 100 characters
///
/// ## Returns
/// The trimmed query string.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.chars().count() > 100 {
        return Err(ValidationError::TooLong {
            field: "search".to_string(),
            max: 100,
        });
    }

    Ok(query.to_string())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates warranty length in months (0 to 240).
pub fn validate_warranty_months(months: i64) -> ValidationResult<()> {
    if !(0..=MAX_WARRANTY_MONTHS).contains(&months) {
        return Err(ValidationError::OutOfRange {
            field: "warranty_months".to_string(),
            min: 0,
            max: MAX_WARRANTY_MONTHS,
        });
    }
    Ok(())
}

/// Parses and validates a purchase cost string.
///
/// Blank input is "no cost"; negative amounts are rejected.
pub fn validate_purchase_cost(raw: &str) -> ValidationResult<Option<Money>> {
    let cost = Money::parse(raw)?;
    if cost.map(|c| c.is_negative()).unwrap_or(false) {
        return Err(ValidationError::OutOfRange {
            field: "purchase_cost".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(cost)
}

// =============================================================================
// Date Validators
// =============================================================================

/// Parses a `YYYY-MM-DD` date.
///
/// ```rust
/// use keeper_core::validation::parse_date;
///
/// assert!(parse_date("next_audit_date", "2025-02-28").is_ok());
/// assert!(parse_date("next_audit_date", "2025-02-30").is_err());
/// ```
pub fn parse_date(field: &str, raw: &str) -> ValidationResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must be a date in YYYY-MM-DD format".to_string(),
        }
    })
}

// =============================================================================
// Identifier Validators
// =============================================================================

/// Validates a UUID string.
///
/// ```rust
/// use keeper_core::validation::validate_uuid;
///
/// assert!(validate_uuid("id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("id", "not-a-uuid").is_err());
/// ```
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

/// Validates a custom field column key.
///
/// Column keys end up in JSON paths of list queries, so they are limited to
/// lowercase ASCII letters, digits and underscores, and must not start with
/// a digit.
pub fn validate_custom_column(column: &str) -> ValidationResult<()> {
    let valid = !column.is_empty()
        && column.len() <= 64
        && !column.starts_with(|c: char| c.is_ascii_digit())
        && column
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

    if !valid {
        return Err(ValidationError::InvalidFormat {
            field: "column".to_string(),
            reason: "must contain only lowercase letters, digits and underscores".to_string(),
        });
    }
    Ok(())
}

/// Derives a column key from a custom field label.
///
/// ```rust
/// use keeper_core::validation::column_slug;
///
/// assert_eq!(column_slug("MAC Address"), "_cf_mac_address");
/// assert_eq!(column_slug("RAM (GB)"), "_cf_ram_gb");
/// ```
pub fn column_slug(name: &str) -> String {
    let mut slug = String::from("_cf_");
    let mut last_underscore = true;
    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
            last_underscore = false;
        } else if !last_underscore {
            slug.push('_');
            last_underscore = true;
        }
    }
    while slug.ends_with('_') && slug.len() > 4 {
        slug.pop();
    }
    slug
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("plain"), "plain");
        assert_eq!(
            sanitize(r#"<script>alert("x")</script>"#),
            "&lt;script&gt;alert(&quot;x&quot;)&lt;/script&gt;"
        );
        assert_eq!(sanitize("Tom & Jerry's"), "Tom &amp; Jerry&#039;s");
        assert_eq!(sanitize_opt(Some("  ")), None);
        assert_eq!(sanitize_opt(Some(" a<b ")), Some("a&lt;b".to_string()));
    }

    #[test]
    fn test_validate_asset_tag() {
        assert!(validate_asset_tag("TAG-001").is_ok());
        assert!(validate_asset_tag("").is_err());
        assert!(validate_asset_tag(&"A".repeat(256)).is_err());
    }

    #[test]
    fn test_validate_warranty_months() {
        assert!(validate_warranty_months(0).is_ok());
        assert!(validate_warranty_months(36).is_ok());
        assert!(validate_warranty_months(240).is_ok());
        assert!(validate_warranty_months(-1).is_err());
        assert!(validate_warranty_months(241).is_err());
    }

    #[test]
    fn test_validate_purchase_cost() {
        assert_eq!(
            validate_purchase_cost("1,000.50").unwrap(),
            Some(Money::from_cents(100_050))
        );
        assert_eq!(validate_purchase_cost("").unwrap(), None);
        assert!(validate_purchase_cost("-3").is_err());
        assert!(validate_purchase_cost("lots").is_err());
    }

    #[test]
    fn test_parse_date() {
        let date = parse_date("purchase_date", "2024-03-01").unwrap();
        assert_eq!(date.to_string(), "2024-03-01");
        assert!(parse_date("purchase_date", "03/01/2024").is_err());
    }

    #[test]
    fn test_validate_custom_column() {
        assert!(validate_custom_column("_cf_mac_address").is_ok());
        assert!(validate_custom_column("ram").is_ok());
        assert!(validate_custom_column("").is_err());
        assert!(validate_custom_column("1abc").is_err());
        assert!(validate_custom_column("x\"); DROP").is_err());
        assert!(validate_custom_column("Upper").is_err());
    }

    #[test]
    fn test_column_slug_is_valid_column() {
        for name in ["MAC Address", "RAM (GB)", "  Ünïcode  name ", "!!!"] {
            let slug = column_slug(name);
            assert!(validate_custom_column(&slug).is_ok(), "{slug}");
        }
    }
}
