//! Service configuration.
//!
//! Configuration is loaded from environment variables with fallback to
//! defaults.
//!
//! | Variable                       | Default        |
//! |--------------------------------|----------------|
//! | `KEEPER_DB_PATH`               | `./keeper.db`  |
//! | `KEEPER_LOCK_PASSWORDS`        | `false`        |
//! | `KEEPER_AUDIT_INTERVAL_MONTHS` | `12`           |
//! | `KEEPER_FULL_COMPANY_SUPPORT`  | `false`        |
//! | `KEEPER_DEFAULT_PAGE_SIZE`     | `50`           |

use std::env;
use std::path::PathBuf;

use keeper_core::{CompanyScope, DEFAULT_AUDIT_INTERVAL_MONTHS, DEFAULT_LIST_LIMIT};
use serde::{Deserialize, Serialize};

/// Site-wide settings the service consults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// SQLite database file
    pub database_path: PathBuf,

    /// Locked-down demo mode: no checkin mails are sent
    pub lock_passwords: bool,

    /// Months between audits
    pub audit_interval_months: u32,

    /// Enforce company boundaries for non-superusers
    pub full_multiple_companies_support: bool,

    /// Listing page size when the request gives none
    pub default_page_size: i64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            database_path: PathBuf::from("./keeper.db"),
            lock_passwords: false,
            audit_interval_months: DEFAULT_AUDIT_INTERVAL_MONTHS,
            full_multiple_companies_support: false,
            default_page_size: DEFAULT_LIST_LIMIT,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which returns the raw value of a
    /// variable if it is set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ServiceConfig::default();

        let config = ServiceConfig {
            database_path: lookup("KEEPER_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),

            lock_passwords: parse_flag(&lookup, "KEEPER_LOCK_PASSWORDS", defaults.lock_passwords)?,

            audit_interval_months: match lookup("KEEPER_AUDIT_INTERVAL_MONTHS") {
                Some(raw) => raw
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("KEEPER_AUDIT_INTERVAL_MONTHS".to_string()))?,
                None => defaults.audit_interval_months,
            },

            full_multiple_companies_support: parse_flag(
                &lookup,
                "KEEPER_FULL_COMPANY_SUPPORT",
                defaults.full_multiple_companies_support,
            )?,

            default_page_size: match lookup("KEEPER_DEFAULT_PAGE_SIZE") {
                Some(raw) => raw
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("KEEPER_DEFAULT_PAGE_SIZE".to_string()))?,
                None => defaults.default_page_size,
            },
        };

        if config.audit_interval_months == 0 {
            return Err(ConfigError::OutOfRange("KEEPER_AUDIT_INTERVAL_MONTHS".to_string()));
        }
        if config.default_page_size <= 0 {
            return Err(ConfigError::OutOfRange("KEEPER_DEFAULT_PAGE_SIZE".to_string()));
        }

        Ok(config)
    }

    pub fn company_scope(&self) -> CompanyScope {
        CompanyScope::new(self.full_multiple_companies_support)
    }
}

fn parse_flag<F>(lookup: &F, key: &str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue(key.to_string())),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("{0} must be greater than zero")]
    OutOfRange(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<ServiceConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.audit_interval_months, 12);
        assert_eq!(config.default_page_size, 50);
        assert!(!config.company_scope().full_multiple_companies_support);
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("KEEPER_DB_PATH", "/data/keeper.db"),
            ("KEEPER_LOCK_PASSWORDS", "TRUE"),
            ("KEEPER_AUDIT_INTERVAL_MONTHS", "6"),
            ("KEEPER_FULL_COMPANY_SUPPORT", "1"),
            ("KEEPER_DEFAULT_PAGE_SIZE", "25"),
        ])
        .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/data/keeper.db"));
        assert!(config.lock_passwords);
        assert_eq!(config.audit_interval_months, 6);
        assert!(config.full_multiple_companies_support);
        assert_eq!(config.default_page_size, 25);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            load(&[("KEEPER_AUDIT_INTERVAL_MONTHS", "twelve")]),
            Err(ConfigError::InvalidValue(_))
        ));
        assert!(matches!(
            load(&[("KEEPER_LOCK_PASSWORDS", "maybe")]),
            Err(ConfigError::InvalidValue(_))
        ));
        assert!(matches!(
            load(&[("KEEPER_DEFAULT_PAGE_SIZE", "0")]),
            Err(ConfigError::OutOfRange(_))
        ));
    }
}
