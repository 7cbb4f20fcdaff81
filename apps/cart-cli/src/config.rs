//! CLI configuration module.
//!
//! Configuration is loaded from environment variables with fallback to
//! defaults; command-line flags are layered on top in `main`.

use std::env;
use std::path::PathBuf;

use cart_core::LedgerConfig;

/// Database file used when `CART_DB_PATH` is not set.
pub const DEFAULT_DB_PATH: &str = "cart_sessions.db";

/// CLI configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CliConfig {
    /// SQLite database file
    pub db_path: PathBuf,

    /// Session the command operates on
    pub session_id: Option<String>,

    /// Allowed product id characters (bracket-body syntax)
    pub product_id_pattern: Option<String>,

    /// Allowed product name characters (bracket-body syntax)
    pub product_name_pattern: Option<String>,

    /// Check product names against the name pattern
    pub product_name_safe: bool,

    /// Session key the cart is stored under
    pub session_key: Option<String>,
}

impl CliConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn load_from(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let config = CliConfig {
            db_path: non_empty("CART_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH)),

            session_id: non_empty("CART_SESSION_ID"),

            product_id_pattern: non_empty("CART_PRODUCT_ID_PATTERN"),

            product_name_pattern: non_empty("CART_PRODUCT_NAME_PATTERN"),

            product_name_safe: match non_empty("CART_PRODUCT_NAME_SAFE") {
                Some(raw) => parse_bool(&raw)
                    .ok_or_else(|| ConfigError::InvalidValue("CART_PRODUCT_NAME_SAFE".to_string()))?,
                None => true,
            },

            session_key: non_empty("CART_SESSION_KEY"),
        };

        Ok(config)
    }

    /// Builds the ledger configuration, starting from the ledger defaults.
    pub fn ledger_config(&self) -> Result<LedgerConfig, ConfigError> {
        let mut builder = LedgerConfig::builder().product_name_safe(self.product_name_safe);

        if let Some(pattern) = &self.product_id_pattern {
            builder = builder.product_id_pattern(pattern.clone());
        }
        if let Some(pattern) = &self.product_name_pattern {
            builder = builder.product_name_pattern(pattern.clone());
        }
        if let Some(key) = &self.session_key {
            builder = builder.session_key(key.clone());
        }

        Ok(builder.build()?)
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error(transparent)]
    Ledger(#[from] cart_core::ConfigError),
}
