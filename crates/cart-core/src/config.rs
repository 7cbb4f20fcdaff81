//! # Ledger Configuration
//!
//! Static, per-ledger options. Patterns are parsed once when the config is
//! built; a ledger never sees an invalid pattern.
//!
//! ## Example
//! ```rust
//! use cart_core::LedgerConfig;
//!
//! let config = LedgerConfig::builder()
//!     .product_id_pattern(r"A-Z0-9\-")
//!     .product_name_safe(false)
//!     .build()
//!     .unwrap();
//!
//! assert!(!config.product_name_safe());
//! assert_eq!(config.session_key(), "cart_contents");
//! ```

use crate::error::ConfigError;
use crate::validation::CharClass;
use crate::{DEFAULT_PRODUCT_ID_PATTERN, DEFAULT_PRODUCT_NAME_PATTERN, DEFAULT_SESSION_KEY};

/// Validated ledger configuration.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    product_id_class: CharClass,
    product_name_class: CharClass,
    product_name_safe: bool,
    session_key: String,
}

impl LedgerConfig {
    /// Starts a builder seeded with the defaults.
    pub fn builder() -> LedgerConfigBuilder {
        LedgerConfigBuilder::default()
    }

    /// Allowed characters for product ids (ASCII, case-insensitive).
    pub fn product_id_class(&self) -> &CharClass {
        &self.product_id_class
    }

    /// Allowed characters for product names (Unicode, case-insensitive).
    pub fn product_name_class(&self) -> &CharClass {
        &self.product_name_class
    }

    /// Whether product names are checked at all.
    pub fn product_name_safe(&self) -> bool {
        self.product_name_safe
    }

    /// Session key the cart is stored under.
    pub fn session_key(&self) -> &str {
        &self.session_key
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        // The default patterns are constants covered by tests
        LedgerConfig {
            product_id_class: CharClass::ascii(DEFAULT_PRODUCT_ID_PATTERN)
                .unwrap_or_else(|e| panic!("default product id pattern: {e}")),
            product_name_class: CharClass::unicode(DEFAULT_PRODUCT_NAME_PATTERN)
                .unwrap_or_else(|e| panic!("default product name pattern: {e}")),
            product_name_safe: true,
            session_key: DEFAULT_SESSION_KEY.to_string(),
        }
    }
}

/// Builder for [`LedgerConfig`].
#[derive(Debug, Clone)]
pub struct LedgerConfigBuilder {
    product_id_pattern: String,
    product_name_pattern: String,
    product_name_safe: bool,
    session_key: String,
}

impl Default for LedgerConfigBuilder {
    fn default() -> Self {
        LedgerConfigBuilder {
            product_id_pattern: DEFAULT_PRODUCT_ID_PATTERN.to_string(),
            product_name_pattern: DEFAULT_PRODUCT_NAME_PATTERN.to_string(),
            product_name_safe: true,
            session_key: DEFAULT_SESSION_KEY.to_string(),
        }
    }
}

impl LedgerConfigBuilder {
    /// Sets the product id character class.
    pub fn product_id_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.product_id_pattern = pattern.into();
        self
    }

    /// Sets the product name character class.
    pub fn product_name_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.product_name_pattern = pattern.into();
        self
    }

    /// Turns product name checks on or off.
    pub fn product_name_safe(mut self, enabled: bool) -> Self {
        self.product_name_safe = enabled;
        self
    }

    /// Sets the session key the cart is stored under.
    pub fn session_key(mut self, key: impl Into<String>) -> Self {
        self.session_key = key.into();
        self
    }

    /// Parses the patterns and produces the config.
    pub fn build(self) -> Result<LedgerConfig, ConfigError> {
        let product_id_class =
            CharClass::ascii(&self.product_id_pattern).map_err(|reason| {
                ConfigError::InvalidPattern {
                    option: "product_id_pattern",
                    reason,
                }
            })?;

        let product_name_class =
            CharClass::unicode(&self.product_name_pattern).map_err(|reason| {
                ConfigError::InvalidPattern {
                    option: "product_name_pattern",
                    reason,
                }
            })?;

        if self.session_key.trim().is_empty() {
            return Err(ConfigError::Empty {
                option: "session_key",
            });
        }

        Ok(LedgerConfig {
            product_id_class,
            product_name_class,
            product_name_safe: self.product_name_safe,
            session_key: self.session_key,
        })
    }
}
