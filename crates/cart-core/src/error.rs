//! # Error Types
//!
//! Domain-specific error types for cart-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  cart-core errors (this file)                                          │
//! │  ├── CartError     - Rejected insert/update, session failures          │
//! │  ├── SessionError  - Session store contract failures                   │
//! │  └── ConfigError   - Invalid ledger configuration                      │
//! │                                                                         │
//! │  cart-db errors (separate crate)                                       │
//! │  └── DbError       - Database operation failures                       │
//! │                                                                         │
//! │  Flow: store failure → SessionError → CartError → caller               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Every rejection is a variant, never a String or a panic
//! 2. Include context in error messages (product id, row id, limits)
//! 3. All variants are recoverable; a failed item never poisons the ledger

use thiserror::Error;

// =============================================================================
// Cart Error
// =============================================================================

/// Errors returned by [`CartLedger`](crate::CartLedger) operations.
///
/// Rejections of individual items inside a batch are logged and skipped;
/// the batch only fails when no item was applied.
#[derive(Debug, Error)]
pub enum CartError {
    /// Insert or update called with nothing to apply.
    #[error("No items supplied")]
    EmptyInput,

    /// A required field is absent from the item.
    ///
    /// Insert requires `id`, `qty`, `price` and `name`; update requires `rowid`.
    #[error("Item is missing required field '{field}'")]
    MissingRequiredField { field: &'static str },

    /// Quantity resolved to zero after flooring negatives.
    ///
    /// ## User Workflow
    /// ```text
    /// insert { id: "sku1", qty: -3, ... }
    ///      │
    ///      ▼
    /// qty = max(-3, 0) = 0
    ///      │
    ///      ▼
    /// ZeroQuantity → nothing inserted, nothing persisted
    /// ```
    #[error("Quantity for {product_id} resolves to zero")]
    ZeroQuantity { product_id: String },

    /// Product id contains characters outside the configured class.
    #[error("Invalid product id: '{product_id}'")]
    InvalidProductId { product_id: String },

    /// Product name contains characters outside the configured class.
    #[error("Invalid product name: '{name}'")]
    InvalidProductName { name: String },

    /// Merged quantity would exceed the item's `max_ord`.
    ///
    /// The row keeps its previous quantity.
    #[error("Quantity {requested} for {product_id} exceeds maximum order of {max}")]
    MaxOrderExceeded {
        product_id: String,
        requested: f64,
        max: f64,
    },

    /// A numeric field decoded to NaN or an infinity.
    ///
    /// Such values cannot be stored as JSON numbers.
    #[error("Item field '{field}' is not a finite number")]
    NonFiniteNumber { field: &'static str },

    /// Update references a row id that is not in the cart.
    #[error("Row not found: {row_id}")]
    RowNotFound { row_id: String },

    /// The session collaborator failed.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

// =============================================================================
// Session Error
// =============================================================================

/// Failures reported by a [`SessionStore`](crate::SessionStore).
#[derive(Debug, Error)]
pub enum SessionError {
    /// The stored value under `key` could not be decoded.
    #[error("Stored value under '{key}' is corrupt: {reason}")]
    Corrupt { key: String, reason: String },

    /// The cart could not be encoded for storage.
    #[error("Failed to encode session value: {0}")]
    Encode(#[from] serde_json::Error),

    /// The backing store failed (database, cache, ...).
    #[error("Session backend failure: {0}")]
    Backend(String),
}

impl SessionError {
    /// Creates a Backend error from anything displayable.
    pub fn backend(err: impl std::fmt::Display) -> Self {
        SessionError::Backend(err.to_string())
    }
}

// =============================================================================
// Config Error
// =============================================================================

/// Invalid ledger configuration, reported once at construction.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A character class could not be parsed.
    #[error("{option} is not a valid character class: {reason}")]
    InvalidPattern {
        option: &'static str,
        reason: String,
    },

    /// A required option is empty.
    #[error("{option} must not be empty")]
    Empty { option: &'static str },
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Convenience type alias for Results with CartError.
pub type CartResult<T> = Result<T, CartError>;

/// Convenience type alias for session store Results.
pub type SessionResult<T> = Result<T, SessionError>;

// =============================================================================
// Unit Tests
// =============================================================================
