//! # cart-core: Pure Ledger Logic for a Session-Bound Cart
//!
//! This crate is the **heart** of the cart ledger. It owns the rules for
//! identifying, merging, validating and totalling line items. The only I/O
//! boundary is the [`SessionStore`] trait, which callers implement or pick
//! from another crate.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Cart Ledger Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  Request handler / CLI                          │   │
//! │  │     add ──► update ──► remove ──► show ──► destroy              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ cart-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │  row_id   │  │  ledger   │  │ validation│  │   │
//! │  │   │ LineItem  │  │  RowId    │  │CartLedger │  │ CharClass │  │   │
//! │  │   │ CartState │  │  sha256   │  │ save_cart │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └─────┬─────┘  └───────────┘  │   │
//! │  │                                       │                        │   │
//! │  │                            ┌──────────▼──────────┐             │   │
//! │  │                            │  trait SessionStore │             │   │
//! │  │                            └──────────┬──────────┘             │   │
//! │  └───────────────────────────────────────┼────────────────────────┘   │
//! │                                          │                             │
//! │  ┌───────────────────────────────────────▼────────────────────────┐   │
//! │  │           MemorySession (here) / SqliteSession (cart-db)        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Line items, cart state, insert/update inputs
//! - [`row_id`] - Content-addressed row identity
//! - [`validation`] - Character-class checks for product ids and names
//! - [`config`] - Immutable ledger configuration
//! - [`session`] - The session store contract and an in-memory store
//! - [`ledger`] - The [`CartLedger`] itself
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use cart_core::{CartLedger, ItemInput, MemorySession};
//!
//! let mut ledger = CartLedger::new(MemorySession::new()).unwrap();
//!
//! let row = ledger
//!     .insert(ItemInput::new("sku1", 2.0, 10.0, "Widget"))
//!     .unwrap();
//! ledger
//!     .insert(ItemInput::new("sku1", 3.0, 10.0, "Widget"))
//!     .unwrap();
//!
//! assert_eq!(ledger.get_item(row.as_str()).unwrap().quantity, 5.0);
//! assert_eq!(ledger.total(), 50.0);
//! assert_eq!(ledger.total_items(), 5);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod ledger;
pub mod row_id;
pub mod session;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use config::{LedgerConfig, LedgerConfigBuilder};
pub use error::{CartError, CartResult, ConfigError, SessionError, SessionResult};
pub use ledger::CartLedger;
pub use row_id::RowId;
pub use session::{MemorySession, SessionStore};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Session key the cart is stored under unless configured otherwise.
pub const DEFAULT_SESSION_KEY: &str = "cart_contents";

/// Default product id character class: letters, digits, dot, underscore, hyphen.
///
/// Matched case-insensitively, so `SKU-1` passes as well as `sku-1`.
pub const DEFAULT_PRODUCT_ID_PATTERN: &str = r"\.a-z0-9_-";

/// Default product name character class.
///
/// Word characters (Unicode-aware), space, hyphen, dot, colon, percent,
/// comma and ampersand.
pub const DEFAULT_PRODUCT_NAME_PATTERN: &str = r"\w \-\.\:\%\,\&";
