//! # cart-db: Session Persistence for the Cart Ledger
//!
//! SQLite storage for session key-value data, plus [`SqliteSession`], the
//! [`cart_core::SessionStore`] implementation the ledger runs against.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Cart Ledger Data Flow                            │
//! │                                                                         │
//! │  cart CLI command (add / update / remove / ...)                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     cart-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repository   │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ (session.rs)  │    │  (embedded)  │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ SessionRepo   │    │ 001_cart_    │  │   │
//! │  │   │ WAL mode      │    │ get/put/apply │    │  sessions    │  │   │
//! │  │   └───────────────┘    └───────▲───────┘    └──────────────┘  │   │
//! │  │                                │                               │   │
//! │  │                        ┌───────┴───────┐                       │   │
//! │  │                        │ SqliteSession │ ← SessionStore impl   │   │
//! │  │                        └───────────────┘                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │             SQLite Database (session_values table)              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Session key-value repository
//! - [`session`] - Prefetching, write-buffering session store
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cart_core::{CartLedger, ItemInput};
//! use cart_db::{Database, DbConfig, SqliteSession};
//!
//! let db = Database::new(DbConfig::new("sessions.db")).await?;
//! let mut session = SqliteSession::load(&db, "visitor-42").await?;
//!
//! {
//!     let mut ledger = CartLedger::new(&mut session)?;
//!     ledger.insert(ItemInput::new("sku1", 1.0, 9.5, "Widget"))?;
//! }
//!
//! session.commit(&db).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod session;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use repository::session::{SessionChange, SessionRepository};
pub use session::SqliteSession;
