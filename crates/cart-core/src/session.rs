//! # Session Store Contract
//!
//! The ledger reads and writes one key in a caller-supplied session. This
//! module defines that contract and ships an in-memory implementation.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Session Store Contract                               │
//! │                                                                         │
//! │  CartLedger::new ──────► get("cart_contents")    → Option<Value>        │
//! │                                                                         │
//! │  save_cart (items) ────► set("cart_contents", v)                        │
//! │  save_cart (empty) ────► remove("cart_contents")                        │
//! │  destroy ──────────────► remove("cart_contents")                        │
//! │                                                                         │
//! │  Each call is an atomic point operation. Two request flows writing     │
//! │  the same session: last write wins.                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The contract is synchronous. Backends with async I/O prefetch the session
//! at the start of a request and flush at the end (see `cart-db`'s
//! `SqliteSession`).

use std::collections::HashMap;

use serde_json::Value;

use crate::error::SessionResult;

/// Key-value session collaborator.
pub trait SessionStore {
    /// Reads the value stored under `key`.
    fn get(&self, key: &str) -> SessionResult<Option<Value>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&mut self, key: &str, value: Value) -> SessionResult<()>;

    /// Deletes `key`. Deleting an absent key is not an error.
    fn remove(&mut self, key: &str) -> SessionResult<()>;
}

impl<S: SessionStore + ?Sized> SessionStore for &mut S {
    fn get(&self, key: &str) -> SessionResult<Option<Value>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: Value) -> SessionResult<()> {
        (**self).set(key, value)
    }

    fn remove(&mut self, key: &str) -> SessionResult<()> {
        (**self).remove(key)
    }
}

impl<S: SessionStore + ?Sized> SessionStore for Box<S> {
    fn get(&self, key: &str) -> SessionResult<Option<Value>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: Value) -> SessionResult<()> {
        (**self).set(key, value)
    }

    fn remove(&mut self, key: &str) -> SessionResult<()> {
        (**self).remove(key)
    }
}

// =============================================================================
// In-Memory Session
// =============================================================================

/// A session held in a `HashMap`.
///
/// Useful for tests and for callers that persist the session themselves.
#[derive(Debug, Clone, Default)]
pub struct MemorySession {
    values: HashMap<String, Value>,
}

impl MemorySession {
    /// Creates an empty session.
    pub fn new() -> Self {
        MemorySession::default()
    }

    /// Whether `key` is currently stored.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Direct read access, bypassing the `Result` of [`SessionStore::get`].
    pub fn peek(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<HashMap<String, Value>> for MemorySession {
    fn from(values: HashMap<String, Value>) -> Self {
        MemorySession { values }
    }
}

impl SessionStore for MemorySession {
    fn get(&self, key: &str) -> SessionResult<Option<Value>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: Value) -> SessionResult<()> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> SessionResult<()> {
        self.values.remove(key);
        Ok(())
    }
}
