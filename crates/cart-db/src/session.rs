//! # SQLite-Backed Session
//!
//! Bridges the synchronous [`SessionStore`] the ledger works against with the
//! async session repository.
//!
//! ## Request Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    One request against one session                      │
//! │                                                                         │
//! │  SqliteSession::load(db, id).await   ← prefetch every key (1 query)    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  CartLedger::new(&mut session)       ← sync reads hit the snapshot     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ledger.insert / update / remove     ← set/remove buffered in pending  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  session.commit(db).await            ← pending flushed in ONE tx       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing reaches the database until `commit`. Dropping an uncommitted
//! session discards its writes.

use std::collections::{BTreeMap, HashMap};

use cart_core::{SessionResult, SessionStore};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use crate::pool::Database;

/// Session snapshot with buffered writes.
#[derive(Debug, Clone)]
pub struct SqliteSession {
    session_id: String,
    values: HashMap<String, Value>,
    pending: BTreeMap<String, Option<Value>>,
}

impl SqliteSession {
    /// Loads every stored key for `session_id`.
    pub async fn load(db: &Database, session_id: impl Into<String>) -> DbResult<Self> {
        let session_id = session_id.into();
        let values = db.sessions().load_all(&session_id).await?;

        Ok(SqliteSession {
            session_id,
            values,
            pending: BTreeMap::new(),
        })
    }

    /// Starts an empty session under a freshly generated id.
    pub fn fresh() -> Self {
        SqliteSession {
            session_id: Uuid::new_v4().to_string(),
            values: HashMap::new(),
            pending: BTreeMap::new(),
        }
    }

    /// The session id.
    pub fn id(&self) -> &str {
        &self.session_id
    }

    /// Whether there are writes not yet committed.
    pub fn is_dirty(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Flushes buffered writes in a single transaction.
    ///
    /// Returns the number of keys written or deleted. On failure the pending
    /// writes are kept so the commit can be retried.
    pub async fn commit(&mut self, db: &Database) -> DbResult<usize> {
        if !self.is_dirty() {
            return Ok(0);
        }

        let changes: Vec<(String, Option<Value>)> = self
            .pending
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        db.sessions().apply(&self.session_id, &changes).await?;
        self.pending.clear();

        debug!(session_id = %self.session_id, changes = changes.len(), "Session committed");
        Ok(changes.len())
    }
}

impl SessionStore for SqliteSession {
    fn get(&self, key: &str) -> SessionResult<Option<Value>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: Value) -> SessionResult<()> {
        self.values.insert(key.to_string(), value.clone());
        self.pending.insert(key.to_string(), Some(value));
        Ok(())
    }

    fn remove(&mut self, key: &str) -> SessionResult<()> {
        self.values.remove(key);
        self.pending.insert(key.to_string(), None);
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
