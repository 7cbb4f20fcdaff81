//! # Session Repository
//!
//! Key-value rows scoped by session id.
//!
//! ## Row Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    session_values rows                                  │
//! │                                                                         │
//! │  put(s, k, v)    ──► INSERT ... ON CONFLICT DO UPDATE (upsert)         │
//! │                      created_at kept, updated_at refreshed             │
//! │                                                                         │
//! │  delete(s, k)    ──► DELETE one row                                    │
//! │                                                                         │
//! │  apply(s, [...]) ──► puts + deletes in ONE transaction                 │
//! │                      (what SqliteSession::commit uses)                 │
//! │                                                                         │
//! │  purge_older_than(t) ──► DELETE rows not touched since t               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Values are stored as JSON text.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};

/// A pending change to one key: `Some` writes, `None` deletes.
pub type SessionChange = (String, Option<Value>);

/// Repository for session key-value operations.
#[derive(Debug, Clone)]
pub struct SessionRepository {
    pool: SqlitePool,
}

impl SessionRepository {
    /// Creates a new SessionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SessionRepository { pool }
    }

    /// Reads one key of a session.
    pub async fn get(&self, session_id: &str, key: &str) -> DbResult<Option<Value>> {
        let row = sqlx::query("SELECT value FROM session_values WHERE session_id = ?1 AND key = ?2")
            .bind(session_id)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| {
            let raw: String = row.try_get("value")?;
            decode(session_id, key, &raw)
        })
        .transpose()
    }

    /// Reads every key of a session.
    pub async fn load_all(&self, session_id: &str) -> DbResult<HashMap<String, Value>> {
        let rows = sqlx::query("SELECT key, value FROM session_values WHERE session_id = ?1")
            .bind(session_id)
            .fetch_all(&self.pool)
            .await?;

        let mut values = HashMap::with_capacity(rows.len());
        for row in rows {
            let key: String = row.try_get("key")?;
            let raw: String = row.try_get("value")?;
            let value = decode(session_id, &key, &raw)?;
            values.insert(key, value);
        }

        debug!(session_id = %session_id, keys = values.len(), "Session loaded");
        Ok(values)
    }

    /// Writes one key, replacing any previous value.
    pub async fn put(&self, session_id: &str, key: &str, value: &Value) -> DbResult<()> {
        self.apply(session_id, &[(key.to_string(), Some(value.clone()))])
            .await
    }

    /// Deletes one key. Returns whether a row was removed.
    pub async fn delete(&self, session_id: &str, key: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM session_values WHERE session_id = ?1 AND key = ?2")
            .bind(session_id)
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Applies a batch of writes and deletes atomically.
    pub async fn apply(&self, session_id: &str, changes: &[SessionChange]) -> DbResult<()> {
        if changes.is_empty() {
            return Ok(());
        }

        let now = Utc::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        for (key, change) in changes {
            match change {
                Some(value) => {
                    sqlx::query(
                        r#"
                        INSERT INTO session_values (session_id, key, value, created_at, updated_at)
                        VALUES (?1, ?2, ?3, ?4, ?4)
                        ON CONFLICT (session_id, key) DO UPDATE SET
                            value = excluded.value,
                            updated_at = excluded.updated_at
                        "#,
                    )
                    .bind(session_id)
                    .bind(key)
                    .bind(value.to_string())
                    .bind(now)
                    .execute(&mut *tx)
                    .await?;
                }
                None => {
                    sqlx::query("DELETE FROM session_values WHERE session_id = ?1 AND key = ?2")
                        .bind(session_id)
                        .bind(key)
                        .execute(&mut *tx)
                        .await?;
                }
            }
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        debug!(session_id = %session_id, changes = changes.len(), "Session changes applied");
        Ok(())
    }

    /// Deletes every key of a session. Returns the number of rows removed.
    pub async fn destroy(&self, session_id: &str) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM session_values WHERE session_id = ?1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Deletes rows not written since `cutoff`. Returns the number removed.
    pub async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM session_values WHERE updated_at < ?1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        debug!(cutoff = %cutoff, removed = result.rows_affected(), "Stale sessions purged");
        Ok(result.rows_affected())
    }

    /// Number of distinct sessions with at least one key.
    pub async fn count_sessions(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT session_id) FROM session_values")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

fn decode(session_id: &str, key: &str, raw: &str) -> DbResult<Value> {
    serde_json::from_str(raw).map_err(|e| DbError::invalid_value(session_id, key, e))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::Duration;
    use serde_json::json;

    async fn repo() -> SessionRepository {
        Database::new(DbConfig::in_memory()).await.unwrap().sessions()
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let repo = repo().await;

        assert_eq!(repo.get("s1", "cart").await.unwrap(), None);

        repo.put("s1", "cart", &json!({ "items": [] })).await.unwrap();
        assert_eq!(
            repo.get("s1", "cart").await.unwrap(),
            Some(json!({ "items": [] }))
        );

        // Upsert replaces
        repo.put("s1", "cart", &json!({ "items": [1] })).await.unwrap();
        assert_eq!(
            repo.get("s1", "cart").await.unwrap(),
            Some(json!({ "items": [1] }))
        );

        assert!(repo.delete("s1", "cart").await.unwrap());
        assert!(!repo.delete("s1", "cart").await.unwrap());
        assert_eq!(repo.get("s1", "cart").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let repo = repo().await;

        repo.put("s1", "cart", &json!(1)).await.unwrap();
        repo.put("s2", "cart", &json!(2)).await.unwrap();
        repo.put("s2", "flash", &json!("hi")).await.unwrap();

        assert_eq!(repo.load_all("s1").await.unwrap().len(), 1);
        assert_eq!(repo.load_all("s2").await.unwrap().len(), 2);
        assert_eq!(repo.count_sessions().await.unwrap(), 2);

        assert_eq!(repo.destroy("s2").await.unwrap(), 2);
        assert_eq!(repo.count_sessions().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_apply_mixes_writes_and_deletes() {
        let repo = repo().await;
        repo.put("s1", "old", &json!(true)).await.unwrap();

        repo.apply(
            "s1",
            &[
                ("new".to_string(), Some(json!({ "a": 1 }))),
                ("old".to_string(), None),
            ],
        )
        .await
        .unwrap();

        let values = repo.load_all("s1").await.unwrap();
        assert_eq!(values.get("new"), Some(&json!({ "a": 1 })));
        assert!(!values.contains_key("old"));
    }

    #[tokio::test]
    async fn test_purge_older_than() {
        let repo = repo().await;
        repo.put("s1", "cart", &json!(1)).await.unwrap();

        assert_eq!(
            repo.purge_older_than(Utc::now() - Duration::hours(1))
                .await
                .unwrap(),
            0
        );
        assert_eq!(
            repo.purge_older_than(Utc::now() + Duration::hours(1))
                .await
                .unwrap(),
            1
        );
        assert_eq!(repo.count_sessions().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_invalid_json_is_reported() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        sqlx::query(
            "INSERT INTO session_values (session_id, key, value, created_at, updated_at) \
             VALUES ('s1', 'cart', 'not json', '2024-01-01', '2024-01-01')",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let err = db.sessions().get("s1", "cart").await.unwrap_err();
        assert!(matches!(err, DbError::InvalidValue { .. }));
    }
}
