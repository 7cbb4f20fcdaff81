//! Command handlers.
//!
//! Each handler loads the session, runs one ledger operation, commits and
//! returns the JSON document `main` prints.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SqliteSession::load ──► CartLedger::with_config(&mut session, ..)     │
//! │                                   │                                     │
//! │                              op(&mut ledger)                            │
//! │                                   │                                     │
//! │           Err ◄───────────────────┤ (nothing committed)                 │
//! │                                   ▼                                     │
//! │                  snapshot ──► drop ledger ──► session.commit()          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use anyhow::{Context, Result};
use cart_core::{
    CartLedger, CartResult, CartState, Entries, Extra, ItemInput, ItemUpdate, LedgerConfig,
    Options,
};
use cart_db::{Database, SqliteSession};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tracing::info;

type SessionLedger<'a> = CartLedger<&'a mut SqliteSession>;

/// Everything a command needs to reach one session's cart.
pub struct CartContext {
    db: Database,
    session_id: Option<String>,
    ledger_config: LedgerConfig,
}

impl CartContext {
    pub fn new(db: Database, session_id: Option<String>, ledger_config: LedgerConfig) -> Self {
        CartContext {
            db,
            session_id,
            ledger_config,
        }
    }

    fn session_id(&self) -> Result<&str> {
        self.session_id
            .as_deref()
            .context("no session id: pass --session or set CART_SESSION_ID")
    }

    /// Loads the configured session. Without an id, `start_fresh` opens a new
    /// session instead of failing.
    async fn open_session(&self, start_fresh: bool) -> Result<SqliteSession> {
        if self.session_id.is_none() && start_fresh {
            let session = SqliteSession::fresh();
            info!(session_id = %session.id(), "Started new session");
            return Ok(session);
        }

        let session_id = self.session_id()?;
        SqliteSession::load(&self.db, session_id)
            .await
            .with_context(|| format!("loading session {session_id}"))
    }

    /// Runs `op` against the session's cart and commits what it wrote.
    ///
    /// Returns the op's output, the resulting cart and the session id.
    async fn with_ledger<T>(
        &self,
        start_fresh: bool,
        op: impl FnOnce(&mut SessionLedger<'_>) -> CartResult<T>,
    ) -> Result<(T, CartState, String)> {
        let mut session = self.open_session(start_fresh).await?;
        let session_id = session.id().to_string();

        let (output, state) = {
            let mut ledger = CartLedger::with_config(&mut session, self.ledger_config.clone())?;
            let output = op(&mut ledger)?;
            (output, ledger.state().clone())
        };

        let written = session
            .commit(&self.db)
            .await
            .with_context(|| format!("committing session {session_id}"))?;
        info!(session_id = %session_id, written, "Session saved");

        Ok((output, state, session_id))
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Adds items. Without a session id the items go into a new session,
    /// whose id is part of the output.
    pub async fn add(&self, items: Entries<ItemInput>) -> Result<Value> {
        let (row_id, cart, session) = self.with_ledger(true, |ledger| ledger.insert(items)).await?;
        Ok(json!({ "session": session, "rowid": row_id, "cart": cart }))
    }

    pub async fn update(&self, items: Entries<ItemUpdate>) -> Result<Value> {
        let ((), cart, session) = self.with_ledger(false, |ledger| ledger.update(items)).await?;
        Ok(json!({ "session": session, "cart": cart }))
    }

    pub async fn remove(&self, row_id: &str) -> Result<Value> {
        let ((), cart, session) = self.with_ledger(false, |ledger| ledger.remove(row_id)).await?;
        Ok(json!({ "session": session, "cart": cart }))
    }

    pub async fn destroy(&self) -> Result<Value> {
        let ((), cart, session) = self.with_ledger(false, |ledger| ledger.destroy()).await?;
        Ok(json!({ "session": session, "cart": cart }))
    }

    /// Prints the cart without writing anything back.
    pub async fn show(&self, newest_first: bool) -> Result<Value> {
        let session = self.open_session(false).await?;
        let ledger = CartLedger::with_config(session, self.ledger_config.clone())?;

        Ok(json!({
            "items": ledger.contents(newest_first),
            "cart_total": ledger.total(),
            "total_items": ledger.total_items(),
        }))
    }

    /// Deletes session rows idle for longer than `hours`.
    pub async fn purge(&self, hours: i64) -> Result<Value> {
        let cutoff = Duration::try_hours(hours)
            .filter(|age| *age > Duration::zero())
            .and_then(|age| Utc::now().checked_sub_signed(age))
            .with_context(|| format!("idle age must be a positive number of hours, got {hours}"))?;

        let sessions = self.db.sessions();
        let removed = sessions.purge_older_than(cutoff).await?;
        let remaining = sessions.count_sessions().await?;
        info!(removed, remaining, %cutoff, "Idle sessions purged");

        Ok(json!({ "removed": removed, "remaining_sessions": remaining, "cutoff": cutoff }))
    }
}

// =============================================================================
// Argument Helpers
// =============================================================================

/// Parses `key=value`; the value is read as JSON when it parses, else as text.
pub fn parse_pair(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }

    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

/// Parses a JSON record or list of records.
pub fn parse_entries<T>(raw: &str) -> Result<Entries<T>>
where
    T: serde::de::DeserializeOwned + cart_core::BatchKey,
{
    let value: Value = serde_json::from_str(raw).context("item JSON is not valid JSON")?;
    Entries::from_value(value).context("item JSON does not describe cart items")
}

/// Builds an insert record from individual flags.
pub fn item_from_flags(
    id: Option<String>,
    qty: Option<f64>,
    price: Option<f64>,
    name: Option<String>,
    max_ord: Option<f64>,
    options: Vec<(String, Value)>,
    extra: Vec<(String, Value)>,
) -> ItemInput {
    ItemInput {
        id,
        qty,
        price,
        name,
        max_ord,
        options: (!options.is_empty()).then(|| options.into_iter().collect::<Options>()),
        extra: extra.into_iter().collect::<Extra>(),
    }
}

/// Builds an update record from individual flags.
pub fn update_from_flags(
    row_id: String,
    qty: Option<f64>,
    price: Option<f64>,
    max_ord: Option<f64>,
    extra: Vec<(String, Value)>,
) -> ItemUpdate {
    ItemUpdate {
        rowid: Some(row_id),
        qty,
        price,
        max_ord,
        extra: extra.into_iter().collect::<Extra>(),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cart_db::DbConfig;

    async fn context(session: Option<&str>) -> CartContext {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        CartContext::new(db, session.map(String::from), LedgerConfig::default())
    }

    #[test]
    fn test_parse_pair() {
        assert_eq!(parse_pair("size=L").unwrap(), ("size".to_string(), json!("L")));
        assert_eq!(parse_pair("count=3").unwrap(), ("count".to_string(), json!(3)));
        assert_eq!(
            parse_pair("note=a=b").unwrap(),
            ("note".to_string(), json!("a=b"))
        );
        assert!(parse_pair("size").is_err());
        assert!(parse_pair("=L").is_err());
    }

    #[test]
    fn test_item_from_flags() {
        let item = item_from_flags(
            Some("sku1".into()),
            Some(1.0),
            Some(2.5),
            Some("Widget".into()),
            None,
            vec![("size".into(), json!("L"))],
            vec![],
        );
        assert_eq!(item, ItemInput::new("sku1", 1.0, 2.5, "Widget").with_option("size", "L"));

        let bare = item_from_flags(None, None, None, None, None, vec![], vec![]);
        assert_eq!(bare.options, None);
    }

    #[test]
    fn test_parse_entries_batch() {
        let entries: Entries<ItemInput> = parse_entries(
            r#"[{"id":"a","qty":"1","price":1,"name":"A"},{"id":"b","qty":2,"price":1,"name":"B"}]"#,
        )
        .unwrap();
        assert_eq!(entries.into_vec().len(), 2);

        assert!(parse_entries::<ItemInput>("not json").is_err());
    }

    #[tokio::test]
    async fn test_add_then_show() {
        let ctx = context(Some("visitor-1")).await;

        ctx.add(ItemInput::new("sku1", 2.0, 10.0, "Widget").into())
            .await
            .unwrap();
        ctx.add(ItemInput::new("sku1", 3.0, 10.0, "Widget").into())
            .await
            .unwrap();

        let shown = ctx.show(false).await.unwrap();
        assert_eq!(shown["total_items"], json!(5));
        assert_eq!(shown["cart_total"], json!(50.0));
        assert_eq!(shown["items"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_add_writes_nothing() {
        let ctx = context(Some("visitor-1")).await;

        let err = ctx
            .add(ItemInput::new("bad id!", 1.0, 1.0, "Widget").into())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("bad id!"));

        let shown = ctx.show(false).await.unwrap();
        assert_eq!(shown["items"], json!([]));
    }

    #[tokio::test]
    async fn test_remove_and_destroy() {
        let ctx = context(Some("visitor-1")).await;

        let added = ctx
            .add(ItemInput::new("sku1", 1.0, 4.0, "Widget").into())
            .await
            .unwrap();
        ctx.add(ItemInput::new("sku2", 1.0, 6.0, "Gadget").into())
            .await
            .unwrap();

        let row_id = added["rowid"].as_str().unwrap().to_string();
        let after_remove = ctx.remove(&row_id).await.unwrap();
        assert_eq!(after_remove["cart"]["cart_total"], json!(6.0));

        ctx.destroy().await.unwrap();
        assert_eq!(ctx.show(false).await.unwrap()["total_items"], json!(0));
    }

    #[tokio::test]
    async fn test_missing_session_id() {
        let ctx = context(None).await;
        assert!(ctx.show(false).await.is_err());
        assert!(ctx.remove("abc").await.is_err());
        // Purge is not tied to a session
        assert_eq!(ctx.purge(24).await.unwrap()["removed"], json!(0));
    }

    #[tokio::test]
    async fn test_add_without_session_starts_one() {
        let ctx = context(None).await;

        let added = ctx
            .add(ItemInput::new("sku1", 2.0, 3.0, "Widget").into())
            .await
            .unwrap();
        let session_id = added["session"].as_str().unwrap().to_string();
        assert!(!session_id.is_empty());

        let reopened = CartContext::new(ctx.db.clone(), Some(session_id), LedgerConfig::default());
        assert_eq!(reopened.show(false).await.unwrap()["cart_total"], json!(6.0));
        assert_eq!(ctx.purge(1).await.unwrap()["remaining_sessions"], json!(1));
    }

    #[tokio::test]
    async fn test_purge_rejects_bad_ages() {
        let ctx = context(Some("visitor-1")).await;
        ctx.add(ItemInput::new("sku1", 1.0, 1.0, "Widget").into())
            .await
            .unwrap();

        assert!(ctx.purge(0).await.is_err());
        assert!(ctx.purge(-5).await.is_err());
        assert!(ctx.purge(i64::MAX).await.is_err());

        // Nothing was purged by the rejected calls
        assert_eq!(ctx.show(false).await.unwrap()["total_items"], json!(1));
    }
}
