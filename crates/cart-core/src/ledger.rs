//! # Cart Ledger
//!
//! The session-bound cart: insert, merge, update, remove, recompute, persist.
//!
//! ## Operation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Ledger Operations                                    │
//! │                                                                         │
//! │  new(session) ──► session.get(key) ──► CartState (or empty)            │
//! │                                                                         │
//! │  insert(items) ─┐                                                       │
//! │  update(items) ─┼──► per-item rules ──► any applied? ──► save_cart     │
//! │  remove(rowid) ─┘                                          │            │
//! │                                                            ▼            │
//! │                                            recompute subtotals/totals  │
//! │                                                            │            │
//! │                                    ┌───── items? ──────────┤            │
//! │                                    │ yes                   │ no         │
//! │                                    ▼                       ▼            │
//! │                          session.set(key, state)   session.remove(key) │
//! │                                                                         │
//! │  destroy() ──► empty state + session.remove(key)                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Batches
//! `insert` and `update` accept one record or a list. Each record is applied
//! or rejected on its own; rejected records are logged and skipped, applied
//! ones are never rolled back. The batch succeeds when at least one record
//! was applied, and then the cart is saved exactly once.

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::LedgerConfig;
use crate::error::{CartError, CartResult, SessionError};
use crate::row_id::RowId;
use crate::session::SessionStore;
use crate::types::{CartState, Entries, ItemInput, ItemUpdate, LineItem, Options};
use crate::validation::{
    floor_quantity, require_finite, validate_product_id, validate_product_name,
};

/// A cart bound to one session for the duration of a request.
///
/// ## Lifecycle
/// Construct once per request with the request's session, apply any number
/// of operations, then drop it (or take the session back with
/// [`CartLedger::into_session`] to flush it).
///
/// ## Example
/// ```rust
/// use cart_core::{CartLedger, ItemInput, ItemUpdate, MemorySession};
///
/// let mut session = MemorySession::new();
/// let mut ledger = CartLedger::new(&mut session).unwrap();
///
/// let row = ledger.insert(ItemInput::new("sku1", 2.0, 10.0, "Widget")).unwrap();
/// assert_eq!(ledger.total(), 20.0);
///
/// ledger.update(ItemUpdate::new(&row).with_qty(0.0)).unwrap();
/// assert!(ledger.is_empty());
///
/// drop(ledger);
/// assert!(!session.contains("cart_contents"));
/// ```
#[derive(Debug)]
pub struct CartLedger<S: SessionStore> {
    session: S,
    config: LedgerConfig,
    cart: CartState,
}

impl<S: SessionStore> CartLedger<S> {
    /// Loads the cart from `session` with the default configuration.
    pub fn new(session: S) -> CartResult<Self> {
        Self::with_config(session, LedgerConfig::default())
    }

    /// Loads the cart from `session`.
    ///
    /// The stored value is trusted and not re-validated. A value that does
    /// not decode as a cart is reported as [`SessionError::Corrupt`].
    pub fn with_config(session: S, config: LedgerConfig) -> CartResult<Self> {
        let key = config.session_key();

        let cart = match session.get(key)? {
            Some(value) => {
                serde_json::from_value(value).map_err(|e| SessionError::Corrupt {
                    key: key.to_string(),
                    reason: e.to_string(),
                })?
            }
            None => CartState::new(),
        };

        debug!(key = %key, rows = cart.len(), "Cart ledger initialized");

        Ok(CartLedger {
            session,
            config,
            cart,
        })
    }

    // =========================================================================
    // Insert
    // =========================================================================

    /// Adds one or more items, merging quantities into existing rows.
    ///
    /// ## Returns
    /// - `Ok(row_id)` of the last item applied
    /// - `Err(EmptyInput)` for an empty list
    /// - the rejection of a single record, or of the last record when no
    ///   record in a batch was applied
    pub fn insert(&mut self, items: impl Into<Entries<ItemInput>>) -> CartResult<RowId> {
        let entries = items.into();
        if entries.is_empty() {
            warn!("Insert called without items");
            return Err(CartError::EmptyInput);
        }

        let mut inserted = None;
        let mut last_error = None;

        for item in entries.into_vec() {
            match self.insert_one(item) {
                Ok(row_id) => inserted = Some(row_id),
                Err(err) => {
                    log_rejection("insert", &err);
                    last_error = Some(err);
                }
            }
        }

        match inserted {
            Some(row_id) => {
                self.save_cart()?;
                Ok(row_id)
            }
            None => Err(last_error.unwrap_or(CartError::EmptyInput)),
        }
    }

    /// Validates and stores one item.
    ///
    /// ## Rules (in order)
    /// 1. `id`, `qty`, `price`, `name` present
    /// 2. `qty` floored at zero (NaN and infinities count as zero); zero is rejected
    /// 3. `id` in the product id class
    /// 4. `name` in the product name class (when name safety is on)
    /// 5. `price` and `max_ord` finite
    /// 6. row id from `(id, options)`
    /// 7. merged qty = supplied + existing
    /// 8. merged qty within a positive `max_ord`
    fn insert_one(&mut self, item: ItemInput) -> CartResult<RowId> {
        let ItemInput {
            id,
            qty,
            price,
            name,
            max_ord,
            options,
            mut extra,
        } = item;

        let product_id = id.ok_or(CartError::MissingRequiredField { field: "id" })?;
        let qty = qty.ok_or(CartError::MissingRequiredField { field: "qty" })?;
        let price = price.ok_or(CartError::MissingRequiredField { field: "price" })?;
        let name = name.ok_or(CartError::MissingRequiredField { field: "name" })?;

        // "NaN" and "inf" carry no usable quantity
        let qty = if qty.is_finite() { floor_quantity(qty) } else { 0.0 };
        if qty == 0.0 {
            return Err(CartError::ZeroQuantity { product_id });
        }

        validate_product_id(&product_id, self.config.product_id_class())?;

        if self.config.product_name_safe() {
            validate_product_name(&name, self.config.product_name_class())?;
        }

        let price = require_finite(price, "price")?;
        let max_ord = max_ord.map(|max| require_finite(max, "max_ord")).transpose()?;

        let row_id = RowId::derive(&product_id, options.as_ref());

        let existing = self
            .cart
            .find(row_id.as_str())
            .map_or(0.0, |row| row.quantity);
        let merged = qty + existing;

        if let Some(max) = max_ord.filter(|max| *max > 0.0) {
            if merged > max {
                return Err(CartError::MaxOrderExceeded {
                    product_id,
                    requested: merged,
                    max,
                });
            }
        }

        // Derived fields are never taken from the caller
        extra.remove("rowid");
        extra.remove("subtotal");

        debug!(
            row_id = %row_id,
            product_id = %product_id,
            qty = merged,
            "Item inserted"
        );

        self.cart.upsert(LineItem {
            row_id: row_id.clone(),
            product_id,
            name,
            quantity: merged,
            unit_price: price,
            subtotal: 0.0,
            max_order_quantity: max_ord,
            options,
            extra,
        });

        Ok(row_id)
    }

    // =========================================================================
    // Update
    // =========================================================================

    /// Changes one or more existing rows.
    ///
    /// ## Behavior
    /// - `qty` of zero (after flooring negatives) deletes the row
    /// - NaN or infinite `qty`, `price` or `max_ord` rejects the record
    /// - `id`, `name` and `options` are never overwritten
    /// - other fields are overwritten only where the stored row has them
    pub fn update(&mut self, items: impl Into<Entries<ItemUpdate>>) -> CartResult<()> {
        let entries = items.into();
        if entries.is_empty() {
            warn!("Update called without items");
            return Err(CartError::EmptyInput);
        }

        let mut applied = false;
        let mut last_error = None;

        for item in entries.into_vec() {
            match self.update_one(item) {
                Ok(()) => applied = true,
                Err(err) => {
                    log_rejection("update", &err);
                    last_error = Some(err);
                }
            }
        }

        if !applied {
            return Err(last_error.unwrap_or(CartError::EmptyInput));
        }

        self.save_cart()?;
        Ok(())
    }

    fn update_one(&mut self, update: ItemUpdate) -> CartResult<()> {
        let row_id = update
            .rowid
            .ok_or(CartError::MissingRequiredField { field: "rowid" })?;

        let Some(stored) = self.cart.find(&row_id) else {
            return Err(CartError::RowNotFound { row_id });
        };

        let new_qty = update
            .qty
            .map(|qty| require_finite(qty, "qty"))
            .transpose()?
            .map(floor_quantity);
        let new_price = update
            .price
            .map(|price| require_finite(price, "price"))
            .transpose()?;
        let new_max = update
            .max_ord
            .map(|max| require_finite(max, "max_ord"))
            .transpose()?;

        if new_qty == Some(0.0) {
            self.cart.remove(&row_id);
            debug!(row_id = %row_id, "Row deleted by zero quantity");
            return Ok(());
        }

        // A max_ord only replaces one the row already carries
        let max_ord = match (stored.max_order_quantity, new_max) {
            (Some(_), Some(new)) => Some(new),
            (current, _) => current,
        };
        let qty = new_qty.unwrap_or(stored.quantity);

        if let Some(max) = max_ord.filter(|max| *max > 0.0) {
            if qty > max {
                return Err(CartError::MaxOrderExceeded {
                    product_id: stored.product_id.clone(),
                    requested: qty,
                    max,
                });
            }
        }

        let Some(row) = self.cart.find_mut(&row_id) else {
            return Err(CartError::RowNotFound { row_id });
        };

        row.quantity = qty;
        row.max_order_quantity = max_ord;
        if let Some(price) = new_price {
            row.unit_price = price;
        }
        for (key, value) in update.extra {
            if let Some(slot) = row.extra.get_mut(&key) {
                *slot = value;
            }
        }

        debug!(row_id = %row_id, qty = qty, "Row updated");
        Ok(())
    }

    // =========================================================================
    // Remove / Destroy
    // =========================================================================

    /// Removes a row if present and saves. Absent rows are not an error.
    pub fn remove(&mut self, row_id: &str) -> CartResult<()> {
        if self.cart.remove(row_id).is_some() {
            debug!(row_id = %row_id, "Row removed");
        }
        self.save_cart()?;
        Ok(())
    }

    /// Empties the cart and deletes its session entry.
    pub fn destroy(&mut self) -> CartResult<()> {
        self.cart = CartState::new();
        self.session.remove(self.config.session_key())?;
        debug!("Cart destroyed");
        Ok(())
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Recomputes totals and writes the cart back to the session.
    ///
    /// ## Returns
    /// - `true` when the cart was written
    /// - `false` when the cart is empty and its session entry was removed
    fn save_cart(&mut self) -> CartResult<bool> {
        self.cart.recompute();

        let key = self.config.session_key();

        if self.cart.is_empty() {
            self.session.remove(key)?;
            debug!(key = %key, "Cart empty, session entry removed");
            return Ok(false);
        }

        let value: Value = serde_json::to_value(&self.cart).map_err(SessionError::from)?;
        self.session.set(key, value)?;

        debug!(
            key = %key,
            rows = self.cart.len(),
            total = self.cart.cart_total,
            total_items = self.cart.total_items,
            "Cart saved"
        );
        Ok(true)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Sum of all subtotals.
    pub fn total(&self) -> f64 {
        self.cart.cart_total
    }

    /// Sum of all quantities, truncated to an integer.
    pub fn total_items(&self) -> i64 {
        self.cart.total_items as i64
    }

    /// Line items in insertion order, or newest first.
    pub fn contents(&self, newest_first: bool) -> Vec<&LineItem> {
        if newest_first {
            self.cart.items.iter().rev().collect()
        } else {
            self.cart.items.iter().collect()
        }
    }

    /// Looks up a single row.
    pub fn get_item(&self, row_id: &str) -> Option<&LineItem> {
        self.cart.find(row_id)
    }

    /// Whether the row exists and carries non-empty options.
    pub fn has_options(&self, row_id: &str) -> bool {
        self.cart.find(row_id).is_some_and(LineItem::has_options)
    }

    /// Options of a row; empty when the row has none or does not exist.
    pub fn product_options(&self, row_id: &str) -> Options {
        self.cart
            .find(row_id)
            .and_then(|row| row.options.clone())
            .unwrap_or_default()
    }

    /// Number of distinct rows.
    pub fn item_count(&self) -> usize {
        self.cart.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cart.is_empty()
    }

    /// The full cart state, as it would be persisted.
    pub fn state(&self) -> &CartState {
        &self.cart
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    /// Releases the session, e.g. to commit it.
    pub fn into_session(self) -> S {
        self.session
    }
}

fn log_rejection(operation: &'static str, err: &CartError) {
    warn!(operation, error = %err, "Item rejected");
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemorySession;
    use crate::DEFAULT_SESSION_KEY;
    use serde_json::json;

    fn widget(qty: f64) -> ItemInput {
        ItemInput::new("sku1", qty, 10.0, "Widget")
    }

    fn assert_totals_consistent<S: SessionStore>(ledger: &CartLedger<S>) {
        let items = ledger.contents(false);
        let total: f64 = items.iter().map(|i| i.unit_price * i.quantity).sum();
        let qty: f64 = items.iter().map(|i| i.quantity).sum();
        assert_eq!(ledger.total(), total);
        assert_eq!(ledger.total_items(), qty as i64);
        assert!(items.iter().all(|i| i.quantity > 0.0));
    }

    #[test]
    fn test_insert_merge_update_scenario() {
        let mut session = MemorySession::new();
        let mut ledger = CartLedger::new(&mut session).unwrap();

        let first = ledger.insert(widget(2.0)).unwrap();
        assert_eq!(ledger.total(), 20.0);
        assert_eq!(ledger.total_items(), 2);

        let second = ledger.insert(widget(3.0)).unwrap();
        assert_eq!(first, second);
        assert_eq!(ledger.item_count(), 1);
        assert_eq!(ledger.get_item(first.as_str()).unwrap().quantity, 5.0);
        assert_eq!(ledger.total(), 50.0);
        assert!(ledger.session().contains(DEFAULT_SESSION_KEY));

        ledger.update(ItemUpdate::new(&first).with_qty(0.0)).unwrap();
        assert!(ledger.is_empty());
        assert_eq!(ledger.total(), 0.0);
        assert_totals_consistent(&ledger);

        drop(ledger);
        assert!(!session.contains(DEFAULT_SESSION_KEY));
    }

    #[test]
    fn test_options_differentiate_rows() {
        let mut ledger = CartLedger::new(MemorySession::new()).unwrap();

        let red = ledger
            .insert(ItemInput::new("tshirt", 1.0, 15.0, "T-Shirt").with_option("color", "red"))
            .unwrap();
        let blue = ledger
            .insert(ItemInput::new("tshirt", 1.0, 15.0, "T-Shirt").with_option("color", "blue"))
            .unwrap();

        assert_ne!(red, blue);
        assert_eq!(ledger.item_count(), 2);
        assert!(ledger.has_options(red.as_str()));
        assert_eq!(ledger.product_options(blue.as_str())["color"], json!("blue"));
        assert_eq!(ledger.total(), 30.0);
    }

    #[test]
    fn test_missing_required_fields_in_order() {
        let mut ledger = CartLedger::new(MemorySession::new()).unwrap();

        let err = ledger.insert(ItemInput::default()).unwrap_err();
        assert!(matches!(err, CartError::MissingRequiredField { field: "id" }));

        let mut item = widget(1.0);
        item.price = None;
        let err = ledger.insert(item).unwrap_err();
        assert!(matches!(err, CartError::MissingRequiredField { field: "price" }));

        let mut item = widget(1.0);
        item.name = None;
        let err = ledger.insert(item).unwrap_err();
        assert!(matches!(err, CartError::MissingRequiredField { field: "name" }));

        assert!(ledger.session().is_empty());
    }

    #[test]
    fn test_zero_and_negative_quantity_rejected() {
        let mut ledger = CartLedger::new(MemorySession::new()).unwrap();

        assert!(matches!(
            ledger.insert(widget(0.0)).unwrap_err(),
            CartError::ZeroQuantity { .. }
        ));
        assert!(matches!(
            ledger.insert(widget(-4.0)).unwrap_err(),
            CartError::ZeroQuantity { .. }
        ));
        assert!(ledger.is_empty());
        assert!(ledger.session().is_empty());
    }

    #[test]
    fn test_invalid_id_and_name_rejected() {
        let mut ledger = CartLedger::new(MemorySession::new()).unwrap();

        let err = ledger
            .insert(ItemInput::new("sku 1", 1.0, 1.0, "Widget"))
            .unwrap_err();
        assert!(matches!(err, CartError::InvalidProductId { .. }));

        let err = ledger
            .insert(ItemInput::new("sku1", 1.0, 1.0, "<b>Widget</b>"))
            .unwrap_err();
        assert!(matches!(err, CartError::InvalidProductName { .. }));
    }

    #[test]
    fn test_name_safety_can_be_disabled() {
        let config = LedgerConfig::builder()
            .product_name_safe(false)
            .build()
            .unwrap();
        let mut ledger = CartLedger::with_config(MemorySession::new(), config).unwrap();

        let row = ledger
            .insert(ItemInput::new("sku1", 1.0, 1.0, "Widget™ (limited!)"))
            .unwrap();
        assert_eq!(ledger.get_item(row.as_str()).unwrap().name, "Widget™ (limited!)");
    }

    #[test]
    fn test_max_order_cap_keeps_prior_quantity() {
        let mut ledger = CartLedger::new(MemorySession::new()).unwrap();

        let row = ledger.insert(widget(3.0).with_max_ord(5.0)).unwrap();

        let err = ledger.insert(widget(3.0).with_max_ord(5.0)).unwrap_err();
        assert!(matches!(
            err,
            CartError::MaxOrderExceeded { requested, max, .. } if requested == 6.0 && max == 5.0
        ));
        assert_eq!(ledger.get_item(row.as_str()).unwrap().quantity, 3.0);
        assert_eq!(ledger.total(), 30.0);

        // Exactly at the cap is allowed
        ledger.insert(widget(2.0).with_max_ord(5.0)).unwrap();
        assert_eq!(ledger.get_item(row.as_str()).unwrap().quantity, 5.0);

        // Zero or negative caps are ignored
        ledger.insert(widget(100.0).with_max_ord(0.0)).unwrap();
        assert_eq!(ledger.get_item(row.as_str()).unwrap().quantity, 105.0);
    }

    #[test]
    fn test_update_cannot_change_id_name_or_options() {
        let mut ledger = CartLedger::new(MemorySession::new()).unwrap();
        let row = ledger
            .insert(ItemInput::new("tshirt", 1.0, 15.0, "T-Shirt").with_option("size", "M"))
            .unwrap();

        let mut update = ItemUpdate::new(&row).with_qty(2.0).with_price(12.5);
        update.id = Some("hacked".to_string());
        update.name = Some("Hacked".to_string());
        update.options = Some(Options::from([("size".to_string(), json!("XL"))]));
        ledger.update(update).unwrap();

        let item = ledger.get_item(row.as_str()).unwrap();
        assert_eq!(item.product_id, "tshirt");
        assert_eq!(item.name, "T-Shirt");
        assert_eq!(ledger.product_options(row.as_str())["size"], json!("M"));
        assert_eq!(item.quantity, 2.0);
        assert_eq!(item.unit_price, 12.5);
        assert_eq!(item.subtotal, 25.0);
        assert_eq!(ledger.total(), 25.0);
    }

    #[test]
    fn test_update_only_touches_existing_fields() {
        let mut ledger = CartLedger::new(MemorySession::new()).unwrap();
        let row = ledger
            .insert(widget(1.0).with_extra("note", "gift"))
            .unwrap();

        ledger
            .update(
                ItemUpdate::new(&row)
                    .with_extra("note", "no gift")
                    .with_extra("coupon", "FREE")
                    .with_max_ord(1.0),
            )
            .unwrap();

        let item = ledger.get_item(row.as_str()).unwrap();
        assert_eq!(item.extra.get("note"), Some(&json!("no gift")));
        assert!(!item.extra.contains_key("coupon"));
        // No max_ord was stored, so none is added
        assert_eq!(item.max_order_quantity, None);
    }

    #[test]
    fn test_update_respects_max_order() {
        let mut ledger = CartLedger::new(MemorySession::new()).unwrap();
        let row = ledger.insert(widget(1.0).with_max_ord(3.0)).unwrap();

        let err = ledger
            .update(ItemUpdate::new(&row).with_qty(4.0))
            .unwrap_err();
        assert!(matches!(err, CartError::MaxOrderExceeded { .. }));
        assert_eq!(ledger.get_item(row.as_str()).unwrap().quantity, 1.0);

        // Raising the cap in the same update lets the quantity through
        ledger
            .update(ItemUpdate::new(&row).with_qty(4.0).with_max_ord(10.0))
            .unwrap();
        assert_eq!(ledger.get_item(row.as_str()).unwrap().quantity, 4.0);
    }

    #[test]
    fn test_update_unknown_or_missing_row() {
        let mut ledger = CartLedger::new(MemorySession::new()).unwrap();
        ledger.insert(widget(1.0)).unwrap();

        let err = ledger
            .update(ItemUpdate::new("nope").with_qty(3.0))
            .unwrap_err();
        assert!(matches!(err, CartError::RowNotFound { row_id } if row_id == "nope"));

        let err = ledger.update(ItemUpdate::default()).unwrap_err();
        assert!(matches!(err, CartError::MissingRequiredField { field: "rowid" }));
    }

    #[test]
    fn test_batch_insert_tolerates_partial_failure() {
        let mut ledger = CartLedger::new(MemorySession::new()).unwrap();

        let last = ledger
            .insert(vec![
                ItemInput::new("a", 1.0, 1.0, "Apple"),
                ItemInput::new("bad id", 1.0, 1.0, "Broken"),
                ItemInput::new("b", 2.0, 3.0, "Banana"),
                ItemInput::new("c", 0.0, 5.0, "Cherry"),
            ])
            .unwrap();

        assert_eq!(last, RowId::derive("b", None));
        assert_eq!(ledger.item_count(), 2);
        assert_eq!(ledger.total(), 7.0);
        assert_eq!(ledger.total_items(), 3);
        assert_totals_consistent(&ledger);
    }

    #[test]
    fn test_batch_with_no_success_fails_without_saving() {
        let mut ledger = CartLedger::new(MemorySession::new()).unwrap();

        let err = ledger
            .insert(vec![
                ItemInput::new("bad id", 1.0, 1.0, "Broken"),
                ItemInput::new("a", 0.0, 1.0, "Apple"),
            ])
            .unwrap_err();
        assert!(matches!(err, CartError::ZeroQuantity { .. }));
        assert!(ledger.session().is_empty());

        let err = ledger.insert(Vec::<ItemInput>::new()).unwrap_err();
        assert!(matches!(err, CartError::EmptyInput));
        let err = ledger.update(Vec::<ItemUpdate>::new()).unwrap_err();
        assert!(matches!(err, CartError::EmptyInput));
    }

    #[test]
    fn test_batch_update() {
        let mut ledger = CartLedger::new(MemorySession::new()).unwrap();
        let a = ledger.insert(ItemInput::new("a", 1.0, 2.0, "Apple")).unwrap();
        let b = ledger.insert(ItemInput::new("b", 1.0, 3.0, "Banana")).unwrap();

        ledger
            .update(vec![
                ItemUpdate::new(&a).with_qty(4.0),
                ItemUpdate::new("missing").with_qty(1.0),
                ItemUpdate::new(&b).with_qty(0.0),
            ])
            .unwrap();

        assert_eq!(ledger.item_count(), 1);
        assert_eq!(ledger.total(), 8.0);
        assert!(ledger.get_item(b.as_str()).is_none());
    }

    #[test]
    fn test_remove_last_item_deletes_session_entry() {
        let mut session = MemorySession::new();
        {
            let mut ledger = CartLedger::new(&mut session).unwrap();
            let row = ledger.insert(widget(1.0)).unwrap();
            assert!(ledger.session().contains(DEFAULT_SESSION_KEY));

            ledger.remove(row.as_str()).unwrap();
            // Removing again is still a success
            ledger.remove(row.as_str()).unwrap();
            assert!(ledger.is_empty());
        }
        assert!(!session.contains(DEFAULT_SESSION_KEY));
    }

    #[test]
    fn test_contents_order() {
        let mut ledger = CartLedger::new(MemorySession::new()).unwrap();
        ledger.insert(ItemInput::new("a", 1.0, 1.0, "Apple")).unwrap();
        ledger.insert(ItemInput::new("b", 1.0, 1.0, "Banana")).unwrap();
        ledger.insert(ItemInput::new("c", 1.0, 1.0, "Cherry")).unwrap();
        // Merging keeps the row where it was
        ledger.insert(ItemInput::new("a", 1.0, 1.0, "Apple")).unwrap();

        let oldest: Vec<_> = ledger.contents(false).into_iter().map(|i| i.product_id.as_str()).collect();
        let newest: Vec<_> = ledger.contents(true).into_iter().map(|i| i.product_id.as_str()).collect();
        assert_eq!(oldest, ["a", "b", "c"]);
        assert_eq!(newest, ["c", "b", "a"]);
    }

    #[test]
    fn test_state_survives_reload() {
        let mut session = MemorySession::new();
        let row = {
            let mut ledger = CartLedger::new(&mut session).unwrap();
            ledger
                .insert(widget(2.0).with_option("size", "L").with_extra("note", "gift"))
                .unwrap()
        };

        let stored = session.peek(DEFAULT_SESSION_KEY).unwrap();
        assert_eq!(stored["cart_total"], json!(20.0));
        assert_eq!(stored["total_items"], json!(2.0));
        assert_eq!(stored["items"][0]["rowid"], json!(row.as_str()));
        assert_eq!(stored["items"][0]["subtotal"], json!(20.0));

        let mut ledger = CartLedger::new(&mut session).unwrap();
        assert_eq!(ledger.total(), 20.0);
        let item = ledger.get_item(row.as_str()).unwrap();
        assert_eq!(item.extra.get("note"), Some(&json!("gift")));

        // Merging continues across requests
        ledger.insert(widget(1.0).with_option("size", "L")).unwrap();
        assert_eq!(ledger.total_items(), 3);
    }

    #[test]
    fn test_destroy_clears_everything() {
        let mut session = MemorySession::new();
        session.set("other", json!("kept")).unwrap();

        let mut ledger = CartLedger::new(&mut session).unwrap();
        ledger.insert(widget(2.0)).unwrap();
        ledger.destroy().unwrap();

        assert!(ledger.is_empty());
        assert_eq!(ledger.total(), 0.0);
        assert_eq!(ledger.total_items(), 0);

        drop(ledger);
        assert!(!session.contains(DEFAULT_SESSION_KEY));
        assert!(session.contains("other"));
    }

    #[test]
    fn test_custom_session_key() {
        let config = LedgerConfig::builder().session_key("basket").build().unwrap();
        let mut session = MemorySession::new();
        {
            let mut ledger = CartLedger::with_config(&mut session, config).unwrap();
            ledger.insert(widget(1.0)).unwrap();
        }
        assert!(session.contains("basket"));
        assert!(!session.contains(DEFAULT_SESSION_KEY));
    }

    #[test]
    fn test_corrupt_session_value() {
        let mut session = MemorySession::new();
        session.set(DEFAULT_SESSION_KEY, json!("not a cart")).unwrap();

        let err = CartLedger::new(session).unwrap_err();
        assert!(matches!(err, CartError::Session(SessionError::Corrupt { .. })));
    }

    #[test]
    fn test_non_finite_numbers_never_reach_the_session() {
        let mut session = MemorySession::new();
        let mut ledger = CartLedger::new(&mut session).unwrap();

        for qty in ["NaN", "inf", "-inf"] {
            let item: ItemInput = serde_json::from_value(
                json!({ "id": "sku1", "qty": qty, "price": 10, "name": "Widget" }),
            )
            .unwrap();
            assert!(matches!(
                ledger.insert(item).unwrap_err(),
                CartError::ZeroQuantity { .. }
            ));
        }

        let item: ItemInput = serde_json::from_value(
            json!({ "id": "sku1", "qty": "1", "price": "NaN", "name": "Widget" }),
        )
        .unwrap();
        assert!(matches!(
            ledger.insert(item).unwrap_err(),
            CartError::NonFiniteNumber { field: "price" }
        ));

        let item: ItemInput = serde_json::from_value(
            json!({ "id": "sku1", "qty": 1, "price": 10, "name": "Widget", "max_ord": "inf" }),
        )
        .unwrap();
        assert!(matches!(
            ledger.insert(item).unwrap_err(),
            CartError::NonFiniteNumber { field: "max_ord" }
        ));

        assert!(ledger.is_empty());
        drop(ledger);
        assert!(session.is_empty());
    }

    #[test]
    fn test_update_rejects_non_finite_numbers() {
        let mut session = MemorySession::new();
        let row_id = {
            let mut ledger = CartLedger::new(&mut session).unwrap();
            ledger.insert(widget(2.0).with_max_ord(5.0)).unwrap()
        };

        let mut ledger = CartLedger::new(&mut session).unwrap();
        for (field, value) in [("qty", "NaN"), ("price", "inf"), ("max_ord", "-inf")] {
            let mut raw = serde_json::Map::new();
            raw.insert("rowid".to_string(), json!(row_id));
            raw.insert(field.to_string(), json!(value));
            let update: ItemUpdate = serde_json::from_value(Value::Object(raw)).unwrap();
            assert!(matches!(
                ledger.update(update).unwrap_err(),
                CartError::NonFiniteNumber { field: f } if f == field
            ));
        }

        // The row is neither deleted nor changed
        let item = ledger.get_item(row_id.as_str()).unwrap();
        assert_eq!(item.quantity, 2.0);
        assert_eq!(item.unit_price, 10.0);
        assert_eq!(item.max_order_quantity, Some(5.0));
        drop(ledger);

        let reloaded = CartLedger::new(&mut session).unwrap();
        assert_eq!(reloaded.total(), 20.0);
    }

    #[test]
    fn test_keyed_batch_keeps_caller_order() {
        let mut ledger = CartLedger::new(MemorySession::new()).unwrap();
        let entries: Entries<ItemInput> = serde_json::from_str(
            r#"{
                "z": { "id": "zeta", "qty": 1, "price": 1, "name": "Zeta" },
                "a": { "id": "alpha", "qty": 1, "price": 1, "name": "Alpha" }
            }"#,
        )
        .unwrap();

        let last = ledger.insert(entries).unwrap();

        assert_eq!(last, RowId::derive("alpha", None));
        let ids: Vec<&str> = ledger
            .contents(false)
            .into_iter()
            .map(|item| item.product_id.as_str())
            .collect();
        assert_eq!(ids, ["zeta", "alpha"]);
    }

    #[test]
    fn test_insert_from_json_batch() {
        let mut ledger = CartLedger::new(MemorySession::new()).unwrap();
        let entries: Entries<ItemInput> = serde_json::from_value(json!([
            { "id": "sku1", "qty": "2", "price": "10", "name": "Widget", "rowid": "forged" },
            { "id": "sku2", "qty": 1, "price": 4.5, "name": "Gadget" }
        ]))
        .unwrap();

        ledger.insert(entries).unwrap();

        let first = ledger.contents(false)[0];
        assert_eq!(first.row_id, RowId::derive("sku1", None));
        assert!(!first.extra.contains_key("rowid"));
        assert_eq!(ledger.total(), 24.5);
    }
}
