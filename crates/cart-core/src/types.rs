//! # Domain Types
//!
//! Core types of the cart ledger.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   ItemInput     │   │    LineItem     │   │   CartState     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id?  qty?      │──►│  rowid (hash)   │──►│  items (ordered)│       │
//! │  │  price? name?   │   │  id, name       │   │  cart_total     │       │
//! │  │  options? ...   │   │  qty, price     │   │  total_items    │       │
//! │  └─────────────────┘   │  subtotal       │   └─────────────────┘       │
//! │                        └─────────────────┘                              │
//! │  ┌─────────────────┐            ▲                                       │
//! │  │   ItemUpdate    │────────────┘ partial overwrite by rowid            │
//! │  └─────────────────┘                                                    │
//! │                                                                         │
//! │  Entries<T>: one record or a list of records                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Names
//! Inputs and the persisted state use short keys: `id`, `qty`, `price`,
//! `name`, `options`, `max_ord`, `rowid`, `subtotal`, `cart_total`,
//! `total_items`. Any other key on an item is kept in `extra` and passed
//! through unchanged.
//!
//! Numeric inputs (`qty`, `price`, `max_ord`) accept numbers or numeric
//! strings, since they usually come straight from a form post.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_aux::field_attributes::deserialize_option_number_from_string;
use serde_json::{Map, Value};

use crate::row_id::RowId;

/// Options distinguishing otherwise identical products (size, color, ...).
///
/// Key-ordered so that serialization is canonical.
pub type Options = BTreeMap<String, Value>;

/// Passthrough fields carried on an item.
pub type Extra = Map<String, Value>;

// =============================================================================
// Line Item
// =============================================================================

/// One product (plus options) in the cart.
///
/// ## Mutability
/// - `row_id`, `product_id`, `name`, `options`: fixed at insert
/// - `quantity`, `unit_price`, `max_order_quantity`, `extra`: changed by update
/// - `subtotal`: derived on every save
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Content-derived identity, see [`RowId::derive`].
    #[serde(rename = "rowid")]
    pub row_id: RowId,

    /// Caller's product identifier.
    #[serde(rename = "id")]
    pub product_id: String,

    /// Display name.
    pub name: String,

    #[serde(rename = "qty")]
    pub quantity: f64,

    #[serde(rename = "price")]
    pub unit_price: f64,

    /// `quantity * unit_price`, as of the last save.
    #[serde(default)]
    pub subtotal: f64,

    /// Cap on the merged quantity, when positive.
    #[serde(rename = "max_ord", default, skip_serializing_if = "Option::is_none")]
    pub max_order_quantity: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Options>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl LineItem {
    /// Whether this row carries non-empty options.
    pub fn has_options(&self) -> bool {
        self.options.as_ref().is_some_and(|o| !o.is_empty())
    }

    /// Line total (unit price × quantity), computed now.
    pub fn line_total(&self) -> f64 {
        self.unit_price * self.quantity
    }
}

// =============================================================================
// Cart State
// =============================================================================

/// The aggregate persisted in the session.
///
/// ## Invariants
/// - Row ids in `items` are unique
/// - `cart_total` and `total_items` equal the sums over `items` after
///   [`CartState::recompute`]
/// - Insertion order is kept; overwriting a row keeps its position
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CartState {
    pub items: Vec<LineItem>,

    #[serde(default)]
    pub cart_total: f64,

    #[serde(default)]
    pub total_items: f64,
}

impl CartState {
    /// Creates an empty cart.
    pub fn new() -> Self {
        CartState::default()
    }

    /// Looks up a row.
    pub fn find(&self, row_id: &str) -> Option<&LineItem> {
        self.items.iter().find(|i| i.row_id.as_str() == row_id)
    }

    /// Looks up a row for modification.
    pub fn find_mut(&mut self, row_id: &str) -> Option<&mut LineItem> {
        self.items.iter_mut().find(|i| i.row_id.as_str() == row_id)
    }

    /// Stores `item`, replacing any row with the same id in place.
    pub fn upsert(&mut self, item: LineItem) {
        match self.items.iter_mut().find(|i| i.row_id == item.row_id) {
            Some(existing) => *existing = item,
            None => self.items.push(item),
        }
    }

    /// Removes a row, returning it if it was present.
    pub fn remove(&mut self, row_id: &str) -> Option<LineItem> {
        let index = self.items.iter().position(|i| i.row_id.as_str() == row_id)?;
        Some(self.items.remove(index))
    }

    /// Recomputes every subtotal and both aggregates from scratch.
    pub fn recompute(&mut self) {
        let mut cart_total = 0.0;
        let mut total_items = 0.0;

        for item in &mut self.items {
            item.subtotal = item.line_total();
            cart_total += item.subtotal;
            total_items += item.quantity;
        }

        self.cart_total = cart_total;
        self.total_items = total_items;
    }

    /// Number of distinct rows.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Checks if the cart has no rows.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// =============================================================================
// Insert Input
// =============================================================================

/// A record passed to [`CartLedger::insert`](crate::CartLedger::insert).
///
/// Every field is optional at the type level so that a missing `id`, `qty`,
/// `price` or `name` is reported as
/// [`CartError::MissingRequiredField`](crate::CartError::MissingRequiredField)
/// rather than a decode failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemInput {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default, deserialize_with = "deserialize_option_number_from_string")]
    pub qty: Option<f64>,

    #[serde(default, deserialize_with = "deserialize_option_number_from_string")]
    pub price: Option<f64>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(
        default,
        deserialize_with = "deserialize_option_number_from_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_ord: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Options>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl ItemInput {
    /// Creates an input with all required fields set.
    pub fn new(id: impl Into<String>, qty: f64, price: f64, name: impl Into<String>) -> Self {
        ItemInput {
            id: Some(id.into()),
            qty: Some(qty),
            price: Some(price),
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Adds one option (e.g. `("size", "L")`).
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options
            .get_or_insert_with(Options::new)
            .insert(key.into(), value.into());
        self
    }

    /// Caps the merged quantity for this row.
    pub fn with_max_ord(mut self, max: f64) -> Self {
        self.max_ord = Some(max);
        self
    }

    /// Adds a passthrough field.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

impl BatchKey for ItemInput {
    const KEY: &'static str = "id";
}

// =============================================================================
// Update Input
// =============================================================================

/// A record passed to [`CartLedger::update`](crate::CartLedger::update).
///
/// `id`, `name` and `options` are accepted so that a client can send back a
/// whole row, but they never overwrite the stored values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemUpdate {
    #[serde(default)]
    pub rowid: Option<String>,

    #[serde(default, deserialize_with = "deserialize_option_number_from_string")]
    pub qty: Option<f64>,

    #[serde(default, deserialize_with = "deserialize_option_number_from_string")]
    pub price: Option<f64>,

    #[serde(
        default,
        deserialize_with = "deserialize_option_number_from_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_ord: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Options>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl ItemUpdate {
    /// Creates an update targeting `row_id` that changes nothing yet.
    pub fn new(row_id: impl AsRef<str>) -> Self {
        ItemUpdate {
            rowid: Some(row_id.as_ref().to_string()),
            ..Default::default()
        }
    }

    pub fn with_qty(mut self, qty: f64) -> Self {
        self.qty = Some(qty);
        self
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_max_ord(mut self, max: f64) -> Self {
        self.max_ord = Some(max);
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

impl BatchKey for ItemUpdate {
    const KEY: &'static str = "rowid";
}

// =============================================================================
// Entries: one or many
// =============================================================================

/// Field whose presence marks a JSON object as a single record.
pub trait BatchKey {
    const KEY: &'static str;
}

/// A single record or a batch of records.
///
/// ## JSON Dispatch
/// ```text
/// {"id": "sku1", ...}              → One
/// [{"id": "sku1"}, {"id": "sku2"}] → Many
/// {"a": {"id": "sku1"}, "b": {...}}→ Many (values of the object)
/// ```
/// The marker field is [`BatchKey::KEY`]: `id` for inserts, `rowid` for
/// updates.
#[derive(Debug, Clone, PartialEq)]
pub enum Entries<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> Entries<T> {
    /// Flattens into a list.
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Entries::One(item) => vec![item],
            Entries::Many(items) => items,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Entries::Many(items) if items.is_empty())
    }
}

impl<T: DeserializeOwned + BatchKey> Entries<T> {
    /// Decodes records from an untyped JSON value.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        use serde::de::Error;

        match value {
            Value::Object(map) if map.contains_key(T::KEY) => {
                serde_json::from_value(Value::Object(map)).map(Entries::One)
            }
            Value::Object(map) => map
                .into_iter()
                .map(|(_, v)| serde_json::from_value(v))
                .collect::<Result<Vec<T>, _>>()
                .map(Entries::Many),
            Value::Array(list) => list
                .into_iter()
                .map(serde_json::from_value)
                .collect::<Result<Vec<T>, _>>()
                .map(Entries::Many),
            other => Err(serde_json::Error::custom(format!(
                "expected an item or a list of items, got {other}"
            ))),
        }
    }
}

impl<'de, T: DeserializeOwned + BatchKey> Deserialize<'de> for Entries<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Entries::from_value(value).map_err(serde::de::Error::custom)
    }
}

impl From<ItemInput> for Entries<ItemInput> {
    fn from(item: ItemInput) -> Self {
        Entries::One(item)
    }
}

impl From<Vec<ItemInput>> for Entries<ItemInput> {
    fn from(items: Vec<ItemInput>) -> Self {
        Entries::Many(items)
    }
}

impl From<ItemUpdate> for Entries<ItemUpdate> {
    fn from(item: ItemUpdate) -> Self {
        Entries::One(item)
    }
}

impl From<Vec<ItemUpdate>> for Entries<ItemUpdate> {
    fn from(items: Vec<ItemUpdate>) -> Self {
        Entries::Many(items)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
