//! # Row Identity
//!
//! A row id is a content hash of `(product id, options)`. Adding the same
//! product with the same options always lands on the same row, so repeated
//! "add to cart" calls accumulate quantity instead of creating duplicates.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Row Id Derivation                               │
//! │                                                                         │
//! │  options absent or empty:   sha256("tshirt")                           │
//! │  options present:           sha256("tshirt" + {"color":"red",...})     │
//! │                                          ▲                              │
//! │                         keys serialized in sorted order                │
//! │                                                                         │
//! │  hex digest truncated to ROW_ID_LEN characters                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Options are held in a `BTreeMap`. Nested objects inside option values keep
//! the caller's key order, so they are re-sorted before hashing. The
//! serialization is canonical no matter what order keys were supplied in.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::types::Options;

/// Length of a row id in hex characters.
pub const ROW_ID_LEN: usize = 32;

/// Content-derived identity of a line item.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(String);

impl RowId {
    /// Derives the row id for a product and its options.
    pub fn derive(product_id: &str, options: Option<&Options>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(product_id.as_bytes());

        if let Some(options) = options.filter(|o| !o.is_empty()) {
            let sorted: Map<String, Value> = options
                .iter()
                .map(|(key, value)| (key.clone(), canonical(value)))
                .collect();
            let canonical = Value::Object(sorted).to_string();
            hasher.update(canonical.as_bytes());
        }

        let mut digest = hex::encode(hasher.finalize());
        digest.truncate(ROW_ID_LEN);
        RowId(digest)
    }

    /// Wraps an existing row id string (e.g. one read back from a client).
    pub fn from_raw(raw: impl Into<String>) -> Self {
        RowId(raw.into())
    }

    /// Returns the row id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Copies a value with every object's keys in sorted order.
fn canonical(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key.clone(), canonical(value)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical).collect()),
        other => other.clone(),
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RowId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<RowId> for String {
    fn from(id: RowId) -> Self {
        id.0
    }
}
