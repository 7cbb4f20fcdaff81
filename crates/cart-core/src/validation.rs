//! # Validation Module
//!
//! Input validation for items entering the cart.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Insert Validation Order                            │
//! │                                                                         │
//! │  1. Required fields present (id, qty, price, name)                     │
//! │  2. qty floored at zero; zero is rejected                              │
//! │  3. id matches the product id class      ◄── CharClass (this module)   │
//! │  4. name matches the product name class  ◄── CharClass (this module)   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Row id derivation, merge, max_ord cap (ledger.rs)                     │
//! │                                                                         │
//! │  The first failing step wins; later steps are not evaluated.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Character Classes
//! Patterns are the body of a bracket expression, the way they would appear
//! between `[` and `]`: `\.a-z0-9_-` allows dots, lowercase letters, digits,
//! underscores and hyphens. Supported syntax:
//!
//! - literal characters
//! - ranges `a-z` (a `-` at either end is literal)
//! - escapes `\.` `\-` `\\` (any escaped character is literal)
//! - shorthands `\w` `\d` `\s`
//!
//! Matching is always case-insensitive. A class built with
//! [`CharClass::unicode`] evaluates shorthands and case folding over the full
//! Unicode range; [`CharClass::ascii`] restricts them to ASCII.

use crate::error::{CartError, CartResult};

// =============================================================================
// Character Class
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum ClassItem {
    Char(char),
    Range(char, char),
    Word,
    Digit,
    Space,
}

/// A parsed, immutable character class.
///
/// ## Example
/// ```rust
/// use cart_core::validation::CharClass;
///
/// let class = CharClass::ascii(r"\.a-z0-9_-").unwrap();
/// assert!(class.matches("sku-1.a"));
/// assert!(class.matches("SKU-1")); // case-insensitive
/// assert!(!class.matches("sku 1"));
/// assert!(!class.matches(""));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharClass {
    source: String,
    items: Vec<ClassItem>,
    unicode: bool,
}

impl CharClass {
    /// Parses a class whose shorthands and case folding are ASCII-only.
    pub fn ascii(source: &str) -> Result<Self, String> {
        Self::parse(source, false)
    }

    /// Parses a class whose shorthands and case folding are Unicode-aware.
    pub fn unicode(source: &str) -> Result<Self, String> {
        Self::parse(source, true)
    }

    fn parse(source: &str, unicode: bool) -> Result<Self, String> {
        if source.is_empty() {
            return Err("class is empty".to_string());
        }

        let mut items = Vec::new();
        let mut chars = source.chars().peekable();

        while let Some(c) = chars.next() {
            let start = match c {
                '\\' => match chars.next() {
                    Some('w') => {
                        items.push(ClassItem::Word);
                        continue;
                    }
                    Some('d') => {
                        items.push(ClassItem::Digit);
                        continue;
                    }
                    Some('s') => {
                        items.push(ClassItem::Space);
                        continue;
                    }
                    Some(escaped) => escaped,
                    None => return Err("trailing backslash".to_string()),
                },
                other => other,
            };

            // `x-` at the very end keeps the hyphen literal
            if chars.peek() == Some(&'-') {
                let mut lookahead = chars.clone();
                lookahead.next();
                if let Some(after) = lookahead.next() {
                    chars.next();
                    chars.next();
                    let end = if after == '\\' {
                        match chars.next() {
                            Some('w' | 'd' | 's') => {
                                return Err(format!("range from '{start}' ends in a shorthand"))
                            }
                            Some(escaped) => escaped,
                            None => return Err("trailing backslash".to_string()),
                        }
                    } else {
                        after
                    };
                    if start > end {
                        return Err(format!("range '{start}-{end}' is out of order"));
                    }
                    items.push(ClassItem::Range(start, end));
                    continue;
                }
            }

            items.push(ClassItem::Char(start));
        }

        Ok(CharClass {
            source: source.to_string(),
            items,
            unicode,
        })
    }

    /// The class as it was written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// True when `value` is non-empty and every character is in the class.
    pub fn matches(&self, value: &str) -> bool {
        !value.is_empty() && value.chars().all(|c| self.contains(c))
    }

    /// True when `c` is in the class, ignoring case.
    pub fn contains(&self, c: char) -> bool {
        if self.contains_exact(c) {
            return true;
        }

        if self.unicode {
            c.to_lowercase().any(|l| self.contains_exact(l))
                || c.to_uppercase().any(|u| self.contains_exact(u))
        } else {
            self.contains_exact(c.to_ascii_lowercase()) || self.contains_exact(c.to_ascii_uppercase())
        }
    }

    fn contains_exact(&self, c: char) -> bool {
        self.items.iter().any(|item| match *item {
            ClassItem::Char(ch) => ch == c,
            ClassItem::Range(lo, hi) => (lo..=hi).contains(&c),
            ClassItem::Word if self.unicode => c.is_alphanumeric() || c == '_',
            ClassItem::Word => c.is_ascii_alphanumeric() || c == '_',
            ClassItem::Digit if self.unicode => c.is_numeric(),
            ClassItem::Digit => c.is_ascii_digit(),
            ClassItem::Space if self.unicode => c.is_whitespace(),
            ClassItem::Space => c.is_ascii_whitespace(),
        })
    }
}

// =============================================================================
// Item Validators
// =============================================================================

/// Floors a supplied quantity at zero.
///
/// Negative and NaN quantities both become `0.0`.
pub fn floor_quantity(qty: f64) -> f64 {
    qty.max(0.0)
}

/// Passes finite numbers through and rejects NaN and infinities.
pub fn require_finite(value: f64, field: &'static str) -> CartResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(CartError::NonFiniteNumber { field })
    }
}

/// Validates a product id against the configured class.
pub fn validate_product_id(product_id: &str, class: &CharClass) -> CartResult<()> {
    if !class.matches(product_id) {
        return Err(CartError::InvalidProductId {
            product_id: product_id.to_string(),
        });
    }

    Ok(())
}

/// Validates a product name against the configured class.
pub fn validate_product_name(name: &str, class: &CharClass) -> CartResult<()> {
    if !class.matches(name) {
        return Err(CartError::InvalidProductName {
            name: name.to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
