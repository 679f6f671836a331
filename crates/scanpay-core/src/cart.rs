//! # Cart
//!
//! The working cart: an ordered list of line items, one per product.
//!
//! ## Operations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Operations                                      │
//! │                                                                         │
//! │  Scan / manual SKU ────► add_or_increment() ──► qty += 1 or push(qty 1) │
//! │  "+" button ───────────► increment(id) ───────► qty += 1                │
//! │  "-" button ───────────► decrement(id) ───────► qty -= 1, drop at 0     │
//! │  "remove" button ──────► remove(id) ──────────► drop line               │
//! │  Checkout success ─────► clear() ─────────────► []                      │
//! │                                                                         │
//! │  Unknown ids are a no-op (CartChange::Unchanged), never an error.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariants
//! - At most one line per product id
//! - Every line has `qty >= 1`
//! - `total()` is exactly Σ price × qty, in integer minor units

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{Product, ProductId};
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

// =============================================================================
// Line Item
// =============================================================================

/// A product in the cart with its quantity.
///
/// Name and price are frozen when the product is first added, so a catalog
/// price change mid-session does not reprice a line the shopper has seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub id: ProductId,
    pub sku: String,
    pub name: String,
    pub price: Money,
    pub qty: u32,
}

impl LineItem {
    pub fn from_product(product: &Product) -> Self {
        LineItem {
            id: product.id,
            sku: product.sku.clone(),
            name: product.name.clone(),
            price: product.price,
            qty: 1,
        }
    }

    /// Unit price × quantity.
    #[inline]
    pub fn line_total(&self) -> Money {
        self.price.multiply_quantity(self.qty)
    }
}

/// What a mutation did to the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartChange {
    /// A new line was appended with qty 1.
    Added,
    /// An existing line's quantity changed.
    QuantityChanged { qty: u32 },
    /// A line was dropped.
    Removed,
    /// Nothing happened (unknown id).
    Unchanged,
}

impl CartChange {
    #[inline]
    pub fn is_changed(&self) -> bool {
        !matches!(self, CartChange::Unchanged)
    }
}

// =============================================================================
// Cart
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    items: Vec<LineItem>,
}

impl Cart {
    pub fn new() -> Self {
        Cart::default()
    }

    /// Rebuilds a cart from stored or remote line items.
    ///
    /// Stored data is not trusted to hold the invariants: duplicate ids are
    /// merged, lines with `qty == 0` dropped, quantities clamped to the
    /// per-line maximum, and lines past the item limit discarded.
    pub fn from_items(items: impl IntoIterator<Item = LineItem>) -> Self {
        let mut cart = Cart::new();

        for item in items {
            if item.qty == 0 {
                continue;
            }

            if let Some(existing) = cart.find_mut(item.id) {
                existing.qty = existing.qty.saturating_add(item.qty).min(MAX_ITEM_QUANTITY);
                continue;
            }

            if cart.items.len() >= MAX_CART_ITEMS {
                break;
            }

            cart.items.push(LineItem {
                qty: item.qty.min(MAX_ITEM_QUANTITY),
                ..item
            });
        }

        cart
    }

    /// Adds one unit of `product`, appending a new line if it is not in the
    /// cart yet.
    ///
    /// ## Returns
    /// - `Ok(CartChange::Added)` for a new line
    /// - `Ok(CartChange::QuantityChanged)` when an existing line grew
    /// - `Err(CartTooLarge | QuantityTooLarge)` when a limit is hit; the
    ///   cart is unchanged
    pub fn add_or_increment(&mut self, product: &Product) -> CoreResult<CartChange> {
        if self.find_mut(product.id).is_some() {
            return self.increment(product.id);
        }

        if self.items.len() >= MAX_CART_ITEMS {
            return Err(CoreError::CartTooLarge {
                max: MAX_CART_ITEMS,
            });
        }

        self.items.push(LineItem::from_product(product));
        Ok(CartChange::Added)
    }

    /// Adds one unit to an existing line. Unknown ids are a no-op.
    pub fn increment(&mut self, id: ProductId) -> CoreResult<CartChange> {
        let Some(item) = self.find_mut(id) else {
            return Ok(CartChange::Unchanged);
        };

        let requested = item.qty + 1;
        if requested > MAX_ITEM_QUANTITY {
            return Err(CoreError::QuantityTooLarge {
                requested,
                max: MAX_ITEM_QUANTITY,
            });
        }

        item.qty = requested;
        Ok(CartChange::QuantityChanged { qty: requested })
    }

    /// Removes one unit; the line disappears when its quantity reaches zero.
    /// Unknown ids are a no-op.
    pub fn decrement(&mut self, id: ProductId) -> CartChange {
        let Some(index) = self.position(id) else {
            return CartChange::Unchanged;
        };

        let item = &mut self.items[index];
        if item.qty <= 1 {
            self.items.remove(index);
            return CartChange::Removed;
        }

        item.qty -= 1;
        CartChange::QuantityChanged { qty: item.qty }
    }

    /// Drops a line regardless of quantity. Unknown ids are a no-op.
    pub fn remove(&mut self, id: ProductId) -> CartChange {
        match self.position(id) {
            Some(index) => {
                self.items.remove(index);
                CartChange::Removed
            }
            None => CartChange::Unchanged,
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Σ price × qty over all lines.
    pub fn total(&self) -> Money {
        self.items.iter().map(LineItem::line_total).sum()
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn get(&self, id: ProductId) -> Option<&LineItem> {
        self.items.iter().find(|i| i.id == id)
    }

    /// Number of distinct lines.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Number of units across all lines.
    pub fn total_quantity(&self) -> u32 {
        self.items.iter().map(|i| i.qty).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Captures an immutable copy for checkout, receipts and draft sync.
    pub fn snapshot(&self) -> CartSnapshot {
        CartSnapshot {
            items: self.items.clone(),
            total: self.total(),
        }
    }

    fn position(&self, id: ProductId) -> Option<usize> {
        self.items.iter().position(|i| i.id == id)
    }

    fn find_mut(&mut self, id: ProductId) -> Option<&mut LineItem> {
        self.items.iter_mut().find(|i| i.id == id)
    }
}

// =============================================================================
// Snapshot
// =============================================================================

/// A frozen copy of the cart at one point in time.
///
/// Checkout submits a snapshot and builds the receipt from the same
/// snapshot, so scans that land while the request is in flight cannot leak
/// onto the receipt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSnapshot {
    pub items: Vec<LineItem>,
    pub total: Money,
}

impl CartSnapshot {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Published after a mutation has been written to local storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartEvent {
    /// The cart now looks like this.
    Changed(CartSnapshot),
    /// The cart was emptied by a confirmed checkout.
    Cleared,
}

impl CartEvent {
    /// The line items the remote draft should hold after this event.
    pub fn draft_items(&self) -> &[LineItem] {
        match self {
            CartEvent::Changed(snapshot) => &snapshot.items,
            CartEvent::Cleared => &[],
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
