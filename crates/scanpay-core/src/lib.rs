//! # scanpay-core: Pure Domain Logic for the ScanPay Kiosk
//!
//! Everything the Scan → Cart → Checkout pipeline decides without touching a
//! device, a disk, or the network lives here.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      ScanPay Kiosk Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                       apps/kiosk                                │   │
//! │  │   Scanner Engine ──► Cart Store ──► Checkout Coordinator        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ scanpay-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────┐          │   │
//! │  │   │  types   │ │   cart   │ │ debounce │ │ receipt  │          │   │
//! │  │   │ Product  │ │   Cart   │ │Debouncer │ │ Receipt  │          │   │
//! │  │   │ Session  │ │ LineItem │ │          │ │ text/html│          │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └──────────┘          │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Product, ScanEvent, PaymentMethod, Session
//! - [`role`] - Role enum and the capabilities it grants
//! - [`money`] - Integer money (no floating point!)
//! - [`cart`] - Cart aggregation and snapshots
//! - [`debounce`] - Duplicate-scan suppression
//! - [`receipt`] - Receipt construction and rendering
//! - [`validation`] - Input checks for codes and quantities
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use scanpay_core::{Cart, Money, Product, ProductId};
//!
//! let widget = Product::new(ProductId(1), "A1", "Widget", Money::from_minor(100));
//! let gadget = Product::new(ProductId(2), "B2", "Gadget", Money::from_minor(50));
//!
//! let mut cart = Cart::new();
//! cart.add_or_increment(&widget).unwrap();
//! cart.add_or_increment(&widget).unwrap();
//! cart.add_or_increment(&gadget).unwrap();
//!
//! assert_eq!(cart.total(), Money::from_minor(250));
//! ```

pub mod cart;
pub mod debounce;
pub mod error;
pub mod money;
pub mod receipt;
pub mod role;
pub mod types;
pub mod validation;

pub use cart::{Cart, CartChange, CartEvent, CartSnapshot, LineItem};
pub use debounce::Debouncer;
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use receipt::{Receipt, ReceiptFormat, ReceiptLine};
pub use role::{Capabilities, Role};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct items allowed in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single item in cart.
///
/// Guards against a stuck scanner or a runaway `increment` loop.
pub const MAX_ITEM_QUANTITY: u32 = 999;

/// Default window within which a repeated identical code is discarded.
pub const DEFAULT_DEBOUNCE_WINDOW_MS: u64 = 2_500;

/// Narrowest receipt paper, in characters. The four text receipt columns
/// need 25 characters plus room for the item name.
pub const MIN_PAPER_WIDTH: usize = 32;

/// Widest receipt paper, in characters.
pub const MAX_PAPER_WIDTH: usize = 80;

/// Name of the durable local slot holding the working cart.
pub const LOCAL_CART_SLOT: &str = "cart";

/// Name of the local slot holding the generated device id.
pub const DEVICE_ID_SLOT: &str = "device_id";
