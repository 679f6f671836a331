//! # scanpay-db: Local Durable Storage
//!
//! SQLite-backed storage for state the kiosk must not lose: today that is
//! the working cart and the device id, each kept in a named slot.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  apps/kiosk  Cart Store actor                                           │
//! │        │  save on every mutation, load at hydrate, clear on checkout    │
//! │        ▼                                                                │
//! │  ★ scanpay-db ★   Database ──► CartSlotRepository ──► local_slots       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Slot repositories
//!
//! ## Usage
//!
//! ```rust,ignore
//! use scanpay_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("kiosk.db")).await?;
//! let stored = db.cart_slot().load().await?;
//! ```

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use repository::cart_slot::CartSlotRepository;
pub use repository::device::DeviceRepository;
