//! # Cart Slot Repository
//!
//! Durable copy of the working cart, stored as the JSON array of line items
//! in the `cart` slot.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  every cart mutation ──► save()   upsert row 'cart'                    │
//! │  kiosk boot          ──► load()   None = no local cart → ask server    │
//! │  checkout success    ──► clear()  delete row 'cart'                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! An empty array and a missing row are different: the first is a cart the
//! shopper emptied, the second means this kiosk has never saved one.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, warn};

use scanpay_core::{Cart, LineItem, LOCAL_CART_SLOT};

use crate::error::{DbError, DbResult};

#[derive(Debug, Clone)]
pub struct CartSlotRepository {
    pool: SqlitePool,
}

impl CartSlotRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CartSlotRepository { pool }
    }

    /// Reads the stored cart.
    ///
    /// ## Returns
    /// * `Ok(None)` - no cart has been saved (or it was cleared)
    /// * `Ok(Some(cart))` - the stored cart, re-normalized
    /// * `Err(DbError::CorruptSlot)` - the row is not a line-item array
    pub async fn load(&self) -> DbResult<Option<Cart>> {
        let payload: Option<String> =
            sqlx::query_scalar("SELECT payload FROM local_slots WHERE name = ?1")
                .bind(LOCAL_CART_SLOT)
                .fetch_optional(&self.pool)
                .await?;

        let Some(payload) = payload else {
            debug!("No local cart slot");
            return Ok(None);
        };

        let items: Vec<LineItem> =
            serde_json::from_str(&payload).map_err(|e| DbError::CorruptSlot {
                slot: LOCAL_CART_SLOT.to_string(),
                reason: e.to_string(),
            })?;

        let cart = Cart::from_items(items);
        debug!(items = cart.item_count(), "Loaded local cart slot");
        Ok(Some(cart))
    }

    /// Writes the cart, replacing any previous value.
    pub async fn save(&self, cart: &Cart) -> DbResult<()> {
        let payload = serde_json::to_string(cart.items()).map_err(|e| DbError::Encode {
            slot: LOCAL_CART_SLOT.to_string(),
            reason: e.to_string(),
        })?;

        sqlx::query(
            r#"
            INSERT INTO local_slots (name, payload, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(name) DO UPDATE SET
                payload = excluded.payload,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(LOCAL_CART_SLOT)
        .bind(&payload)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        debug!(items = cart.item_count(), "Saved local cart slot");
        Ok(())
    }

    /// Removes the slot entirely.
    pub async fn clear(&self) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM local_slots WHERE name = ?1")
            .bind(LOCAL_CART_SLOT)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            warn!("Cleared cart slot that was already empty");
        }
        Ok(())
    }
}
