//! # Device Repository
//!
//! The kiosk's own id, kept in the `device_id` slot so it survives
//! restarts. First writer wins; later boots read the stored value back.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};

use scanpay_core::DEVICE_ID_SLOT;

use crate::error::DbResult;

#[derive(Debug, Clone)]
pub struct DeviceRepository {
    pool: SqlitePool,
}

impl DeviceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        DeviceRepository { pool }
    }

    pub async fn load_id(&self) -> DbResult<Option<String>> {
        let id = sqlx::query_scalar("SELECT payload FROM local_slots WHERE name = ?1")
            .bind(DEVICE_ID_SLOT)
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }

    /// Returns the stored id, storing `fresh` first if there is none.
    pub async fn get_or_insert_id(&self, fresh: &str) -> DbResult<String> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO local_slots (name, payload, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(name) DO NOTHING
            "#,
        )
        .bind(DEVICE_ID_SLOT)
        .bind(fresh)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?
        .rows_affected();

        let id: String = sqlx::query_scalar("SELECT payload FROM local_slots WHERE name = ?1")
            .bind(DEVICE_ID_SLOT)
            .fetch_one(&self.pool)
            .await?;

        if inserted > 0 {
            info!(device_id = %id, "Stored new device id");
        } else {
            debug!(device_id = %id, "Using stored device id");
        }
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_first_id_is_kept() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.device();
        assert!(repo.load_id().await.unwrap().is_none());

        assert_eq!(repo.get_or_insert_id("kiosk-1").await.unwrap(), "kiosk-1");
        assert_eq!(repo.get_or_insert_id("kiosk-2").await.unwrap(), "kiosk-1");
        assert_eq!(repo.load_id().await.unwrap().as_deref(), Some("kiosk-1"));
    }

    #[tokio::test]
    async fn test_device_id_does_not_touch_cart_slot() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.device().get_or_insert_id("kiosk-1").await.unwrap();

        assert!(db.cart_slot().load().await.unwrap().is_none());
        db.cart_slot().clear().await.unwrap();
        assert_eq!(db.device().load_id().await.unwrap().as_deref(), Some("kiosk-1"));
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kiosk.db");

        let db = Database::new(DbConfig::new(path.clone())).await.unwrap();
        db.device().get_or_insert_id("kiosk-1").await.unwrap();
        db.close().await;

        let db = Database::new(DbConfig::new(path.clone())).await.unwrap();
        assert_eq!(db.device().get_or_insert_id("kiosk-2").await.unwrap(), "kiosk-1");
    }
}
