//! # Backend Seam
//!
//! The kiosk's view of the store backend: five calls, one trait. The
//! pipeline only ever holds an `Arc<dyn Backend>`, so the REST client and
//! the in-memory collaborator are interchangeable.
//!
//! ```text
//! ┌──────────────────────────┬──────────────────────────┬─────────────────┐
//! │ Call                     │ REST endpoint            │ Used by         │
//! ├──────────────────────────┼──────────────────────────┼─────────────────┤
//! │ current_session()        │ GET  api/v1/me/          │ boot, checkout  │
//! │ fetch_catalog()          │ GET  api/v1/product/     │ CatalogLookup   │
//! │ fetch_draft()            │ GET  api/v1/cart/        │ hydrate         │
//! │ save_draft(items)        │ POST api/v1/cart/save/   │ DraftSyncWorker │
//! │ submit_transaction(req)  │ POST api/v1/transaction/ │ checkout        │
//! └──────────────────────────┴──────────────────────────┴─────────────────┘
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use scanpay_core::{CartSnapshot, LineItem, Money, PaymentMethod, Product, Session, TransactionId};

use crate::error::BackendResult;

/// Body of a transaction submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub items: Vec<LineItem>,
    pub payment_method: PaymentMethod,
    /// Client-computed total; lets the server reject a repriced basket.
    pub total: Money,
}

impl TransactionRequest {
    pub fn from_snapshot(snapshot: &CartSnapshot, payment_method: PaymentMethod) -> Self {
        TransactionRequest {
            items: snapshot.items.clone(),
            payment_method,
            total: snapshot.total,
        }
    }
}

#[async_trait]
pub trait Backend: Send + Sync {
    /// Returns the signed-in account, or `BackendError::Unauthorized`.
    async fn current_session(&self) -> BackendResult<Session>;

    async fn fetch_catalog(&self) -> BackendResult<Vec<Product>>;

    /// Server-side cart draft; empty when none was saved.
    async fn fetch_draft(&self) -> BackendResult<Vec<LineItem>>;

    /// Replaces the server-side draft.
    async fn save_draft(&self, items: &[LineItem]) -> BackendResult<()>;

    /// Commits a transaction and returns its id.
    async fn submit_transaction(&self, request: &TransactionRequest) -> BackendResult<TransactionId>;
}
