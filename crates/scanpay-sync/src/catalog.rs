//! # Catalog Lookup
//!
//! Resolves a scanned code to a product by exact SKU match.
//!
//! ```text
//! resolve(code)
//!   │
//!   ├─ cache fresh and holds code ──────────────► Ok(product)
//!   │
//!   ├─ otherwise fetch_catalog() once, reindex
//!   │     ├─ ok,  holds code ───────────────────► Ok(product)
//!   │     ├─ ok,  no such SKU ──────────────────► NotFound
//!   │     └─ err, stale cache holds code ───────► Ok(product)   (logged)
//!   │     └─ err ───────────────────────────────► Unavailable
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use scanpay_core::Product;

use crate::backend::Backend;
use crate::error::LookupError;

struct CatalogIndex {
    by_sku: HashMap<String, Product>,
    fetched_at: Instant,
}

impl CatalogIndex {
    fn build(products: Vec<Product>) -> Self {
        let mut by_sku = HashMap::with_capacity(products.len());
        for product in products {
            // First listing of a SKU wins, like a linear find would
            by_sku.entry(product.sku.clone()).or_insert(product);
        }
        CatalogIndex {
            by_sku,
            fetched_at: Instant::now(),
        }
    }
}

pub struct CatalogLookup {
    backend: Arc<dyn Backend>,
    ttl: Duration,
    index: Mutex<Option<CatalogIndex>>,
}

impl CatalogLookup {
    pub fn new(backend: Arc<dyn Backend>, ttl: Duration) -> Self {
        CatalogLookup {
            backend,
            ttl,
            index: Mutex::new(None),
        }
    }

    pub async fn resolve(&self, code: &str) -> Result<Product, LookupError> {
        let mut index = self.index.lock().await;

        if let Some(cached) = index.as_ref() {
            if cached.fetched_at.elapsed() < self.ttl {
                if let Some(product) = cached.by_sku.get(code) {
                    return Ok(product.clone());
                }
            }
        }

        debug!(code, "Catalog miss or stale; refetching");
        match self.backend.fetch_catalog().await {
            Ok(products) => {
                let fresh = CatalogIndex::build(products);
                let found = fresh.by_sku.get(code).cloned();
                *index = Some(fresh);
                found.ok_or_else(|| LookupError::NotFound(code.to_string()))
            }
            Err(err) => {
                if let Some(product) = index.as_ref().and_then(|c| c.by_sku.get(code)) {
                    warn!(code, error = %err, "Catalog refresh failed; using cached entry");
                    return Ok(product.clone());
                }
                Err(LookupError::Unavailable(err))
            }
        }
    }

    /// Forces the next `resolve` to refetch.
    pub async fn invalidate(&self) {
        *self.index.lock().await = None;
    }

    /// Number of indexed SKUs, 0 before the first fetch.
    pub async fn len(&self) -> usize {
        self.index
            .lock()
            .await
            .as_ref()
            .map(|c| c.by_sku.len())
            .unwrap_or(0)
    }
}
