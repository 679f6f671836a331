//! # Scan Pipeline
//!
//! Glue between the scanner and the cart: resolve the code, add the
//! product, tell the shopper what happened.
//!
//! ```text
//! ScanEvent ──► "Scanned: A1" ──► spawn ──► CatalogLookup::resolve
//!                                             ├─ Ok(p)      ──► cart.add_or_increment(p)
//!                                             │                 └─► "Added Widget to cart"
//!                                             ├─ NotFound    ──► "Product with scanned SKU not found"
//!                                             └─ Unavailable ──► "Error fetching products: ..."
//! ```
//!
//! Scan-triggered work is spawned so the decode loop never waits on the
//! network. Manual entry (`submit_manual`) runs the same path inline and
//! is not debounced.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use scanpay_core::validation::normalize_code;
use scanpay_core::{Product, ScanEvent};
use scanpay_sync::{CatalogLookup, LookupError};

use crate::error::KioskError;
use crate::status::StatusBoard;
use crate::store::CartHandle;

#[derive(Clone)]
pub struct ScanPipeline {
    catalog: Arc<CatalogLookup>,
    cart: CartHandle,
    status: StatusBoard,
}

impl ScanPipeline {
    pub fn new(catalog: Arc<CatalogLookup>, cart: CartHandle, status: StatusBoard) -> Self {
        ScanPipeline {
            catalog,
            cart,
            status,
        }
    }

    /// Handles a debounced scan without blocking the caller.
    pub fn on_scan(&self, event: ScanEvent) -> JoinHandle<()> {
        self.status.info(format!("Scanned: {}", event.code));
        let pipeline = self.clone();
        tokio::spawn(async move {
            // Outcome already reported on the status board
            let _ = pipeline.resolve_and_add(&event.code).await;
        })
    }

    /// Adds the product with the typed-in SKU.
    pub async fn submit_manual(&self, raw: &str) -> Result<Product, KioskError> {
        let code = match normalize_code(raw) {
            Ok(code) => code,
            Err(e) => {
                let err = KioskError::from(e);
                self.status.fail(&err);
                return Err(err);
            }
        };
        self.status.info(format!("Scanned: {}", code));
        self.resolve_and_add(&code).await
    }

    async fn resolve_and_add(&self, code: &str) -> Result<Product, KioskError> {
        let product = match self.catalog.resolve(code).await {
            Ok(product) => product,
            Err(err) => {
                if let LookupError::NotFound(code) = &err {
                    debug!(%code, "No product for code");
                } else {
                    warn!(code, error = %err, "Catalog lookup failed");
                }
                let err = KioskError::from(err);
                self.status.fail(&err);
                return Err(err);
            }
        };

        match self.cart.add_or_increment(product.clone()).await {
            Ok(change) => {
                debug!(sku = %product.sku, ?change, "Scan applied");
                self.status.success(format!("Added {} to cart", product.name));
                Ok(product)
            }
            Err(err) => {
                warn!(sku = %product.sku, error = %err, "Could not add scanned product");
                let err = KioskError::from(err);
                self.status.fail(&err);
                Err(err)
            }
        }
    }
}
