//! # scanpay-sync
//!
//! Backend collaborators for the ScanPay kiosk.
//!
//! ## Components
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  backend   Backend trait + TransactionRequest                           │
//! │  http      HttpBackend: REST client (session cookie, CSRF header)       │
//! │  memory    InMemoryBackend: offline demo and test double                │
//! │  catalog   CatalogLookup: code → Product, indexed, refetch on miss      │
//! │  draft     DraftSyncWorker: cart events → save_draft with backoff       │
//! │  config    [backend] and [draft_sync] settings                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! let backend: Arc<dyn Backend> = Arc::new(HttpBackend::new(&config.backend)?);
//! let catalog = CatalogLookup::new(backend.clone(), config.backend.catalog_ttl());
//! let product = catalog.resolve("A1").await?;
//! ```

pub mod backend;
pub mod catalog;
pub mod config;
pub mod draft;
pub mod error;
pub mod http;
pub mod memory;

pub use backend::{Backend, TransactionRequest};
pub use catalog::CatalogLookup;
pub use config::{BackendConfig, BackendMode, DraftSyncSettings};
pub use draft::{DraftSyncHandle, DraftSyncStatus, DraftSyncWorker};
pub use error::{BackendError, BackendResult, LookupError, SyncError, SyncResult};
pub use http::HttpBackend;
pub use memory::{Call, InMemoryBackend};

use std::sync::Arc;

/// Builds the collaborator selected by `config.mode`.
pub fn connect(config: &BackendConfig) -> SyncResult<Arc<dyn Backend>> {
    match config.mode {
        BackendMode::Http => Ok(Arc::new(HttpBackend::new(config)?)),
        BackendMode::Offline => {
            tracing::info!("Backend in offline mode; using demo catalog");
            Ok(Arc::new(InMemoryBackend::demo()))
        }
    }
}
