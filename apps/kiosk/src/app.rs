//! # Kiosk Assembly
//!
//! Builds every component from a [`KioskConfig`] and routes console
//! [`Command`]s to them.
//!
//! ## Wiring
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  FrameSender ──► ChannelCamera ──► ScannerEngine ──► ScanPipeline ──┐   │
//! │  (scan cmd)                        (decode loop)     (lookup)       │   │
//! │                                                                     ▼   │
//! │  sku cmd ────────────────────────────────────────► ScanPipeline ─► CartStore
//! │                                                                     │   │
//! │  inc/dec/rm ─────────────────────────────────────────────────────► │   │
//! │                                                                     │   │
//! │                                          CartEvent ◄────────────────┤   │
//! │                                              │                      │   │
//! │                                              ▼                      │   │
//! │                                       DraftSyncWorker               │   │
//! │                                                                     │   │
//! │  checkout/pay/cancel ──► CheckoutCoordinator ──────────────────────┘   │
//! │                                    │                                    │
//! │                                    └──► ReceiptPrinter                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use scanpay_core::{CartChange, CartSnapshot, ReceiptFormat, Session};
use scanpay_db::Database;
use scanpay_sync::{Backend, BackendError, CatalogLookup, DraftSyncHandle, DraftSyncWorker};

use crate::checkout::{CheckoutCoordinator, CheckoutSettings};
use crate::commands::{Command, HELP};
use crate::config::KioskConfig;
use crate::error::{ErrorCode, KioskError};
use crate::pipeline::ScanPipeline;
use crate::receipt::ReceiptPrinter;
use crate::scanner::{
    BellFeedback, Camera, ChannelCamera, Frame, FrameSender, PayloadDecoder, ScanError, ScanHandle,
    ScannerEngine,
};
use crate::status::{StatusBoard, StatusLevel};
use crate::store::{CartHandle, CartStore, HydrationSource};

/// How long a pushed frame may go without any status change before it is
/// treated as a suppressed duplicate.
const SCAN_ACK_WAIT: Duration = Duration::from_millis(500);

const FRAME_BUFFER: usize = 16;

pub struct Kiosk {
    config: KioskConfig,
    format: ReceiptFormat,
    backend: Arc<dyn Backend>,
    db: Database,
    cart: CartHandle,
    status: StatusBoard,
    pipeline: ScanPipeline,
    checkout: CheckoutCoordinator,
    scanner: ScannerEngine,
    frames: Option<FrameSender>,
    scan: Option<ScanHandle>,
    session: Option<Session>,
    draft_sync: Option<DraftSyncHandle>,
    tasks: Vec<JoinHandle<()>>,
}

impl Kiosk {
    /// Connects the configured backend and a console-fed camera.
    pub async fn start(config: KioskConfig, db: Database) -> Result<Self, KioskError> {
        let backend = scanpay_sync::connect(&config.backend)?;
        let (camera, frames) = ChannelCamera::new(FRAME_BUFFER);
        Self::assemble(config, db, backend, Arc::new(camera), Some(frames)).await
    }

    /// Builds and starts every component around the given collaborators.
    ///
    /// Camera and session problems do not fail startup; they are reported on
    /// the status board and the scanner stays off.
    pub async fn assemble(
        mut config: KioskConfig,
        db: Database,
        backend: Arc<dyn Backend>,
        camera: Arc<dyn Camera>,
        frames: Option<FrameSender>,
    ) -> Result<Self, KioskError> {
        config.ensure_device_id(&db.device()).await;
        let mut tasks = Vec::new();

        let (store, cart) = CartStore::new(db.cart_slot(), backend.clone());
        tasks.push(tokio::spawn(store.run()));

        let draft_sync = if config.draft_sync.enabled {
            let (worker, handle) =
                DraftSyncWorker::new(backend.clone(), config.draft_sync.clone(), cart.subscribe());
            tasks.push(tokio::spawn(worker.run()));
            Some(handle)
        } else {
            info!("Draft sync disabled");
            None
        };

        let status = StatusBoard::new();
        let catalog = Arc::new(CatalogLookup::new(backend.clone(), config.backend.catalog_ttl()));
        let pipeline = ScanPipeline::new(catalog, cart.clone(), status.clone());

        let format = config.receipt_format();
        let mut checkout = CheckoutCoordinator::new(
            backend.clone(),
            cart.clone(),
            CheckoutSettings {
                payment_delay: config.checkout.payment_delay(),
                timeout: config.checkout.timeout(),
                store_name: config.store.name.clone(),
            },
        );
        match config.receipt_dir() {
            Ok(dir) => {
                checkout = checkout.with_printer(ReceiptPrinter::new(dir, format.clone(), config.receipt.html));
            }
            Err(e) => warn!(error = %e, "No receipt directory; receipts will not be printed"),
        }

        let scanner = ScannerEngine::new(
            camera,
            Arc::new(PayloadDecoder),
            Arc::new(BellFeedback {
                sound_enabled: config.scanner.sound_enabled,
            }),
            config.scanner.debounce_window(),
        );

        let mut kiosk = Kiosk {
            config,
            format,
            backend,
            db,
            cart,
            status,
            pipeline,
            checkout,
            scanner,
            frames,
            scan: None,
            session: None,
            draft_sync,
            tasks,
        };

        kiosk.hydrate().await?;
        if let Err(e) = kiosk.ensure_scanner().await {
            warn!(error = %e, "Scanner not started");
        }

        info!(
            device = %kiosk.config.device.id.as_deref().unwrap_or("unknown"),
            store = %kiosk.config.store.name,
            "Kiosk ready"
        );
        Ok(kiosk)
    }

    pub fn status(&self) -> &StatusBoard {
        &self.status
    }

    pub fn cart(&self) -> &CartHandle {
        &self.cart
    }

    pub fn checkout(&self) -> &CheckoutCoordinator {
        &self.checkout
    }

    pub fn scanner(&self) -> &ScannerEngine {
        &self.scanner
    }

    async fn hydrate(&self) -> Result<(), KioskError> {
        match self.cart.hydrate().await? {
            HydrationSource::Local { items } => debug!(items, "Cart restored from this device"),
            HydrationSource::Draft { items } => {
                self.status.info(format!("Restored {} item(s) from your saved cart", items));
            }
            HydrationSource::Empty => debug!("Starting with an empty cart"),
        }
        Ok(())
    }

    // =========================================================================
    // Access
    // =========================================================================

    /// Verifies that the current session may use the scanner and cart.
    async fn authorize(&mut self) -> Result<(), KioskError> {
        if self.session.as_ref().is_some_and(|s| s.capabilities.can_scan) {
            return Ok(());
        }

        let timeout = self.config.checkout.timeout();
        let session = match tokio::time::timeout(timeout, self.backend.current_session()).await {
            Ok(Ok(session)) => session,
            Ok(Err(BackendError::Unauthorized)) | Ok(Err(BackendError::Decode(_))) => {
                return Err(KioskError::new(
                    ErrorCode::AuthRequired,
                    "Please sign in to use the scanner",
                ));
            }
            Ok(Err(e)) => {
                return Err(KioskError::new(
                    ErrorCode::BackendUnavailable,
                    format!("Could not verify session: {}", e),
                ));
            }
            Err(_) => {
                return Err(KioskError::new(ErrorCode::Timeout, "Session check timed out"));
            }
        };

        if !session.capabilities.can_scan {
            warn!(user = %session.user, role = ?session.role, "Scanner refused for role");
            return Err(ScanError::Forbidden.into());
        }

        info!(user = %session.user, role = ?session.role, "Session verified");
        self.session = Some(session);
        Ok(())
    }

    /// Starts the decode loop unless it is already running.
    async fn ensure_scanner(&mut self) -> Result<(), KioskError> {
        if self.scan.as_ref().is_some_and(|scan| !scan.is_finished()) {
            return Ok(());
        }

        if let Err(e) = self.authorize().await {
            self.status.fail(&e);
            return Err(e);
        }

        let pipeline = self.pipeline.clone();
        match self
            .scanner
            .start(move |event| {
                pipeline.on_scan(event);
            })
            .await
        {
            Ok(handle) => {
                self.scan = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.status.error(e.to_string());
                Err(e.into())
            }
        }
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Runs one console command and returns the text to show.
    pub async fn execute(&mut self, command: Command) -> Result<String, KioskError> {
        debug!(?command, "Executing command");
        match command {
            Command::Scan(code) => self.scan_code(&code).await,
            Command::Sku(code) => {
                self.authorize().await?;
                let product = self.pipeline.submit_manual(&code).await?;
                Ok(format!("Added {} to cart", product.name))
            }
            Command::Increment(id) => {
                self.authorize().await?;
                let change = self.cart.increment(id).await?;
                self.cart_after(change).await
            }
            Command::Decrement(id) => {
                self.authorize().await?;
                let change = self.cart.decrement(id).await?;
                self.cart_after(change).await
            }
            Command::Remove(id) => {
                self.authorize().await?;
                let change = self.cart.remove(id).await?;
                self.cart_after(change).await
            }
            Command::Cart => Ok(self.render_cart(&self.cart.snapshot().await?)),
            Command::Checkout => {
                self.checkout.initiate().await?;
                let snapshot = self.cart.snapshot().await?;
                Ok(format!(
                    "Total {}. Choose 'pay cash' or 'pay card', or 'cancel'.",
                    self.money(snapshot.total)
                ))
            }
            Command::Pay(method) => match self.checkout.confirm(method).await {
                Ok(receipt) => {
                    self.status.success("Payment successful");
                    Ok(receipt.render_text(&self.format))
                }
                Err(e) => {
                    self.status.error(e.to_string());
                    Err(e.into())
                }
            },
            Command::Cancel => {
                self.checkout.cancel()?;
                Ok("Checkout cancelled".to_string())
            }
            Command::Status => Ok(self.render_status()),
            Command::Help => Ok(HELP.to_string()),
            Command::Quit => Ok("Goodbye".to_string()),
        }
    }

    /// Pushes a frame through the camera and waits for the pipeline's verdict.
    async fn scan_code(&mut self, code: &str) -> Result<String, KioskError> {
        self.ensure_scanner().await?;
        let Some(frames) = &self.frames else {
            return Err(KioskError::new(
                ErrorCode::CameraError,
                "This camera is not fed from the console",
            ));
        };

        let mut updates = self.status.subscribe();
        updates.borrow_and_update();

        if !frames.send(Frame::from_code(code)).await {
            return Err(KioskError::new(ErrorCode::CameraError, "Scanner is not running"));
        }

        // The first change is "Scanned: ..."; nothing at all means debounced
        let mut wait = SCAN_ACK_WAIT;
        loop {
            match tokio::time::timeout(wait, updates.changed()).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => return Err(KioskError::internal("Status board closed")),
                Err(_) if wait == SCAN_ACK_WAIT => {
                    return Ok(format!("{} already scanned", code.trim()));
                }
                Err(_) => return Ok("Still looking up the product...".to_string()),
            }

            let Some(message) = updates.borrow_and_update().clone() else {
                continue;
            };
            match message.level {
                StatusLevel::Info => wait = self.config.backend.request_timeout() + SCAN_ACK_WAIT,
                StatusLevel::Success => return Ok(message.text),
                StatusLevel::Error => {
                    let code = message.code.unwrap_or(ErrorCode::Internal);
                    return Err(KioskError::new(code, message.text));
                }
            }
        }
    }

    async fn cart_after(&self, change: CartChange) -> Result<String, KioskError> {
        if change == CartChange::Unchanged {
            return Ok("That item is not in the cart".to_string());
        }
        Ok(self.render_cart(&self.cart.snapshot().await?))
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    fn money(&self, amount: scanpay_core::Money) -> String {
        amount.format(&self.format.currency_symbol, self.format.currency_decimals)
    }

    fn render_cart(&self, snapshot: &CartSnapshot) -> String {
        if snapshot.is_empty() {
            return "Cart is empty".to_string();
        }

        let mut out = String::new();
        for item in &snapshot.items {
            out.push_str(&format!(
                "{:>4}  {:<24} x{:<4} {}\n",
                item.id.0,
                item.name,
                item.qty,
                self.money(item.line_total())
            ));
        }
        out.push_str(&format!("Total: {}", self.money(snapshot.total)));
        out
    }

    fn render_status(&self) -> String {
        let session = match &self.session {
            Some(s) => format!("{} ({:?})", s.user, s.role),
            None => "not verified".to_string(),
        };
        let draft = match &self.draft_sync {
            Some(handle) => handle.status().to_string(),
            None => "disabled".to_string(),
        };
        let last = self
            .status
            .current()
            .map(|m| m.text)
            .unwrap_or_else(|| "-".to_string());

        let mut out = format!(
            "Scanner:    {}\nCheckout:   {}\nDraft sync: {}\nSession:    {}\nStatus:     {}",
            self.scanner.state(),
            self.checkout.phase(),
            draft,
            session,
            last
        );
        if let Some(err) = self.checkout.last_error() {
            out.push_str(&format!("\nLast checkout error: {}", err));
        }
        out
    }

    /// Stops the scanner and background workers, then closes the database.
    pub async fn shutdown(mut self) {
        info!("Kiosk shutting down");
        if let Some(scan) = self.scan.take() {
            scan.cancel().await;
        }
        if let Some(draft_sync) = &self.draft_sync {
            draft_sync.shutdown().await;
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.db.close().await;
    }
}
