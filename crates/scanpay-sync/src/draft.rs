//! # Draft Sync Worker
//!
//! Mirrors the local cart to the backend's draft slot in the background.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CartStore ──broadcast<CartEvent>──► DraftSyncWorker ──► save_draft()  │
//! │                                                                         │
//! │  1. Receive an event, then drain the channel: only the latest          │
//! │     snapshot is sent (coalescing)                                       │
//! │  2. save_draft(items)                                                   │
//! │       ok ────────────────► status Synced { at }                        │
//! │       retryable error ──► wait backoff, retry                          │
//! │       other / exhausted ─► status Failed, wait for next event          │
//! │  3. While waiting out a backoff, a newer event replaces the pending    │
//! │     snapshot and restarts the attempt count                            │
//! │                                                                         │
//! │  A failed sync never touches the local cart.                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

use scanpay_core::{CartEvent, LineItem};

use crate::backend::Backend;
use crate::config::DraftSyncSettings;

// =============================================================================
// Status
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftSyncStatus {
    /// Nothing sent yet.
    Idle,
    /// A save is in flight or waiting out a backoff.
    Syncing,
    Synced { at: DateTime<Utc> },
    /// Gave up on the latest snapshot.
    Failed { attempts: u32, error: String },
}

impl std::fmt::Display for DraftSyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DraftSyncStatus::Idle => write!(f, "idle"),
            DraftSyncStatus::Syncing => write!(f, "syncing"),
            DraftSyncStatus::Synced { at } => write!(f, "synced at {}", at.format("%H:%M:%S")),
            DraftSyncStatus::Failed { attempts, error } => {
                write!(f, "failed after {} attempt(s): {}", attempts, error)
            }
        }
    }
}

enum Flow {
    Continue,
    Stop,
}

// =============================================================================
// Worker
// =============================================================================

pub struct DraftSyncWorker {
    backend: Arc<dyn Backend>,
    settings: DraftSyncSettings,
    events: broadcast::Receiver<CartEvent>,
    events_open: bool,
    status_tx: watch::Sender<DraftSyncStatus>,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for observing and stopping the worker.
#[derive(Clone)]
pub struct DraftSyncHandle {
    shutdown_tx: mpsc::Sender<()>,
    status_rx: watch::Receiver<DraftSyncStatus>,
}

impl DraftSyncHandle {
    pub fn status(&self) -> DraftSyncStatus {
        self.status_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DraftSyncStatus> {
        self.status_rx.clone()
    }

    /// Triggers graceful shutdown. An in-flight save is not awaited.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

impl DraftSyncWorker {
    pub fn new(
        backend: Arc<dyn Backend>,
        settings: DraftSyncSettings,
        events: broadcast::Receiver<CartEvent>,
    ) -> (Self, DraftSyncHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let (status_tx, status_rx) = watch::channel(DraftSyncStatus::Idle);

        let worker = DraftSyncWorker {
            backend,
            settings,
            events,
            events_open: true,
            status_tx,
            shutdown_rx,
        };

        (worker, DraftSyncHandle { shutdown_tx, status_rx })
    }

    /// Runs until shutdown or until the cart store goes away.
    ///
    /// This should be spawned as a background task.
    pub async fn run(mut self) {
        info!("Draft sync worker starting");

        loop {
            tokio::select! {
                received = self.events.recv() => {
                    let event = match received {
                        Ok(event) => self.drain_latest().unwrap_or(event),
                        Err(RecvError::Lagged(skipped)) => {
                            debug!(skipped, "Draft sync lagged; jumping to latest");
                            match self.drain_latest() {
                                Some(event) => event,
                                None => continue,
                            }
                        }
                        Err(RecvError::Closed) => {
                            debug!("Cart event channel closed");
                            break;
                        }
                    };

                    if let Flow::Stop = self.sync(event.draft_items().to_vec()).await {
                        break;
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Draft sync worker shutting down");
                    break;
                }
            }
        }

        info!("Draft sync worker stopped");
    }

    /// Latest event already queued, if any.
    fn drain_latest(&mut self) -> Option<CartEvent> {
        let mut latest = None;
        loop {
            match self.events.try_recv() {
                Ok(event) => latest = Some(event),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Closed) => {
                    self.events_open = false;
                    break;
                }
            }
        }
        latest
    }

    async fn sync(&mut self, mut items: Vec<LineItem>) -> Flow {
        let mut backoff = self.create_backoff();
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            self.status_tx.send_replace(DraftSyncStatus::Syncing);

            let err = match self.backend.save_draft(&items).await {
                Ok(()) => {
                    debug!(items = items.len(), attempts, "Draft synced");
                    self.status_tx
                        .send_replace(DraftSyncStatus::Synced { at: Utc::now() });
                    return Flow::Continue;
                }
                Err(err) => err,
            };

            if !err.is_retryable() || attempts >= self.settings.max_attempts {
                warn!(error = %err, attempts, "Draft sync failed; keeping local cart");
                self.status_tx.send_replace(DraftSyncStatus::Failed {
                    attempts,
                    error: err.to_string(),
                });
                return Flow::Continue;
            }

            let delay = backoff
                .next_backoff()
                .unwrap_or_else(|| self.settings.max_backoff());
            warn!(error = %err, attempts, ?delay, "Draft sync failed; retrying");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}

                received = self.events.recv(), if self.events_open => {
                    let newer = match received {
                        Ok(event) => Some(self.drain_latest().unwrap_or(event)),
                        Err(RecvError::Lagged(_)) => self.drain_latest(),
                        Err(RecvError::Closed) => {
                            self.events_open = false;
                            None
                        }
                    };
                    if let Some(event) = newer {
                        debug!("Newer cart state supersedes pending draft retry");
                        items = event.draft_items().to_vec();
                        attempts = 0;
                        backoff.reset();
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Draft sync worker shutting down during retry");
                    return Flow::Stop;
                }
            }
        }
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.settings.initial_backoff(),
            max_interval: self.settings.max_backoff(),
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}
