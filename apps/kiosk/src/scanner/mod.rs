//! # Scanner Engine
//!
//! Turns a camera's frame stream into discrete, debounced [`ScanEvent`]s.
//!
//! ## States
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Idle ──start()──► Initializing ──camera open──► Scanning              │
//! │                          │                           │                  │
//! │                          ├─► PermissionDenied        ├─ cancel()        │
//! │                          └─► DeviceUnavailable       ├─ handle dropped  │
//! │                               (terminal, no retry)   ├─ stream ended    │
//! │                                                      ▼                  │
//! │                                                   Stopped               │
//! │                                       (camera released on every path)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Decode Loop
//! ```text
//! loop {
//!     frame ← camera                       (or cancel)
//!     detect(frame)
//!       Err  ──► ignored (trace)
//!       None ──► nothing
//!       Some(code) ──► debounce.accept(code)?
//!                        no  ──► nothing, no feedback
//!                        yes ──► feedback.acknowledge(), on_event(ScanEvent)
//!     yield
//! }
//! ```

pub mod camera;
pub mod decoder;

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use scanpay_core::{Debouncer, ScanEvent};

pub use camera::{Camera, ChannelCamera, Frame, FrameSender, FrameStream};
pub use decoder::{CodeDecoder, DecodeError, PayloadDecoder};

// =============================================================================
// Errors & State
// =============================================================================

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScanError {
    #[error("Unable to access camera: {0}")]
    PermissionDenied(String),

    #[error("Unable to access camera: {0}")]
    DeviceUnavailable(String),

    #[error("Scanner is already running")]
    AlreadyRunning,

    #[error("This account is not allowed to scan")]
    Forbidden,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScannerState {
    Idle,
    Initializing,
    Scanning,
    Stopped,
    PermissionDenied(String),
    DeviceUnavailable(String),
}

impl ScannerState {
    pub fn is_running(&self) -> bool {
        matches!(self, ScannerState::Initializing | ScannerState::Scanning)
    }
}

impl std::fmt::Display for ScannerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScannerState::Idle => write!(f, "idle"),
            ScannerState::Initializing => write!(f, "initializing"),
            ScannerState::Scanning => write!(f, "scanning"),
            ScannerState::Stopped => write!(f, "stopped"),
            ScannerState::PermissionDenied(reason) => write!(f, "permission denied ({})", reason),
            ScannerState::DeviceUnavailable(reason) => write!(f, "device unavailable ({})", reason),
        }
    }
}

// =============================================================================
// Feedback
// =============================================================================

/// Audible/visual acknowledgement of an accepted scan.
pub trait ScanFeedback: Send + Sync {
    fn acknowledge(&self, code: &str);
}

/// Rings the terminal bell.
#[derive(Debug, Clone)]
pub struct BellFeedback {
    pub sound_enabled: bool,
}

impl ScanFeedback for BellFeedback {
    fn acknowledge(&self, code: &str) {
        debug!(code, "Scan acknowledged");
        if self.sound_enabled {
            eprint!("\x07");
        }
    }
}

// =============================================================================
// Engine
// =============================================================================

pub struct ScannerEngine {
    camera: Arc<dyn Camera>,
    decoder: Arc<dyn CodeDecoder>,
    feedback: Arc<dyn ScanFeedback>,
    debounce_window: Duration,
    state: Arc<watch::Sender<ScannerState>>,
}

impl ScannerEngine {
    pub fn new(
        camera: Arc<dyn Camera>,
        decoder: Arc<dyn CodeDecoder>,
        feedback: Arc<dyn ScanFeedback>,
        debounce_window: Duration,
    ) -> Self {
        let (state, _) = watch::channel(ScannerState::Idle);
        ScannerEngine {
            camera,
            decoder,
            feedback,
            debounce_window,
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> ScannerState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ScannerState> {
        self.state.subscribe()
    }

    /// Opens the camera and starts the decode loop.
    ///
    /// Camera failures are terminal for this engine: once denied or
    /// unavailable, later calls return the same error without touching
    /// the camera.
    pub async fn start<F>(&self, on_event: F) -> Result<ScanHandle, ScanError>
    where
        F: FnMut(ScanEvent) + Send + 'static,
    {
        let mut refused = None;
        self.state.send_if_modified(|state| match state {
            ScannerState::PermissionDenied(reason) => {
                refused = Some(ScanError::PermissionDenied(reason.clone()));
                false
            }
            ScannerState::DeviceUnavailable(reason) => {
                refused = Some(ScanError::DeviceUnavailable(reason.clone()));
                false
            }
            state if state.is_running() => {
                refused = Some(ScanError::AlreadyRunning);
                false
            }
            state => {
                *state = ScannerState::Initializing;
                true
            }
        });
        if let Some(err) = refused {
            return Err(err);
        }
        let _initializing = InitGuard(self.state.clone());

        let stream = match self.camera.open().await {
            Ok(stream) => stream,
            Err(err) => {
                warn!(error = %err, "Camera acquisition failed");
                let state = match &err {
                    ScanError::PermissionDenied(reason) => ScannerState::PermissionDenied(reason.clone()),
                    ScanError::DeviceUnavailable(reason) => ScannerState::DeviceUnavailable(reason.clone()),
                    other => ScannerState::DeviceUnavailable(other.to_string()),
                };
                self.state.send_replace(state);
                return Err(err);
            }
        };

        self.state.send_replace(ScannerState::Scanning);
        info!(window_ms = self.debounce_window.as_millis() as u64, "Scanner started");

        let (cancel_tx, cancel_rx) = oneshot::channel();
        let scan_loop = DecodeLoop {
            stream,
            decoder: self.decoder.clone(),
            feedback: self.feedback.clone(),
            debouncer: Debouncer::new(self.debounce_window),
            _stopped: StopGuard(self.state.clone()),
        };
        let task = tokio::spawn(scan_loop.run(cancel_rx, on_event));

        Ok(ScanHandle {
            cancel_tx: Some(cancel_tx),
            task: Some(task),
        })
    }
}

/// Returns a start abandoned while opening the camera to `Idle`.
struct InitGuard(Arc<watch::Sender<ScannerState>>);

impl Drop for InitGuard {
    fn drop(&mut self) {
        self.0.send_if_modified(|state| {
            if *state == ScannerState::Initializing {
                *state = ScannerState::Idle;
                true
            } else {
                false
            }
        });
    }
}

/// Publishes `Stopped` when the loop ends, however it ends.
struct StopGuard(Arc<watch::Sender<ScannerState>>);

impl Drop for StopGuard {
    fn drop(&mut self) {
        self.0.send_replace(ScannerState::Stopped);
    }
}

// Field order matters: the stream (camera) drops before the guard reports Stopped
struct DecodeLoop {
    stream: Box<dyn FrameStream>,
    decoder: Arc<dyn CodeDecoder>,
    feedback: Arc<dyn ScanFeedback>,
    debouncer: Debouncer,
    _stopped: StopGuard,
}

impl DecodeLoop {
    async fn run<F>(mut self, mut cancel_rx: oneshot::Receiver<()>, mut on_event: F)
    where
        F: FnMut(ScanEvent) + Send + 'static,
    {
        loop {
            let frame = tokio::select! {
                _ = &mut cancel_rx => {
                    debug!("Scanner cancelled");
                    break;
                }
                frame = self.stream.next_frame() => match frame {
                    Some(frame) => frame,
                    None => {
                        info!("Camera stream ended");
                        break;
                    }
                },
            };

            match self.decoder.detect(&frame) {
                Ok(Some(code)) => {
                    let now = tokio::time::Instant::now().into_std();
                    if self.debouncer.accept(&code, now) {
                        self.feedback.acknowledge(&code);
                        on_event(ScanEvent::new(code, Utc::now()));
                    } else {
                        trace!(code, "Duplicate read suppressed");
                    }
                }
                Ok(None) => {}
                Err(e) => trace!(error = %e, "Decode noise"),
            }

            tokio::task::yield_now().await;
        }

        info!("Scanner stopped");
    }
}

// =============================================================================
// Handle
// =============================================================================

/// Owner of a running decode loop. Dropping it stops the loop and releases
/// the camera.
pub struct ScanHandle {
    cancel_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ScanHandle {
    /// Stops the loop and waits until the camera is released.
    pub async fn cancel(mut self) {
        if let Some(tx) = self.cancel_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |t| t.is_finished())
    }
}

impl Drop for ScanHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
