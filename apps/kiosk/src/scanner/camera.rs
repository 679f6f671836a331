//! Camera device seam.
//!
//! A [`Camera`] hands out at most one [`FrameStream`] at a time. The stream
//! owns the device; dropping it releases the device, on every path.

use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::debug;

use super::ScanError;

/// One captured video frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(data: Vec<u8>) -> Self {
        Frame { data }
    }

    /// A frame whose payload is `code`.
    pub fn from_code(code: &str) -> Self {
        Frame::new(code.as_bytes().to_vec())
    }

    /// A frame with nothing in view.
    pub fn blank() -> Self {
        Frame::new(Vec::new())
    }
}

#[async_trait]
pub trait Camera: Send + Sync {
    /// Acquires the device exclusively.
    async fn open(&self) -> Result<Box<dyn FrameStream>, ScanError>;
}

#[async_trait]
pub trait FrameStream: Send {
    /// Next frame; `None` once the device has gone away.
    async fn next_frame(&mut self) -> Option<Frame>;
}

// =============================================================================
// Channel Camera
// =============================================================================

enum Slot {
    Available(mpsc::Receiver<Frame>),
    InUse,
    Denied(String),
}

/// A camera fed through a channel: by a capture thread, a hardware
/// scanner bridge, or the console's `scan` command.
#[derive(Clone)]
pub struct ChannelCamera {
    slot: Arc<Mutex<Slot>>,
}

/// Producer side of a [`ChannelCamera`].
#[derive(Clone)]
pub struct FrameSender {
    tx: mpsc::Sender<Frame>,
}

impl FrameSender {
    /// Returns false when the camera has been dropped.
    pub async fn send(&self, frame: Frame) -> bool {
        self.tx.send(frame).await.is_ok()
    }
}

impl ChannelCamera {
    pub fn new(buffer: usize) -> (Self, FrameSender) {
        let (tx, rx) = mpsc::channel(buffer);
        let camera = ChannelCamera {
            slot: Arc::new(Mutex::new(Slot::Available(rx))),
        };
        (camera, FrameSender { tx })
    }

    /// A camera the OS refuses to open.
    pub fn denied(reason: impl Into<String>) -> Self {
        ChannelCamera {
            slot: Arc::new(Mutex::new(Slot::Denied(reason.into()))),
        }
    }

    pub fn in_use(&self) -> bool {
        matches!(*lock(&self.slot), Slot::InUse)
    }
}

#[async_trait]
impl Camera for ChannelCamera {
    async fn open(&self) -> Result<Box<dyn FrameStream>, ScanError> {
        let mut slot = lock(&self.slot);
        match std::mem::replace(&mut *slot, Slot::InUse) {
            Slot::Available(mut rx) => {
                // Frames queued while nobody was looking are stale
                while rx.try_recv().is_ok() {}
                debug!("Camera acquired");
                Ok(Box::new(ChannelStream {
                    rx: Some(rx),
                    slot: self.slot.clone(),
                }))
            }
            Slot::InUse => Err(ScanError::DeviceUnavailable("camera is in use".into())),
            Slot::Denied(reason) => {
                *slot = Slot::Denied(reason.clone());
                Err(ScanError::PermissionDenied(reason))
            }
        }
    }
}

struct ChannelStream {
    rx: Option<mpsc::Receiver<Frame>>,
    slot: Arc<Mutex<Slot>>,
}

#[async_trait]
impl FrameStream for ChannelStream {
    async fn next_frame(&mut self) -> Option<Frame> {
        self.rx.as_mut()?.recv().await
    }
}

impl Drop for ChannelStream {
    fn drop(&mut self) {
        if let Some(rx) = self.rx.take() {
            *lock(&self.slot) = Slot::Available(rx);
            debug!("Camera released");
        }
    }
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
