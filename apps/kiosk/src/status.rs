//! # Status Board
//!
//! The single line of user-facing status text under the camera view
//! ("Scanned: A1", "Added Widget to cart", ...). Latest message wins.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;

use crate::error::{ErrorCode, KioskError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusMessage {
    pub level: StatusLevel,
    pub text: String,
    /// Set on errors that came from a [`KioskError`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    pub at: DateTime<Utc>,
}

impl std::fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

#[derive(Debug, Clone)]
pub struct StatusBoard {
    tx: Arc<watch::Sender<Option<StatusMessage>>>,
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusBoard {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        StatusBoard { tx: Arc::new(tx) }
    }

    pub fn publish(&self, level: StatusLevel, text: impl Into<String>) {
        self.send(StatusMessage {
            level,
            text: text.into(),
            code: None,
            at: Utc::now(),
        });
    }

    /// Shows the error's message, keeping its code for callers waiting on
    /// the outcome.
    pub fn fail(&self, err: &KioskError) {
        self.send(StatusMessage {
            level: StatusLevel::Error,
            text: err.message.clone(),
            code: Some(err.code),
            at: Utc::now(),
        });
    }

    fn send(&self, message: StatusMessage) {
        tracing::debug!(level = ?message.level, text = %message.text, "Status");
        self.tx.send_replace(Some(message));
    }

    pub fn info(&self, text: impl Into<String>) {
        self.publish(StatusLevel::Info, text);
    }

    pub fn success(&self, text: impl Into<String>) {
        self.publish(StatusLevel::Success, text);
    }

    pub fn error(&self, text: impl Into<String>) {
        self.publish(StatusLevel::Error, text);
    }

    pub fn current(&self) -> Option<StatusMessage> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<StatusMessage>> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_message_wins() {
        let board = StatusBoard::new();
        assert!(board.current().is_none());

        board.info("Scanned: A1");
        board.success("Added Widget to cart");

        let current = board.current().unwrap();
        assert_eq!(current.text, "Added Widget to cart");
        assert_eq!(current.level, StatusLevel::Success);
    }

    #[test]
    fn test_failure_keeps_error_code() {
        let board = StatusBoard::new();
        board.fail(&KioskError::new(ErrorCode::BackendUnavailable, "Error fetching products"));

        let current = board.current().unwrap();
        assert_eq!(current.level, StatusLevel::Error);
        assert_eq!(current.code, Some(ErrorCode::BackendUnavailable));
        assert_eq!(current.text, "Error fetching products");

        board.error("Unable to access camera: denied");
        assert_eq!(board.current().unwrap().code, None);
    }

    #[test]
    fn test_clones_share_board() {
        let board = StatusBoard::new();
        let other = board.clone();
        other.error("Unable to access camera: denied");
        assert_eq!(board.current().unwrap().level, StatusLevel::Error);
    }
}
