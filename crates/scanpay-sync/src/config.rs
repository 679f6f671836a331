//! # Backend Configuration
//!
//! Settings for the store backend and the draft sync worker. These are the
//! `[backend]` and `[draft_sync]` tables of the kiosk's `kiosk.toml`.
//!
//! ## Configuration File Format
//! ```toml
//! [backend]
//! mode = "http"                      # http | offline
//! base_url = "https://store.example/"
//! request_timeout_secs = 10
//! session_cookie = "sessionid=abc123"
//! csrf_cookie = "csrftoken"
//! csrf_header = "X-CSRFToken"
//! catalog_ttl_secs = 300
//!
//! [draft_sync]
//! enabled = true
//! initial_backoff_ms = 500
//! max_backoff_secs = 30
//! max_attempts = 5
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Backend Mode
// =============================================================================

/// Which collaborator implementation the kiosk talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendMode {
    /// The store's REST API.
    #[default]
    Http,

    /// Built-in demo catalog, nothing leaves the device.
    Offline,
}

impl std::fmt::Display for BackendMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendMode::Http => write!(f, "http"),
            BackendMode::Offline => write!(f, "offline"),
        }
    }
}

impl std::str::FromStr for BackendMode {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "http" | "online" | "rest" => Ok(BackendMode::Http),
            "offline" | "demo" => Ok(BackendMode::Offline),
            other => Err(SyncError::InvalidConfig(format!(
                "Unknown backend mode: '{}'. Valid options: http, offline",
                other
            ))),
        }
    }
}

// =============================================================================
// Backend Config
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub mode: BackendMode,

    /// Root of the store API; endpoint paths (`api/v1/...`) are joined onto it.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request bound enforced by the HTTP client.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Cookie holding the anti-forgery token.
    #[serde(default = "default_csrf_cookie")]
    pub csrf_cookie: String,

    /// Header the anti-forgery token is echoed in.
    #[serde(default = "default_csrf_header")]
    pub csrf_header: String,

    /// Fixed token, used when the backend never sets the cookie.
    #[serde(default)]
    pub csrf_token: Option<String>,

    /// `name=value` cookie for a pre-authenticated kiosk account.
    #[serde(default)]
    pub session_cookie: Option<String>,

    /// How long a fetched catalog is trusted before a refetch.
    #[serde(default = "default_catalog_ttl")]
    pub catalog_ttl_secs: u64,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000/".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_csrf_cookie() -> String {
    "csrftoken".to_string()
}

fn default_csrf_header() -> String {
    "X-CSRFToken".to_string()
}

fn default_catalog_ttl() -> u64 {
    300
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            mode: BackendMode::default(),
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
            csrf_cookie: default_csrf_cookie(),
            csrf_header: default_csrf_header(),
            csrf_token: None,
            session_cookie: None,
            catalog_ttl_secs: default_catalog_ttl(),
        }
    }
}

impl BackendConfig {
    pub fn validate(&self) -> SyncResult<()> {
        if self.mode == BackendMode::Offline {
            return Ok(());
        }

        let url = url::Url::parse(&self.base_url)?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(SyncError::InvalidUrl(format!(
                "Backend URL must start with http:// or https://, got: {}",
                self.base_url
            )));
        }

        if self.request_timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "request_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.csrf_header.trim().is_empty() {
            return Err(SyncError::InvalidConfig("csrf_header must not be empty".into()));
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn catalog_ttl(&self) -> Duration {
        Duration::from_secs(self.catalog_ttl_secs)
    }
}

// =============================================================================
// Draft Sync Settings
// =============================================================================

/// Retry behavior of the background draft sync worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftSyncSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,

    /// Attempts per snapshot before giving up on it (minimum 1).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_true() -> bool {
    true
}

fn default_initial_backoff() -> u64 {
    500
}

fn default_max_backoff() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    5
}

impl Default for DraftSyncSettings {
    fn default() -> Self {
        DraftSyncSettings {
            enabled: true,
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_secs: default_max_backoff(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl DraftSyncSettings {
    pub fn validate(&self) -> SyncResult<()> {
        if self.max_attempts == 0 {
            return Err(SyncError::InvalidConfig(
                "draft_sync.max_attempts must be at least 1".into(),
            ));
        }
        if self.initial_backoff_ms == 0 {
            return Err(SyncError::InvalidConfig(
                "draft_sync.initial_backoff_ms must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }
}
