//! # Sync Error Types
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BackendError   one failed collaborator call                            │
//! │  ├── Unauthorized        401/403 or a redirect to the login page       │
//! │  ├── Rejected            any other non-2xx, with the server's message  │
//! │  ├── Transport           connect/read failure                          │
//! │  ├── Timeout             request exceeded its bound                    │
//! │  └── Decode              2xx with a body we cannot read                │
//! │                                                                         │
//! │  LookupError    code → Product resolution                               │
//! │  ├── NotFound            no product with that SKU                      │
//! │  └── Unavailable         catalog could not be fetched                  │
//! │                                                                         │
//! │  SyncError      configuration problems                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Backend Error
// =============================================================================

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// Session missing, expired, or lacking permission.
    #[error("Not authenticated")]
    Unauthorized,

    /// The server answered with an error status.
    ///
    /// `message` comes from the body's `error`, `detail` or `message` field.
    #[error("Server rejected request ({status}): {}", .message.as_deref().unwrap_or("no details"))]
    Rejected { status: u16, message: Option<String> },

    #[error("Network error: {0}")]
    Transport(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl BackendError {
    /// Returns true if repeating the same request could succeed.
    ///
    /// Only the draft sync worker retries; checkout never does.
    pub fn is_retryable(&self) -> bool {
        match self {
            BackendError::Transport(_) | BackendError::Timeout => true,
            BackendError::Rejected { status, .. } => *status >= 500 || *status == 429,
            BackendError::Unauthorized | BackendError::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BackendError::Timeout
        } else if err.is_decode() {
            BackendError::Decode(err.to_string())
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}

/// Result type alias for collaborator calls.
pub type BackendResult<T> = Result<T, BackendError>;

// =============================================================================
// Lookup Error
// =============================================================================

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("Product with scanned SKU not found: {0}")]
    NotFound(String),

    #[error("Error fetching products: {0}")]
    Unavailable(#[from] BackendError),
}

// =============================================================================
// Configuration Error
// =============================================================================

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Invalid backend configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),

    /// The HTTP client could not be built (TLS backend init failed).
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

/// Result type alias for configuration operations.
pub type SyncResult<T> = Result<T, SyncError>;
