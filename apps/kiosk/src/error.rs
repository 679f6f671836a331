//! # Kiosk Error Type
//!
//! The one error the console surface renders.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CoreError ─────────┐                                                   │
//! │  ValidationError ───┤                                                   │
//! │  CartStoreError ────┤                                                   │
//! │  LookupError ───────┼──► KioskError { code, message } ──► console       │
//! │  CheckoutError ─────┤                                                   │
//! │  ScanError ─────────┤    internal details (SQL, IO) are logged and      │
//! │  DbError ───────────┤    replaced with a generic message                │
//! │  ConfigError ───────┘                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;

use scanpay_core::{CoreError, ValidationError};
use scanpay_db::DbError;
use scanpay_sync::{LookupError, SyncError};

use crate::checkout::CheckoutError;
use crate::config::ConfigError;
use crate::scanner::ScanError;
use crate::store::CartStoreError;

/// ```json
/// { "code": "AUTH_REQUIRED", "message": "Please sign in to complete checkout" }
/// ```
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KioskError {
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    ValidationError,
    CartError,
    StorageError,
    BackendUnavailable,
    AuthRequired,
    Forbidden,
    CheckoutFailed,
    Timeout,
    InvalidState,
    CameraError,
    ConfigError,
    Internal,
}

impl KioskError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        KioskError {
            code,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        KioskError::new(ErrorCode::ValidationError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        KioskError::new(ErrorCode::Internal, message)
    }
}

impl std::fmt::Display for KioskError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for KioskError {}

impl From<ValidationError> for KioskError {
    fn from(err: ValidationError) -> Self {
        KioskError::validation(err.to_string())
    }
}

impl From<CoreError> for KioskError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(e) => e.into(),
            CoreError::ItemNotInCart(_) => KioskError::new(ErrorCode::NotFound, err.to_string()),
            CoreError::EmptyCart
            | CoreError::CartTooLarge { .. }
            | CoreError::QuantityTooLarge { .. } => {
                KioskError::new(ErrorCode::CartError, err.to_string())
            }
        }
    }
}

impl From<DbError> for KioskError {
    fn from(err: DbError) -> Self {
        tracing::error!(error = %err, "Local storage failure");
        KioskError::new(ErrorCode::StorageError, "Could not save the cart on this device")
    }
}

impl From<CartStoreError> for KioskError {
    fn from(err: CartStoreError) -> Self {
        match err {
            CartStoreError::Rule(e) => e.into(),
            CartStoreError::Storage(e) => e.into(),
            CartStoreError::Closed => KioskError::internal("Cart is unavailable"),
        }
    }
}

impl From<LookupError> for KioskError {
    fn from(err: LookupError) -> Self {
        match err {
            LookupError::NotFound(_) => {
                KioskError::new(ErrorCode::NotFound, "Product with scanned SKU not found")
            }
            LookupError::Unavailable(_) => {
                KioskError::new(ErrorCode::BackendUnavailable, err.to_string())
            }
        }
    }
}

impl From<CheckoutError> for KioskError {
    fn from(err: CheckoutError) -> Self {
        let code = match &err {
            CheckoutError::EmptyCart => ErrorCode::CartError,
            CheckoutError::AuthRequired => ErrorCode::AuthRequired,
            CheckoutError::Forbidden => ErrorCode::Forbidden,
            CheckoutError::InvalidState { .. } => ErrorCode::InvalidState,
            CheckoutError::TransactionSubmitFailure { .. } => ErrorCode::CheckoutFailed,
            CheckoutError::Timeout => ErrorCode::Timeout,
            CheckoutError::CartUnavailable => ErrorCode::Internal,
        };
        KioskError::new(code, err.to_string())
    }
}

impl From<ScanError> for KioskError {
    fn from(err: ScanError) -> Self {
        let code = match &err {
            ScanError::Forbidden => ErrorCode::Forbidden,
            ScanError::AlreadyRunning => ErrorCode::InvalidState,
            ScanError::PermissionDenied(_) | ScanError::DeviceUnavailable(_) => ErrorCode::CameraError,
        };
        KioskError::new(code, err.to_string())
    }
}

impl From<ConfigError> for KioskError {
    fn from(err: ConfigError) -> Self {
        KioskError::new(ErrorCode::ConfigError, err.to_string())
    }
}

impl From<SyncError> for KioskError {
    fn from(err: SyncError) -> Self {
        KioskError::new(ErrorCode::ConfigError, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanpay_sync::BackendError;

    #[test]
    fn test_serialized_shape() {
        let err = KioskError::from(CheckoutError::AuthRequired);
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "AUTH_REQUIRED");
        assert_eq!(json["message"], "Please sign in to complete checkout");
    }

    #[test]
    fn test_lookup_mapping() {
        let err = KioskError::from(LookupError::NotFound("Z9".into()));
        assert_eq!(err.code, ErrorCode::NotFound);
        assert_eq!(err.message, "Product with scanned SKU not found");

        let err = KioskError::from(LookupError::Unavailable(BackendError::Timeout));
        assert_eq!(err.code, ErrorCode::BackendUnavailable);
        assert_eq!(err.message, "Error fetching products: Request timed out");
    }

    #[test]
    fn test_storage_details_hidden() {
        let err = KioskError::from(DbError::Internal("disk I/O error at page 7".into()));
        assert_eq!(err.code, ErrorCode::StorageError);
        assert!(!err.message.contains("page 7"));
    }

    #[test]
    fn test_cart_limit_is_cart_error() {
        let err = KioskError::from(CoreError::QuantityTooLarge {
            requested: 1000,
            max: 999,
        });
        assert_eq!(err.code, ErrorCode::CartError);
    }
}
