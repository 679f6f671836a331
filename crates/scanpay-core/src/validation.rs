//! # Validation Module
//!
//! Input checks applied before a code reaches the catalog.
//!
//! Decoded QR payloads and hand-typed SKUs go through the same
//! [`normalize_code`] so both paths resolve identically.
//!
//! ## Usage
//! ```rust
//! use scanpay_core::validation::normalize_code;
//!
//! assert_eq!(normalize_code("  A1\n").unwrap(), "A1");
//! assert!(normalize_code("   ").is_err());
//! ```

use crate::error::ValidationError;
use crate::{MAX_PAPER_WIDTH, MIN_PAPER_WIDTH};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest code the kiosk will try to resolve.
pub const MAX_CODE_LENGTH: usize = 128;

/// Trims and checks a scanned or typed code.
///
/// ## Rules
/// - Surrounding whitespace is dropped
/// - Must not be empty
/// - At most [`MAX_CODE_LENGTH`] characters
/// - No control characters inside the code
pub fn normalize_code(raw: &str) -> ValidationResult<String> {
    let code = raw.trim();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "code".to_string(),
        });
    }

    if code.chars().count() > MAX_CODE_LENGTH {
        return Err(ValidationError::TooLong {
            field: "code".to_string(),
            max: MAX_CODE_LENGTH,
        });
    }

    if code.chars().any(char::is_control) {
        return Err(ValidationError::InvalidFormat {
            field: "code".to_string(),
            reason: "contains control characters".to_string(),
        });
    }

    Ok(code.to_string())
}

/// Checks a receipt paper width in characters.
pub fn validate_paper_width(width: usize) -> ValidationResult<()> {
    if !(MIN_PAPER_WIDTH..=MAX_PAPER_WIDTH).contains(&width) {
        return Err(ValidationError::OutOfRange {
            field: "paper_width".to_string(),
            min: MIN_PAPER_WIDTH as i64,
            max: MAX_PAPER_WIDTH as i64,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_code_trims() {
        assert_eq!(normalize_code(" SKU-42 ").unwrap(), "SKU-42");
    }

    #[test]
    fn test_normalize_code_rejects_empty() {
        assert!(matches!(
            normalize_code(""),
            Err(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn test_normalize_code_rejects_control_chars() {
        assert!(matches!(
            normalize_code("A1\u{0007}B"),
            Err(ValidationError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_normalize_code_length() {
        let long = "X".repeat(MAX_CODE_LENGTH + 1);
        assert!(matches!(
            normalize_code(&long),
            Err(ValidationError::TooLong { .. })
        ));
        assert!(normalize_code(&"X".repeat(MAX_CODE_LENGTH)).is_ok());
    }

    #[test]
    fn test_paper_width() {
        assert!(validate_paper_width(42).is_ok());
        assert!(validate_paper_width(MIN_PAPER_WIDTH).is_ok());
        assert!(validate_paper_width(MIN_PAPER_WIDTH - 1).is_err());
        assert!(validate_paper_width(10).is_err());
        assert!(validate_paper_width(120).is_err());
    }
}
