//! Code decoder seam.
//!
//! Symbol decoding itself is an external capability; the engine only needs
//! `detect(frame) -> Option<code>`.

use thiserror::Error;

use scanpay_core::validation::normalize_code;

use super::camera::Frame;

/// A frame that could not be read. Never fatal.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Decode failed: {0}")]
pub struct DecodeError(pub String);

pub trait CodeDecoder: Send + Sync {
    /// `Ok(None)` when the frame holds no code.
    fn detect(&self, frame: &Frame) -> Result<Option<String>, DecodeError>;
}

/// Reads frames whose pixels already carry the decoded payload as UTF-8,
/// as delivered by hardware scanners in keyboard-wedge or serial mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct PayloadDecoder;

impl CodeDecoder for PayloadDecoder {
    fn detect(&self, frame: &Frame) -> Result<Option<String>, DecodeError> {
        if frame.data.is_empty() {
            return Ok(None);
        }

        let text = std::str::from_utf8(&frame.data).map_err(|e| DecodeError(e.to_string()))?;
        if text.trim().is_empty() {
            return Ok(None);
        }

        normalize_code(text)
            .map(Some)
            .map_err(|e| DecodeError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_decoder() {
        let decoder = PayloadDecoder;
        assert_eq!(
            decoder.detect(&Frame::from_code(" A1\n")).unwrap(),
            Some("A1".to_string())
        );
        assert_eq!(decoder.detect(&Frame::blank()).unwrap(), None);
        assert!(decoder.detect(&Frame::new(vec![0xff, 0xfe])).is_err());
    }
}
