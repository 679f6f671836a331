//! # Scan Debouncing
//!
//! A camera decodes the same QR code on every frame it stays in view. The
//! debouncer turns that stream into one event per deliberate scan.
//!
//! ```text
//!  t=0.0s  "A1"  ──► accepted   (first sighting)
//!  t=0.1s  "A1"  ──► discarded  (same code, inside window)
//!  t=0.5s  "B2"  ──► accepted   (different code)
//!  t=0.6s  "A1"  ──► accepted   (no longer the preceding code)
//!  t=3.5s  "A1"  ──► accepted   (window since last acceptance elapsed)
//! ```
//!
//! The clock is passed in, so the decision is deterministic under test.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    last_accepted: Option<(String, Instant)>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Debouncer {
            window,
            last_accepted: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Decides whether `code`, observed at `now`, is a new scan.
    ///
    /// Only accepted codes move the reference point; a discarded duplicate
    /// does not extend the window.
    pub fn accept(&mut self, code: &str, now: Instant) -> bool {
        if let Some((last_code, at)) = &self.last_accepted {
            if last_code == code && now.saturating_duration_since(*at) < self.window {
                return false;
            }
        }

        self.last_accepted = Some((code.to_string(), now));
        true
    }

    /// Forgets the last accepted code (e.g. when the scanner restarts).
    pub fn reset(&mut self) {
        self.last_accepted = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(2_500);

    #[test]
    fn test_duplicate_inside_window_is_discarded() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(WINDOW);

        assert!(debouncer.accept("A1", start));
        assert!(!debouncer.accept("A1", start + Duration::from_millis(100)));
        assert!(!debouncer.accept("A1", start + Duration::from_millis(2_499)));
    }

    #[test]
    fn test_duplicate_after_window_is_accepted() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(WINDOW);

        assert!(debouncer.accept("A1", start));
        assert!(debouncer.accept("A1", start + WINDOW));
    }

    #[test]
    fn test_discarded_duplicates_do_not_extend_window() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(WINDOW);

        assert!(debouncer.accept("A1", start));
        assert!(!debouncer.accept("A1", start + Duration::from_millis(2_000)));
        assert!(debouncer.accept("A1", start + Duration::from_millis(2_600)));
    }

    #[test]
    fn test_different_code_resets_reference() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(WINDOW);

        assert!(debouncer.accept("A1", start));
        assert!(debouncer.accept("B2", start + Duration::from_millis(10)));
        assert!(debouncer.accept("A1", start + Duration::from_millis(20)));
    }

    #[test]
    fn test_reset() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(WINDOW);

        assert!(debouncer.accept("A1", start));
        debouncer.reset();
        assert!(debouncer.accept("A1", start));
    }
}
