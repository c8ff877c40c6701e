//! OCR fallback policy.
//!
//! OCR runs per scanned page and is abandoned for the rest of the job after
//! three consecutive failures: a document with a stretch of bad scans still
//! produces a degraded-but-complete archive (image-only fixed layout for
//! the untranscribed pages) instead of failing outright.

/// Consecutive failures after which OCR is abandoned for the job.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 3;

/// Tracks OCR health across one job's scanned pages.
#[derive(Debug, Default)]
pub struct OcrGate {
    consecutive_failures: u32,
    abandoned: bool,
}

impl OcrGate {
    /// Fresh gate at the start of a job.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether OCR should still be attempted for the next scanned page.
    pub fn should_attempt(&self) -> bool {
        !self.abandoned
    }

    /// Record a successful recognition; resets the failure streak.
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    /// Record a failed recognition (an engine error, or a result with zero
    /// confidence and no text).
    pub fn record_failure(&mut self, page_number: u32) {
        self.consecutive_failures += 1;
        log::debug!(
            "OCR failure on page {} ({} consecutive)",
            page_number,
            self.consecutive_failures
        );
        if self.consecutive_failures >= MAX_CONSECUTIVE_FAILURES && !self.abandoned {
            self.abandoned = true;
            log::warn!(
                "abandoning OCR after {} consecutive failures; remaining scanned \
                 pages keep fallback text",
                self.consecutive_failures
            );
        }
    }

    /// Whether OCR has been abandoned for the job.
    pub fn is_abandoned(&self) -> bool {
        self.abandoned
    }
}
