//! Error types for the conversion toolkit.
//!
//! Only two error kinds are fatal to a conversion job by design: a source
//! document that cannot be decoded, and a packaging failure. Everything else
//! degrades to a lower-confidence but complete result.

/// Result type alias for conversion operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during document conversion.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Source file unreadable or corrupt. Fatal: the job fails immediately.
    #[error("Failed to decode source document: {0}")]
    Decode(String),

    /// Clustering and the paragraph fallback both produced no blocks for a
    /// page. Non-fatal: the page proceeds with zero blocks.
    #[error("Text extraction produced no blocks for page {page}: {reason}")]
    Extraction {
        /// One-based page number
        page: u32,
        /// Reason extraction came up empty
        reason: String,
    },

    /// OCR failure for one page. Soft: counted toward the consecutive-failure
    /// threshold, never job-fatal by itself.
    #[error("OCR failed on page {page}: {reason}")]
    Ocr {
        /// One-based page number
        page: u32,
        /// Engine failure description
        reason: String,
    },

    /// External classifier failure. Soft: the heuristic result is retained.
    #[error("Classification service error: {0}")]
    Classification(String),

    /// Archive assembly failure. Fatal: the partial archive is discarded.
    #[error("EPUB packaging failed: {0}")]
    Packaging(String),

    /// Progress or snapshot write failure. Logged, never interrupts the job.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Job not found in the store.
    #[error("Unknown job: {0}")]
    UnknownJob(String),

    /// Job is in a terminal state and cannot be modified.
    #[error("Job {id} is already {status}")]
    TerminalState {
        /// Job identifier
        id: String,
        /// Terminal status name
        status: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error (snapshots, run dumps)
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error must terminate the whole conversion job.
    ///
    /// Per the error-handling design, only decode and packaging errors are
    /// job-fatal; the rest are soft and callers degrade around them.
    pub fn is_job_fatal(&self) -> bool {
        matches!(self, Error::Decode(_) | Error::Packaging(_))
    }
}

/// Outcome of a call into a rate-limited or unreliable external service.
///
/// Soft failures are first-class values rather than exceptions so callers are
/// forced to handle the degraded path explicitly. `Soft` carries a reason for
/// the log line; `Fatal` wraps an [`Error`] that must propagate.
#[derive(Debug)]
pub enum Outcome<T> {
    /// The service answered.
    Ok(T),
    /// The service was unavailable, rejected, timed out, or declined to
    /// answer. The caller continues without the enhancement.
    Soft(String),
    /// A hard error that must propagate to the caller.
    Fatal(Error),
}

impl<T> Outcome<T> {
    /// Map `Ok` through `f`, passing `Soft` and `Fatal` unchanged.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Outcome::Ok(v) => Outcome::Ok(f(v)),
            Outcome::Soft(reason) => Outcome::Soft(reason),
            Outcome::Fatal(e) => Outcome::Fatal(e),
        }
    }

    /// Convert to `Option`, logging soft failures at debug level and
    /// propagating fatal ones.
    pub fn into_soft_option(self) -> Result<Option<T>> {
        match self {
            Outcome::Ok(v) => Ok(Some(v)),
            Outcome::Soft(reason) => {
                log::debug!("external service skipped: {}", reason);
                Ok(None)
            },
            Outcome::Fatal(e) => Err(e),
        }
    }
}
