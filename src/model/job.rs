//! Conversion job records and the stage ladder.

use crate::error::{Error, Result};
use crate::model::sync::AudioSync;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Lifecycle status of a conversion job.
///
/// `Completed`, `Failed` and `Cancelled` are terminal: once reached, no
/// further writes to the job are permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Accepted, not yet picked up by a worker
    Pending,
    /// A worker is driving the stage ladder
    InProgress,
    /// Finished successfully; `epub_path` is set
    Completed,
    /// Terminated by an error; `error_message` is set
    Failed,
    /// Terminated by explicit external request
    Cancelled,
}

impl JobStatus {
    /// Whether this status permits no further writes.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobStatus::Pending => "PENDING",
            JobStatus::InProgress => "IN_PROGRESS",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::Cancelled => "CANCELLED",
        };
        f.write_str(name)
    }
}

/// The nine ordered pipeline stages.
///
/// Order is load-bearing: the orchestrator runs them strictly in sequence
/// and progress reporting derives from the stage index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStep {
    /// Determine per-page scanned/digital character and seed the structure
    Classification,
    /// Pull positioned runs (or OCR text) and cluster them into blocks
    TextExtraction,
    /// Spread detection and reading-order resolution
    LayoutAnalysis,
    /// Block classification, id assignment, table of contents
    SemanticStructuring,
    /// Alt text and language defaults
    Accessibility,
    /// Text sanitization and re-segmentation
    ContentCleanup,
    /// Equation and table detection
    SpecialContent,
    /// Archive assembly
    EpubGeneration,
    /// Confidence scoring and review flag
    QaReview,
}

impl PipelineStep {
    /// All steps in execution order.
    pub const ALL: [PipelineStep; 9] = [
        PipelineStep::Classification,
        PipelineStep::TextExtraction,
        PipelineStep::LayoutAnalysis,
        PipelineStep::SemanticStructuring,
        PipelineStep::Accessibility,
        PipelineStep::ContentCleanup,
        PipelineStep::SpecialContent,
        PipelineStep::EpubGeneration,
        PipelineStep::QaReview,
    ];

    /// Zero-based position in the ladder.
    pub fn index(&self) -> usize {
        Self::ALL.iter().position(|s| s == self).unwrap_or(0)
    }

    /// Progress percentage reported on *entering* this step.
    ///
    /// Completion of the whole ladder reports 100 separately.
    pub fn entry_progress(&self) -> u8 {
        (self.index() * 100 / Self::ALL.len()) as u8
    }
}

/// Request to convert one source document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionRequest {
    /// Path of the source document handed to the decoder
    pub source_path: PathBuf,
    /// Title override; defaults to the source file stem
    pub title: Option<String>,
    /// BCP-47 language for text layers and OCR
    pub language: String,
    /// Narration timing data, when the caller has audio
    pub audio_syncs: Vec<AudioSync>,
    /// Directory receiving the finished archive and working files
    pub output_dir: PathBuf,
}

/// The job record: the only channel between a submitter and the worker
/// driving the conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionJob {
    /// Unique job identifier
    pub id: String,
    /// Lifecycle status
    pub status: JobStatus,
    /// Stage the worker is currently in (or stopped at)
    pub current_step: PipelineStep,
    /// Progress 0..=100, persisted on every stage transition
    pub progress_percent: u8,
    /// Failure description, truncated to 500 characters
    pub error_message: Option<String>,
    /// Path of the finished archive once completed
    pub epub_path: Option<PathBuf>,
    /// Document-wide confidence score computed at QA review
    pub confidence_score: Option<f32>,
    /// Whether the result needs human review
    pub requires_review: bool,
    /// When the job was created
    pub created_at: DateTime<Utc>,
    /// When the job reached a terminal state
    pub completed_at: Option<DateTime<Utc>>,
}

/// Failure messages surface to users and stay bounded.
const MAX_ERROR_LEN: usize = 500;

impl ConversionJob {
    /// A fresh pending job with a random id.
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            status: JobStatus::Pending,
            current_step: PipelineStep::Classification,
            progress_percent: 0,
            error_message: None,
            epub_path: None,
            confidence_score: None,
            requires_review: false,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Guard every mutation behind the terminal-state rule.
    pub fn ensure_writable(&self) -> Result<()> {
        if self.status.is_terminal() {
            return Err(Error::TerminalState {
                id: self.id.clone(),
                status: self.status.to_string(),
            });
        }
        Ok(())
    }

    /// Record a failure: terminal `Failed` status, truncated message.
    pub fn fail(&mut self, message: &str) {
        self.status = JobStatus::Failed;
        let truncated: String = message.chars().take(MAX_ERROR_LEN).collect();
        self.error_message = Some(truncated);
        self.completed_at = Some(Utc::now());
    }

    /// Record successful completion.
    pub fn complete(&mut self, epub_path: PathBuf, confidence: f32, requires_review: bool) {
        self.status = JobStatus::Completed;
        self.progress_percent = 100;
        self.epub_path = Some(epub_path);
        self.confidence_score = Some(confidence);
        self.requires_review = requires_review;
        self.completed_at = Some(Utc::now());
    }

    /// Record cancellation.
    pub fn cancel(&mut self) {
        self.status = JobStatus::Cancelled;
        self.completed_at = Some(Utc::now());
    }
}

impl Default for ConversionJob {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_order_and_index() {
        assert_eq!(PipelineStep::Classification.index(), 0);
        assert_eq!(PipelineStep::TextExtraction.index(), 1);
        assert_eq!(PipelineStep::QaReview.index(), 8);
        assert_eq!(PipelineStep::ALL.len(), 9);
    }

    #[test]
    fn test_entry_progress_monotonic() {
        let mut last = 0;
        for step in PipelineStep::ALL {
            let p = step.entry_progress();
            assert!(p >= last, "{:?} regressed to {}", step, p);
            last = p;
        }
        assert!(last < 100);
    }

    #[test]
    fn test_error_truncation() {
        let mut job = ConversionJob::new();
        let long = "x".repeat(1000);
        job.fail(&long);
        assert_eq!(job.error_message.as_ref().unwrap().len(), 500);
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn test_terminal_states_reject_writes() {
        let mut job = ConversionJob::new();
        assert!(job.ensure_writable().is_ok());
        job.complete(PathBuf::from("out.epub"), 0.9, false);
        assert!(job.ensure_writable().is_err());

        let mut job = ConversionJob::new();
        job.cancel();
        assert!(job.ensure_writable().is_err());
    }

    #[test]
    fn test_completion_sets_hundred_percent() {
        let mut job = ConversionJob::new();
        job.progress_percent = 88;
        job.complete(PathBuf::from("out.epub"), 0.8, false);
        assert_eq!(job.progress_percent, 100);
        assert_eq!(job.confidence_score, Some(0.8));
    }
}
