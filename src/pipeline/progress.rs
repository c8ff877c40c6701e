//! Append-only progress events and the job-state reducer.
//!
//! Stage progress is recorded as an event appended to the job's log, each
//! committed independently of the job's eventual outcome, so a status
//! poller (or a crash investigator) always sees how far a job got. The
//! materialized job view is just a fold of the event log over the stored
//! record; there is no second write path for progress.

use crate::model::{ConversionJob, JobStatus, PipelineStep};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One progress observation for a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Job the event belongs to
    pub job_id: String,
    /// Stage the job entered
    pub step: PipelineStep,
    /// Progress 0..=100 at that transition
    pub progress_percent: u8,
    /// When the transition happened
    pub at: DateTime<Utc>,
}

impl ProgressEvent {
    /// Event for entering `step` now.
    pub fn entered(job_id: &str, step: PipelineStep) -> Self {
        Self {
            job_id: job_id.to_string(),
            step,
            progress_percent: step.entry_progress(),
            at: Utc::now(),
        }
    }
}

/// Fold progress events into the job record.
///
/// Events only ever advance `current_step`/`progress_percent`; they never
/// touch status or terminal fields, so reducing over a terminal job is a
/// no-op for its outcome. Events are applied in order; the last one wins.
pub fn apply_events(mut job: ConversionJob, events: &[ProgressEvent]) -> ConversionJob {
    for event in events {
        if event.job_id != job.id {
            continue;
        }
        // A terminal job's final numbers stand; stale events cannot regress
        // a completed job back below 100%.
        if job.status == JobStatus::Completed {
            continue;
        }
        job.current_step = event.step;
        job.progress_percent = event.progress_percent;
    }
    job
}
