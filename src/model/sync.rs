//! Audio/text synchronization records.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One piece of narration timing data supplied with a conversion request.
///
/// With `block_id` present the clip range belongs to that single block.
/// Without it the range covers the whole page and is distributed across the
/// page's blocks proportionally at packaging time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSync {
    /// One-based page number the audio narrates
    pub page_number: u32,
    /// Target block id; `None` means page-level sync
    pub block_id: Option<String>,
    /// Clip start in seconds from the beginning of the audio file
    pub start_time: f64,
    /// Clip end in seconds
    pub end_time: f64,
    /// Audio file the clip range refers to
    pub audio_file_path: PathBuf,
}

impl AudioSync {
    /// Clip duration in seconds.
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// Format a time offset in seconds as `HH:MM:SS.mmm`, the clock-value form
/// used by synchronization documents.
///
/// # Examples
///
/// ```
/// use readalong::model::format_clock;
///
/// assert_eq!(format_clock(0.0), "00:00:00.000");
/// assert_eq!(format_clock(3723.25), "01:02:03.250");
/// ```
pub fn format_clock(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_secs = total_ms / 1000;
    let s = total_secs % 60;
    let m = (total_secs / 60) % 60;
    let h = total_secs / 3600;
    format!("{:02}:{:02}:{:02}.{:03}", h, m, s, ms)
}
