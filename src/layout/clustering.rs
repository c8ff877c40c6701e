//! Proximity clustering of positioned text runs into logical blocks.
//!
//! Runs arrive from the page decoder unordered. Clustering sorts them into
//! visual order and sweeps them into groups using thresholds derived from
//! the page's mean run height, so the same thresholds adapt to dense
//! footnote pages and large-print children's books alike.
//!
//! When clustering loses too much of the page text (under half of the flat
//! text length), the whole result is discarded in favor of a paragraph
//! splitting fallback over the raw text, which guarantees that no page ends
//! up empty of blocks if extraction found anything at all.

use crate::geometry::BoundingBox;
use crate::model::{PositionedRun, TextBlock};

/// Default line height when a page has too few runs to measure one.
const DEFAULT_LINE_HEIGHT: f32 = 12.0;

/// Page margin assumed when synthesizing fallback bounding boxes.
const FALLBACK_MARGIN: f32 = 72.0;

/// Line height used for synthetic fallback boxes.
const FALLBACK_LINE_HEIGHT: f32 = 16.0;

/// Thresholds derived from one page's typography.
#[derive(Debug, Clone, Copy)]
struct Thresholds {
    /// Maximum vertical distance for two runs to share a block
    vertical: f32,
    /// Maximum vertical distance for two runs to share a line
    max_line_gap: f32,
    /// Maximum horizontal gap within a line
    horizontal: f32,
}

impl Thresholds {
    fn from_runs(runs: &[PositionedRun]) -> Self {
        let line_height = if runs.len() < 2 {
            DEFAULT_LINE_HEIGHT
        } else {
            runs.iter().map(|r| r.height).sum::<f32>() / runs.len() as f32
        };
        Self {
            vertical: 2.0 * line_height,
            max_line_gap: 0.8 * line_height,
            horizontal: (3.0 * line_height).max(50.0),
        }
    }
}

/// Cluster one page's positioned runs into logical text blocks.
///
/// Runs are sorted by descending Y (top of page first) then ascending X;
/// the sweep keeps a current group and decides for each run whether it
/// continues the group's current line, starts a new line within the group,
/// or opens a new group. The sort is stable and all comparisons are total,
/// so identical input always produces identical block boundaries.
///
/// # Examples
///
/// ```
/// use readalong::layout::clustering::cluster_page;
/// use readalong::model::PositionedRun;
///
/// let run = |text: &str, x: f32, y: f32| PositionedRun {
///     text: text.into(),
///     x,
///     y,
///     width: text.len() as f32 * 6.0,
///     height: 12.0,
///     font_name: "Times".into(),
///     font_size: 12.0,
///     bold: false,
///     italic: false,
/// };
///
/// // Two runs on one line, one run far below: two blocks.
/// let runs = vec![run("Hello", 72.0, 700.0), run("world", 110.0, 700.0), run("Footer", 72.0, 100.0)];
/// let blocks = cluster_page(&runs, 1, 612.0, 792.0);
/// assert_eq!(blocks.len(), 2);
/// assert_eq!(blocks[0].text, "Hello world");
/// ```
pub fn cluster_page(
    runs: &[PositionedRun],
    page_number: u32,
    page_width: f32,
    page_height: f32,
) -> Vec<TextBlock> {
    if runs.is_empty() {
        return Vec::new();
    }

    let thresholds = Thresholds::from_runs(runs);

    let mut sorted: Vec<&PositionedRun> = runs.iter().collect();
    sorted.sort_by(|a, b| b.y.total_cmp(&a.y).then_with(|| a.x.total_cmp(&b.x)));

    let mut blocks: Vec<TextBlock> = Vec::new();
    let mut group = GroupBuilder::new(page_number);

    for run in &sorted {
        if !group.try_join(run, &thresholds, page_width) {
            if let Some(block) = group.finish() {
                blocks.push(block);
            }
            group = GroupBuilder::new(page_number);
            let joined = group.try_join(run, &thresholds, page_width);
            debug_assert!(joined, "a fresh group accepts any run");
        }
    }
    if let Some(block) = group.finish() {
        blocks.push(block);
    }

    // Silent-drop guard: if the clustered text covers less than half the
    // page's flat text, discard the clustering and fall back to paragraph
    // splitting over the raw text.
    let flat = flat_text(&sorted, &thresholds);
    let flat_len = glyph_count(&flat);
    let clustered_len: usize = blocks.iter().map(|b| glyph_count(&b.text)).sum();
    if flat_len > 0 && clustered_len * 2 < flat_len {
        log::warn!(
            "page {}: clustering kept {}/{} glyphs, using paragraph fallback",
            page_number,
            clustered_len,
            flat_len
        );
        return fallback_blocks(&flat, page_number, page_width, page_height);
    }

    blocks
}

/// Split raw page text into paragraph blocks with synthetic bounding boxes.
///
/// Splits on blank lines when the text has any; otherwise every non-empty
/// line becomes one block. Boxes are estimated top-down at a fixed line
/// height so downstream ordering still works. This is also the entry point
/// for OCR output, which has text but no positions.
pub fn fallback_blocks(
    raw_text: &str,
    page_number: u32,
    page_width: f32,
    page_height: f32,
) -> Vec<TextBlock> {
    let paragraphs: Vec<String> = if raw_text.contains("\n\n") {
        raw_text
            .split("\n\n")
            .map(|p| p.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|p| !p.is_empty())
            .collect()
    } else {
        raw_text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect()
    };

    let width = (page_width - 2.0 * FALLBACK_MARGIN).max(page_width * 0.5);
    paragraphs
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            let top = page_height - FALLBACK_MARGIN - i as f32 * FALLBACK_LINE_HEIGHT;
            let bottom = (top - FALLBACK_LINE_HEIGHT).max(0.0);
            let bbox = BoundingBox::new(
                page_number,
                FALLBACK_MARGIN.min(page_width * 0.1),
                bottom,
                width,
                FALLBACK_LINE_HEIGHT,
            );
            TextBlock::new(text, Some(bbox))
        })
        .collect()
}

/// Reconstruct the page's flat text from sorted runs: runs on one line are
/// joined with spaces, lines are separated by newlines.
fn flat_text(sorted: &[&PositionedRun], thresholds: &Thresholds) -> String {
    let mut out = String::new();
    let mut prev: Option<&PositionedRun> = None;
    for run in sorted {
        if let Some(p) = prev {
            if (p.y - run.y).abs() < thresholds.max_line_gap {
                out.push(' ');
            } else {
                out.push('\n');
            }
        }
        out.push_str(run.text.trim_end());
        prev = Some(run);
    }
    out
}

fn glyph_count(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

/// Accumulates one block's member runs during the sweep.
struct GroupBuilder {
    page_number: u32,
    text: String,
    bbox: Option<BoundingBox>,
    min_x: f32,
    prev: Option<(f32, f32)>, // (y, right edge)
}

impl GroupBuilder {
    fn new(page_number: u32) -> Self {
        Self {
            page_number,
            text: String::new(),
            bbox: None,
            min_x: f32::MAX,
            prev: None,
        }
    }

    /// Try to add `run` to this group. Returns false when the run belongs to
    /// a new group.
    fn try_join(&mut self, run: &PositionedRun, t: &Thresholds, page_width: f32) -> bool {
        let run_bbox = BoundingBox::new(self.page_number, run.x, run.y, run.width, run.height);

        match self.prev {
            None => {
                self.push_run(run, run_bbox, false, 0.0);
                true
            },
            Some((prev_y, prev_right)) => {
                let dy = (prev_y - run.y).abs();
                let gap = run.x - prev_right;

                let same_line = dy < t.max_line_gap && gap < t.horizontal;
                let same_block = dy < t.vertical && (run.x - self.min_x).abs() <= 0.9 * page_width;

                if same_line {
                    self.push_run(run, run_bbox, true, gap);
                    true
                } else if same_block {
                    self.push_run(run, run_bbox, false, 0.0);
                    true
                } else {
                    false
                }
            },
        }
    }

    fn push_run(&mut self, run: &PositionedRun, run_bbox: BoundingBox, same_line: bool, gap: f32) {
        if !self.text.is_empty() {
            if same_line {
                // Only a gap wider than half the incoming run's width counts
                // as a word break; smaller gaps are kerning artifacts.
                if gap > run.width / 2.0 {
                    self.text.push(' ');
                }
            } else {
                self.text.push(' ');
            }
        }
        self.text.push_str(run.text.trim_end());
        self.bbox = Some(match self.bbox {
            Some(b) => b.union(&run_bbox),
            None => run_bbox,
        });
        self.min_x = self.min_x.min(run.x);
        self.prev = Some((run.y, run.x + run.width));
    }

    fn finish(self) -> Option<TextBlock> {
        if self.text.trim().is_empty() {
            return None;
        }
        Some(TextBlock::new(self.text, self.bbox))
    }
}
