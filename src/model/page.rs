//! Per-page structure.

use crate::geometry::BoundingBox;
use crate::model::block::TextBlock;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A non-text block on a page, typically the rendered page image itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageBlock {
    /// Stable identifier within the page
    pub id: String,
    /// Geometric extent on the page
    pub bounding_box: BoundingBox,
    /// Path of the rendered image on disk (job-namespaced directory)
    pub image_path: PathBuf,
    /// Alternative text for assistive technology
    pub alt_text: String,
}

/// Everything known about one source page.
///
/// `text_blocks` keeps insertion order from extraction. Reading order is a
/// derived permutation: `reading_order` holds indices into `text_blocks`,
/// and each block's own `reading_order` field carries its 1-based position.
/// After layout analysis, insertion order must never be used as a substitute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageStructure {
    /// One-based page number
    pub page_number: u32,
    /// Page width in page units
    pub width: f32,
    /// Page height in page units
    pub height: f32,
    /// Whether the page had no digital text and went through OCR
    pub is_scanned: bool,
    /// OCR confidence for the page, when OCR ran
    pub ocr_confidence: Option<f32>,
    /// Text blocks in insertion order
    pub text_blocks: Vec<TextBlock>,
    /// Image blocks (rendered page image, figures)
    pub image_blocks: Vec<ImageBlock>,
    /// Indices into `text_blocks` in reading sequence (excluded blocks absent)
    pub reading_order: Vec<usize>,
    /// Whether this page image contains two facing source pages
    pub is_two_page_spread: bool,
}

impl PageStructure {
    /// Create an empty page of the given dimensions.
    pub fn new(page_number: u32, width: f32, height: f32) -> Self {
        Self {
            page_number,
            width,
            height,
            is_scanned: false,
            ocr_confidence: None,
            text_blocks: Vec::new(),
            image_blocks: Vec::new(),
            reading_order: Vec::new(),
            is_two_page_spread: false,
        }
    }

    /// Iterate blocks in reading sequence.
    ///
    /// Falls back to insertion order only when layout analysis has not run
    /// yet (empty `reading_order` with blocks present).
    pub fn blocks_in_reading_order(&self) -> impl Iterator<Item = &TextBlock> {
        let indices: Vec<usize> = if self.reading_order.is_empty() {
            (0..self.text_blocks.len())
                .filter(|&i| !self.text_blocks[i].exclude_from_reading_order)
                .collect()
        } else {
            self.reading_order.clone()
        };
        indices.into_iter().map(move |i| &self.text_blocks[i])
    }

    /// Blocks participating in the reading flow (not suppressed).
    pub fn content_block_count(&self) -> usize {
        self.text_blocks
            .iter()
            .filter(|b| !b.exclude_from_reading_order)
            .count()
    }

    /// Bounding box of the rendered page image block, if one was attached.
    pub fn page_image(&self) -> Option<&ImageBlock> {
        self.image_blocks.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reading_order_iteration() {
        let mut page = PageStructure::new(1, 612.0, 792.0);
        page.text_blocks.push(TextBlock::new("second", None));
        page.text_blocks.push(TextBlock::new("first", None));
        page.reading_order = vec![1, 0];

        let texts: Vec<&str> = page
            .blocks_in_reading_order()
            .map(|b| b.text.as_str())
            .collect();
        assert_eq!(texts, vec!["first", "second"]);
    }

    #[test]
    fn test_insertion_order_fallback_skips_excluded() {
        let mut page = PageStructure::new(1, 612.0, 792.0);
        page.text_blocks.push(TextBlock::new("body", None));
        let mut footer = TextBlock::new("42", None);
        footer.exclude_from_reading_order = true;
        page.text_blocks.push(footer);

        let texts: Vec<&str> = page
            .blocks_in_reading_order()
            .map(|b| b.text.as_str())
            .collect();
        assert_eq!(texts, vec!["body"]);
        assert_eq!(page.content_block_count(), 1);
    }
}
