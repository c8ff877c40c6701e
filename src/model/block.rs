//! Text runs and logical text blocks.

use crate::geometry::BoundingBox;
use serde::{Deserialize, Serialize};

/// One fragment of positioned text as produced by the source-page decoder.
///
/// Coordinates are in page units with the origin at the bottom-left corner
/// and Y increasing upward. Runs are immutable inputs; the clusterer never
/// modifies them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionedRun {
    /// The text of the fragment
    pub text: String,
    /// X coordinate of the left edge
    pub x: f32,
    /// Y coordinate of the bottom edge
    pub y: f32,
    /// Width of the fragment
    pub width: f32,
    /// Height of the fragment
    pub height: f32,
    /// Font name as reported by the decoder
    pub font_name: String,
    /// Font size in points
    pub font_size: f32,
    /// Whether the run uses a bold face
    pub bold: bool,
    /// Whether the run uses an italic face
    pub italic: bool,
}

/// Semantic classification of a text block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockType {
    /// Regular body text
    Paragraph,
    /// Heading at some level (see [`TextBlock::heading_level`])
    Heading,
    /// Bulleted, numbered or lettered list entry
    ListItem,
    /// Figure or table caption
    Caption,
    /// "Term: definition" entry
    GlossaryTerm,
    /// Running header (top page band)
    Header,
    /// Running footer or folio (bottom page band)
    Footer,
    /// Footnote body; excluded from the read-aloud layer
    Footnote,
    /// Sidebar / pull-out box; excluded from the read-aloud layer
    Sidebar,
}

impl BlockType {
    /// Short lowercase slug used inside element identifiers.
    pub fn slug(&self) -> &'static str {
        match self {
            BlockType::Paragraph => "para",
            BlockType::Heading => "head",
            BlockType::ListItem => "list",
            BlockType::Caption => "capt",
            BlockType::GlossaryTerm => "gloss",
            BlockType::Header => "hdr",
            BlockType::Footer => "ftr",
            BlockType::Footnote => "note",
            BlockType::Sidebar => "side",
        }
    }

    /// Whether blocks of this type are spoken by the read-aloud layer.
    pub fn is_spoken(&self) -> bool {
        !matches!(self, BlockType::Footnote | BlockType::Sidebar)
    }
}

/// A logical unit of page content.
///
/// `id` is assigned once, after reading order and classification are final,
/// by the single deterministic id function in `epub::ids`. It is referenced
/// by synchronization documents and must never change afterwards. Blocks are
/// owned by the page that contains them and are never reparented.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    /// Stable, URL-fragment-safe identifier. Empty until assigned.
    pub id: String,
    /// The block's text content
    pub text: String,
    /// Semantic classification
    pub block_type: BlockType,
    /// Heading level 1..=6 when classified with one
    pub heading_level: Option<u8>,
    /// Position in the page's reading sequence, 1..=N. Zero for blocks
    /// excluded from the reading flow (headers/footers).
    pub reading_order: u32,
    /// Geometric extent; `None` when the block came from a positionless
    /// source (OCR plain text, paragraph fallback without estimates).
    pub bounding_box: Option<BoundingBox>,
    /// Recognition confidence, when one was recorded for this block
    pub confidence: Option<f32>,
    /// Excluded from reading-order numbering and the read-aloud flow
    pub exclude_from_reading_order: bool,
    /// Whitespace-delimited words of `text`
    pub words: Vec<String>,
    /// Sentence splits of `text`
    pub sentences: Vec<String>,
    /// Phrase splits (comma/semicolon level) of `text`
    pub phrases: Vec<String>,
}

impl TextBlock {
    /// Create an unclassified paragraph block from text and an optional box.
    pub fn new(text: impl Into<String>, bounding_box: Option<BoundingBox>) -> Self {
        let text = text.into();
        let mut block = Self {
            id: String::new(),
            text,
            block_type: BlockType::Paragraph,
            heading_level: None,
            reading_order: 0,
            bounding_box,
            confidence: None,
            exclude_from_reading_order: false,
            words: Vec::new(),
            sentences: Vec::new(),
            phrases: Vec::new(),
        };
        block.resegment();
        block
    }

    /// Recompute `words`, `sentences` and `phrases` from `text`.
    ///
    /// This is deliberately simple splitting; locale-aware segmentation is a
    /// collaborator concern and plugs in at the cleanup stage.
    pub fn resegment(&mut self) {
        self.words = self.text.split_whitespace().map(str::to_string).collect();
        self.sentences = split_on(&self.text, &['.', '!', '?']);
        self.phrases = split_on(&self.text, &['.', '!', '?', ',', ';', ':']);
    }

    /// Heading level with the documented default of 1 for headings that the
    /// classifier recognized without assigning a level.
    pub fn effective_heading_level(&self) -> u8 {
        self.heading_level.unwrap_or(1).clamp(1, 6)
    }
}

fn split_on(text: &str, terminators: &[char]) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        current.push(ch);
        if terminators.contains(&ch) {
            let trimmed = current.trim();
            if !trimmed.is_empty() {
                out.push(trimmed.to_string());
            }
            current.clear();
        }
    }
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
    out
}
