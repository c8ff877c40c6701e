//! The pure per-stage transformation passes.
//!
//! Every pass takes the document by value and returns a replacement. None of
//! them touch collaborators, counters or clocks, so re-running a pass on the
//! same input always yields the same output and retries are safe.

use crate::epub::ids::assign_block_ids;
use crate::epub::sanitize::clean_text;
use crate::layout::{classify, resolve_reading_order, suppress_headers_footers};
use crate::model::{BlockType, DocumentStructure, SemanticBlock, TocEntry};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Mathematical operators that mark equation-ish text.
    static ref MATH_CHARS: Regex = Regex::new(r"[=+\-×÷±∑∏∫√^≤≥≠]").unwrap();
    /// Column separators that mark table-ish text.
    static ref TABLE_SEPARATOR: Regex = Regex::new(r"\|").unwrap();
}

/// Default confidence when a document records no signals at all.
pub const DEFAULT_CONFIDENCE: f32 = 0.8;

/// Confidence threshold below which the result needs human review.
pub const REVIEW_THRESHOLD: f32 = 0.7;

/// Heuristic classification of every block.
///
/// Runs the ordered heuristic chain over each page's blocks. The external
/// classifier, when enabled, overrides single blocks afterwards; this pass
/// guarantees a fully classified document either way.
pub fn classify_blocks(mut doc: DocumentStructure) -> DocumentStructure {
    for page in &mut doc.pages {
        for block in &mut page.text_blocks {
            let (block_type, heading_level) = classify(&block.text);
            block.block_type = block_type;
            block.heading_level = heading_level;
        }
    }
    doc
}

/// Finalize page semantics: suppress headers/footers, re-resolve reading
/// order around the suppressed blocks, assign the final element ids and
/// derive the table of contents and semantic block index.
///
/// Ids are assigned here exactly once; later passes may rewrite block text
/// but never ids.
pub fn finalize_semantics(mut doc: DocumentStructure) -> DocumentStructure {
    let mut toc = Vec::new();
    let mut semantic = Vec::new();

    for page in &mut doc.pages {
        suppress_headers_footers(page);
        resolve_reading_order(page);
        assign_block_ids(page);

        for block in &page.text_blocks {
            if block.exclude_from_reading_order {
                continue;
            }
            if block.block_type == BlockType::Heading {
                toc.push(TocEntry {
                    title: block.text.clone(),
                    page_number: page.page_number,
                    level: block.effective_heading_level(),
                    block_id: block.id.clone(),
                });
            }
            if block.block_type != BlockType::Paragraph {
                semantic.push(SemanticBlock {
                    page_number: page.page_number,
                    block_id: block.id.clone(),
                    block_type: block.block_type,
                });
            }
        }
    }

    doc.table_of_contents = toc;
    doc.semantic_blocks = semantic;
    doc
}

/// Accessibility pass: default alt text for page images and a language
/// default for the package.
pub fn accessibility_pass(mut doc: DocumentStructure) -> DocumentStructure {
    if doc.metadata.language.trim().is_empty() {
        doc.metadata.language = "en".to_string();
    }
    for page in &mut doc.pages {
        for image in &mut page.image_blocks {
            if image.alt_text.trim().is_empty() {
                image.alt_text = format!("Page {} illustration", page.page_number);
            }
        }
    }
    doc
}

/// Cleanup pass: strip control characters and extraction artifacts from
/// every block and recompute the word/sentence/phrase splits.
pub fn content_cleanup(mut doc: DocumentStructure) -> DocumentStructure {
    for page in &mut doc.pages {
        for block in &mut page.text_blocks {
            let cleaned = clean_text(&block.text);
            if cleaned != block.text {
                block.text = cleaned;
                block.resegment();
            }
        }
    }
    doc
}

/// Special-content pass: index equation-like and table-like blocks.
pub fn special_content(mut doc: DocumentStructure) -> DocumentStructure {
    let mut equations = Vec::new();
    let mut tables = Vec::new();

    for page in &doc.pages {
        for block in &page.text_blocks {
            if block.exclude_from_reading_order || block.id.is_empty() {
                continue;
            }
            if looks_like_equation(&block.text) {
                equations.push(SemanticBlock {
                    page_number: page.page_number,
                    block_id: block.id.clone(),
                    block_type: block.block_type,
                });
            } else if looks_like_table_row(&block.text) {
                tables.push(SemanticBlock {
                    page_number: page.page_number,
                    block_id: block.id.clone(),
                    block_type: block.block_type,
                });
            }
        }
    }

    doc.equations = equations;
    doc.tables = tables;
    doc
}

/// Document-wide confidence and the review flag.
///
/// The score is the mean of every recorded OCR and per-block confidence;
/// a document with no signals defaults to [`DEFAULT_CONFIDENCE`], which is
/// above the review threshold.
pub fn qa_confidence(doc: &DocumentStructure) -> (f32, bool) {
    let signals = doc.confidence_signals();
    let score = if signals.is_empty() {
        DEFAULT_CONFIDENCE
    } else {
        signals.iter().sum::<f32>() / signals.len() as f32
    };
    (score, score < REVIEW_THRESHOLD)
}

fn looks_like_equation(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.len() < 3 || trimmed.len() > 120 {
        return false;
    }
    let math = MATH_CHARS.find_iter(trimmed).count();
    let digits = trimmed.chars().filter(|c| c.is_ascii_digit()).count();
    math >= 1 && (math + digits) * 3 >= trimmed.chars().count()
}

fn looks_like_table_row(text: &str) -> bool {
    TABLE_SEPARATOR.find_iter(text).count() >= 2
}
