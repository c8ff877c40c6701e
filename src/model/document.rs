//! Whole-document aggregate passed between pipeline stages.

use crate::model::block::BlockType;
use crate::model::page::PageStructure;
use serde::{Deserialize, Serialize};

/// Dublin Core style document metadata for the package document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Document title
    pub title: String,
    /// Author / creator
    pub author: Option<String>,
    /// BCP-47 language tag
    pub language: String,
    /// Publisher
    pub publisher: Option<String>,
    /// Unique identifier (urn:uuid by default)
    pub identifier: String,
}

impl DocumentMetadata {
    /// Metadata with a fresh identifier and the given title.
    pub fn with_title(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            author: None,
            language: "en".to_string(),
            publisher: None,
            identifier: format!("urn:uuid:{}", uuid::Uuid::new_v4()),
        }
    }
}

/// Entry in the generated table of contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TocEntry {
    /// Heading text
    pub title: String,
    /// One-based page number the entry points to
    pub page_number: u32,
    /// Heading level 1..=6
    pub level: u8,
    /// Element id of the heading block on that page
    pub block_id: String,
}

/// A cross-document reference to a typed block (equations, tables, notable
/// semantic content collected during the special-content stage).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticBlock {
    /// Page the block lives on
    pub page_number: u32,
    /// The block's stable id
    pub block_id: String,
    /// Its semantic classification
    pub block_type: BlockType,
}

/// The whole-document aggregate.
///
/// One conversion job owns exactly one of these. Each pipeline stage takes
/// the current value and returns a replacement; the orchestrator persists a
/// snapshot of the returned value before invoking the next stage, so partial
/// progress stays inspectable even when a later stage fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentStructure {
    /// Package metadata
    pub metadata: DocumentMetadata,
    /// All pages in source order
    pub pages: Vec<PageStructure>,
    /// Detected equation blocks
    pub equations: Vec<SemanticBlock>,
    /// Detected table blocks
    pub tables: Vec<SemanticBlock>,
    /// All classified non-paragraph content of interest
    pub semantic_blocks: Vec<SemanticBlock>,
    /// Generated table of contents
    pub table_of_contents: Vec<TocEntry>,
}

impl DocumentStructure {
    /// An empty document with the given metadata.
    pub fn new(metadata: DocumentMetadata) -> Self {
        Self {
            metadata,
            pages: Vec::new(),
            equations: Vec::new(),
            tables: Vec::new(),
            semantic_blocks: Vec::new(),
            table_of_contents: Vec::new(),
        }
    }

    /// Look up a page by one-based number.
    pub fn page(&self, page_number: u32) -> Option<&PageStructure> {
        self.pages.iter().find(|p| p.page_number == page_number)
    }

    /// All confidence signals recorded anywhere in the document: per-page OCR
    /// confidences and per-block confidences.
    pub fn confidence_signals(&self) -> Vec<f32> {
        let mut signals = Vec::new();
        for page in &self.pages {
            if let Some(c) = page.ocr_confidence {
                signals.push(c);
            }
            for block in &page.text_blocks {
                if let Some(c) = block.confidence {
                    signals.push(c);
                }
            }
        }
        signals
    }
}
