//! # Readalong
//!
//! Accessible EPUB3 conversion toolkit: rebuilds logical text structure from
//! raw positioned glyph runs and packages the result as a fixed-layout
//! EPUB3 with optional read-aloud media overlays.
//!
//! ## Core Pipeline
//!
//! - **Layout analysis**: proximity clustering of positioned runs into
//!   logical blocks, two-page-spread detection and deterministic reading
//!   order resolution
//! - **Classification**: ordered layout/text heuristics for headings, list
//!   items, glossary terms and running headers/footers, with an optional
//!   external classifier override
//! - **Orchestration**: a nine-stage job state machine with per-stage
//!   progress persistence, structure snapshots, an OCR fallback policy and
//!   cooperative cancellation
//! - **Packaging**: deterministic fixed-layout EPUB3 assembly (package
//!   document, navigation, per-page content documents, stylesheet) with
//!   per-page synchronization documents when narration timing is supplied
//!
//! External collaborators — the page decoder, the OCR engine, the AI text
//! service and the job store — are consumed through the narrow traits in
//! [`services`] and are all optional or replaceable.
//!
//! ## Quick Start
//!
//! ```no_run
//! use readalong::pipeline::{Orchestrator, OrchestratorConfig};
//! use readalong::services::{JsonDumpDecoder, MemoryJobStore, PdfDecoder};
//! use readalong::worker::{ConversionService, DecoderFactory};
//! use readalong::model::ConversionRequest;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> readalong::error::Result<()> {
//! let store = Arc::new(MemoryJobStore::new());
//! let orchestrator = Arc::new(Orchestrator::new(store, OrchestratorConfig::default()));
//! let factory: DecoderFactory = Arc::new(|path| {
//!     Ok(Box::new(JsonDumpDecoder::open(path)?) as Box<dyn PdfDecoder>)
//! });
//! let service = ConversionService::new(orchestrator, factory, 4);
//!
//! let job_id = service.submit(ConversionRequest {
//!     source_path: "book.runs.json".into(),
//!     title: Some("All About Horses".into()),
//!     language: "en".into(),
//!     audio_syncs: Vec::new(),
//!     output_dir: "out".into(),
//! })?;
//!
//! let job = service.status(&job_id)?;
//! println!("{}: {}%", job.status, job.progress_percent);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod geometry;
pub mod model;

pub mod layout;

pub mod epub;
pub mod pipeline;
pub mod services;
pub mod worker;

pub use error::{Error, Outcome, Result};
pub use model::{
    AudioSync, BlockType, ConversionJob, ConversionRequest, DocumentStructure, JobStatus,
    PageStructure, PipelineStep, PositionedRun, TextBlock,
};
pub use pipeline::{CancelToken, Orchestrator, OrchestratorConfig};
pub use worker::ConversionService;
