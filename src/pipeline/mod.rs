//! The conversion pipeline orchestrator.
//!
//! Drives the nine-stage ladder for one job: each stage is a pure
//! `DocumentStructure -> DocumentStructure` transformation (plus collaborator
//! calls where the stage contract allows them), and the orchestrator owns
//! everything around the stages — progress persistence, snapshots, the OCR
//! fallback policy, soft handling of external services, cancellation and
//! terminal failure/success semantics.

pub mod ocr;
pub mod progress;
pub mod stages;

use crate::error::{Error, Outcome, Result};
use crate::layout::{cluster_page, fallback_blocks, resolve_reading_order};
use crate::model::{
    BlockType, ConversionJob, ConversionRequest, DocumentMetadata, DocumentStructure, ImageBlock,
    PageStructure, PipelineStep,
};
use crate::services::{soft_call, AiTextService, JobStore, OcrEngine, PdfDecoder, RateLimiter};
use ocr::OcrGate;
use progress::ProgressEvent;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Cooperative cancellation flag, checked between stages.
///
/// Cancellation never interrupts an in-flight stage; the orchestrator
/// observes the flag at the next stage boundary and stops advancing.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Orchestrator tuning.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// DPI for rendered page images
    pub render_dpi: u32,
    /// Time budget per external-service call
    pub service_timeout: Duration,
    /// Minimum interval between OCR calls
    pub ocr_min_interval: Duration,
    /// Minimum interval between AI service calls
    pub ai_min_interval: Duration,
    /// Root of per-job working directories (images, temp archive builds)
    pub work_dir: PathBuf,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            render_dpi: 150,
            service_timeout: Duration::from_secs(30),
            ocr_min_interval: Duration::from_millis(100),
            ai_min_interval: Duration::from_millis(100),
            work_dir: std::env::temp_dir().join("readalong"),
        }
    }
}

/// How a job run ended (other than with an error).
enum RunOutcome {
    Completed {
        epub_path: PathBuf,
        confidence: f32,
        requires_review: bool,
    },
    Cancelled,
}

/// Mutable per-run state threaded through the stages.
struct RunState {
    gate: OcrGate,
    epub_path: Option<PathBuf>,
    qa: Option<(f32, bool)>,
}

/// Drives conversion jobs through the stage ladder.
pub struct Orchestrator {
    store: Arc<dyn JobStore>,
    ocr: Option<Arc<dyn OcrEngine>>,
    ai: Option<Arc<dyn AiTextService>>,
    ocr_limiter: RateLimiter,
    ai_limiter: RateLimiter,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Orchestrator over a job store, with no optional services attached.
    pub fn new(store: Arc<dyn JobStore>, config: OrchestratorConfig) -> Self {
        let ocr_limiter = RateLimiter::new(config.ocr_min_interval);
        let ai_limiter = RateLimiter::new(config.ai_min_interval);
        Self {
            store,
            ocr: None,
            ai: None,
            ocr_limiter,
            ai_limiter,
            config,
        }
    }

    /// Attach an OCR engine for scanned pages.
    pub fn with_ocr(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.ocr = Some(engine);
        self
    }

    /// Attach the optional AI classification/correction service.
    pub fn with_ai(mut self, service: Arc<dyn AiTextService>) -> Self {
        self.ai = Some(service);
        self
    }

    /// The job store this orchestrator persists through.
    pub fn store(&self) -> Arc<dyn JobStore> {
        Arc::clone(&self.store)
    }

    /// Run one job to a terminal state.
    ///
    /// Never returns an error: failures are recorded on the job (`FAILED`
    /// status, message truncated) and logged. The decoder is already open;
    /// decode failures during the run are job-fatal.
    pub async fn run_job(
        &self,
        job_id: &str,
        request: &ConversionRequest,
        decoder: &dyn PdfDecoder,
        cancel: &CancelToken,
    ) {
        match self.execute(job_id, request, decoder, cancel).await {
            Ok(RunOutcome::Cancelled) => {
                log::info!("job {} cancelled", job_id);
            },
            Ok(RunOutcome::Completed {
                epub_path,
                confidence,
                requires_review,
            }) => match self.store.load(job_id) {
                Ok(mut job) if !job.status.is_terminal() => {
                    job.complete(epub_path, confidence, requires_review);
                    if let Err(e) = self.store.save(&job) {
                        log::warn!("job {}: completion write failed: {}", job_id, e);
                    }
                },
                Ok(_) => {},
                Err(e) => log::warn!("job {}: load at completion failed: {}", job_id, e),
            },
            Err(e) => {
                log::error!("job {} failed: {}", job_id, e);
                if let Ok(mut job) = self.store.load(job_id) {
                    if !job.status.is_terminal() {
                        job.fail(&e.to_string());
                        if let Err(e) = self.store.save(&job) {
                            log::warn!("job {}: failure write failed: {}", job_id, e);
                        }
                    }
                }
            },
        }
    }

    async fn execute(
        &self,
        job_id: &str,
        request: &ConversionRequest,
        decoder: &dyn PdfDecoder,
        cancel: &CancelToken,
    ) -> Result<RunOutcome> {
        let mut job = self.store.load(job_id)?;
        job.ensure_writable()?;
        job.status = crate::model::JobStatus::InProgress;
        self.persist_job(&job);

        let mut state = RunState {
            gate: OcrGate::new(),
            epub_path: None,
            qa: None,
        };
        let mut doc = DocumentStructure::new(DocumentMetadata::with_title(""));

        for step in PipelineStep::ALL {
            if cancel.is_cancelled() {
                job.cancel();
                self.persist_job(&job);
                return Ok(RunOutcome::Cancelled);
            }

            self.record_progress(&mut job, step);
            doc = self
                .run_stage(step, doc, job_id, request, decoder, &mut state)
                .await?;
            if let Err(e) = self.store.save_snapshot(job_id, &doc) {
                // A failed snapshot write never interrupts the pipeline.
                log::warn!("job {}: snapshot after {:?} failed: {}", job_id, step, e);
            }
        }

        let epub_path = state
            .epub_path
            .ok_or_else(|| Error::Packaging("no archive produced".to_string()))?;
        let (confidence, requires_review) =
            state.qa.unwrap_or_else(|| stages::qa_confidence(&doc));
        Ok(RunOutcome::Completed {
            epub_path,
            confidence,
            requires_review,
        })
    }

    async fn run_stage(
        &self,
        step: PipelineStep,
        doc: DocumentStructure,
        job_id: &str,
        request: &ConversionRequest,
        decoder: &dyn PdfDecoder,
        state: &mut RunState,
    ) -> Result<DocumentStructure> {
        match step {
            PipelineStep::Classification => self.classify_document(job_id, request, decoder),
            PipelineStep::TextExtraction => {
                self.extract_text(doc, job_id, request, decoder, state).await
            },
            PipelineStep::LayoutAnalysis => {
                let mut doc = doc;
                for page in &mut doc.pages {
                    resolve_reading_order(page);
                }
                Ok(doc)
            },
            PipelineStep::SemanticStructuring => {
                let doc = stages::classify_blocks(doc);
                let doc = self.apply_external_classification(doc).await?;
                Ok(stages::finalize_semantics(doc))
            },
            PipelineStep::Accessibility => Ok(stages::accessibility_pass(doc)),
            PipelineStep::ContentCleanup => {
                let doc = stages::content_cleanup(doc);
                self.apply_text_correction(doc).await
            },
            PipelineStep::SpecialContent => Ok(stages::special_content(doc)),
            PipelineStep::EpubGeneration => {
                std::fs::create_dir_all(&request.output_dir)?;
                let out = request.output_dir.join(format!("{}.epub", job_id));
                let path = crate::epub::package(&doc, &request.audio_syncs, &out)?;
                state.epub_path = Some(path);
                Ok(doc)
            },
            PipelineStep::QaReview => {
                state.qa = Some(stages::qa_confidence(&doc));
                Ok(doc)
            },
        }
    }

    /// Stage 0: seed the structure and determine each page's character.
    fn classify_document(
        &self,
        job_id: &str,
        request: &ConversionRequest,
        decoder: &dyn PdfDecoder,
    ) -> Result<DocumentStructure> {
        let title = request.title.clone().unwrap_or_else(|| {
            request
                .source_path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "Untitled".to_string())
        });
        // The identifier derives from the job id, keeping the stage
        // deterministic for retries.
        let metadata = DocumentMetadata {
            title,
            author: None,
            language: request.language.clone(),
            publisher: None,
            identifier: format!("urn:uuid:{}", job_id),
        };

        let mut doc = DocumentStructure::new(metadata);
        let page_count = decoder.page_count()?;
        for n in 1..=page_count {
            let (width, height) = decoder.page_dimensions(n)?;
            let mut page = PageStructure::new(n, width, height);
            page.is_scanned = decoder.positioned_runs(n)?.is_empty();
            doc.pages.push(page);
        }
        log::info!(
            "job {}: {} pages ({} scanned)",
            job_id,
            doc.pages.len(),
            doc.pages.iter().filter(|p| p.is_scanned).count()
        );
        Ok(doc)
    }

    /// Stage 1: render page images and build each page's text blocks, via
    /// clustering for digital pages and gated OCR for scanned ones.
    async fn extract_text(
        &self,
        mut doc: DocumentStructure,
        job_id: &str,
        request: &ConversionRequest,
        decoder: &dyn PdfDecoder,
        state: &mut RunState,
    ) -> Result<DocumentStructure> {
        let image_dir = self.config.work_dir.join(job_id).join("image");
        std::fs::create_dir_all(&image_dir)?;

        for page in &mut doc.pages {
            let n = page.page_number;
            let image_bytes = decoder.render_page_image(n, self.config.render_dpi)?;
            let image_path = image_dir.join(format!("page_{:04}.png", n));
            std::fs::write(&image_path, &image_bytes)?;
            page.image_blocks.push(ImageBlock {
                id: format!("img{:04}", n),
                bounding_box: crate::geometry::BoundingBox::new(
                    n, 0.0, 0.0, page.width, page.height,
                ),
                image_path,
                alt_text: String::new(),
            });

            if !page.is_scanned {
                let runs = decoder.positioned_runs(n)?;
                let blocks = cluster_page(&runs, n, page.width, page.height);
                if blocks.is_empty() && !runs.is_empty() {
                    // The page continues with zero blocks; the job does not
                    // stop for one unextractable page.
                    log::error!(
                        "{}",
                        Error::Extraction {
                            page: n,
                            reason: "clustering and fallback produced no blocks".to_string(),
                        }
                    );
                }
                page.text_blocks = blocks;
                continue;
            }

            self.ocr_page(page, &image_bytes, request, state).await?;
        }
        Ok(doc)
    }

    /// OCR one scanned page under the fallback policy. The page keeps its
    /// previous (empty digital-fallback) blocks unless recognition succeeds.
    async fn ocr_page(
        &self,
        page: &mut PageStructure,
        image_bytes: &[u8],
        request: &ConversionRequest,
        state: &mut RunState,
    ) -> Result<()> {
        let Some(engine) = &self.ocr else {
            return Ok(());
        };
        if !state.gate.should_attempt() {
            return Ok(());
        }
        if !self.ocr_limiter.try_acquire() {
            log::debug!("page {}: OCR rate-limited, skipped", page.page_number);
            return Ok(());
        }

        let n = page.page_number;
        let outcome = soft_call(
            "ocr",
            self.config.service_timeout,
            engine.recognize(image_bytes, &request.language),
        )
        .await;

        match outcome {
            Outcome::Ok((text, confidence)) => {
                if text.trim().is_empty() && confidence <= 0.0 {
                    state.gate.record_failure(n);
                } else {
                    state.gate.record_success();
                    page.ocr_confidence = Some(confidence);
                    let mut blocks = fallback_blocks(&text, n, page.width, page.height);
                    for block in &mut blocks {
                        block.confidence = Some(confidence);
                    }
                    page.text_blocks = blocks;
                }
            },
            Outcome::Soft(reason) => {
                log::warn!("page {}: OCR soft failure: {}", n, reason);
                state.gate.record_failure(n);
            },
            Outcome::Fatal(e) => return Err(e),
        }
        Ok(())
    }

    /// Consult the external classifier for each block, overriding the
    /// heuristic result where it has an opinion. Runs between the heuristic
    /// pass and semantics finalization so overrides land before ids are
    /// assigned.
    async fn apply_external_classification(
        &self,
        mut doc: DocumentStructure,
    ) -> Result<DocumentStructure> {
        let Some(ai) = &self.ai else {
            return Ok(doc);
        };
        for page in &mut doc.pages {
            for block in &mut page.text_blocks {
                if !self.ai_limiter.try_acquire() {
                    continue;
                }
                let outcome = soft_call(
                    "classification service",
                    self.config.service_timeout,
                    ai.classify(&block.text),
                )
                .await;
                if let Some(Some(block_type)) = outcome.into_soft_option()? {
                    if block_type != block.block_type {
                        block.block_type = block_type;
                        if block_type != BlockType::Heading {
                            block.heading_level = None;
                        }
                    }
                }
            }
        }
        Ok(doc)
    }

    /// Optional AI text correction after cleanup. Ids never change here;
    /// only block text and its derived segments.
    async fn apply_text_correction(&self, mut doc: DocumentStructure) -> Result<DocumentStructure> {
        let Some(ai) = &self.ai else {
            return Ok(doc);
        };
        let context = doc.metadata.title.clone();
        for page in &mut doc.pages {
            for block in &mut page.text_blocks {
                if block.text.is_empty() || !self.ai_limiter.try_acquire() {
                    continue;
                }
                let outcome = soft_call(
                    "correction service",
                    self.config.service_timeout,
                    ai.correct_text(&block.text, &context),
                )
                .await;
                if let Some(corrected) = outcome.into_soft_option()? {
                    if !corrected.trim().is_empty() && corrected != block.text {
                        block.text = corrected;
                        block.resegment();
                    }
                }
            }
        }
        Ok(doc)
    }

    /// Persist a stage transition: append the progress event and update the
    /// job record. Both writes commit independently of the job's eventual
    /// outcome; failures are logged and never interrupt the pipeline.
    fn record_progress(&self, job: &mut ConversionJob, step: PipelineStep) {
        let event = ProgressEvent::entered(&job.id, step);
        if let Err(e) = self.store.append_progress(&event) {
            log::warn!("job {}: progress event write failed: {}", job.id, e);
        }
        job.current_step = step;
        job.progress_percent = step.entry_progress();
        self.persist_job(job);
    }

    fn persist_job(&self, job: &ConversionJob) {
        if let Err(e) = self.store.save(job) {
            log::warn!("job {}: record write failed: {}", job.id, e);
        }
    }
}
