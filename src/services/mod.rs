//! Collaborator interfaces consumed by the conversion core.
//!
//! The page decoder, OCR engine, AI text service and job store are external
//! systems; the core consumes them through the narrow traits here and never
//! reaches past them. The OCR and AI services are rate-limited and
//! unreliable by contract: calls go through [`soft_call`], which converts
//! timeouts and soft errors into [`Outcome::Soft`] so callers degrade
//! instead of failing the job.

use crate::error::{Error, Outcome, Result};
use crate::model::{BlockType, ConversionJob, DocumentStructure, PositionedRun};
use crate::pipeline::progress::ProgressEvent;
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Decoder for the paginated source document.
///
/// Page numbers are one-based everywhere in this crate.
pub trait PdfDecoder: Send + Sync {
    /// Number of pages in the document.
    fn page_count(&self) -> Result<u32>;
    /// Page width and height in page units (points).
    fn page_dimensions(&self, page_number: u32) -> Result<(f32, f32)>;
    /// All positioned text runs on a page. Empty for scanned pages.
    fn positioned_runs(&self, page_number: u32) -> Result<Vec<PositionedRun>>;
    /// Render the page to an image (PNG or JPEG bytes) at the given DPI.
    fn render_page_image(&self, page_number: u32, dpi: u32) -> Result<Vec<u8>>;
}

/// Optical character recognition over a rendered page image.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Recognize text in `image`; returns the text and a 0..=1 confidence.
    async fn recognize(&self, image: &[u8], language: &str) -> Result<(String, f32)>;
}

/// Optional AI text correction and classification service.
///
/// Absence or failure of this service is never an error, just a
/// reduced-accuracy path.
#[async_trait]
pub trait AiTextService: Send + Sync {
    /// Return a corrected version of `text`.
    async fn correct_text(&self, text: &str, context: &str) -> Result<String>;
    /// Classify a block's text; `None` means no opinion.
    async fn classify(&self, text: &str) -> Result<Option<BlockType>>;
}

/// The orchestrator's only persistence dependency.
pub trait JobStore: Send + Sync {
    /// Load the materialized view of a job (stored record + progress events).
    fn load(&self, job_id: &str) -> Result<ConversionJob>;
    /// Persist the job record.
    fn save(&self, job: &ConversionJob) -> Result<()>;
    /// Persist a structure snapshot after a stage.
    fn save_snapshot(&self, job_id: &str, structure: &DocumentStructure) -> Result<()>;
    /// Append one progress event; committed independently of `save`.
    fn append_progress(&self, event: &ProgressEvent) -> Result<()>;
}

/// Wrap an external-service call with a time budget and soft-failure
/// semantics.
///
/// Timeouts and non-fatal errors become [`Outcome::Soft`]; only errors that
/// are job-fatal by design pass through as [`Outcome::Fatal`].
pub async fn soft_call<T, F>(what: &str, budget: Duration, call: F) -> Outcome<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(budget, call).await {
        Err(_) => Outcome::Soft(format!("{} timed out after {:?}", what, budget)),
        Ok(Err(e)) if e.is_job_fatal() => Outcome::Fatal(e),
        Ok(Err(e)) => Outcome::Soft(format!("{}: {}", what, e)),
        Ok(Ok(value)) => Outcome::Ok(value),
    }
}

/// Minimum-interval rate limiter for external service calls.
///
/// Rejection is not an error; callers skip the optional enhancement.
pub struct RateLimiter {
    min_interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Limiter allowing one call per `min_interval`.
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: Mutex::new(None),
        }
    }

    /// Try to take a slot now. Returns false when the caller must skip.
    pub fn try_acquire(&self) -> bool {
        let mut last = self.last.lock().expect("rate limiter poisoned");
        let now = Instant::now();
        match *last {
            Some(prev) if now.duration_since(prev) < self.min_interval => false,
            _ => {
                *last = Some(now);
                true
            },
        }
    }
}

/// In-memory job store.
///
/// The default store for tests and the CLI. `load` materializes the job view
/// by folding the progress-event log over the stored record, so progress is
/// visible to pollers even when the job record itself was last saved before
/// the current stage.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: Mutex<HashMap<String, ConversionJob>>,
    events: Mutex<HashMap<String, Vec<ProgressEvent>>>,
    snapshots: Mutex<HashMap<String, String>>,
}

impl MemoryJobStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest persisted snapshot for a job, as JSON.
    pub fn snapshot_json(&self, job_id: &str) -> Option<String> {
        self.snapshots
            .lock()
            .expect("snapshot lock poisoned")
            .get(job_id)
            .cloned()
    }

    /// Progress events recorded for a job, in append order.
    pub fn events_for(&self, job_id: &str) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .expect("event lock poisoned")
            .get(job_id)
            .cloned()
            .unwrap_or_default()
    }
}

impl JobStore for MemoryJobStore {
    fn load(&self, job_id: &str) -> Result<ConversionJob> {
        let job = self
            .jobs
            .lock()
            .expect("job lock poisoned")
            .get(job_id)
            .cloned()
            .ok_or_else(|| Error::UnknownJob(job_id.to_string()))?;
        let events = self.events_for(job_id);
        Ok(crate::pipeline::progress::apply_events(job, &events))
    }

    fn save(&self, job: &ConversionJob) -> Result<()> {
        self.jobs
            .lock()
            .expect("job lock poisoned")
            .insert(job.id.clone(), job.clone());
        Ok(())
    }

    fn save_snapshot(&self, job_id: &str, structure: &DocumentStructure) -> Result<()> {
        let json = serde_json::to_string(structure)?;
        self.snapshots
            .lock()
            .expect("snapshot lock poisoned")
            .insert(job_id.to_string(), json);
        Ok(())
    }

    fn append_progress(&self, event: &ProgressEvent) -> Result<()> {
        self.events
            .lock()
            .expect("event lock poisoned")
            .entry(event.job_id.clone())
            .or_default()
            .push(event.clone());
        Ok(())
    }
}

/// Decoder over a JSON dump of positioned runs.
///
/// Accepts the interchange format produced by upstream decode tooling: one
/// JSON document listing pages with dimensions, runs and an optional
/// pre-rendered image path. Used by the CLI and by end-to-end tests; real
/// deployments implement [`PdfDecoder`] over the actual decoder.
pub struct JsonDumpDecoder {
    pages: Vec<DumpPage>,
    base_dir: PathBuf,
}

#[derive(serde::Deserialize)]
struct DumpPage {
    width: f32,
    height: f32,
    #[serde(default)]
    runs: Vec<PositionedRun>,
    #[serde(default)]
    image: Option<PathBuf>,
}

#[derive(serde::Deserialize)]
struct Dump {
    pages: Vec<DumpPage>,
}

impl JsonDumpDecoder {
    /// Load a dump file; relative image paths resolve against its directory.
    pub fn open(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| Error::Decode(format!("{}: {}", path.display(), e)))?;
        let dump: Dump =
            serde_json::from_str(&data).map_err(|e| Error::Decode(format!("bad dump: {}", e)))?;
        if dump.pages.is_empty() {
            return Err(Error::Decode("dump contains no pages".to_string()));
        }
        Ok(Self {
            pages: dump.pages,
            base_dir: path.parent().unwrap_or(Path::new(".")).to_path_buf(),
        })
    }

    fn page(&self, page_number: u32) -> Result<&DumpPage> {
        self.pages
            .get(page_number.saturating_sub(1) as usize)
            .ok_or_else(|| Error::Decode(format!("no page {}", page_number)))
    }
}

impl PdfDecoder for JsonDumpDecoder {
    fn page_count(&self) -> Result<u32> {
        Ok(self.pages.len() as u32)
    }

    fn page_dimensions(&self, page_number: u32) -> Result<(f32, f32)> {
        let page = self.page(page_number)?;
        Ok((page.width, page.height))
    }

    fn positioned_runs(&self, page_number: u32) -> Result<Vec<PositionedRun>> {
        Ok(self.page(page_number)?.runs.clone())
    }

    fn render_page_image(&self, page_number: u32, dpi: u32) -> Result<Vec<u8>> {
        let page = self.page(page_number)?;
        if let Some(rel) = &page.image {
            let path = self.base_dir.join(rel);
            return std::fs::read(&path)
                .map_err(|e| Error::Decode(format!("{}: {}", path.display(), e)));
        }
        // No pre-rendered image in the dump: synthesize a blank page canvas
        // at the requested resolution.
        let scale = dpi as f32 / 72.0;
        let w = (page.width * scale).round().max(1.0) as u32;
        let h = (page.height * scale).round().max(1.0) as u32;
        let canvas = image::RgbaImage::from_pixel(w, h, image::Rgba([255, 255, 255, 255]));
        let mut bytes = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(canvas)
            .write_to(&mut bytes, image::ImageOutputFormat::Png)
            .map_err(|e| Error::Decode(format!("render: {}", e)))?;
        Ok(bytes.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_rate_limiter_rejects_within_interval() {
        let limiter = RateLimiter::new(Duration::from_secs(60));
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[test]
    fn test_rate_limiter_zero_interval_always_allows() {
        let limiter = RateLimiter::new(Duration::ZERO);
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
    }

    #[tokio::test]
    async fn test_soft_call_timeout_is_soft() {
        let outcome: Outcome<u32> = soft_call("slow service", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(1)
        })
        .await;
        assert!(matches!(outcome, Outcome::Soft(_)));
    }

    #[tokio::test]
    async fn test_soft_call_soft_error() {
        let outcome: Outcome<u32> = soft_call("ocr", Duration::from_secs(1), async {
            Err(Error::Ocr {
                page: 1,
                reason: "blurry".into(),
            })
        })
        .await;
        assert!(matches!(outcome, Outcome::Soft(_)));
    }

    #[tokio::test]
    async fn test_soft_call_fatal_error_passes_through() {
        let outcome: Outcome<u32> = soft_call("packager", Duration::from_secs(1), async {
            Err(Error::Packaging("disk".into()))
        })
        .await;
        assert!(matches!(outcome, Outcome::Fatal(_)));
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryJobStore::new();
        let job = ConversionJob::new();
        store.save(&job).unwrap();
        let loaded = store.load(&job.id).unwrap();
        assert_eq!(loaded.id, job.id);
        assert!(store.load("missing").is_err());
    }

    #[test]
    fn test_memory_store_materializes_progress() {
        use crate::model::PipelineStep;

        let store = MemoryJobStore::new();
        let job = ConversionJob::new();
        store.save(&job).unwrap();
        store
            .append_progress(&ProgressEvent::entered(&job.id, PipelineStep::EpubGeneration))
            .unwrap();

        let view = store.load(&job.id).unwrap();
        assert_eq!(view.current_step, PipelineStep::EpubGeneration);
        assert_eq!(
            view.progress_percent,
            PipelineStep::EpubGeneration.entry_progress()
        );
    }

    #[test]
    fn test_json_dump_decoder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{"pages":[{{"width":612.0,"height":792.0,"runs":[
                {{"text":"Hello","x":72.0,"y":700.0,"width":30.0,"height":12.0,
                  "font_name":"Times","font_size":12.0,"bold":false,"italic":false}}
            ]}}]}}"#
        )
        .unwrap();

        let decoder = JsonDumpDecoder::open(&path).unwrap();
        assert_eq!(decoder.page_count().unwrap(), 1);
        assert_eq!(decoder.page_dimensions(1).unwrap(), (612.0, 792.0));
        assert_eq!(decoder.positioned_runs(1).unwrap().len(), 1);
        // Synthesized canvas is a decodable PNG of the scaled page size.
        let png = decoder.render_page_image(1, 72).unwrap();
        let dims = image::load_from_memory(&png).unwrap();
        assert_eq!(dims.width(), 612);
        assert_eq!(dims.height(), 792);
    }

    #[test]
    fn test_json_dump_decoder_rejects_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.json");
        std::fs::write(&path, r#"{"pages":[]}"#).unwrap();
        assert!(JsonDumpDecoder::open(&path).is_err());
    }
}
