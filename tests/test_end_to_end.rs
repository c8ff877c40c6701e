//! End-to-end conversion of a small digital document.

use readalong::error::Result;
use readalong::model::{AudioSync, ConversionRequest, PositionedRun};
use readalong::pipeline::{Orchestrator, OrchestratorConfig};
use readalong::services::{JobStore, MemoryJobStore, PdfDecoder};
use readalong::worker::{ConversionService, DecoderFactory};
use readalong::JobStatus;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

struct MockPage {
    width: f32,
    height: f32,
    runs: Vec<PositionedRun>,
}

struct MockDecoder {
    pages: Vec<MockPage>,
}

impl PdfDecoder for MockDecoder {
    fn page_count(&self) -> Result<u32> {
        Ok(self.pages.len() as u32)
    }

    fn page_dimensions(&self, page_number: u32) -> Result<(f32, f32)> {
        let page = &self.pages[(page_number - 1) as usize];
        Ok((page.width, page.height))
    }

    fn positioned_runs(&self, page_number: u32) -> Result<Vec<PositionedRun>> {
        Ok(self.pages[(page_number - 1) as usize].runs.clone())
    }

    fn render_page_image(&self, _page_number: u32, _dpi: u32) -> Result<Vec<u8>> {
        let canvas = image::RgbaImage::from_pixel(100, 130, image::Rgba([255, 255, 255, 255]));
        let mut bytes = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(canvas)
            .write_to(&mut bytes, image::ImageOutputFormat::Png)
            .expect("png encode");
        Ok(bytes.into_inner())
    }
}

fn run(text: &str, x: f32, y: f32, height: f32) -> PositionedRun {
    PositionedRun {
        text: text.to_string(),
        x,
        y,
        width: text.len() as f32 * 6.0,
        height,
        font_name: "Times".to_string(),
        font_size: height,
        bold: false,
        italic: false,
    }
}

/// Page 1: an all-caps title and a paragraph. Page 2: a three-item list.
fn horse_book() -> MockDecoder {
    MockDecoder {
        pages: vec![
            MockPage {
                width: 612.0,
                height: 792.0,
                runs: vec![
                    run("ALL ABOUT HORSES", 180.0, 700.0, 20.0),
                    run("Horses are gentle animals.", 72.0, 600.0, 12.0),
                    run("They live in open fields.", 72.0, 586.0, 12.0),
                ],
            },
            MockPage {
                width: 612.0,
                height: 792.0,
                runs: vec![
                    run("• Hay", 72.0, 700.0, 12.0),
                    run("• Oats", 72.0, 650.0, 12.0),
                    run("• Grass", 72.0, 600.0, 12.0),
                ],
            },
        ],
    }
}

fn service_for(
    decoder_pages: fn() -> MockDecoder,
    work_dir: PathBuf,
) -> (ConversionService, Arc<MemoryJobStore>) {
    let store = Arc::new(MemoryJobStore::new());
    let config = OrchestratorConfig {
        work_dir,
        ..OrchestratorConfig::default()
    };
    let orchestrator = Arc::new(Orchestrator::new(store.clone(), config));
    let factory: DecoderFactory =
        Arc::new(move |_path| Ok(Box::new(decoder_pages()) as Box<dyn PdfDecoder>));
    (ConversionService::new(orchestrator, factory, 2), store)
}

fn read_entry(zip: &mut zip::ZipArchive<std::fs::File>, name: &str) -> String {
    let mut out = String::new();
    zip.by_name(name)
        .unwrap_or_else(|_| panic!("missing entry {}", name))
        .read_to_string(&mut out)
        .unwrap();
    out
}

#[tokio::test]
async fn test_two_page_digital_conversion() {
    let dir = tempfile::tempdir().unwrap();
    let (service, store) = service_for(horse_book, dir.path().join("work"));

    let audio_path = dir.path().join("narration.mp3");
    std::fs::write(&audio_path, b"mp3-bytes").unwrap();

    let job_id = service
        .submit(ConversionRequest {
            source_path: PathBuf::from("horses.pdf"),
            title: Some("All About Horses".to_string()),
            language: "en".to_string(),
            audio_syncs: vec![AudioSync {
                page_number: 1,
                block_id: None,
                start_time: 0.0,
                end_time: 10.0,
                audio_file_path: audio_path,
            }],
            output_dir: dir.path().join("out"),
        })
        .unwrap();
    service.wait(&job_id).await;

    let job = service.status(&job_id).unwrap();
    assert_eq!(job.status, JobStatus::Completed, "{:?}", job.error_message);
    assert_eq!(job.progress_percent, 100);
    // No confidence signals on a digital document: default score, no review.
    assert!((job.confidence_score.unwrap() - 0.8).abs() < 1e-6);
    assert!(!job.requires_review);

    let epub_path = service.archive_path(&job_id).unwrap().unwrap();
    let mut zip = zip::ZipArchive::new(std::fs::File::open(&epub_path).unwrap()).unwrap();

    // One content document per source page.
    let names: Vec<String> = (0..zip.len())
        .map(|i| zip.by_index(i).unwrap().name().to_string())
        .collect();
    assert!(names.contains(&"OEBPS/page_0001.xhtml".to_string()));
    assert!(names.contains(&"OEBPS/page_0002.xhtml".to_string()));
    assert!(!names.contains(&"OEBPS/page_0003.xhtml".to_string()));

    // Page 1: the title classified as a level-1 heading, paragraph follows.
    let page1 = read_entry(&mut zip, "OEBPS/page_0001.xhtml");
    assert!(page1.contains("<h1 id=\"p0001_head_001\">ALL ABOUT HORSES</h1>"));
    assert!(page1.contains("Horses are gentle animals. They live in open fields."));

    // Page 2: exactly three list items, in original list order.
    let page2 = read_entry(&mut zip, "OEBPS/page_0002.xhtml");
    assert_eq!(page2.matches("<li ").count(), 3);
    let hay = page2.find("• Hay").unwrap();
    let oats = page2.find("• Oats").unwrap();
    let grass = page2.find("• Grass").unwrap();
    assert!(hay < oats && oats < grass);
    assert!(page2.contains("id=\"p0002_list_001_li\""));

    // The page-level sync split across page 1's two blocks, summing to 10s.
    let smil = read_entry(&mut zip, "OEBPS/smil/page_0001.smil");
    assert_eq!(smil.matches("<par ").count(), 2);
    assert!(smil.contains("clipBegin=\"00:00:00.000\""));
    assert!(smil.contains("clipEnd=\"00:00:10.000\""));

    // Identifier consistency: every SMIL text anchor resolves in the page.
    for anchor in smil
        .split("page_0001.xhtml#")
        .skip(1)
        .map(|rest| rest.split('"').next().unwrap())
    {
        assert!(
            page1.contains(&format!("id=\"{}\"", anchor)),
            "anchor {} missing from content document",
            anchor
        );
    }

    // The package document links the overlay and declares fixed layout.
    let opf = read_entry(&mut zip, "OEBPS/content.opf");
    assert!(opf.contains("pre-paginated"));
    assert!(opf.contains("media-overlay=\"smil0001\""));
    assert!(opf.contains("idref=\"page0001\""));

    // Progress events were appended for all nine stages, in ladder order.
    let events = store.events_for(&job_id);
    assert_eq!(events.len(), 9);
    assert!(events
        .windows(2)
        .all(|pair| pair[0].step.index() < pair[1].step.index()));

    // A snapshot of the final structure is persisted and parseable.
    let snapshot = store.snapshot_json(&job_id).unwrap();
    let doc: readalong::DocumentStructure = serde_json::from_str(&snapshot).unwrap();
    assert_eq!(doc.pages.len(), 2);
    assert_eq!(doc.table_of_contents.len(), 1);
    assert_eq!(doc.table_of_contents[0].title, "ALL ABOUT HORSES");
}

#[tokio::test]
async fn test_cancellation_before_first_stage() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryJobStore::new());
    let orchestrator = Orchestrator::new(
        store.clone(),
        OrchestratorConfig {
            work_dir: dir.path().to_path_buf(),
            ..OrchestratorConfig::default()
        },
    );

    let job = readalong::ConversionJob::new();
    store.save(&job).unwrap();

    let cancel = readalong::CancelToken::new();
    cancel.cancel();

    let request = ConversionRequest {
        source_path: PathBuf::from("horses.pdf"),
        title: None,
        language: "en".to_string(),
        audio_syncs: Vec::new(),
        output_dir: dir.path().join("out"),
    };
    let decoder = horse_book();
    orchestrator.run_job(&job.id, &request, &decoder, &cancel).await;

    let job = store.load(&job.id).unwrap();
    assert_eq!(job.status, JobStatus::Cancelled);
    assert!(job.epub_path.is_none());
    assert!(job.completed_at.is_some());
}
