//! Convert a positioned-run dump into an accessible EPUB3.
//!
//! Usage: readalong <runs.json> <output-dir> [title]
//!
//! Submits one conversion job, polls its progress until it reaches a
//! terminal state and prints the resulting archive path. The input is the
//! JSON interchange dump produced by upstream decode tooling (see
//! `services::JsonDumpDecoder`); deployments with a live decoder wire their
//! own `DecoderFactory` instead.

use readalong::model::ConversionRequest;
use readalong::pipeline::{Orchestrator, OrchestratorConfig};
use readalong::services::{JsonDumpDecoder, MemoryJobStore, PdfDecoder};
use readalong::worker::{ConversionService, DecoderFactory};
use readalong::JobStatus;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!("usage: readalong <runs.json> <output-dir> [title]");
        std::process::exit(2);
    }
    let source = PathBuf::from(&args[1]);
    let output_dir = PathBuf::from(&args[2]);
    let title = args.get(3).cloned();

    let store = Arc::new(MemoryJobStore::new());
    let orchestrator = Arc::new(Orchestrator::new(store, OrchestratorConfig::default()));
    let factory: DecoderFactory =
        Arc::new(|path| Ok(Box::new(JsonDumpDecoder::open(path)?) as Box<dyn PdfDecoder>));
    let service = ConversionService::new(orchestrator, factory, 2);

    let job_id = match service.submit(ConversionRequest {
        source_path: source,
        title,
        language: "en".to_string(),
        audio_syncs: Vec::new(),
        output_dir,
    }) {
        Ok(id) => id,
        Err(e) => {
            eprintln!("submit failed: {}", e);
            std::process::exit(1);
        },
    };

    let mut last_report = 0u8;
    loop {
        tokio::time::sleep(Duration::from_millis(200)).await;
        let job = match service.status(&job_id) {
            Ok(job) => job,
            Err(e) => {
                eprintln!("status poll failed: {}", e);
                std::process::exit(1);
            },
        };

        if job.progress_percent != last_report {
            last_report = job.progress_percent;
            println!("{:?}: {}%", job.current_step, job.progress_percent);
        }

        match job.status {
            JobStatus::Completed => {
                let path = job.epub_path.expect("completed job has a path");
                println!("done: {}", path.display());
                if job.requires_review {
                    println!(
                        "confidence {:.2} is low; manual review recommended",
                        job.confidence_score.unwrap_or_default()
                    );
                }
                return;
            },
            JobStatus::Failed => {
                eprintln!(
                    "conversion failed: {}",
                    job.error_message.unwrap_or_else(|| "unknown error".into())
                );
                std::process::exit(1);
            },
            JobStatus::Cancelled => {
                eprintln!("conversion cancelled");
                std::process::exit(1);
            },
            JobStatus::Pending | JobStatus::InProgress => {},
        }
    }
}
