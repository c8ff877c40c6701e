//! Asynchronous job dispatch.
//!
//! Each conversion runs on its own worker task, admitted by a bounded
//! semaphore so a flood of submissions cannot oversubscribe the host.
//! Submission returns immediately with the job id; the job record in the
//! store is the only channel between the submitter and the worker.

use crate::error::{Error, Result};
use crate::model::{ConversionJob, ConversionRequest, JobStatus};
use crate::pipeline::{CancelToken, Orchestrator};
use crate::services::{JobStore, PdfDecoder};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Opens a decoder for a source document.
///
/// Injected so deployments choose their decoder (and tests their fixtures)
/// without the worker knowing anything about source formats.
pub type DecoderFactory = Arc<dyn Fn(&Path) -> Result<Box<dyn PdfDecoder>> + Send + Sync>;

/// The conversion job service: submit, poll, cancel, fetch.
pub struct ConversionService {
    orchestrator: Arc<Orchestrator>,
    store: Arc<dyn JobStore>,
    factory: DecoderFactory,
    semaphore: Arc<Semaphore>,
    cancels: Mutex<HashMap<String, CancelToken>>,
    handles: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl ConversionService {
    /// Service admitting at most `max_concurrent_jobs` workers at once.
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        factory: DecoderFactory,
        max_concurrent_jobs: usize,
    ) -> Self {
        let store = orchestrator.store();
        Self {
            orchestrator,
            store,
            factory,
            semaphore: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
            cancels: Mutex::new(HashMap::new()),
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Enqueue a conversion and return its job id immediately.
    ///
    /// The worker acquires a pool slot, opens the decoder and drives the
    /// orchestrator; every outcome, including a decoder that refuses the
    /// source, lands on the job record.
    pub fn submit(&self, request: ConversionRequest) -> Result<String> {
        let job = ConversionJob::new();
        self.store.save(&job)?;
        let job_id = job.id.clone();

        let token = CancelToken::new();
        self.cancels
            .lock()
            .expect("cancel map poisoned")
            .insert(job_id.clone(), token.clone());

        let orchestrator = Arc::clone(&self.orchestrator);
        let store = Arc::clone(&self.store);
        let factory = Arc::clone(&self.factory);
        let semaphore = Arc::clone(&self.semaphore);
        let id = job_id.clone();

        let handle = tokio::spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };

            let decoder = match (factory)(&request.source_path) {
                Ok(decoder) => decoder,
                Err(e) => {
                    log::error!("job {}: decoder open failed: {}", id, e);
                    if let Ok(mut job) = store.load(&id) {
                        if !job.status.is_terminal() {
                            job.fail(&e.to_string());
                            if let Err(e) = store.save(&job) {
                                log::warn!("job {}: failure write failed: {}", id, e);
                            }
                        }
                    }
                    return;
                },
            };

            orchestrator
                .run_job(&id, &request, decoder.as_ref(), &token)
                .await;
        });

        self.handles
            .lock()
            .expect("handle map poisoned")
            .insert(job_id.clone(), handle);
        Ok(job_id)
    }

    /// Current materialized job view.
    pub fn status(&self, job_id: &str) -> Result<ConversionJob> {
        self.store.load(job_id)
    }

    /// Request cooperative cancellation.
    ///
    /// The flag is observed between stages; an in-flight stage finishes
    /// first. Cancelling a job already in a terminal state is an error.
    pub fn cancel(&self, job_id: &str) -> Result<()> {
        let job = self.store.load(job_id)?;
        if job.status.is_terminal() {
            return Err(Error::TerminalState {
                id: job_id.to_string(),
                status: job.status.to_string(),
            });
        }
        match self
            .cancels
            .lock()
            .expect("cancel map poisoned")
            .get(job_id)
        {
            Some(token) => {
                token.cancel();
                Ok(())
            },
            None => Err(Error::UnknownJob(job_id.to_string())),
        }
    }

    /// Path of the finished archive, once the job completed.
    pub fn archive_path(&self, job_id: &str) -> Result<Option<PathBuf>> {
        let job = self.store.load(job_id)?;
        Ok(match job.status {
            JobStatus::Completed => job.epub_path,
            _ => None,
        })
    }

    /// Await a job's worker task. For tests and command-line callers;
    /// polling `status` is the usual interface.
    pub async fn wait(&self, job_id: &str) {
        let handle = self
            .handles
            .lock()
            .expect("handle map poisoned")
            .remove(job_id);
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                log::warn!("job {}: worker task panicked: {}", job_id, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::OrchestratorConfig;
    use crate::services::MemoryJobStore;

    fn service_with_missing_decoder() -> ConversionService {
        let store = Arc::new(MemoryJobStore::new());
        let orchestrator = Arc::new(Orchestrator::new(store, OrchestratorConfig::default()));
        let factory: DecoderFactory =
            Arc::new(|path| Err(Error::Decode(format!("cannot open {}", path.display()))));
        ConversionService::new(orchestrator, factory, 2)
    }

    fn request() -> ConversionRequest {
        ConversionRequest {
            source_path: PathBuf::from("missing.pdf"),
            title: None,
            language: "en".to_string(),
            audio_syncs: Vec::new(),
            output_dir: std::env::temp_dir(),
        }
    }

    #[tokio::test]
    async fn test_decoder_failure_fails_job() {
        let service = service_with_missing_decoder();
        let id = service.submit(request()).unwrap();
        service.wait(&id).await;

        let job = service.status(&id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error_message.unwrap().contains("cannot open"));
        assert!(service.archive_path(&id).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cancel_unknown_job() {
        let service = service_with_missing_decoder();
        assert!(service.cancel("nope").is_err());
    }

    #[tokio::test]
    async fn test_cancel_terminal_job_rejected() {
        let service = service_with_missing_decoder();
        let id = service.submit(request()).unwrap();
        service.wait(&id).await;
        assert!(matches!(
            service.cancel(&id),
            Err(Error::TerminalState { .. })
        ));
    }
}
