//! Job service
//!
//! Validates submissions, records them and runs the pipeline in the
//! background. Progress events are folded into the job record.

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::document::{DocumentError, DocumentKind, SourceDocument};
use crate::ocr::{validate_language, ProcessingOptions};
use crate::pipeline::{
    CancelFlag, PipelineError, ProcessRequest, ProcessingOrchestrator, ValidationError,
};
use crate::progress::{progress_channel, ProgressEvent};

use super::store::JobStore;
use super::types::{JobError, JobOutcome, JobRecord, JobStatus};

/// Default upload limit: 50MB
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Job service settings
#[derive(Debug, Clone)]
pub struct JobServiceConfig {
    pub max_upload_bytes: usize,
    pub default_language: String,
}

impl Default for JobServiceConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            default_language: "eng".to_string(),
        }
    }
}

/// A document submitted for extraction
#[derive(Debug, Clone)]
pub struct SubmitJob {
    pub owner_id: String,
    pub file_name: String,
    pub data: Vec<u8>,
    /// Falls back to the configured default
    pub language: Option<String>,
    pub options: ProcessingOptions,
    pub selected_pages: Option<Vec<u32>>,
}

/// Runs extraction jobs
#[derive(Clone)]
pub struct JobService {
    inner: Arc<JobServiceInner>,
}

struct JobServiceInner {
    store: Arc<dyn JobStore>,
    orchestrator: Arc<ProcessingOrchestrator>,
    /// Cancel flags of jobs that have not finished
    running: Mutex<HashMap<Uuid, CancelFlag>>,
    config: JobServiceConfig,
}

impl JobService {
    pub fn new(
        store: Arc<dyn JobStore>,
        orchestrator: Arc<ProcessingOrchestrator>,
        config: JobServiceConfig,
    ) -> Self {
        Self {
            inner: Arc::new(JobServiceInner {
                store,
                orchestrator,
                running: Mutex::new(HashMap::new()),
                config,
            }),
        }
    }

    pub fn orchestrator(&self) -> &Arc<ProcessingOrchestrator> {
        &self.inner.orchestrator
    }

    pub fn config(&self) -> &JobServiceConfig {
        &self.inner.config
    }

    /// Validate and queue a job. Processing starts in the background.
    pub async fn submit(&self, submission: SubmitJob) -> Result<JobRecord, JobError> {
        let SubmitJob {
            owner_id,
            file_name,
            data,
            language,
            options,
            selected_pages,
        } = submission;

        if data.is_empty() {
            return Err(ValidationError::EmptyDocument.into());
        }
        if data.len() > self.inner.config.max_upload_bytes {
            return Err(ValidationError::TooLarge {
                size: data.len(),
                limit: self.inner.config.max_upload_bytes,
            }
            .into());
        }

        let language = language
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| self.inner.config.default_language.clone());
        validate_language(&language)
            .map_err(|e| ValidationError::InvalidLanguage(e.to_string()))?;
        options
            .validate()
            .map_err(|e| ValidationError::InvalidOptions(e.to_string()))?;

        let document = SourceDocument::from_bytes(file_name, data)
            .map_err(|e| ValidationError::UnsupportedFormat(e.to_string()))?;

        if let Some(pages) = &selected_pages {
            self.validate_selection(&document, pages).await?;
        }

        let record = JobRecord::new(
            document.id.clone(),
            owner_id,
            document.file_name.clone(),
            language.clone(),
            options.clone(),
            selected_pages.clone(),
        );
        self.inner.store.insert(record.clone()).await?;

        let cancel = CancelFlag::new();
        self.inner.running.lock().insert(record.id, cancel.clone());

        tracing::info!(
            job_id = %record.id,
            owner_id = %record.owner_id,
            file_name = %record.file_name,
            size = document.len(),
            "Submitted extraction job"
        );

        let service = self.clone();
        let id = record.id;
        let request = ProcessRequest {
            document,
            language,
            options,
            selected_pages,
        };
        tokio::spawn(async move {
            let runner = service.clone();
            let worker = tokio::spawn(async move { runner.run(id, request, cancel).await });
            if let Err(e) = worker.await {
                service.abandon(id, e.to_string()).await;
            }
        });

        Ok(record)
    }

    async fn validate_selection(
        &self,
        document: &SourceDocument,
        pages: &[u32],
    ) -> Result<(), ValidationError> {
        if pages.is_empty() {
            return Err(ValidationError::NoPagesSelected);
        }

        let total = match document.kind {
            DocumentKind::Image(_) => 1,
            DocumentKind::Paginated => self
                .inner
                .orchestrator
                .rasterizer()
                .page_count(document)
                .await
                .map_err(|e: DocumentError| ValidationError::UnsupportedFormat(e.to_string()))?,
        };

        let mut invalid: Vec<u32> = pages
            .iter()
            .copied()
            .filter(|p| *p == 0 || *p > total)
            .collect();
        if !invalid.is_empty() {
            invalid.sort_unstable();
            invalid.dedup();
            return Err(ValidationError::InvalidPages(invalid));
        }
        Ok(())
    }

    async fn run(&self, id: Uuid, request: ProcessRequest, cancel: CancelFlag) {
        let store = &self.inner.store;

        // Cancelled while pending
        if let Err(e) = store
            .transition(id, JobStatus::Processing, JobOutcome::default())
            .await
        {
            tracing::debug!(job_id = %id, "Job not started: {}", e);
            self.inner.running.lock().remove(&id);
            return;
        }

        let (reporter, mut events) = progress_channel();
        let progress_store = Arc::clone(store);
        let forwarder = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let ProgressEvent::Progress(percent) = event {
                    if let Err(e) = progress_store.update_progress(id, percent).await {
                        tracing::warn!(job_id = %id, "Failed to record progress: {}", e);
                    }
                }
            }
        });

        let result = self
            .inner
            .orchestrator
            .process(request, &reporter, &cancel)
            .await;

        let (status, outcome) = match result {
            Ok(processed) => {
                reporter.complete();
                tracing::info!(
                    job_id = %id,
                    strategy = %processed.strategy,
                    pages = processed.pages.len(),
                    failed_pages = processed.failed_pages.len(),
                    confidence = processed.confidence,
                    "Job completed"
                );
                (JobStatus::Completed, JobOutcome::completed(processed))
            }
            Err(PipelineError::Cancelled) => {
                reporter.fail("cancelled");
                tracing::info!(job_id = %id, "Job cancelled");
                (JobStatus::Cancelled, JobOutcome::failed("Cancelled by user"))
            }
            Err(e) => {
                reporter.fail(e.to_string());
                tracing::error!(job_id = %id, "Job failed: {}", e);
                (JobStatus::Failed, JobOutcome::failed(e.to_string()))
            }
        };

        if let Err(e) = forwarder.await {
            tracing::warn!(job_id = %id, "Progress forwarder ended abnormally: {}", e);
        }
        if let Err(e) = store.transition(id, status, outcome).await {
            tracing::warn!(job_id = %id, "Failed to record final status: {}", e);
        }
        self.inner.running.lock().remove(&id);
    }

    /// Settle a job whose run aborted before recording an outcome
    async fn abandon(&self, id: Uuid, reason: String) {
        tracing::error!(job_id = %id, "Job run aborted: {}", reason);
        let outcome = JobOutcome::failed(format!("Processing aborted: {}", reason));
        if let Err(e) = self.inner.store.transition(id, JobStatus::Failed, outcome).await {
            tracing::warn!(job_id = %id, "Failed to record aborted job: {}", e);
        }
        self.inner.running.lock().remove(&id);
    }

    /// Request cancellation.
    ///
    /// Pending jobs are cancelled at once; processing jobs stop before their
    /// next page.
    pub async fn cancel(&self, id: Uuid) -> Result<JobRecord, JobError> {
        let job = self.inner.store.get(id).await?;
        if job.status.is_terminal() {
            return Err(JobError::InvalidTransition {
                id,
                from: job.status,
                to: JobStatus::Cancelled,
            });
        }

        if let Some(flag) = self.inner.running.lock().get(&id) {
            flag.cancel();
        }

        if job.status == JobStatus::Pending {
            match self
                .inner
                .store
                .transition(id, JobStatus::Cancelled, JobOutcome::failed("Cancelled by user"))
                .await
            {
                Ok(record) => {
                    tracing::info!(job_id = %id, "Cancelled pending job");
                    return Ok(record);
                }
                // Started in the meantime; the flag stops it
                Err(JobError::InvalidTransition { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        tracing::info!(job_id = %id, "Cancellation requested");
        self.inner.store.get(id).await
    }

    pub async fn get(&self, id: Uuid) -> Result<JobRecord, JobError> {
        self.inner.store.get(id).await
    }

    pub async fn list(&self, owner_id: &str) -> Result<Vec<JobRecord>, JobError> {
        self.inner.store.list_by_owner(owner_id).await
    }

    /// Number of jobs that have not reached a terminal status
    pub fn active_jobs(&self) -> usize {
        self.inner.running.lock().len()
    }
}
