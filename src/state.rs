//! Application state management

use std::sync::Arc;

use tokio::time::Duration;

use crate::config::Config;
use crate::document::{DocumentCache, MupdfRasterizer, NativeTextExtractor};
use crate::jobs::{InMemoryJobStore, JobService, JobServiceConfig};
use crate::ocr::{engine_for, RecognitionAdapter, RecognitionQueue};
use crate::pages::PageSelectionService;
use crate::pipeline::ProcessingOrchestrator;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    jobs: JobService,
    selection: PageSelectionService,
    adapter: Arc<RecognitionAdapter>,
    queue: RecognitionQueue,
}

impl AppState {
    /// Wire the production components from `config`
    pub fn new(config: Config) -> Self {
        let engine = engine_for(
            config.ocr.engine,
            &config.ocr.tesseract_path,
            &config.ocr.ollama_url,
            &config.ocr.ollama_model,
        );
        let adapter = Arc::new(RecognitionAdapter::new(engine));
        let queue = RecognitionQueue::with_limits(
            Arc::clone(&adapter),
            config.ocr.max_concurrent,
            Duration::from_millis(config.ocr.queue_delay_ms),
        );

        let cache = DocumentCache::new(config.limits.document_cache_size);
        let orchestrator = ProcessingOrchestrator::new(
            Arc::new(NativeTextExtractor::new(cache.clone())),
            Arc::new(MupdfRasterizer::new(cache)),
            queue,
        )
        .with_render_scale(config.ocr.render_scale);

        Self::from_parts(config, orchestrator)
    }

    /// Build around an existing orchestrator
    pub fn from_parts(config: Config, orchestrator: ProcessingOrchestrator) -> Self {
        let queue = orchestrator.queue().clone();
        let adapter = Arc::clone(queue.adapter());
        let jobs = JobService::new(
            Arc::new(InMemoryJobStore::new()),
            Arc::new(orchestrator),
            JobServiceConfig {
                max_upload_bytes: config.limits.max_upload_bytes,
                default_language: config.ocr.default_language.clone(),
            },
        );
        let selection = PageSelectionService::new(config.limits.selection_cache_size);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                jobs,
                selection,
                adapter,
                queue,
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn jobs(&self) -> &JobService {
        &self.inner.jobs
    }

    pub fn selection(&self) -> &PageSelectionService {
        &self.inner.selection
    }

    pub fn adapter(&self) -> &Arc<RecognitionAdapter> {
        &self.inner.adapter
    }

    pub fn queue(&self) -> &RecognitionQueue {
        &self.inner.queue
    }
}
