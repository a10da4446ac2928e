//! Processing orchestrator
//!
//! Routes a document through native extraction or recognition and packs
//! the per-page results.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::confidence::mean_confidence;
use crate::document::{
    resolve_pages, DocumentKind, PageImage, PageRasterizer, SourceDocument, TextLayerExtractor,
    DEFAULT_RENDER_SCALE,
};
use crate::ocr::{
    decode_image, OcrError, ProcessingOptions, RecognitionQueue, RecognitionRequest,
    RecognitionResult,
};
use crate::pages::{encode_pages, PageResult};
use crate::progress::ProgressReporter;

use super::{PipelineError, ValidationError};

/// Share of progress spent on the text layer check of paginated documents
const NATIVE_PROGRESS_END: u8 = 10;

/// How the text was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStrategy {
    /// Flat image sent straight to recognition
    ImageRecognition,
    /// Embedded text layer of a paginated document
    NativeText,
    /// Rendered pages sent to recognition
    RasterizedRecognition,
}

impl ExtractionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ImageRecognition => "image recognition",
            Self::NativeText => "native text",
            Self::RasterizedRecognition => "rasterized recognition",
        }
    }
}

impl fmt::Display for ExtractionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A page that could not be recognized
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageFailure {
    pub page_number: u32,
    pub message: String,
}

/// Cooperative cancellation, checked before each page
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// What to process
#[derive(Debug, Clone)]
pub struct ProcessRequest {
    pub document: SourceDocument,
    pub language: String,
    pub options: ProcessingOptions,
    /// Restrict paginated documents to these pages
    pub selected_pages: Option<Vec<u32>>,
}

/// Extraction outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedDocument {
    /// Packed page text, or plain text for flat images
    pub text: String,
    /// Mean page confidence (0-100)
    pub confidence: f64,
    /// Pages that produced text
    pub pages: Vec<u32>,
    pub strategy: ExtractionStrategy,
    pub failed_pages: Vec<PageFailure>,
}

/// Drives one document through extraction
pub struct ProcessingOrchestrator {
    native: Arc<dyn TextLayerExtractor>,
    rasterizer: Arc<dyn PageRasterizer>,
    queue: RecognitionQueue,
    render_scale: f32,
}

impl ProcessingOrchestrator {
    pub fn new(
        native: Arc<dyn TextLayerExtractor>,
        rasterizer: Arc<dyn PageRasterizer>,
        queue: RecognitionQueue,
    ) -> Self {
        Self {
            native,
            rasterizer,
            queue,
            render_scale: DEFAULT_RENDER_SCALE,
        }
    }

    pub fn with_render_scale(mut self, scale: f32) -> Self {
        self.render_scale = scale;
        self
    }

    pub fn queue(&self) -> &RecognitionQueue {
        &self.queue
    }

    pub fn rasterizer(&self) -> &Arc<dyn PageRasterizer> {
        &self.rasterizer
    }

    /// Extract the text of a document.
    ///
    /// Progress is reported but the reporter is not completed; that is left
    /// to the caller.
    pub async fn process(
        &self,
        request: ProcessRequest,
        progress: &ProgressReporter,
        cancel: &CancelFlag,
    ) -> Result<ProcessedDocument, PipelineError> {
        request
            .options
            .validate()
            .map_err(|e| ValidationError::InvalidOptions(e.to_string()))?;

        tracing::info!(
            document_id = %request.document.id,
            "Processing {} ({})",
            request.document.file_name,
            request.document.kind.label()
        );

        match request.document.kind {
            DocumentKind::Image(_) => self.process_image(request, progress, cancel).await,
            DocumentKind::Paginated => self.process_paginated(request, progress, cancel).await,
        }
    }

    async fn process_image(
        &self,
        request: ProcessRequest,
        progress: &ProgressReporter,
        cancel: &CancelFlag,
    ) -> Result<ProcessedDocument, PipelineError> {
        let strategy = ExtractionStrategy::ImageRecognition;
        check_cancelled(progress, cancel)?;

        let data = Arc::clone(&request.document.data);
        let image = tokio::task::spawn_blocking(move || decode_image(&data))
            .await
            .map_err(|e| ValidationError::InvalidRequest(format!("Task join error: {}", e)))?
            .map_err(|e| ValidationError::UnsupportedFormat(e.to_string()))?;

        let page = PageImage {
            page_number: 1,
            image,
        };
        let outcome = self.recognize_page(strategy, &request, page, progress).await?;

        match outcome {
            Ok(result) => Ok(ProcessedDocument {
                text: result.text,
                confidence: result.confidence,
                pages: vec![1],
                strategy,
                failed_pages: Vec::new(),
            }),
            Err(failure) => Err(all_failed(strategy, vec![failure])),
        }
    }

    async fn process_paginated(
        &self,
        request: ProcessRequest,
        progress: &ProgressReporter,
        cancel: &CancelFlag,
    ) -> Result<ProcessedDocument, PipelineError> {
        check_cancelled(progress, cancel)?;
        let selected = request.selected_pages.as_deref();

        match self.native.extract(&request.document, selected).await {
            Ok(Some(native)) => {
                progress.report(100);
                let confidences: Vec<f64> = native.pages.iter().map(|p| p.confidence).collect();
                tracing::info!(
                    "Using native text layer of {} ({} pages)",
                    request.document.file_name,
                    native.pages.len()
                );
                return Ok(ProcessedDocument {
                    text: native.text,
                    confidence: mean_confidence(&confidences).round(),
                    pages: native.pages.iter().map(|p| p.page_number).collect(),
                    strategy: ExtractionStrategy::NativeText,
                    failed_pages: Vec::new(),
                });
            }
            Ok(None) => tracing::debug!(
                "No usable text layer in {}, falling back to recognition",
                request.document.file_name
            ),
            Err(e) => tracing::warn!(
                "Text layer extraction failed for {}, falling back to recognition: {}",
                request.document.file_name,
                e
            ),
        }
        progress.report(NATIVE_PROGRESS_END);

        self.recognize_pages(request, progress, cancel).await
    }

    async fn recognize_pages(
        &self,
        request: ProcessRequest,
        progress: &ProgressReporter,
        cancel: &CancelFlag,
    ) -> Result<ProcessedDocument, PipelineError> {
        let strategy = ExtractionStrategy::RasterizedRecognition;
        let document = &request.document;

        let total = self.rasterizer.page_count(document).await?;
        let pages = resolve_pages(request.selected_pages.as_deref(), total);
        if pages.is_empty() {
            return Err(ValidationError::NoPagesSelected.into());
        }

        let mut results = Vec::with_capacity(pages.len());
        let mut failures = Vec::new();
        let count = pages.len();

        for (index, page_number) in pages.into_iter().enumerate() {
            check_cancelled(progress, cancel)?;

            let span = page_span(progress, index, count);
            let rendered = self
                .rasterizer
                .rasterize(document, &[page_number], self.render_scale)
                .await
                .map_err(|source| PipelineError::Rasterization {
                    strategy,
                    page: page_number,
                    source,
                })?;

            let Some(page) = rendered.into_iter().next() else {
                failures.push(PageFailure {
                    page_number,
                    message: "page produced no image".to_string(),
                });
                continue;
            };

            match self.recognize_page(strategy, &request, page, &span).await? {
                Ok(result) => {
                    results.push(PageResult::new(page_number, result.text, result.confidence))
                }
                Err(failure) => failures.push(failure),
            }
        }

        if results.is_empty() {
            return Err(all_failed(strategy, failures));
        }

        if !failures.is_empty() {
            tracing::warn!(
                "{}: {} of {} pages failed for {}",
                strategy,
                failures.len(),
                count,
                document.file_name
            );
        }

        let confidences: Vec<f64> = results.iter().map(|p| p.confidence).collect();
        Ok(ProcessedDocument {
            text: encode_pages(&results),
            confidence: mean_confidence(&confidences).round(),
            pages: results.iter().map(|p| p.page_number).collect(),
            strategy,
            failed_pages: failures,
        })
    }

    /// Recognize one page.
    ///
    /// The outer error aborts the job; the inner one is a recorded page failure.
    async fn recognize_page(
        &self,
        strategy: ExtractionStrategy,
        request: &ProcessRequest,
        page: PageImage,
        progress: &ProgressReporter,
    ) -> Result<Result<RecognitionResult, PageFailure>, PipelineError> {
        let page_number = page.page_number;
        let result = self
            .queue
            .enqueue(
                RecognitionRequest {
                    image: page.image,
                    language: request.language.clone(),
                    options: request.options.clone(),
                    label: format!("page {} of {}", page_number, request.document.file_name),
                },
                progress.clone(),
            )
            .await;

        match result {
            Ok(result) => Ok(Ok(result)),
            Err(OcrError::Cancelled(_)) => Err(PipelineError::Cancelled),
            Err(e) if e.is_fatal() => {
                tracing::error!("{} aborted on page {}: {}", strategy, page_number, e);
                Err(PipelineError::Engine {
                    strategy,
                    page: page_number,
                    source: e,
                })
            }
            Err(e) => {
                tracing::warn!("{} failed on page {}: {}", strategy, page_number, e);
                Ok(Err(PageFailure {
                    page_number,
                    message: e.to_string(),
                }))
            }
        }
    }
}

fn check_cancelled(progress: &ProgressReporter, cancel: &CancelFlag) -> Result<(), PipelineError> {
    if cancel.is_cancelled() || progress.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }
    Ok(())
}

fn all_failed(strategy: ExtractionStrategy, failures: Vec<PageFailure>) -> PipelineError {
    tracing::error!("{} failed on every page", strategy);
    PipelineError::AllPagesFailed { strategy, failures }
}

/// Progress range of page `index` out of `count`, after the native check
fn page_span(progress: &ProgressReporter, index: usize, count: usize) -> ProgressReporter {
    let width = usize::from(100 - NATIVE_PROGRESS_END);
    let start = usize::from(NATIVE_PROGRESS_END) + width * index / count;
    let end = usize::from(NATIVE_PROGRESS_END) + width * (index + 1) / count;
    progress.span(start as u8, end as u8)
}
