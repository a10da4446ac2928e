//! Bounded recognition queue
//!
//! FIFO backlog with a cap on simultaneously active recognitions. Items start
//! in submission order; completion order is not guaranteed. Clearing the
//! queue fails pending items only, active ones run to completion.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use image::DynamicImage;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::oneshot;
use tokio::time::Duration;

use crate::progress::ProgressReporter;

use super::adapter::RecognitionAdapter;
use super::preprocess::{apply_options, encode_png};
use super::types::{OcrError, ProcessingOptions, RecognitionResult};

/// Default number of concurrently active recognitions
pub const DEFAULT_MAX_CONCURRENT: usize = 2;
/// Default pause after a completion before pulling the next item
pub const DEFAULT_COMPLETION_DELAY: Duration = Duration::from_millis(100);

/// Input of one recognition
pub struct RecognitionRequest {
    pub image: DynamicImage,
    pub language: String,
    pub options: ProcessingOptions,
    /// Used in logs, e.g. "page 3"
    pub label: String,
}

struct QueueItem {
    id: u64,
    request: RecognitionRequest,
    progress: ProgressReporter,
    reply: oneshot::Sender<Result<RecognitionResult, OcrError>>,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<QueueItem>,
    active: usize,
}

struct QueueInner {
    adapter: Arc<RecognitionAdapter>,
    state: Mutex<QueueState>,
    max_concurrent: usize,
    completion_delay: Duration,
    next_id: AtomicU64,
}

/// Queue statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub pending: usize,
    pub active: usize,
    pub max_concurrent: usize,
}

/// Bounded-concurrency recognition queue
#[derive(Clone)]
pub struct RecognitionQueue {
    inner: Arc<QueueInner>,
}

impl RecognitionQueue {
    pub fn new(adapter: Arc<RecognitionAdapter>) -> Self {
        Self::with_limits(adapter, DEFAULT_MAX_CONCURRENT, DEFAULT_COMPLETION_DELAY)
    }

    pub fn with_limits(
        adapter: Arc<RecognitionAdapter>,
        max_concurrent: usize,
        completion_delay: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                adapter,
                state: Mutex::new(QueueState::default()),
                max_concurrent: max_concurrent.max(1),
                completion_delay,
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn adapter(&self) -> &Arc<RecognitionAdapter> {
        &self.inner.adapter
    }

    /// Queue a recognition.
    ///
    /// The item is queued before this returns, so call order is start order.
    /// Must be called within a Tokio runtime.
    pub fn enqueue(
        &self,
        request: RecognitionRequest,
        progress: ProgressReporter,
    ) -> impl Future<Output = Result<RecognitionResult, OcrError>> + Send + 'static {
        let (reply, rx) = oneshot::channel();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(queue_item = id, "Queued recognition for {}", request.label);

        self.inner.state.lock().pending.push_back(QueueItem {
            id,
            request,
            progress,
            reply,
        });
        pump(&self.inner);

        async move {
            rx.await.unwrap_or_else(|_| {
                Err(OcrError::Cancelled(format!("queue item {} was dropped", id)))
            })
        }
    }

    /// Fail every item that has not started yet. Returns how many were failed.
    pub fn clear_queue(&self) -> usize {
        let drained: Vec<QueueItem> = self.inner.state.lock().pending.drain(..).collect();
        let count = drained.len();
        for item in drained {
            item.progress.fail("cancelled before start");
            let _ = item.reply.send(Err(OcrError::Cancelled(format!(
                "{} was removed from the queue",
                item.request.label
            ))));
        }
        if count > 0 {
            tracing::info!("Cleared {} pending recognitions", count);
        }
        count
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.inner.state.lock();
        QueueStats {
            pending: state.pending.len(),
            active: state.active,
            max_concurrent: self.inner.max_concurrent,
        }
    }
}

/// Start pending items while under the cap
fn pump(inner: &Arc<QueueInner>) {
    loop {
        let item = {
            let mut state = inner.state.lock();
            if state.active >= inner.max_concurrent {
                return;
            }
            let Some(item) = state.pending.pop_front() else {
                return;
            };
            state.active += 1;
            item
        };

        let inner = Arc::clone(inner);
        tokio::spawn(async move {
            let QueueItem {
                id,
                request,
                progress,
                reply,
            } = item;

            // Recognition runs in its own task so a panicking engine still
            // releases the slot
            let worker = tokio::spawn(run_item(Arc::clone(&inner), id, request, progress));
            let result = worker.await.unwrap_or_else(|e| {
                tracing::error!(queue_item = id, "Recognition task aborted: {}", e);
                Err(OcrError::ProcessingError(format!(
                    "recognition task aborted: {}",
                    e
                )))
            });

            inner.state.lock().active -= 1;
            let _ = reply.send(result);

            if !inner.completion_delay.is_zero() {
                tokio::time::sleep(inner.completion_delay).await;
            }
            pump(&inner);
        });
    }
}

async fn run_item(
    inner: Arc<QueueInner>,
    id: u64,
    request: RecognitionRequest,
    progress: ProgressReporter,
) -> Result<RecognitionResult, OcrError> {
    tracing::debug!(queue_item = id, "Starting recognition for {}", request.label);
    let result = recognize(&inner, request, &progress).await;

    match &result {
        Ok(r) => tracing::debug!(
            queue_item = id,
            confidence = r.confidence,
            "Recognition finished"
        ),
        Err(e) => tracing::warn!(queue_item = id, "Recognition failed: {}", e),
    }
    result
}

async fn recognize(
    inner: &QueueInner,
    request: RecognitionRequest,
    progress: &ProgressReporter,
) -> Result<RecognitionResult, OcrError> {
    let RecognitionRequest {
        image,
        language,
        options,
        label: _,
    } = request;

    // Preprocessing and PNG encoding are CPU-bound
    let png = tokio::task::spawn_blocking(move || {
        let image = apply_options(image, &options)?;
        encode_png(&image)
    })
    .await
    .map_err(|e| OcrError::ProcessingError(format!("Task join error: {}", e)))??;

    inner.adapter.recognize(&png, &language, progress).await
}
