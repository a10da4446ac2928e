//! Recognition engine adapter
//!
//! Owns at most one language-bound engine instance.
//!
//! ```text
//! Uninitialized ──initialize/recognize──▶ Ready(lang) ◀──▶ Recognizing
//!                                             │
//!                        language change:     │ terminate
//!                        terminate + reload   ▼
//!                                         Terminated ──initialize──▶ Ready(lang)
//! ```
//!
//! `recognize` initializes lazily from `Uninitialized` only. Once terminated,
//! recognition fails until `initialize` is called explicitly.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::progress::ProgressReporter;

use super::engine::{LoadedEngine, RecognitionEngine};
use super::types::{OcrError, OcrProvider, RecognitionResult};

enum AdapterState {
    Uninitialized,
    Ready(Arc<dyn LoadedEngine>),
    Terminated,
}

/// Observable adapter status
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "language", rename_all = "snake_case")]
pub enum AdapterStatus {
    Uninitialized,
    Ready(String),
    Recognizing(String),
    Terminated,
}

/// Counts a recognition as running until dropped, unwinding included
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Injectable handle around a recognition engine
pub struct RecognitionAdapter {
    engine: Box<dyn RecognitionEngine>,
    state: Mutex<AdapterState>,
    in_flight: AtomicUsize,
}

impl RecognitionAdapter {
    pub fn new(engine: Box<dyn RecognitionEngine>) -> Self {
        Self {
            engine,
            state: Mutex::new(AdapterState::Uninitialized),
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn provider(&self) -> OcrProvider {
        self.engine.provider_type()
    }

    /// Whether the underlying engine is usable
    pub async fn is_available(&self) -> bool {
        self.engine.is_available().await
    }

    /// Bind the engine to `language`, replacing any instance bound to
    /// another language. Also leaves the terminated state.
    pub async fn initialize(&self, language: &str) -> Result<(), OcrError> {
        let mut state = self.state.lock().await;
        self.ensure_ready(&mut state, language).await.map(|_| ())
    }

    async fn ensure_ready(
        &self,
        state: &mut AdapterState,
        language: &str,
    ) -> Result<Arc<dyn LoadedEngine>, OcrError> {
        if let AdapterState::Ready(engine) = state {
            if engine.language() == language {
                return Ok(Arc::clone(engine));
            }
            tracing::info!(
                "Switching {:?} engine from {} to {}",
                self.engine.provider_type(),
                engine.language(),
                language
            );
            engine.terminate().await;
            *state = AdapterState::Uninitialized;
        }

        let engine = self.engine.load(language).await.map_err(|e| match e {
            OcrError::InvalidLanguage(_) | OcrError::ProviderNotAvailable(_) => e,
            other => OcrError::InitializationFailed(other.to_string()),
        })?;
        tracing::info!("{:?} engine initialized for {}", self.engine.provider_type(), language);

        *state = AdapterState::Ready(Arc::clone(&engine));
        Ok(engine)
    }

    /// Recognize an encoded image.
    ///
    /// Progress milestones: 10 once the engine is ready, 50 when recognition
    /// starts, 80 when the engine returns, 100 after validation.
    pub async fn recognize(
        &self,
        image_png: &[u8],
        language: &str,
        progress: &ProgressReporter,
    ) -> Result<RecognitionResult, OcrError> {
        let engine = {
            let mut state = self.state.lock().await;
            if matches!(*state, AdapterState::Terminated) {
                return Err(OcrError::EngineTerminated);
            }
            self.ensure_ready(&mut state, language).await?
        };
        progress.report(10);

        let output = {
            let _in_flight = InFlight::enter(&self.in_flight);
            progress.report(50);
            engine.recognize(image_png).await
        };
        progress.report(80);

        let result = output?.into_result(engine.language(), self.engine.provider_type())?;
        progress.report(100);
        Ok(result)
    }

    /// Release the engine. Further recognition needs `initialize`.
    pub async fn terminate(&self) {
        let mut state = self.state.lock().await;
        if let AdapterState::Ready(engine) = &*state {
            engine.terminate().await;
            tracing::info!("{:?} engine terminated", self.engine.provider_type());
        }
        *state = AdapterState::Terminated;
    }

    pub async fn status(&self) -> AdapterStatus {
        let state = self.state.lock().await;
        match &*state {
            AdapterState::Uninitialized => AdapterStatus::Uninitialized,
            AdapterState::Terminated => AdapterStatus::Terminated,
            AdapterState::Ready(engine) => {
                let language = engine.language().to_string();
                if self.in_flight.load(Ordering::Acquire) > 0 {
                    AdapterStatus::Recognizing(language)
                } else {
                    AdapterStatus::Ready(language)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::engine::testing::FakeEngine;
    use crate::progress::{progress_channel, ProgressEvent};
    use futures::StreamExt;

    #[tokio::test]
    async fn test_lazy_initialization() {
        let engine = FakeEngine::new("hello");
        let probe = engine.probe();
        let adapter = RecognitionAdapter::new(Box::new(engine));
        assert_eq!(adapter.status().await, AdapterStatus::Uninitialized);

        let result = adapter
            .recognize(b"png", "eng", &ProgressReporter::noop())
            .await
            .unwrap();
        assert_eq!(result.text, "hello");
        assert_eq!(result.confidence, 90.0);
        assert_eq!(result.language, "eng");
        assert_eq!(adapter.status().await, AdapterStatus::Ready("eng".into()));

        adapter.recognize(b"png", "eng", &ProgressReporter::noop()).await.unwrap();
        assert_eq!(probe.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_language_change_rebuilds_engine() {
        let engine = FakeEngine::new("x");
        let probe = engine.probe();
        let adapter = RecognitionAdapter::new(Box::new(engine));

        adapter.initialize("eng").await.unwrap();
        adapter.recognize(b"png", "deu", &ProgressReporter::noop()).await.unwrap();

        assert_eq!(probe.loads.load(Ordering::SeqCst), 2);
        assert_eq!(probe.terminations.load(Ordering::SeqCst), 1);
        assert_eq!(adapter.status().await, AdapterStatus::Ready("deu".into()));
    }

    #[tokio::test]
    async fn test_terminated_requires_initialize() {
        let adapter = RecognitionAdapter::new(Box::new(FakeEngine::new("x")));
        adapter.initialize("eng").await.unwrap();
        adapter.terminate().await;
        assert_eq!(adapter.status().await, AdapterStatus::Terminated);

        let err = adapter
            .recognize(b"png", "eng", &ProgressReporter::noop())
            .await
            .unwrap_err();
        assert!(matches!(err, OcrError::EngineTerminated));

        adapter.initialize("eng").await.unwrap();
        assert!(adapter
            .recognize(b"png", "eng", &ProgressReporter::noop())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_load_failure_is_initialization_error() {
        let adapter = RecognitionAdapter::new(Box::new(FakeEngine::new("x").failing_load()));
        let err = adapter.initialize("eng").await.unwrap_err();
        assert!(matches!(err, OcrError::InitializationFailed(_)));
        assert!(err.is_fatal());
        assert_eq!(adapter.status().await, AdapterStatus::Uninitialized);
    }

    #[tokio::test]
    async fn test_engine_panic_leaves_adapter_ready() {
        let adapter = Arc::new(RecognitionAdapter::new(Box::new(
            FakeEngine::new("x").panicking_on(&[1]),
        )));

        let worker = Arc::clone(&adapter);
        let joined = tokio::spawn(async move {
            worker
                .recognize(b"png", "eng", &ProgressReporter::noop())
                .await
        })
        .await;
        assert!(joined.is_err());
        assert_eq!(adapter.status().await, AdapterStatus::Ready("eng".into()));

        assert!(adapter
            .recognize(b"png", "eng", &ProgressReporter::noop())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_progress_milestones() {
        let adapter = RecognitionAdapter::new(Box::new(FakeEngine::new("x")));
        let (reporter, stream) = progress_channel();
        adapter.recognize(b"png", "eng", &reporter).await.unwrap();
        reporter.complete();

        let events: Vec<_> = stream.collect().await;
        assert_eq!(
            events,
            vec![
                ProgressEvent::Progress(10),
                ProgressEvent::Progress(50),
                ProgressEvent::Progress(80),
                ProgressEvent::Progress(100),
                ProgressEvent::Completed,
            ]
        );
    }
}
