//! Recognition engine traits
//!
//! A [`RecognitionEngine`] builds language-bound [`LoadedEngine`] instances.
//! Loaded engines return an [`EngineOutput`], which is validated into a
//! [`RecognitionResult`] before leaving the adapter.

use std::sync::Arc;

use async_trait::async_trait;

use crate::confidence::normalize_confidence;

use super::types::{OcrError, OcrProvider, OcrWord, PixelRect, RecognitionResult};

/// Engine factory
#[async_trait]
pub trait RecognitionEngine: Send + Sync {
    /// Get the provider type
    fn provider_type(&self) -> OcrProvider;

    /// Check if the engine can be used at all
    async fn is_available(&self) -> bool;

    /// Build an engine instance bound to `language`
    async fn load(&self, language: &str) -> Result<Arc<dyn LoadedEngine>, OcrError>;
}

/// Language-bound engine instance
#[async_trait]
pub trait LoadedEngine: Send + Sync {
    fn language(&self) -> &str;

    /// Recognize text in an encoded image (PNG)
    async fn recognize(&self, image_png: &[u8]) -> Result<EngineOutput, OcrError>;

    /// Release engine resources
    async fn terminate(&self) {}
}

/// Confidence as reported by an engine
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineConfidence {
    /// 0.0 - 1.0
    Fraction(f64),
    /// 0 - 100
    Percent(f64),
    Unreported,
}

impl EngineConfidence {
    fn check(&self, what: &str) -> Result<(), OcrError> {
        let value = match self {
            Self::Fraction(v) | Self::Percent(v) => *v,
            Self::Unreported => return Ok(()),
        };
        if !value.is_finite() || value < 0.0 {
            return Err(OcrError::MalformedResult(format!(
                "{} confidence {} is not a valid score",
                what, value
            )));
        }
        if let Self::Fraction(v) = self {
            if *v > 1.0 {
                return Err(OcrError::MalformedResult(format!(
                    "{} confidence {} reported as a fraction",
                    what, v
                )));
            }
        }
        Ok(())
    }

    /// Normalized percentage (0-100)
    pub fn percentage(&self) -> f64 {
        match self {
            Self::Fraction(v) => normalize_confidence(Some(*v)),
            // 0-1 would be misread as a fraction
            Self::Percent(v) if *v <= 1.0 => normalize_confidence(Some(*v / 100.0)),
            Self::Percent(v) => normalize_confidence(Some(*v)),
            Self::Unreported => 0.0,
        }
    }
}

/// Word reported by an engine
#[derive(Debug, Clone, PartialEq)]
pub struct EngineWord {
    pub text: String,
    pub confidence: EngineConfidence,
    pub bbox: PixelRect,
}

/// Raw engine output
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOutput {
    pub text: String,
    pub confidence: EngineConfidence,
    pub words: Vec<EngineWord>,
}

impl EngineOutput {
    pub fn text_only(text: impl Into<String>, confidence: EngineConfidence) -> Self {
        Self {
            text: text.into(),
            confidence,
            words: Vec::new(),
        }
    }

    /// Validate and normalize into a [`RecognitionResult`].
    ///
    /// Non-finite or negative scores are rejected. When the engine gives no
    /// overall score the mean word confidence is used.
    pub fn into_result(
        self,
        language: &str,
        provider: OcrProvider,
    ) -> Result<RecognitionResult, OcrError> {
        self.confidence.check("overall")?;

        let mut words = Vec::with_capacity(self.words.len());
        for word in self.words {
            word.confidence.check("word")?;
            let text = word.text.trim();
            if text.is_empty() {
                continue;
            }
            words.push(OcrWord {
                text: text.to_string(),
                confidence: word.confidence.percentage(),
                bbox: word.bbox,
            });
        }

        let confidence = match self.confidence {
            EngineConfidence::Unreported if !words.is_empty() => {
                (words.iter().map(|w| w.confidence).sum::<f64>() / words.len() as f64).round()
            }
            other => other.percentage(),
        };

        Ok(RecognitionResult {
            text: self.text.trim().to_string(),
            confidence,
            language: language.to_string(),
            provider,
            words,
        })
    }
}

/// Validate a language code such as `eng`, `eng+deu` or `chi_sim`
pub fn validate_language(lang: &str) -> Result<(), OcrError> {
    if lang.is_empty() || lang.len() > 20 {
        return Err(OcrError::InvalidLanguage(format!(
            "invalid language code length: '{}'",
            lang
        )));
    }
    if let Some(c) = lang
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && *c != '+' && *c != '_')
    {
        return Err(OcrError::InvalidLanguage(format!(
            "invalid character '{}' in '{}'",
            c, lang
        )));
    }
    Ok(())
}

/// Scriptable engines for tests
#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use parking_lot::Mutex;

    use super::*;

    /// Shared counters observed by tests
    #[derive(Default)]
    pub struct EngineProbe {
        pub loads: AtomicUsize,
        pub terminations: AtomicUsize,
        pub calls: AtomicUsize,
        pub active: AtomicUsize,
        pub max_active: AtomicUsize,
    }

    /// Engine that echoes a fixed text, optionally failing on given calls
    pub struct FakeEngine {
        pub probe: Arc<EngineProbe>,
        pub output: EngineOutput,
        pub delay: Duration,
        /// 1-based call numbers that fail
        pub failing_calls: Mutex<HashSet<usize>>,
        /// 1-based call numbers that panic inside the engine
        pub panicking_calls: Mutex<HashSet<usize>>,
        pub fail_load: bool,
    }

    impl FakeEngine {
        pub fn new(text: &str) -> Self {
            Self {
                probe: Arc::new(EngineProbe::default()),
                output: EngineOutput::text_only(text, EngineConfidence::Percent(90.0)),
                delay: Duration::from_millis(0),
                failing_calls: Mutex::new(HashSet::new()),
                panicking_calls: Mutex::new(HashSet::new()),
                fail_load: false,
            }
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub fn failing_on(self, calls: &[usize]) -> Self {
            self.failing_calls.lock().extend(calls.iter().copied());
            self
        }

        pub fn panicking_on(self, calls: &[usize]) -> Self {
            self.panicking_calls.lock().extend(calls.iter().copied());
            self
        }

        pub fn failing_load(mut self) -> Self {
            self.fail_load = true;
            self
        }

        pub fn probe(&self) -> Arc<EngineProbe> {
            Arc::clone(&self.probe)
        }
    }

    struct FakeInstance {
        language: String,
        probe: Arc<EngineProbe>,
        output: EngineOutput,
        delay: Duration,
        failing_calls: HashSet<usize>,
        panicking_calls: HashSet<usize>,
    }

    #[async_trait]
    impl RecognitionEngine for FakeEngine {
        fn provider_type(&self) -> OcrProvider {
            OcrProvider::Tesseract
        }

        async fn is_available(&self) -> bool {
            !self.fail_load
        }

        async fn load(&self, language: &str) -> Result<Arc<dyn LoadedEngine>, OcrError> {
            if self.fail_load {
                return Err(OcrError::InitializationFailed("fake engine refuses to load".into()));
            }
            self.probe.loads.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(FakeInstance {
                language: language.to_string(),
                probe: Arc::clone(&self.probe),
                output: self.output.clone(),
                delay: self.delay,
                failing_calls: self.failing_calls.lock().clone(),
                panicking_calls: self.panicking_calls.lock().clone(),
            }))
        }
    }

    #[async_trait]
    impl LoadedEngine for FakeInstance {
        fn language(&self) -> &str {
            &self.language
        }

        async fn recognize(&self, _image_png: &[u8]) -> Result<EngineOutput, OcrError> {
            let call = self.probe.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let active = self.probe.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.probe.max_active.fetch_max(active, Ordering::SeqCst);

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            self.probe.active.fetch_sub(1, Ordering::SeqCst);
            if self.panicking_calls.contains(&call) {
                panic!("fake engine panicked on call {}", call);
            }
            if self.failing_calls.contains(&call) {
                return Err(OcrError::ProcessingError(format!("fake failure on call {}", call)));
            }
            Ok(self.output.clone())
        }

        async fn terminate(&self) {
            self.probe.terminations.fetch_add(1, Ordering::SeqCst);
        }
    }
}
