//! OCR Module
//!
//! Turns page images into text through a pluggable recognition engine.
//!
//! Supports multiple backends:
//! - Tesseract (local CLI, requires installation)
//! - Ollama vision models (local LLM)
//!
//! The [`RecognitionAdapter`] owns one language-bound engine instance and the
//! [`RecognitionQueue`] bounds how many recognitions run at once.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use folio_ocr::ocr::{engine_for, OcrProvider, RecognitionAdapter, RecognitionQueue};
//!
//! let adapter = Arc::new(RecognitionAdapter::new(engine_for(
//!     OcrProvider::Tesseract,
//!     "tesseract",
//!     "http://localhost:11434",
//!     "llava",
//! )));
//! let queue = RecognitionQueue::new(adapter);
//!
//! let result = queue
//!     .enqueue(RecognitionRequest { image, language: "eng".into(), ..request }, reporter)
//!     .await?;
//! ```

mod adapter;
pub(crate) mod engine;
mod preprocess;
mod provider;
mod queue;
mod types;

pub use adapter::{AdapterStatus, RecognitionAdapter};
pub use engine::{
    validate_language, EngineConfidence, EngineOutput, EngineWord, LoadedEngine,
    RecognitionEngine,
};
pub use preprocess::{apply_options, decode_image, encode_png};
pub use provider::{engine_for, OllamaEngine, TesseractEngine};
pub use queue::{
    QueueStats, RecognitionQueue, RecognitionRequest, DEFAULT_COMPLETION_DELAY,
    DEFAULT_MAX_CONCURRENT,
};
pub use types::{OcrError, OcrProvider, OcrWord, PixelRect, ProcessingOptions, RecognitionResult};
