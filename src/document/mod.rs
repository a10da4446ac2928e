//! Document handling
//!
//! Identifies submitted content, reads embedded text layers and renders pages
//! of paginated documents.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                DocumentCache                  │
//! │   (LRU of opened documents, keyed by sha256) │
//! └──────────────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          ▼                         ▼
//! ┌──────────────────┐     ┌──────────────────┐
//! │NativeTextExtractor│    │  MupdfRasterizer │
//! │ (text layer +     │    │ (page → RGBA)    │
//! │  quality score)   │    │                  │
//! └──────────────────┘     └──────────────────┘
//!          │                         │
//!          └────────────┬────────────┘
//!                       ▼
//! ┌──────────────────────────────────────────────┐
//! │                SafeDocument                   │
//! │   (serialized MuPDF access, fresh per call)  │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Both extractor and rasterizer are traits so the pipeline can be driven
//! without MuPDF in tests.

mod cache;
mod error;
mod native;
mod rasterizer;
mod safe;
mod types;

pub use cache::DocumentCache;
pub use error::{DocumentError, DocumentResult};
pub use native::{
    assess_text_layer, meets_native_thresholds, text_layer_score, NativeExtraction,
    NativeTextExtractor, TextLayerExtractor, MIN_NATIVE_CONFIDENCE, MIN_NATIVE_TEXT_CHARS,
};
pub use rasterizer::{
    clamp_scale, resolve_pages, MupdfRasterizer, PageRasterizer, DEFAULT_RENDER_SCALE,
    MAX_RENDER_SCALE, MIN_RENDER_SCALE,
};
pub use safe::SafeDocument;
pub use types::{content_id, DocumentKind, PageImage, SourceDocument};

#[cfg(test)]
pub(crate) mod testing;
