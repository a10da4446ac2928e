//! Extraction pipeline
//!
//! ```text
//! document ──▶ kind?
//!               ├─ image ──────────────────────────▶ queue ─▶ adapter ─▶ text
//!               └─ paginated ─▶ text layer usable? ─┬─ yes ─▶ packed text
//!                                                   └─ no ──▶ rasterize page
//!                                                             ─▶ queue ─▶ adapter
//!                                                             ─▶ packed text
//! ```
//!
//! A text layer is used when it has at least 50 characters and its mean page
//! score is above 0.6. Recognition failures of single pages are recorded and
//! skipped; engine start-up and render failures abort the job.

mod error;
mod orchestrator;

pub use error::{PipelineError, ValidationError};
pub use orchestrator::{
    CancelFlag, ExtractionStrategy, PageFailure, ProcessRequest, ProcessedDocument,
    ProcessingOrchestrator,
};
