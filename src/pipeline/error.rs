//! Pipeline error types

use thiserror::Error;

use crate::document::DocumentError;
use crate::ocr::OcrError;

use super::{ExtractionStrategy, PageFailure};

/// Input rejected before any processing starts
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("Unsupported document: {0}")]
    UnsupportedFormat(String),

    #[error("Document is empty")]
    EmptyDocument,

    #[error("Document is {size} bytes, the limit is {limit}")]
    TooLarge { size: usize, limit: usize },

    #[error("Pages do not exist: {0:?}")]
    InvalidPages(Vec<u32>),

    #[error("No pages selected")]
    NoPagesSelected,

    #[error("Invalid processing options: {0}")]
    InvalidOptions(String),

    #[error("Invalid language: {0}")]
    InvalidLanguage(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Processing failure
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    /// Rendering is fatal for the whole job
    #[error("{strategy} could not render page {page}: {source}")]
    Rasterization {
        strategy: ExtractionStrategy,
        page: u32,
        #[source]
        source: DocumentError,
    },

    /// Engine could not be used at all
    #[error("{strategy} engine failure on page {page}: {source}")]
    Engine {
        strategy: ExtractionStrategy,
        page: u32,
        #[source]
        source: OcrError,
    },

    #[error("{strategy} failed on all {} pages", .failures.len())]
    AllPagesFailed {
        strategy: ExtractionStrategy,
        failures: Vec<PageFailure>,
    },

    #[error("Processing cancelled")]
    Cancelled,
}

impl PipelineError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
