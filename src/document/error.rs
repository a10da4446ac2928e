//! Document error types

use thiserror::Error;

/// Errors raised while loading, reading or rendering a document
#[derive(Debug, Error)]
pub enum DocumentError {
    /// Content is neither a supported image nor a paginated document
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Failed to parse document
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Page number outside `1..=page_count`
    #[error("Page not found: {0}")]
    PageNotFound(u32),

    /// Failed to render a page
    #[error("Render error on page {page}: {message}")]
    RenderError { page: u32, message: String },

    /// Text layer could not be read
    #[error("Text extraction error: {0}")]
    TextExtractionError(String),

    /// MuPDF context error
    #[error("MuPDF context error: {0}")]
    ContextError(String),

    /// Image processing error
    #[error("Image error: {0}")]
    ImageError(String),

    /// Blocking task failed to join
    #[error("Thread pool error: {0}")]
    ThreadPoolError(String),

    /// Timeout error
    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),
}

/// Result type alias for document operations
pub type DocumentResult<T> = std::result::Result<T, DocumentError>;

impl From<mupdf::Error> for DocumentError {
    fn from(err: mupdf::Error) -> Self {
        DocumentError::ContextError(err.to_string())
    }
}

impl From<tokio::task::JoinError> for DocumentError {
    fn from(err: tokio::task::JoinError) -> Self {
        DocumentError::ThreadPoolError(err.to_string())
    }
}
