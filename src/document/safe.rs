//! Thread-safe document wrapper for MuPDF
//!
//! MuPDF documents are not thread-safe. This wrapper keeps the raw bytes,
//! opens a fresh document for each operation and serializes access with a
//! `parking_lot::Mutex`, so no document reference outlives its closure.

use std::sync::Arc;

use mupdf::{Document, TextPageOptions};
use parking_lot::Mutex;

use super::{DocumentError, DocumentResult};

const PDF_MIME: &str = "application/pdf";

/// Thread-safe paginated document
pub struct SafeDocument {
    id: String,
    data: Arc<Vec<u8>>,
    page_count: u32,
    lock: Mutex<()>,
}

impl SafeDocument {
    /// Parse `data` once to validate it and read the page count
    pub fn from_bytes(data: Arc<Vec<u8>>, id: String) -> DocumentResult<Self> {
        let doc = Document::from_bytes(&data, PDF_MIME)
            .map_err(|e| DocumentError::ParseError(format!("{}: {}", id, e)))?;
        let count = doc.page_count()?;
        let page_count = u32::try_from(count)
            .map_err(|_| DocumentError::ParseError(format!("invalid page count {}", count)))?;

        Ok(Self {
            id,
            data,
            page_count,
            lock: Mutex::new(()),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Execute a closure with access to a freshly opened document
    pub fn with_doc<F, R>(&self, f: F) -> DocumentResult<R>
    where
        F: FnOnce(&Document) -> DocumentResult<R>,
    {
        let _guard = self.lock.lock();
        let doc = Document::from_bytes(&self.data, PDF_MIME)?;
        f(&doc)
    }

    /// Plain text of one page (1-based)
    pub fn page_text(&self, page_number: u32) -> DocumentResult<String> {
        self.check_page(page_number)?;
        self.with_doc(|doc| {
            let page = doc.load_page(page_index(page_number))?;
            let text_page = page
                .to_text_page(TextPageOptions::empty())
                .map_err(|e| DocumentError::TextExtractionError(e.to_string()))?;
            text_page
                .to_text()
                .map_err(|e| DocumentError::TextExtractionError(e.to_string()))
        })
    }

    pub fn check_page(&self, page_number: u32) -> DocumentResult<()> {
        if page_number == 0 || page_number > self.page_count {
            return Err(DocumentError::PageNotFound(page_number));
        }
        Ok(())
    }
}

/// MuPDF page index for a 1-based page number
pub(crate) fn page_index(page_number: u32) -> i32 {
    i32::try_from(page_number.saturating_sub(1)).unwrap_or(i32::MAX)
}
