//! Paginated text
//!
//! Multi-page results travel as a single text blob with page markers:
//!
//! ```text
//! === PAGE 1 ===
//! <page 1 text>
//! === END PAGE 1 ===
//!
//! === PAGE 2 ===
//! [No text found on this page]
//! === END PAGE 2 ===
//! ```
//!
//! The format is persisted by callers and must stay stable.

mod markers;
mod ranges;
mod selection;
mod stats;

use serde::{Deserialize, Serialize};

pub use markers::{decode_pages, encode_pages, has_page_markers, EMPTY_PAGE_PLACEHOLDER};
pub use ranges::{compress_page_ranges, parse_page_ranges, MAX_PARSED_PAGES};
pub use selection::{PageSelectionService, PageValidation, SelectionResult};
pub use stats::{char_count, word_count, DocumentStats};

/// Text of one page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult {
    /// Page number (1-indexed)
    pub page_number: u32,
    pub text: String,
    /// Confidence (0-100)
    #[serde(default)]
    pub confidence: f64,
}

impl PageResult {
    pub fn new(page_number: u32, text: impl Into<String>, confidence: f64) -> Self {
        Self {
            page_number,
            text: text.into(),
            confidence,
        }
    }
}
