//! Text statistics

use serde::Serialize;

use super::PageResult;

/// Whitespace-delimited token count
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Character count (Unicode scalar values)
pub fn char_count(text: &str) -> usize {
    text.chars().count()
}

/// Aggregate statistics of a whole document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentStats {
    pub total_pages: usize,
    pub total_word_count: usize,
    pub total_char_count: usize,
}

impl DocumentStats {
    pub fn from_pages(pages: &[PageResult]) -> Self {
        Self {
            total_pages: pages.len(),
            total_word_count: pages.iter().map(|p| word_count(&p.text)).sum(),
            total_char_count: pages.iter().map(|p| char_count(&p.text)).sum(),
        }
    }
}
