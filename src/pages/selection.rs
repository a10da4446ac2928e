//! Page selection over packed document text
//!
//! Decoded documents are memoized per cache key (usually a job id) so that
//! repeated previews of a large document do not re-parse it.

use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;

use crate::document::content_id;

use super::markers::{decode_pages, encode_pages};
use super::ranges::compress_page_ranges;
use super::stats::{char_count, word_count, DocumentStats};
use super::PageResult;

const DEFAULT_CACHE_SIZE: usize = 32;

/// Selected subset of a packed document
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionResult {
    /// Selected pages, ascending
    pub pages: Vec<PageResult>,
    pub selected_page_numbers: Vec<u32>,
    /// Selected pages re-encoded with page markers
    pub combined_text: String,
    pub total_word_count: usize,
    pub total_char_count: usize,
    /// Compressed label, e.g. `1-3, 5`
    pub page_range: String,
    /// Statistics of the whole document the pages were taken from
    pub document_stats: DocumentStats,
}

/// Outcome of checking requested pages against a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageValidation {
    pub valid: Vec<u32>,
    /// Requested pages the document does not contain
    pub invalid: Vec<u32>,
}

impl PageValidation {
    pub fn is_valid(&self) -> bool {
        self.invalid.is_empty()
    }
}

struct CachedDocument {
    /// SHA-256 of the packed text the pages were decoded from
    source_id: String,
    pages: Arc<Vec<PageResult>>,
    stats: DocumentStats,
}

/// Extracts page subsets from packed text
pub struct PageSelectionService {
    cache: Mutex<LruCache<String, CachedDocument>>,
}

impl Default for PageSelectionService {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_SIZE)
    }
}

impl PageSelectionService {
    pub fn new(cache_size: usize) -> Self {
        let size = NonZeroUsize::new(cache_size)
            .or(NonZeroUsize::new(DEFAULT_CACHE_SIZE))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(size)),
        }
    }

    /// Decode packed text, reusing the memoized pages for `cache_key`
    fn decode(&self, packed: &str, cache_key: Option<&str>) -> (Arc<Vec<PageResult>>, DocumentStats) {
        let Some(key) = cache_key else {
            let pages = decode_pages(packed);
            let stats = DocumentStats::from_pages(&pages);
            return (Arc::new(pages), stats);
        };

        let source_id = content_id(packed.as_bytes());
        {
            let mut cache = self.cache.lock();
            if let Some(cached) = cache.get(key) {
                if cached.source_id == source_id {
                    return (Arc::clone(&cached.pages), cached.stats.clone());
                }
            }
        }

        // Decoding is idempotent, a concurrent miss just does it twice
        let pages = Arc::new(decode_pages(packed));
        let stats = DocumentStats::from_pages(&pages);
        tracing::debug!(cache_key = key, pages = pages.len(), "Decoded packed document");

        self.cache.lock().put(
            key.to_string(),
            CachedDocument {
                source_id,
                pages: Arc::clone(&pages),
                stats: stats.clone(),
            },
        );

        (pages, stats)
    }

    /// Extract the requested pages.
    ///
    /// Page numbers the document does not contain are ignored; use
    /// [`validate_page_selection`](Self::validate_page_selection) first to
    /// reject them.
    pub fn extract_selected_pages(
        &self,
        packed: &str,
        page_numbers: &[u32],
        cache_key: Option<&str>,
    ) -> SelectionResult {
        let (pages, document_stats) = self.decode(packed, cache_key);
        let wanted: BTreeSet<u32> = page_numbers.iter().copied().collect();

        let selected: Vec<PageResult> = pages
            .iter()
            .filter(|p| wanted.contains(&p.page_number))
            .cloned()
            .collect();
        let selected_page_numbers: Vec<u32> = selected.iter().map(|p| p.page_number).collect();

        let combined_text = if selected.is_empty() {
            String::new()
        } else {
            encode_pages(&selected)
        };

        SelectionResult {
            total_word_count: selected.iter().map(|p| word_count(&p.text)).sum(),
            total_char_count: selected.iter().map(|p| char_count(&p.text)).sum(),
            page_range: compress_page_ranges(&selected_page_numbers),
            combined_text,
            selected_page_numbers,
            pages: selected,
            document_stats,
        }
    }

    /// Split requested page numbers into those present and those missing
    pub fn validate_page_selection(
        &self,
        packed: &str,
        page_numbers: &[u32],
        cache_key: Option<&str>,
    ) -> PageValidation {
        let (pages, _) = self.decode(packed, cache_key);
        let present: BTreeSet<u32> = pages.iter().map(|p| p.page_number).collect();
        let requested: BTreeSet<u32> = page_numbers.iter().copied().collect();

        let (valid, invalid) = requested.into_iter().partition(|n| present.contains(n));
        PageValidation { valid, invalid }
    }

    /// Page numbers present in a packed document
    pub fn available_pages(&self, packed: &str, cache_key: Option<&str>) -> Vec<u32> {
        let (pages, _) = self.decode(packed, cache_key);
        pages.iter().map(|p| p.page_number).collect()
    }

    /// Drop a memoized document
    pub fn invalidate(&self, cache_key: &str) {
        self.cache.lock().pop(cache_key);
    }

    pub fn cached_documents(&self) -> usize {
        self.cache.lock().len()
    }
}
