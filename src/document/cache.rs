//! Parsed document cache with LRU eviction
//!
//! Keyed by content id, so populating twice for the same bytes is harmless.
//! Parsing runs on the blocking pool with a timeout; some malformed PDFs make
//! MuPDF spin, and the caller gets an error instead of waiting forever.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use tokio::time::{timeout, Duration};

use super::{DocumentError, DocumentResult, SafeDocument, SourceDocument};

/// Timeout for document parsing operations
pub(crate) const PARSE_TIMEOUT_SECS: u64 = 30;

const DEFAULT_CAPACITY: usize = 16;

/// Thread-safe cache of opened documents
#[derive(Clone)]
pub struct DocumentCache {
    documents: Arc<Mutex<LruCache<String, Arc<SafeDocument>>>>,
}

impl Default for DocumentCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl DocumentCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            documents: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    /// Cached document, opening it on a miss
    pub async fn open(&self, source: &SourceDocument) -> DocumentResult<Arc<SafeDocument>> {
        if let Some(doc) = self.documents.lock().get(&source.id) {
            return Ok(Arc::clone(doc));
        }

        let data = Arc::clone(&source.data);
        let id = source.id.clone();
        let parsed = timeout(
            Duration::from_secs(PARSE_TIMEOUT_SECS),
            tokio::task::spawn_blocking(move || SafeDocument::from_bytes(data, id)),
        )
        .await
        .map_err(|_| {
            tracing::error!("Parsing {} timed out", source.file_name);
            DocumentError::Timeout(PARSE_TIMEOUT_SECS)
        })???;

        let doc = Arc::new(parsed);
        tracing::debug!(
            "Opened {} ({} pages)",
            source.file_name,
            doc.page_count()
        );
        self.documents
            .lock()
            .put(source.id.clone(), Arc::clone(&doc));
        Ok(doc)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.documents.lock().contains(id)
    }

    pub fn invalidate(&self, id: &str) -> bool {
        self.documents.lock().pop(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.documents.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
