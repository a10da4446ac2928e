//! Native text layer extraction
//!
//! Reads the embedded text of paginated documents and scores it with a
//! cheap heuristic. Thin or noisy text layers (typical of scans with a bad
//! OCR layer) are reported as `None` so the caller can rasterize instead.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::{timeout, Duration};

use crate::pages::{char_count, encode_pages, PageResult};

use super::rasterizer::resolve_pages;
use super::{DocumentCache, DocumentError, DocumentResult, SourceDocument};

/// Timeout for reading the text layer of a whole selection
const TEXT_TIMEOUT_SECS: u64 = 30;

/// Minimum combined characters for a usable text layer
pub const MIN_NATIVE_TEXT_CHARS: usize = 50;
/// Average page score (0.0 - 1.0) a text layer must exceed
pub const MIN_NATIVE_CONFIDENCE: f64 = 0.6;

/// Text layer accepted as the document's text
#[derive(Debug, Clone, PartialEq)]
pub struct NativeExtraction {
    /// Packed page text
    pub text: String,
    /// Mean page score, 0.0 - 1.0
    pub confidence: f64,
    pub has_native_text: bool,
    /// Per page, confidences as percentages
    pub pages: Vec<PageResult>,
}

/// Source of embedded document text
#[async_trait]
pub trait TextLayerExtractor: Send + Sync {
    /// Extract the text layer of `pages` (every page when `None`).
    ///
    /// `Ok(None)` means the layer is missing or too poor to use.
    async fn extract(
        &self,
        document: &SourceDocument,
        pages: Option<&[u32]>,
    ) -> DocumentResult<Option<NativeExtraction>>;
}

/// MuPDF-backed extractor
#[derive(Clone, Default)]
pub struct NativeTextExtractor {
    cache: DocumentCache,
}

impl NativeTextExtractor {
    pub fn new(cache: DocumentCache) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl TextLayerExtractor for NativeTextExtractor {
    async fn extract(
        &self,
        document: &SourceDocument,
        pages: Option<&[u32]>,
    ) -> DocumentResult<Option<NativeExtraction>> {
        if !document.kind.is_paginated() {
            return Ok(None);
        }

        let doc = self.cache.open(document).await?;
        let page_numbers = resolve_pages(pages, doc.page_count());

        let reader = Arc::clone(&doc);
        let raw = timeout(
            Duration::from_secs(TEXT_TIMEOUT_SECS),
            tokio::task::spawn_blocking(move || {
                page_numbers
                    .into_iter()
                    .map(|n| reader.page_text(n).map(|text| (n, text)))
                    .collect::<DocumentResult<Vec<_>>>()
            }),
        )
        .await
        .map_err(|_| DocumentError::Timeout(TEXT_TIMEOUT_SECS))???;

        let extraction = assess_text_layer(raw);
        match &extraction {
            Some(e) => tracing::debug!(
                "Native text accepted for {} ({} pages, score {:.2})",
                document.file_name,
                e.pages.len(),
                e.confidence
            ),
            None => tracing::debug!("Native text rejected for {}", document.file_name),
        }
        Ok(extraction)
    }
}

/// Score and threshold raw page texts
pub fn assess_text_layer(raw: Vec<(u32, String)>) -> Option<NativeExtraction> {
    if raw.is_empty() {
        return None;
    }

    let mut total_chars = 0;
    let mut score_sum = 0.0;
    let mut pages = Vec::with_capacity(raw.len());
    for (page_number, text) in raw {
        let text = text.trim();
        let score = text_layer_score(text);
        total_chars += char_count(text);
        score_sum += score;
        pages.push(PageResult::new(page_number, text, (score * 100.0).round()));
    }
    let confidence = score_sum / pages.len() as f64;

    if !meets_native_thresholds(total_chars, confidence) {
        return None;
    }

    Some(NativeExtraction {
        text: encode_pages(&pages),
        confidence,
        has_native_text: total_chars > 0,
        pages,
    })
}

/// Whether a text layer is good enough to skip recognition
pub fn meets_native_thresholds(total_chars: usize, confidence: f64) -> bool {
    total_chars >= MIN_NATIVE_TEXT_CHARS && confidence > MIN_NATIVE_CONFIDENCE
}

/// Heuristic quality of one page of embedded text, 0.0 - 1.0
pub fn text_layer_score(text: &str) -> f64 {
    if text.trim().is_empty() {
        return 0.0;
    }

    let mut score: f64 = 0.5;
    if text.chars().any(char::is_alphabetic) {
        score += 0.3;
    }
    if text.chars().any(|c| c.is_ascii_digit()) {
        score += 0.1;
    }
    if text.chars().any(char::is_whitespace) {
        score += 0.2;
    }

    let (visible, special) = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .fold((0usize, 0usize), |(visible, special), c| {
            (visible + 1, special + usize::from(!c.is_alphanumeric()))
        });
    if (special as f64) < visible as f64 * 0.3 {
        score += 0.2;
    }

    score.min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_empty_is_zero() {
        assert_eq!(text_layer_score(""), 0.0);
        assert_eq!(text_layer_score("  \n "), 0.0);
    }

    #[test]
    fn test_score_components() {
        // base + alphabetic + clean
        assert!((text_layer_score("hello") - 1.0).abs() < 1e-9);
        // base + digits + clean
        assert!((text_layer_score("12345") - 0.8).abs() < 1e-9);
        // base only: all symbols, no whitespace
        assert!((text_layer_score("#$%&*") - 0.5).abs() < 1e-9);
        // base + whitespace, mostly symbols
        assert!((text_layer_score("#$ %&") - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_threshold_boundaries() {
        assert!(!meets_native_thresholds(49, 0.9));
        assert!(meets_native_thresholds(51, 0.61));
        assert!(meets_native_thresholds(50, 0.61));
        assert!(!meets_native_thresholds(500, 0.6));
    }

    #[test]
    fn test_assess_rejects_short_text() {
        let raw = vec![(1, "a".repeat(49))];
        assert!(assess_text_layer(raw).is_none());
    }

    #[test]
    fn test_assess_accepts_and_packs() {
        let raw = vec![
            (1, format!("  {}  ", "word ".repeat(10))),
            (2, "second page text".to_string()),
        ];
        let extraction = assess_text_layer(raw).unwrap();
        assert!(extraction.has_native_text);
        assert_eq!(extraction.pages.len(), 2);
        assert_eq!(extraction.pages[0].confidence, 100.0);
        assert!(extraction.text.starts_with("=== PAGE 1 ===\nword word"));
        assert!(extraction.text.contains("=== PAGE 2 ===\nsecond page text\n=== END PAGE 2 ==="));
    }

    #[test]
    fn test_assess_blank_pages_drag_average_down() {
        let raw = vec![
            (1, "x".repeat(60)),
            (2, String::new()),
            (3, String::new()),
        ];
        // (1.0 + 0 + 0) / 3 is below the threshold
        assert!(assess_text_layer(raw).is_none());
    }
}
