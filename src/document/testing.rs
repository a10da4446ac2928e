//! In-memory stand-ins for MuPDF-backed components

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use image::{DynamicImage, RgbaImage};

use crate::pages::{char_count, encode_pages, PageResult};

use super::*;

/// Text layer with a fixed body and score
pub struct StubTextLayer {
    pub text: String,
    pub confidence: f64,
}

impl StubTextLayer {
    pub fn empty() -> Self {
        Self {
            text: String::new(),
            confidence: 0.0,
        }
    }
}

#[async_trait]
impl TextLayerExtractor for StubTextLayer {
    async fn extract(
        &self,
        _document: &SourceDocument,
        _pages: Option<&[u32]>,
    ) -> DocumentResult<Option<NativeExtraction>> {
        if !meets_native_thresholds(char_count(&self.text), self.confidence) {
            return Ok(None);
        }
        let pages = vec![PageResult::new(1, self.text.clone(), self.confidence * 100.0)];
        Ok(Some(NativeExtraction {
            text: encode_pages(&pages),
            confidence: self.confidence,
            has_native_text: true,
            pages,
        }))
    }
}

/// Rasterizer producing blank 4x4 pages
pub struct StubRasterizer {
    pub pages: u32,
    pub fail_render_on: Option<u32>,
    pub panic_on_render: Option<u32>,
    pub renders: AtomicUsize,
}

impl StubRasterizer {
    pub fn new(pages: u32) -> Self {
        Self {
            pages,
            fail_render_on: None,
            panic_on_render: None,
            renders: AtomicUsize::new(0),
        }
    }

    pub fn render_count(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageRasterizer for StubRasterizer {
    async fn page_count(&self, _document: &SourceDocument) -> DocumentResult<u32> {
        Ok(self.pages)
    }

    async fn rasterize(
        &self,
        _document: &SourceDocument,
        pages: &[u32],
        _scale: f32,
    ) -> DocumentResult<Vec<PageImage>> {
        let mut images = Vec::new();
        for page_number in resolve_pages(Some(pages), self.pages) {
            if self.panic_on_render == Some(page_number) {
                panic!("stub rasterizer panicked on page {}", page_number);
            }
            if self.fail_render_on == Some(page_number) {
                return Err(DocumentError::RenderError {
                    page: page_number,
                    message: "broken page".into(),
                });
            }
            self.renders.fetch_add(1, Ordering::SeqCst);
            images.push(PageImage {
                page_number,
                image: DynamicImage::ImageRgba8(RgbaImage::new(4, 4)),
            });
        }
        Ok(images)
    }
}

/// Paginated document whose bytes only carry the PDF magic
pub fn stub_pdf(file_name: &str) -> SourceDocument {
    SourceDocument::from_bytes(file_name, b"%PDF-1.4 stub".to_vec())
        .unwrap_or_else(|e| panic!("stub pdf rejected: {e}"))
}

/// Blank PNG bytes
pub fn blank_png(width: u32, height: u32) -> Vec<u8> {
    crate::ocr::encode_png(&DynamicImage::ImageRgba8(RgbaImage::new(width, height)))
        .unwrap_or_else(|e| panic!("png encoding failed: {e}"))
}
