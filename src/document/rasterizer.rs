//! Page rasterization
//!
//! Renders pages of paginated documents to RGBA images for recognition.

use async_trait::async_trait;
use image::{DynamicImage, RgbaImage};
use mupdf::{Colorspace, Matrix};
use tokio::time::{timeout, Duration};

use super::safe::page_index;
use super::{DocumentCache, DocumentError, DocumentResult, PageImage, SourceDocument};

/// Timeout for rendering one page
const RENDER_TIMEOUT_SECS: u64 = 30;

/// Default render scale for recognition (2x the PDF point size)
pub const DEFAULT_RENDER_SCALE: f32 = 2.0;
pub const MIN_RENDER_SCALE: f32 = 0.1;
pub const MAX_RENDER_SCALE: f32 = 4.0;

/// Renders document pages to images
#[async_trait]
pub trait PageRasterizer: Send + Sync {
    /// Number of pages in the document
    async fn page_count(&self, document: &SourceDocument) -> DocumentResult<u32>;

    /// Render `pages` in ascending order.
    ///
    /// Pages outside `1..=page_count` are dropped and duplicates collapse.
    /// Any render failure fails the whole call.
    async fn rasterize(
        &self,
        document: &SourceDocument,
        pages: &[u32],
        scale: f32,
    ) -> DocumentResult<Vec<PageImage>>;
}

/// Ascending, deduplicated page numbers within `1..=total`.
/// `None` selects every page.
pub fn resolve_pages(requested: Option<&[u32]>, total: u32) -> Vec<u32> {
    match requested {
        None => (1..=total).collect(),
        Some(pages) => {
            let mut pages: Vec<u32> = pages
                .iter()
                .copied()
                .filter(|p| (1..=total).contains(p))
                .collect();
            pages.sort_unstable();
            pages.dedup();
            pages
        }
    }
}

pub fn clamp_scale(scale: f32) -> f32 {
    if scale.is_finite() {
        scale.clamp(MIN_RENDER_SCALE, MAX_RENDER_SCALE)
    } else {
        DEFAULT_RENDER_SCALE
    }
}

/// MuPDF-backed rasterizer
#[derive(Clone, Default)]
pub struct MupdfRasterizer {
    cache: DocumentCache,
}

impl MupdfRasterizer {
    pub fn new(cache: DocumentCache) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl PageRasterizer for MupdfRasterizer {
    async fn page_count(&self, document: &SourceDocument) -> DocumentResult<u32> {
        if !document.kind.is_paginated() {
            return Ok(1);
        }
        Ok(self.cache.open(document).await?.page_count())
    }

    async fn rasterize(
        &self,
        document: &SourceDocument,
        pages: &[u32],
        scale: f32,
    ) -> DocumentResult<Vec<PageImage>> {
        if !document.kind.is_paginated() {
            return Err(DocumentError::UnsupportedFormat(format!(
                "{} is not paginated",
                document.file_name
            )));
        }

        let doc = self.cache.open(document).await?;
        let scale = clamp_scale(scale);
        let mut images = Vec::new();

        for page_number in resolve_pages(Some(pages), doc.page_count()) {
            let doc = doc.clone();
            let image = timeout(
                Duration::from_secs(RENDER_TIMEOUT_SECS),
                tokio::task::spawn_blocking(move || {
                    doc.with_doc(|mupdf_doc| {
                        let page = mupdf_doc.load_page(page_index(page_number))?;
                        let matrix = Matrix::new_scale(scale, scale);
                        let pixmap = page.to_pixmap(&matrix, &Colorspace::device_rgb(), true, true)?;
                        pixmap_to_image(&pixmap)
                    })
                    .map_err(|e| match e {
                        DocumentError::RenderError { .. } => e,
                        other => DocumentError::RenderError {
                            page: page_number,
                            message: other.to_string(),
                        },
                    })
                }),
            )
            .await
            .map_err(|_| DocumentError::Timeout(RENDER_TIMEOUT_SECS))???;

            tracing::debug!(
                "Rendered page {} of {} at {}x{}",
                page_number,
                document.file_name,
                image.width(),
                image.height()
            );
            images.push(PageImage { page_number, image });
        }

        Ok(images)
    }
}

/// Convert a MuPDF pixmap (RGB or RGBA samples) to an RGBA image
fn pixmap_to_image(pixmap: &mupdf::Pixmap) -> DocumentResult<DynamicImage> {
    let width = pixmap.width() as u32;
    let height = pixmap.height() as u32;
    let samples = pixmap.samples();
    let n = pixmap.n() as usize;

    let mut rgba_buffer = Vec::with_capacity(width as usize * height as usize * 4);
    for y in 0..height as usize {
        for x in 0..width as usize {
            let offset = (y * width as usize + x) * n;
            let r = samples.get(offset).copied().unwrap_or(0);
            let g = samples.get(offset + 1).copied().unwrap_or(0);
            let b = samples.get(offset + 2).copied().unwrap_or(0);
            let a = if n >= 4 {
                samples.get(offset + 3).copied().unwrap_or(255)
            } else {
                255
            };
            rgba_buffer.extend_from_slice(&[r, g, b, a]);
        }
    }

    let img = RgbaImage::from_raw(width, height, rgba_buffer)
        .ok_or_else(|| DocumentError::ImageError("Failed to create image buffer".to_string()))?;
    Ok(DynamicImage::ImageRgba8(img))
}
