//! Core document types

use std::sync::Arc;

use image::{DynamicImage, ImageFormat};
use serde::Serialize;
use sha2::{Digest, Sha256};

use super::{DocumentError, DocumentResult};

/// What kind of content a submission holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// Single flat image (photo, scan)
    Image(ImageFormat),
    /// Multi-page document (PDF)
    Paginated,
}

/// Image formats accepted as flat documents
const SUPPORTED_IMAGE_FORMATS: &[ImageFormat] = &[
    ImageFormat::Png,
    ImageFormat::Jpeg,
    ImageFormat::WebP,
    ImageFormat::Tiff,
    ImageFormat::Bmp,
    ImageFormat::Gif,
];

impl DocumentKind {
    /// Detect the kind from magic bytes
    pub fn from_magic_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 4 {
            return None;
        }

        // PDF magic: %PDF
        if bytes.starts_with(b"%PDF") {
            return Some(Self::Paginated);
        }

        image::guess_format(bytes)
            .ok()
            .filter(|format| SUPPORTED_IMAGE_FORMATS.contains(format))
            .map(Self::Image)
    }

    pub fn is_paginated(&self) -> bool {
        matches!(self, Self::Paginated)
    }

    /// Short label for logs and API output
    pub fn label(&self) -> &'static str {
        match self {
            Self::Paginated => "pdf",
            Self::Image(format) => format.extensions_str().first().copied().unwrap_or("image"),
        }
    }
}

impl Serialize for DocumentKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// Submitted document content
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Hex SHA-256 of the content
    pub id: String,
    pub file_name: String,
    pub data: Arc<Vec<u8>>,
    pub kind: DocumentKind,
}

impl SourceDocument {
    /// Identify and wrap uploaded bytes
    pub fn from_bytes(file_name: impl Into<String>, data: Vec<u8>) -> DocumentResult<Self> {
        let file_name = file_name.into();
        let kind = DocumentKind::from_magic_bytes(&data).ok_or_else(|| {
            DocumentError::UnsupportedFormat(format!("{} is not a PDF or a supported image", file_name))
        })?;

        Ok(Self {
            id: content_id(&data),
            file_name,
            data: Arc::new(data),
            kind,
        })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Content-addressed document id
pub fn content_id(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Rendered page ready for recognition
#[derive(Debug, Clone)]
pub struct PageImage {
    /// 1-based
    pub page_number: u32,
    pub image: DynamicImage,
}
