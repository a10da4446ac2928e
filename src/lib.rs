//! Folio OCR
//!
//! Text extraction service for scanned documents and images. Documents with
//! a usable text layer are read directly; everything else is rasterized and
//! recognized page by page through a bounded recognition queue.

pub mod confidence;
pub mod config;
pub mod document;
pub mod error;
pub mod jobs;
pub mod ocr;
pub mod pages;
pub mod pipeline;
pub mod progress;
pub mod routes;
pub mod state;
