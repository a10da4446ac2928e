//! Configuration management for Folio OCR

use std::env;
use std::str::FromStr;

use serde::Deserialize;

use crate::document::DEFAULT_RENDER_SCALE;
use crate::jobs::DEFAULT_MAX_UPLOAD_BYTES;
use crate::ocr::{OcrProvider, DEFAULT_COMPLETION_DELAY, DEFAULT_MAX_CONCURRENT};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub ocr: OcrConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcrConfig {
    pub engine: OcrProvider,
    pub default_language: String,
    pub tesseract_path: String,
    pub ollama_url: String,
    pub ollama_model: String,
    /// Simultaneously active recognitions
    pub max_concurrent: usize,
    /// Pause after each recognition before the next one starts
    pub queue_delay_ms: u64,
    /// Rasterization scale for documents without a usable text layer
    pub render_scale: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    pub max_upload_bytes: usize,
    pub document_cache_size: usize,
    pub selection_cache_size: usize,
}

/// Invalid environment value
#[derive(Debug, thiserror::Error)]
#[error("invalid value {value:?} for {name}")]
pub struct ConfigError {
    pub name: &'static str,
    pub value: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            ocr: OcrConfig {
                engine: OcrProvider::Tesseract,
                default_language: "eng".to_string(),
                tesseract_path: "tesseract".to_string(),
                ollama_url: "http://localhost:11434".to_string(),
                ollama_model: "llava".to_string(),
                max_concurrent: DEFAULT_MAX_CONCURRENT,
                queue_delay_ms: DEFAULT_COMPLETION_DELAY.as_millis() as u64,
                render_scale: DEFAULT_RENDER_SCALE,
            },
            limits: LimitsConfig {
                max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
                document_cache_size: 16,
                selection_cache_size: 32,
            },
        }
    }
}

impl Config {
    /// Read settings from the environment; unset variables keep their defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Config::default();
        let string = |name: &str, default: String| lookup(name).unwrap_or(default);

        Ok(Config {
            server: ServerConfig {
                host: string("SERVER_HOST", defaults.server.host),
                port: parse(&lookup, "SERVER_PORT", defaults.server.port)?,
            },
            ocr: OcrConfig {
                engine: parse(&lookup, "OCR_ENGINE", defaults.ocr.engine)?,
                default_language: string("OCR_DEFAULT_LANGUAGE", defaults.ocr.default_language),
                tesseract_path: string("TESSERACT_PATH", defaults.ocr.tesseract_path),
                ollama_url: string("OLLAMA_URL", defaults.ocr.ollama_url),
                ollama_model: string("OLLAMA_MODEL", defaults.ocr.ollama_model),
                max_concurrent: parse(&lookup, "OCR_MAX_CONCURRENT", defaults.ocr.max_concurrent)?,
                queue_delay_ms: parse(&lookup, "OCR_QUEUE_DELAY_MS", defaults.ocr.queue_delay_ms)?,
                render_scale: parse(&lookup, "OCR_RENDER_SCALE", defaults.ocr.render_scale)?,
            },
            limits: LimitsConfig {
                max_upload_bytes: parse(&lookup, "MAX_UPLOAD_BYTES", defaults.limits.max_upload_bytes)?,
                document_cache_size: parse(
                    &lookup,
                    "DOCUMENT_CACHE_SIZE",
                    defaults.limits.document_cache_size,
                )?,
                selection_cache_size: parse(
                    &lookup,
                    "SELECTION_CACHE_SIZE",
                    defaults.limits.selection_cache_size,
                )?,
            },
        })
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError { name, value }),
    }
}
