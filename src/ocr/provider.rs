//! OCR Providers
//!
//! Engine implementations for the supported OCR backends.

use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::{timeout, Duration};

use super::engine::{
    validate_language, EngineConfidence, EngineOutput, EngineWord, LoadedEngine, RecognitionEngine,
};
use super::types::{OcrError, OcrProvider, PixelRect};

/// Timeout for a single recognition call
const RECOGNIZE_TIMEOUT_SECS: u64 = 120;

/// Tesseract OCR provider (CLI)
pub struct TesseractEngine {
    /// Path to the tesseract executable
    binary: String,
}

impl TesseractEngine {
    pub fn new(binary: &str) -> Self {
        Self {
            binary: binary.to_string(),
        }
    }

    /// Languages reported by `tesseract --list-langs`
    async fn installed_languages(&self) -> Result<Vec<String>, OcrError> {
        let output = Command::new(&self.binary)
            .arg("--list-langs")
            .output()
            .await
            .map_err(|e| OcrError::ProviderNotAvailable(format!("Failed to run tesseract: {}", e)))?;

        // Older releases print the list on stderr
        let listing = format!(
            "{}\n{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        Ok(parse_language_list(&listing))
    }
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self::new("tesseract")
    }
}

#[async_trait]
impl RecognitionEngine for TesseractEngine {
    fn provider_type(&self) -> OcrProvider {
        OcrProvider::Tesseract
    }

    async fn is_available(&self) -> bool {
        matches!(
            Command::new(&self.binary)
                .arg("--version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await,
            Ok(status) if status.success()
        )
    }

    async fn load(&self, language: &str) -> Result<Arc<dyn LoadedEngine>, OcrError> {
        validate_language(language)?;

        let installed = self.installed_languages().await?;
        if let Some(missing) = language
            .split('+')
            .find(|lang| !installed.iter().any(|i| i == lang))
        {
            return Err(OcrError::InitializationFailed(format!(
                "tesseract language pack '{}' is not installed",
                missing
            )));
        }

        tracing::debug!("Tesseract ready for language {}", language);
        Ok(Arc::new(TesseractInstance {
            binary: self.binary.clone(),
            language: language.to_string(),
        }))
    }
}

struct TesseractInstance {
    binary: String,
    language: String,
}

#[async_trait]
impl LoadedEngine for TesseractInstance {
    fn language(&self) -> &str {
        &self.language
    }

    async fn recognize(&self, image_png: &[u8]) -> Result<EngineOutput, OcrError> {
        let mut child = Command::new(&self.binary)
            .args(["stdin", "stdout", "-l", &self.language, "--oem", "3", "--psm", "3", "tsv"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| OcrError::ProcessingError(format!("Failed to run tesseract: {}", e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(image_png)
                .await
                .map_err(|e| OcrError::ProcessingError(format!("Failed to pipe image: {}", e)))?;
        }

        let output = timeout(
            Duration::from_secs(RECOGNIZE_TIMEOUT_SECS),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| OcrError::Timeout(RECOGNIZE_TIMEOUT_SECS))?
        .map_err(|e| OcrError::ProcessingError(format!("Tesseract did not finish: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::ProcessingError(format!(
                "Tesseract failed: {}",
                stderr.trim()
            )));
        }

        Ok(parse_tsv(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Parse the language listing, skipping the header line
fn parse_language_list(listing: &str) -> Vec<String> {
    listing
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("List of available languages"))
        .filter(|line| line.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'))
        .map(str::to_string)
        .collect()
}

/// Parse tesseract TSV output.
///
/// Word rows (level 5) carry a box and a 0-100 confidence. Text is rebuilt
/// with one line per TSV line and a blank line between paragraphs.
fn parse_tsv(tsv: &str) -> EngineOutput {
    let mut text = String::new();
    let mut words = Vec::new();
    let mut current_line: Option<(u32, u32, u32)> = None;
    let mut current_para: Option<(u32, u32)> = None;

    for row in tsv.lines().skip(1) {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 12 || cols[0] != "5" {
            continue;
        }

        let num = |i: usize| cols[i].trim().parse::<u32>().ok();
        let (Some(block), Some(par), Some(line)) = (num(2), num(3), num(4)) else {
            continue;
        };
        let word_text = cols[11].trim();
        let conf = cols[10].trim().parse::<f64>().unwrap_or(-1.0);
        if word_text.is_empty() || conf < 0.0 {
            continue;
        }

        if current_para.is_some() && current_para != Some((block, par)) {
            text.push_str("\n\n");
        } else if current_line.is_some() && current_line != Some((block, par, line)) {
            text.push('\n');
        } else if !text.is_empty() {
            text.push(' ');
        }
        current_para = Some((block, par));
        current_line = Some((block, par, line));
        text.push_str(word_text);

        words.push(EngineWord {
            text: word_text.to_string(),
            confidence: EngineConfidence::Percent(conf),
            bbox: PixelRect {
                x: num(6).unwrap_or(0),
                y: num(7).unwrap_or(0),
                width: num(8).unwrap_or(0),
                height: num(9).unwrap_or(0),
            },
        });
    }

    EngineOutput {
        text,
        // Overall score is the word mean, computed at validation
        confidence: EngineConfidence::Unreported,
        words,
    }
}

/// Ollama vision model provider
pub struct OllamaEngine {
    /// Ollama API URL
    base_url: String,
    /// Model name (e.g., "llava", "bakllava")
    model: String,
    client: reqwest::Client,
}

impl OllamaEngine {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn default_url() -> Self {
        Self::new("http://localhost:11434", "llava")
    }
}

#[async_trait]
impl RecognitionEngine for OllamaEngine {
    fn provider_type(&self) -> OcrProvider {
        OcrProvider::Ollama
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    async fn load(&self, language: &str) -> Result<Arc<dyn LoadedEngine>, OcrError> {
        validate_language(language)?;
        if !self.is_available().await {
            return Err(OcrError::ProviderNotAvailable(format!(
                "Ollama is not reachable at {}",
                self.base_url
            )));
        }

        Ok(Arc::new(OllamaInstance {
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            language: language.to_string(),
            client: self.client.clone(),
        }))
    }
}

struct OllamaInstance {
    base_url: String,
    model: String,
    language: String,
    client: reqwest::Client,
}

#[async_trait]
impl LoadedEngine for OllamaInstance {
    fn language(&self) -> &str {
        &self.language
    }

    async fn recognize(&self, image_png: &[u8]) -> Result<EngineOutput, OcrError> {
        use base64::Engine;

        let url = format!("{}/api/generate", self.base_url);
        let image_base64 = base64::engine::general_purpose::STANDARD.encode(image_png);

        let prompt = format!(
            "Extract all text from this image exactly as written. The text is in {}. Return only the extracted text, nothing else.",
            self.language
        );

        let request = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "images": [image_base64],
            "stream": false
        });

        let response = self
            .client
            .post(&url)
            .json(&request)
            .timeout(std::time::Duration::from_secs(RECOGNIZE_TIMEOUT_SECS))
            .send()
            .await
            .map_err(|e| OcrError::ApiError(format!("Failed to call Ollama: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(OcrError::ApiError(format!(
                "Ollama returned {}: {}",
                status, body
            )));
        }

        let result: serde_json::Value = response
            .json()
            .await
            .map_err(|e| OcrError::ApiError(format!("Failed to parse response: {}", e)))?;

        let text = result["response"].as_str().ok_or_else(|| {
            OcrError::MalformedResult("Ollama response has no 'response' field".to_string())
        })?;

        // Vision models don't report confidence
        Ok(EngineOutput::text_only(text, EngineConfidence::Percent(75.0)))
    }
}

/// Build the configured engine
pub fn engine_for(
    provider: OcrProvider,
    tesseract_path: &str,
    ollama_url: &str,
    ollama_model: &str,
) -> Box<dyn RecognitionEngine> {
    match provider {
        OcrProvider::Tesseract => Box::new(TesseractEngine::new(tesseract_path)),
        OcrProvider::Ollama => Box::new(OllamaEngine::new(ollama_url, ollama_model)),
    }
}
