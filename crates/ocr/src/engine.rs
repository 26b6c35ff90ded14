//! OCR engines that turn a decoded image into text.

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use std::{fmt::Debug, io::Cursor, process::Stdio};
use thiserror::Error;
use tokio::{io::AsyncWriteExt, process::Command};
use tracing::debug;

pub const DEFAULT_LANGUAGE: &str = "eng";

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("Failed to encode image for OCR: {0}")]
    Encode(#[from] image::ImageError),
    #[error("Failed to start '{binary}': {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error while talking to the OCR process: {0}")]
    Io(#[from] std::io::Error),
    #[error("OCR process exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("Failed to initialize Tesseract: {0}")]
    Init(String),
    #[error("Failed to run OCR: {0}")]
    Recognition(String),
}

/// Recognizes the text in an image.
#[async_trait]
pub trait OcrEngine: Send + Sync + Debug {
    async fn recognize(&self, image: &DynamicImage) -> Result<String, OcrError>;
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, OcrError> {
    let mut png_buf = Cursor::new(Vec::new());
    image.write_to(&mut png_buf, ImageFormat::Png)?;
    Ok(png_buf.into_inner())
}

/// Runs the `tesseract` command-line tool, piping the image through stdin.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    binary: String,
    language: String,
}

impl Default for TesseractCli {
    fn default() -> Self {
        Self {
            binary: "tesseract".to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

impl TesseractCli {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tesseract language codes, e.g. `eng` or `eng+fra`.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Uses a binary other than the `tesseract` found on `PATH`.
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn language(&self) -> &str {
        &self.language
    }
}

#[async_trait]
impl OcrEngine for TesseractCli {
    async fn recognize(&self, image: &DynamicImage) -> Result<String, OcrError> {
        let png = encode_png(image)?;
        debug!(
            "--> Running {} on a {}x{} image ({} PNG bytes)",
            self.binary,
            image.width(),
            image.height(),
            png.len()
        );

        let mut child = Command::new(&self.binary)
            .args(["stdin", "stdout", "-l", self.language.as_str()])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| OcrError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&png).await?;
            // Closing stdin tells tesseract the image is complete.
            drop(stdin);
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(OcrError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// In-process Tesseract through `leptess`.
#[cfg(feature = "leptess")]
#[derive(Debug, Clone)]
pub struct LeptessEngine {
    language: String,
}

#[cfg(feature = "leptess")]
impl LeptessEngine {
    /// Fails early when the language data is not installed.
    pub fn new(language: impl Into<String>) -> Result<Self, OcrError> {
        let language = language.into();
        leptess::LepTess::new(None, &language).map_err(|e| {
            OcrError::Init(format!(
                "language '{language}' is unavailable: {e}. Make sure the Tesseract language data is installed"
            ))
        })?;
        Ok(Self { language })
    }
}

#[cfg(feature = "leptess")]
#[async_trait]
impl OcrEngine for LeptessEngine {
    async fn recognize(&self, image: &DynamicImage) -> Result<String, OcrError> {
        let png = encode_png(image)?;
        let language = self.language.clone();
        tokio::task::spawn_blocking(move || -> Result<String, OcrError> {
            let mut lt = leptess::LepTess::new(None, &language)
                .map_err(|e| OcrError::Init(e.to_string()))?;
            lt.set_image_from_mem(&png)
                .map_err(|e| OcrError::Recognition(format!("failed to set image: {e}")))?;
            let text = lt
                .get_utf8_text()
                .map_err(|e| OcrError::Recognition(e.to_string()))?;
            Ok(text.trim().to_string())
        })
        .await
        .map_err(|e| OcrError::Recognition(format!("OCR task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_is_a_spawn_error() {
        let engine = TesseractCli::new().with_binary("/nonexistent/tesseract-binary");
        let image = DynamicImage::new_rgb8(8, 8);

        let err = engine.recognize(&image).await.unwrap_err();

        assert!(
            matches!(err, OcrError::Spawn { ref binary, .. } if binary == "/nonexistent/tesseract-binary")
        );
    }

    #[test]
    fn test_default_language() {
        assert_eq!(TesseractCli::new().language(), "eng");
        assert_eq!(TesseractCli::new().with_language("eng+msa").language(), "eng+msa");
    }
}
