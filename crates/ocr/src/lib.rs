//! # docextract-ocr: Image Content Fetcher
//!
//! Implements [`ContentFetcher`] for `image` documents: the image for index
//! `N` is downloaded from `{base_url}/img/{N}.jpg`, decoded and passed to an
//! [`OcrEngine`]. The recognized text is the document content.

pub mod engine;

pub use engine::{OcrEngine, OcrError, TesseractCli};
#[cfg(feature = "leptess")]
pub use engine::LeptessEngine;

use async_trait::async_trait;
use docextract::{
    document::{DocumentKind, DocumentRef},
    errors::FetchError,
    fetcher::ContentFetcher,
};
use std::sync::Arc;
use tracing::{debug, field, info, instrument, Span};

/// Downloads receipt images from the raw-data content source and runs OCR on them.
#[derive(Debug, Clone)]
pub struct ImageFetcher {
    client: reqwest::Client,
    base_url: String,
    engine: Arc<dyn OcrEngine>,
}

impl ImageFetcher {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, engine: Arc<dyn OcrEngine>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            engine,
        }
    }

    /// The URL the image for `index` is fetched from.
    pub fn image_url(&self, index: &str) -> String {
        format!("{}/img/{}.jpg", self.base_url.trim_end_matches('/'), index)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let request_error = |source| FetchError::Request {
            url: url.to_string(),
            source,
        };
        let response = self.client.get(url).send().await.map_err(request_error)?;
        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        let bytes = response.bytes().await.map_err(request_error)?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ContentFetcher for ImageFetcher {
    #[instrument(
        name = "processing receipt image using OCR",
        skip(self, document),
        fields(document = %document, ocr_chars = field::Empty)
    )]
    async fn fetch(&self, document: &DocumentRef) -> Result<String, FetchError> {
        if document.kind() != DocumentKind::Image {
            return Err(FetchError::UnsupportedKind(document.kind()));
        }

        let url = self.image_url(document.locator());
        debug!("--> Downloading receipt image from {}", url);
        let bytes = self.download(&url).await?;

        let image = image::load_from_memory(&bytes).map_err(|e| FetchError::Decode {
            locator: url.clone(),
            message: e.to_string(),
        })?;

        let text = self
            .engine
            .recognize(&image)
            .await
            .map_err(|e| FetchError::Ocr(e.to_string()))?;

        let chars = text.chars().count();
        Span::current().record("ocr_chars", chars);
        info!("OCR produced {} characters for {}", chars, document);
        Ok(text)
    }
}
