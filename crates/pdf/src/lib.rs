//! # docextract-pdf: PDF Content Fetcher
//!
//! Implements [`ContentFetcher`] for `pdf` documents. The locator is either a
//! filesystem path or an `http(s)` URL; the text of every page is extracted
//! in document order.

use async_trait::async_trait;
use docextract::{
    document::{DocumentKind, DocumentRef},
    errors::FetchError,
    fetcher::ContentFetcher,
};
use pdf::{
    content::{Op, TextDrawAdjusted},
    file::FileOptions,
};
use tracing::{debug, info, instrument, warn};

/// Reads PDF documents from disk or over HTTP and returns their text.
#[derive(Debug, Clone)]
pub struct PdfFetcher {
    client: reqwest::Client,
}

impl PdfFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn read_bytes(&self, locator: &str) -> Result<Vec<u8>, FetchError> {
        if !is_url(locator) {
            return tokio::fs::read(locator)
                .await
                .map_err(|source| FetchError::Io {
                    path: locator.to_string(),
                    source,
                });
        }

        debug!("--> Downloading PDF from {}", locator);
        let request_error = |source| FetchError::Request {
            url: locator.to_string(),
            source,
        };
        let response = self
            .client
            .get(locator)
            .send()
            .await
            .map_err(request_error)?;
        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: locator.to_string(),
                status: response.status().as_u16(),
            });
        }
        let bytes = response.bytes().await.map_err(request_error)?;
        Ok(bytes.to_vec())
    }
}

impl Default for PdfFetcher {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

fn is_url(locator: &str) -> bool {
    locator.starts_with("http://") || locator.starts_with("https://")
}

/// Extracts the text of all pages of a PDF.
///
/// Text-show operators contribute their strings; each text-line operator and
/// each page boundary contributes a newline. CPU bound, so async callers
/// should run it on a blocking thread.
pub fn extract_text(pdf_data: &[u8]) -> Result<String, FetchError> {
    let file = FileOptions::cached()
        .load(pdf_data)
        .map_err(|e| FetchError::Pdf(e.to_string()))?;
    let resolver = file.resolver();
    let mut full_text = String::new();

    for page_num in 0..file.num_pages() {
        let page = file
            .get_page(page_num)
            .map_err(|e| FetchError::Pdf(e.to_string()))?;

        let Some(content) = &page.contents else {
            warn!("Page {} has no content stream.", page_num);
            continue;
        };
        let operations = content
            .operations(&resolver)
            .map_err(|e| FetchError::Pdf(e.to_string()))?;

        for op in operations.iter() {
            match op {
                Op::TextDraw { text } => full_text.push_str(&text.to_string_lossy()),
                Op::TextDrawAdjusted { array } => {
                    for item in array.iter() {
                        if let TextDrawAdjusted::Text(text) = item {
                            full_text.push_str(&text.to_string_lossy());
                        }
                    }
                }
                Op::TextNewline | Op::EndText => end_line(&mut full_text),
                _ => {}
            }
        }
        end_line(&mut full_text);
    }

    Ok(full_text.trim_end().to_string())
}

fn end_line(text: &mut String) {
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
}

#[async_trait]
impl ContentFetcher for PdfFetcher {
    #[instrument(name = "processing contract PDF", skip(self, document), fields(document = %document))]
    async fn fetch(&self, document: &DocumentRef) -> Result<String, FetchError> {
        if document.kind() != DocumentKind::Pdf {
            return Err(FetchError::UnsupportedKind(document.kind()));
        }

        let data = self.read_bytes(document.locator()).await?;
        let text = tokio::task::spawn_blocking(move || extract_text(&data))
            .await
            .map_err(|e| FetchError::Pdf(format!("PDF parsing task failed: {e}")))??;

        info!(
            "Extracted {} characters of text from {}",
            text.chars().count(),
            document.locator()
        );
        Ok(text)
    }
}
