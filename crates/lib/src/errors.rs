use crate::document::DocumentKind;
use thiserror::Error;

/// Errors raised at the model-provider boundary.
#[derive(Error, Debug)]
pub enum PromptError {
    #[error("Failed to build Reqwest client: {0}")]
    ReqwestClientBuild(reqwest::Error),
    #[error("Failed to send request to AI provider: {0}")]
    AiRequest(reqwest::Error),
    #[error("Failed to deserialize AI provider response: {0}")]
    AiDeserialization(reqwest::Error),
    #[error("AI provider returned an error: {0}")]
    AiApi(String),
    #[error("AI provider returned an empty response")]
    EmptyResponse,
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised while retrieving raw content for a document.
///
/// A `FetchError` is never retried by the fetcher itself; the extraction
/// agent treats it as a retryable failure of the current attempt.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Request to '{url}' failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Request to '{url}' returned status {status}")]
    Status { url: String, status: u16 },
    #[error("Failed to decode content from '{locator}': {message}")]
    Decode { locator: String, message: String },
    #[error("Failed to open '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("OCR failed: {0}")]
    Ocr(String),
    #[error("Failed to extract PDF text: {0}")]
    Pdf(String),
    #[error("No content fetcher registered for '{0}' documents")]
    UnsupportedKind(DocumentKind),
}
