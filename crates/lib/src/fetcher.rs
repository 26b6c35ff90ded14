//! # Content Fetchers
//!
//! A content fetcher turns a [`DocumentRef`] into raw unstructured text. The
//! concrete OCR and PDF fetchers live in the `docextract-ocr` and
//! `docextract-pdf` plugin crates; this module defines the contract and a
//! router that dispatches on the document kind.

use crate::{
    document::{DocumentKind, DocumentRef},
    errors::FetchError,
};
use async_trait::async_trait;
use std::{collections::HashMap, fmt::Debug, sync::Arc};
use tracing::debug;

/// Retrieves the raw text of a document.
///
/// Implementations must not cache: every call re-fetches. They may perform
/// one network call or one filesystem open per invocation.
#[async_trait]
pub trait ContentFetcher: Send + Sync + Debug {
    async fn fetch(&self, document: &DocumentRef) -> Result<String, FetchError>;
}

/// Dispatches each document to the fetcher registered for its kind.
#[derive(Debug, Default, Clone)]
pub struct FetcherRouter {
    fetchers: HashMap<DocumentKind, Arc<dyn ContentFetcher>>,
}

impl FetcherRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the fetcher for a document kind, replacing any previous one.
    pub fn route(mut self, kind: DocumentKind, fetcher: Arc<dyn ContentFetcher>) -> Self {
        self.fetchers.insert(kind, fetcher);
        self
    }
}

#[async_trait]
impl ContentFetcher for FetcherRouter {
    async fn fetch(&self, document: &DocumentRef) -> Result<String, FetchError> {
        let fetcher = self
            .fetchers
            .get(&document.kind())
            .ok_or(FetchError::UnsupportedKind(document.kind()))?;
        debug!("Routing {} to its {} fetcher", document, document.kind());
        fetcher.fetch(document).await
    }
}
