//! # Document References
//!
//! Types identifying a single source document and the document type it is
//! extracted as.

use crate::{
    prompts::extraction::{
        CONTRACT_EXTRACTION_SYSTEM_PROMPT, CONTRACT_QUESTION_TEMPLATE,
        RECEIPT_EXTRACTION_SYSTEM_PROMPT, RECEIPT_QUESTION_TEMPLATE,
    },
    schema::{FieldSchema, CONTRACT_SCHEMA, RECEIPT_SCHEMA},
};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// How the raw content of a document is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// An image addressed by an index in the raw-data content source.
    Image,
    /// A PDF addressed by a filesystem path or an `http(s)` URL.
    Pdf,
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKind::Image => write!(f, "image"),
            DocumentKind::Pdf => write!(f, "pdf"),
        }
    }
}

/// Identifies one source document. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentRef {
    kind: DocumentKind,
    locator: String,
}

impl DocumentRef {
    pub fn new(kind: DocumentKind, locator: impl Into<String>) -> Self {
        Self {
            kind,
            locator: locator.into(),
        }
    }

    /// An image document, e.g. `DocumentRef::image("069")`.
    pub fn image(index: impl Into<String>) -> Self {
        Self::new(DocumentKind::Image, index)
    }

    /// A PDF document at a path or URL.
    pub fn pdf(path: impl Into<String>) -> Self {
        Self::new(DocumentKind::Pdf, path)
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.locator)
    }
}

/// The document types the extraction agent knows how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Receipt,
    Contract,
}

impl DocumentType {
    pub fn schema(&self) -> &'static FieldSchema {
        match self {
            DocumentType::Receipt => &RECEIPT_SCHEMA,
            DocumentType::Contract => &CONTRACT_SCHEMA,
        }
    }

    /// The kind of document this type is usually read from.
    pub fn default_kind(&self) -> DocumentKind {
        match self {
            DocumentType::Receipt => DocumentKind::Image,
            DocumentType::Contract => DocumentKind::Pdf,
        }
    }

    pub fn system_prompt(&self) -> &'static str {
        match self {
            DocumentType::Receipt => RECEIPT_EXTRACTION_SYSTEM_PROMPT,
            DocumentType::Contract => CONTRACT_EXTRACTION_SYSTEM_PROMPT,
        }
    }

    /// Builds the user question for one field of one document.
    pub fn question(&self, field: &str, document: &DocumentRef) -> String {
        let template = match self {
            DocumentType::Receipt => RECEIPT_QUESTION_TEMPLATE,
            DocumentType::Contract => CONTRACT_QUESTION_TEMPLATE,
        };
        template
            .replace("{field}", field)
            .replace("{locator}", document.locator())
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentType::Receipt => write!(f, "Receipt"),
            DocumentType::Contract => write!(f, "Contract"),
        }
    }
}

impl FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "receipt" => Ok(DocumentType::Receipt),
            "contract" => Ok(DocumentType::Contract),
            other => Err(format!(
                "Unknown document type '{other}'. Expected 'Receipt' or 'Contract'."
            )),
        }
    }
}
