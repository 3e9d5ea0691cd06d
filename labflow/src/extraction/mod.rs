//! Biomarker extraction from lab-report PDFs.
//!
//! The extraction itself is done by an external, OpenAI-compatible model. This module owns the
//! client that calls it ([`OpenAiExtractor`]), the lenient parser for whatever the model sends
//! back ([`parse_extraction`]), and the checks run on an upload before any bytes leave the
//! service ([`validate_pdf`]).
//!
//! Handlers only see the [`DocumentExtractor`] trait, so tests can substitute a stub.

mod openai;
mod parse;

pub use openai::OpenAiExtractor;
pub use parse::{parse_date, parse_extraction, parse_numeric};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use utoipa::ToSchema;

use crate::config::ExtractionConfig;
use crate::types::{Biomarker, Gender};

const PDF_MAGIC: &[u8] = b"%PDF-";

/// One extraction call.
#[derive(Clone, Copy)]
pub struct ExtractionRequest<'a> {
    pub pdf: &'a [u8],
    pub filename: &'a str,
    pub api_key: &'a str,
    /// Overrides the configured model for this call
    pub model: Option<&'a str>,
}

impl std::fmt::Debug for ExtractionRequest<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionRequest")
            .field("pdf_bytes", &self.pdf.len())
            .field("filename", &self.filename)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

/// What the model found in a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ExtractedReport {
    pub patient_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub lab_test_date: Option<NaiveDate>,
    pub biomarkers: Vec<Biomarker>,
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Neither the user nor the deployment has an API key for the extraction service
    #[error("no API key configured for extraction")]
    MissingApiKey,

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("document is {size} bytes, limit is {max}")]
    TooLarge { size: usize, max: usize },

    #[error("extraction service error ({status:?}): {message}")]
    Upstream { status: Option<u16>, message: String },

    #[error("extraction service timed out")]
    Timeout,

    #[error("malformed extraction response: {0}")]
    MalformedResponse(String),

    #[error("No biomarkers found in document")]
    NoBiomarkers,
}

/// Something that turns a PDF into an [`ExtractedReport`].
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    async fn extract(&self, request: ExtractionRequest<'_>) -> Result<ExtractedReport, ExtractionError>;
}

/// Reject uploads that cannot be a PDF before they are sent anywhere.
pub fn validate_pdf(bytes: &[u8], max_size: usize) -> Result<(), ExtractionError> {
    if bytes.is_empty() {
        return Err(ExtractionError::InvalidDocument("Uploaded file is empty".to_string()));
    }
    if bytes.len() > max_size {
        return Err(ExtractionError::TooLarge {
            size: bytes.len(),
            max: max_size,
        });
    }
    if !bytes.starts_with(PDF_MAGIC) {
        return Err(ExtractionError::InvalidDocument("Uploaded file is not a PDF".to_string()));
    }
    Ok(())
}

/// Build the extractor used by the running service.
pub fn create_extractor(config: &ExtractionConfig) -> anyhow::Result<Arc<dyn DocumentExtractor>> {
    Ok(Arc::new(OpenAiExtractor::new(config)?))
}
