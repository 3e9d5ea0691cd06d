//! API models for report uploads.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::models::analyses::AnalysisResponse;
use crate::api::models::clients::ClientResponse;
use crate::extraction::ExtractedReport;
use crate::matching::MatchOutcome;

/// Result of uploading a report.
///
/// `saved` means the report was attached to the single high-confidence match and stored
/// (`201`). `needs_confirmation` returns the extraction for review; the client decides and posts
/// it to `/api/v1/analyses` (`200`).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UploadResponse {
    Saved {
        analysis: AnalysisResponse,
        client: ClientResponse,
        #[serde(rename = "match")]
        match_outcome: MatchOutcome,
    },
    NeedsConfirmation {
        extraction: ExtractedReport,
        source_filename: String,
        #[serde(rename = "match")]
        match_outcome: MatchOutcome,
    },
}

impl IntoResponse for UploadResponse {
    fn into_response(self) -> Response {
        let status = match self {
            UploadResponse::Saved { .. } => StatusCode::CREATED,
            UploadResponse::NeedsConfirmation { .. } => StatusCode::OK,
        };
        (status, Json(self)).into_response()
    }
}
