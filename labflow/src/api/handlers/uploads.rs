//! The upload flow: validate the PDF, extract it, match the patient, then either save or hand
//! the extraction back for confirmation.
//!
//! No database connection is held across the extraction call, which can take tens of seconds.

use axum::extract::{Multipart, State};

use crate::{
    AppState,
    api::{
        handlers::clients::{client_not_found, run_matcher},
        models::{analyses::AnalysisResponse, clients::ClientResponse, uploads::UploadResponse, users::CurrentUser},
    },
    crypto,
    db::{
        self,
        handlers::{Analyses, Clients, Repository, Settings},
        models::{analyses::AnalysisCreateDBRequest, settings::SettingsDBResponse},
    },
    errors::{Error, Result},
    extraction::{ExtractionError, ExtractionRequest, validate_pdf},
    matching::{MatchCandidate, MatchDecision, MatchOutcome},
    types::abbrev_uuid,
};

const DEFAULT_FILENAME: &str = "report.pdf";

/// Resolve the API key for an extraction: the user's own key, else the service fallback.
fn resolve_api_key(settings: &SettingsDBResponse, state: &AppState) -> Result<String> {
    if let Some(encrypted) = &settings.api_key_encrypted {
        let secret_key = state.config.secret_key.as_deref().ok_or_else(|| Error::Internal {
            operation: "decrypt API key: secret_key is not configured".to_string(),
        })?;
        return crypto::decrypt_secret(secret_key, encrypted).map_err(|e| Error::Other(e.context("decrypt stored API key")));
    }

    state
        .config
        .extraction
        .api_key
        .clone()
        .filter(|key| !key.is_empty())
        .ok_or_else(|| ExtractionError::MissingApiKey.into())
}

/// Upload a lab report PDF
#[utoipa::path(
    post,
    path = "/api/v1/uploads",
    tag = "uploads",
    summary = "Upload lab report",
    description = "Upload a lab report as multipart form data with the PDF in the `file` field.

The report is sent to the extraction service and the patient is matched against your clients. When exactly one client matches with high confidence and `auto_accept_matches` is enabled, the analysis is saved immediately (`201`, status `saved`). Otherwise the extraction is returned for review (`200`, status `needs_confirmation`) and can be confirmed with `POST /api/v1/analyses`.",
    request_body(content_type = "multipart/form-data", content = String, description = "PDF in the `file` field"),
    responses(
        (status = 201, description = "Report extracted and saved against the matched client", body = UploadResponse),
        (status = 200, description = "Report extracted; confirmation required", body = UploadResponse),
        (status = 400, description = "Missing file or not a PDF"),
        (status = 401, description = "Unauthorized"),
        (status = 413, description = "File too large"),
        (status = 422, description = "No biomarkers found in document"),
        (status = 502, description = "Extraction service error"),
        (status = 503, description = "AI extraction is not configured"),
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id)))]
pub async fn upload_report(State(state): State<AppState>, current_user: CurrentUser, mut multipart: Multipart) -> Result<UploadResponse> {
    let mut upload = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| Error::BadRequest {
        message: format!("Failed to parse multipart data: {e}"),
    })? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_FILENAME.to_string());
        let bytes = field.bytes().await.map_err(|e| Error::BadRequest {
            message: format!("Failed to read uploaded file: {e}"),
        })?;
        upload = Some((filename, bytes));
        break;
    }

    let (filename, pdf) = upload.ok_or_else(|| Error::BadRequest {
        message: "Missing 'file' field in multipart upload".to_string(),
    })?;
    validate_pdf(&pdf, state.config.extraction.max_pdf_size)?;

    tracing::info!(filename = %filename, size = pdf.len(), "Received lab report upload");

    let settings = {
        let mut tx = db::begin_scoped(&state.db, current_user.id).await?;
        let settings = Settings::new(&mut tx, current_user.id).get().await?;
        tx.commit().await.map_err(|e| Error::Database(e.into()))?;
        settings
    };
    let api_key = resolve_api_key(&settings, &state)?;

    let report = state
        .extractor
        .extract(ExtractionRequest {
            pdf: &pdf,
            filename: &filename,
            api_key: &api_key,
            model: settings.extraction_model.as_deref(),
        })
        .await?;

    tracing::info!(biomarkers = report.biomarkers.len(), "Extracted lab report");

    let mut tx = db::begin_scoped(&state.db, current_user.id).await?;

    let match_outcome = match report.patient_name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => {
            let clients = Clients::new(&mut tx, current_user.id).list_all_for_matching().await?;
            let candidate = MatchCandidate {
                name: name.to_string(),
                date_of_birth: report.date_of_birth,
                gender: report.gender,
            };
            run_matcher(&candidate, &clients, &state)
        }
        // Without a name there is nothing to match on
        None => MatchOutcome {
            decision: MatchDecision::NewClient,
            candidates: Vec::new(),
        },
    };

    if let MatchDecision::AutoAccept { client_id } = match_outcome.decision
        && settings.auto_accept_matches
    {
        let client = Clients::new(&mut tx, current_user.id)
            .get_by_id(client_id)
            .await?
            .ok_or_else(|| client_not_found(client_id))?;

        let analysis = Analyses::new(&mut tx, current_user.id)
            .create(&AnalysisCreateDBRequest {
                client_id,
                lab_test_date: report.lab_test_date,
                source_filename: Some(filename),
                biomarkers: report.biomarkers,
            })
            .await?;
        tx.commit().await.map_err(|e| Error::Database(e.into()))?;

        tracing::info!(
            analysis_id = %abbrev_uuid(&analysis.id),
            client_id = %abbrev_uuid(&client_id),
            "Auto-accepted upload for high confidence match"
        );

        return Ok(UploadResponse::Saved {
            analysis: AnalysisResponse::from(analysis),
            client: ClientResponse::from(client),
            match_outcome,
        });
    }

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(UploadResponse::NeedsConfirmation {
        extraction: report,
        source_filename: filename,
        match_outcome,
    })
}
