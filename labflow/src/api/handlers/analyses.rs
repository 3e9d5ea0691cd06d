use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{
    AppState,
    api::{
        handlers::clients::{client_not_found, validate_client_name},
        models::{
            analyses::{AnalysisConfirm, AnalysisResponse, ClientSelection, ConfirmedAnalysisResponse, ListAnalysesQuery},
            clients::ClientResponse,
            pagination::PaginatedResponse,
            users::CurrentUser,
        },
    },
    db::{
        self,
        handlers::{Analyses, Clients, Repository, analyses::AnalysisFilter},
        models::analyses::AnalysisCreateDBRequest,
    },
    errors::{Error, Result},
    types::{AnalysisId, Biomarker, abbrev_uuid},
};

fn analysis_not_found(id: AnalysisId) -> Error {
    Error::NotFound {
        resource: "Analysis".to_string(),
        id: id.to_string(),
    }
}

/// Reject biomarker lists that cannot be stored or charted.
fn validate_biomarkers(biomarkers: &[Biomarker]) -> Result<()> {
    if biomarkers.is_empty() {
        return Err(Error::BadRequest {
            message: "At least one biomarker is required".to_string(),
        });
    }
    for biomarker in biomarkers {
        if biomarker.name.trim().is_empty() {
            return Err(Error::BadRequest {
                message: "Biomarker names cannot be empty".to_string(),
            });
        }
        if !biomarker.value.is_finite() {
            return Err(Error::BadRequest {
                message: format!("Biomarker '{}' has a non-numeric value", biomarker.name),
            });
        }
    }
    Ok(())
}

/// Confirm an extraction and store it as an analysis
///
/// The analysis is attached to an existing client or to a client created in the same
/// transaction.
#[utoipa::path(
    post,
    path = "/api/v1/analyses",
    tag = "analyses",
    summary = "Confirm analysis",
    request_body = AnalysisConfirm,
    responses(
        (status = 201, description = "Analysis stored", body = ConfirmedAnalysisResponse),
        (status = 400, description = "Invalid request, e.g. no biomarkers"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Client not found"),
        (status = 409, description = "A client with this name and date of birth already exists"),
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id)))]
pub async fn confirm_analysis(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(confirm): Json<AnalysisConfirm>,
) -> Result<(StatusCode, Json<ConfirmedAnalysisResponse>)> {
    validate_biomarkers(&confirm.biomarkers)?;
    if let ClientSelection::New(create) = &confirm.client {
        validate_client_name(&create.name)?;
    }

    let mut tx = db::begin_scoped(&state.db, current_user.id).await?;

    let mut clients = Clients::new(&mut tx, current_user.id);
    let (client, client_created) = match confirm.client {
        ClientSelection::Existing(client_id) => {
            let client = clients.get_by_id(client_id).await?.ok_or_else(|| client_not_found(client_id))?;
            (client, false)
        }
        ClientSelection::New(create) => (clients.create(&create.into()).await?, true),
    };

    let source_filename = confirm.source_filename.map(|f| f.trim().to_string()).filter(|f| !f.is_empty());
    let analysis = Analyses::new(&mut tx, current_user.id)
        .create(&AnalysisCreateDBRequest {
            client_id: client.id,
            lab_test_date: confirm.lab_test_date,
            source_filename,
            biomarkers: confirm.biomarkers,
        })
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    tracing::info!(
        analysis_id = %abbrev_uuid(&analysis.id),
        client_id = %abbrev_uuid(&client.id),
        client_created,
        "Stored confirmed analysis"
    );

    Ok((
        StatusCode::CREATED,
        Json(ConfirmedAnalysisResponse {
            analysis: AnalysisResponse::from(analysis),
            client: ClientResponse::from(client),
            client_created,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/analyses",
    tag = "analyses",
    summary = "List analyses",
    params(ListAnalysesQuery),
    responses(
        (status = 200, description = "Page of analyses, newest first", body = PaginatedResponse<AnalysisResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_analyses(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ListAnalysesQuery>,
) -> Result<Json<PaginatedResponse<AnalysisResponse>>> {
    let (skip, limit) = query.pagination.params();
    let mut filter = AnalysisFilter::new(skip, limit);
    if let Some(client_id) = query.client_id {
        filter = filter.with_client(client_id);
    }

    let mut tx = db::begin_scoped(&state.db, current_user.id).await?;
    let mut repo = Analyses::new(&mut tx, current_user.id);
    let analyses = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    let data = analyses.into_iter().map(AnalysisResponse::from).collect();
    Ok(Json(PaginatedResponse::new(data, total_count, skip, limit)))
}

#[utoipa::path(
    get,
    path = "/api/v1/analyses/{id}",
    tag = "analyses",
    summary = "Get analysis",
    params(("id" = String, Path, description = "Analysis ID")),
    responses(
        (status = 200, description = "The analysis", body = AnalysisResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Analysis not found"),
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_analysis(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<AnalysisId>,
) -> Result<Json<AnalysisResponse>> {
    let mut tx = db::begin_scoped(&state.db, current_user.id).await?;
    let analysis = Analyses::new(&mut tx, current_user.id)
        .get_by_id(id)
        .await?
        .ok_or_else(|| analysis_not_found(id))?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(AnalysisResponse::from(analysis)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/analyses/{id}",
    tag = "analyses",
    summary = "Delete analysis",
    params(("id" = String, Path, description = "Analysis ID")),
    responses(
        (status = 204, description = "Analysis deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Analysis not found"),
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn delete_analysis(State(state): State<AppState>, current_user: CurrentUser, Path(id): Path<AnalysisId>) -> Result<StatusCode> {
    let mut tx = db::begin_scoped(&state.db, current_user.id).await?;
    if !Analyses::new(&mut tx, current_user.id).delete(id).await? {
        return Err(analysis_not_found(id));
    }
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(StatusCode::NO_CONTENT)
}
