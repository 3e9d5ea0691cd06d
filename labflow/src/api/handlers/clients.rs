use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{
    AppState,
    api::models::{
        analyses::AnalysisResponse,
        clients::{ClientCreate, ClientResponse, ClientUpdate, ListClientsQuery, TrendsQuery},
        pagination::{PaginatedResponse, Pagination},
        users::CurrentUser,
    },
    db::{
        self,
        errors::DbError,
        handlers::{Analyses, Clients, CustomBenchmarks, Repository, Settings, analyses::AnalysisFilter, clients::ClientFilter},
        models::clients::{ClientDBResponse, ClientUpdateDBRequest},
    },
    errors::{Error, Result},
    matching::{ClientRecord, MatchCandidate, MatchOutcome, match_clients},
    trends::{TrendReport, compute_trends},
    types::ClientId,
};

pub(crate) fn client_not_found(id: ClientId) -> Error {
    Error::NotFound {
        resource: "Client".to_string(),
        id: id.to_string(),
    }
}

pub(crate) fn validate_client_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "Client name cannot be empty".to_string(),
        });
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/api/v1/clients",
    tag = "clients",
    summary = "List clients",
    params(ListClientsQuery),
    responses(
        (status = 200, description = "Page of clients, ordered by name", body = PaginatedResponse<ClientResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_clients(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ListClientsQuery>,
) -> Result<Json<PaginatedResponse<ClientResponse>>> {
    let (skip, limit) = query.pagination.params();
    let mut filter = ClientFilter::new(skip, limit);
    if let Some(search) = query.search.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) {
        filter = filter.with_search(search);
    }

    let mut tx = db::begin_scoped(&state.db, current_user.id).await?;
    let mut repo = Clients::new(&mut tx, current_user.id);
    let clients = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    let data = clients.into_iter().map(ClientResponse::from).collect();
    Ok(Json(PaginatedResponse::new(data, total_count, skip, limit)))
}

#[utoipa::path(
    post,
    path = "/api/v1/clients",
    tag = "clients",
    summary = "Create client",
    request_body = ClientCreate,
    responses(
        (status = 201, description = "Client created", body = ClientResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "A client with this name and date of birth already exists"),
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_client(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(create): Json<ClientCreate>,
) -> Result<(StatusCode, Json<ClientResponse>)> {
    validate_client_name(&create.name)?;

    let mut tx = db::begin_scoped(&state.db, current_user.id).await?;
    let client = Clients::new(&mut tx, current_user.id).create(&create.into()).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok((StatusCode::CREATED, Json(ClientResponse::from(client))))
}

#[utoipa::path(
    get,
    path = "/api/v1/clients/{id}",
    tag = "clients",
    summary = "Get client",
    params(("id" = String, Path, description = "Client ID")),
    responses(
        (status = 200, description = "The client", body = ClientResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Client not found"),
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_client(State(state): State<AppState>, current_user: CurrentUser, Path(id): Path<ClientId>) -> Result<Json<ClientResponse>> {
    let mut tx = db::begin_scoped(&state.db, current_user.id).await?;
    let client = Clients::new(&mut tx, current_user.id)
        .get_by_id(id)
        .await?
        .ok_or_else(|| client_not_found(id))?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(ClientResponse::from(client)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/clients/{id}",
    tag = "clients",
    summary = "Update client",
    params(("id" = String, Path, description = "Client ID")),
    request_body = ClientUpdate,
    responses(
        (status = 200, description = "Updated client", body = ClientResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Client not found"),
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn update_client(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<ClientId>,
    Json(update): Json<ClientUpdate>,
) -> Result<Json<ClientResponse>> {
    if let Some(name) = &update.name {
        validate_client_name(name)?;
    }

    let request = ClientUpdateDBRequest {
        name: update.name,
        date_of_birth: update.date_of_birth,
        gender: update.gender,
    };

    let mut tx = db::begin_scoped(&state.db, current_user.id).await?;
    let client = Clients::new(&mut tx, current_user.id)
        .update(id, &request)
        .await
        .map_err(|e| match e {
            DbError::NotFound => client_not_found(id),
            e => e.into(),
        })?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(ClientResponse::from(client)))
}

/// Delete a client together with all of its analyses
#[utoipa::path(
    delete,
    path = "/api/v1/clients/{id}",
    tag = "clients",
    summary = "Delete client",
    params(("id" = String, Path, description = "Client ID")),
    responses(
        (status = 204, description = "Client and its analyses deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Client not found"),
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn delete_client(State(state): State<AppState>, current_user: CurrentUser, Path(id): Path<ClientId>) -> Result<StatusCode> {
    let mut tx = db::begin_scoped(&state.db, current_user.id).await?;
    let deleted = Clients::new(&mut tx, current_user.id).delete(id).await?;
    if !deleted {
        return Err(client_not_found(id));
    }
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/clients/{id}/analyses",
    tag = "clients",
    summary = "List a client's analyses",
    params(("id" = String, Path, description = "Client ID"), Pagination),
    responses(
        (status = 200, description = "Page of analyses, newest first", body = PaginatedResponse<AnalysisResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Client not found"),
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_client_analyses(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<ClientId>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<PaginatedResponse<AnalysisResponse>>> {
    let (skip, limit) = pagination.params();
    let filter = AnalysisFilter::new(skip, limit).with_client(id);

    let mut tx = db::begin_scoped(&state.db, current_user.id).await?;
    Clients::new(&mut tx, current_user.id)
        .get_by_id(id)
        .await?
        .ok_or_else(|| client_not_found(id))?;

    let mut repo = Analyses::new(&mut tx, current_user.id);
    let analyses = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    let data = analyses.into_iter().map(AnalysisResponse::from).collect();
    Ok(Json(PaginatedResponse::new(data, total_count, skip, limit)))
}

/// Biomarker trends across all of a client's analyses
///
/// The most frequently measured biomarkers are displayed, up to `display` (or the user's
/// `trend_biomarker_count`); the rest are listed by name.
#[utoipa::path(
    get,
    path = "/api/v1/clients/{id}/trends",
    tag = "clients",
    summary = "Get client trends",
    params(("id" = String, Path, description = "Client ID"), TrendsQuery),
    responses(
        (status = 200, description = "Trend report", body = TrendReport),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Client not found"),
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all, fields(client_id = %id))]
pub async fn get_client_trends(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<ClientId>,
    Query(query): Query<TrendsQuery>,
) -> Result<Json<TrendReport>> {
    let mut tx = db::begin_scoped(&state.db, current_user.id).await?;
    Clients::new(&mut tx, current_user.id)
        .get_by_id(id)
        .await?
        .ok_or_else(|| client_not_found(id))?;

    let analyses = Analyses::new(&mut tx, current_user.id).list_for_client(id).await?;
    let benchmarks = CustomBenchmarks::new(&mut tx, current_user.id).list_all().await?;
    let display = match query.display {
        Some(display) => display,
        None => match Settings::new(&mut tx, current_user.id).get().await {
            Ok(settings) => usize::try_from(settings.trend_biomarker_count).unwrap_or(state.config.trends.default_display_count),
            Err(DbError::NotFound) => state.config.trends.default_display_count,
            Err(e) => return Err(e.into()),
        },
    };
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    if display == 0 {
        return Err(Error::BadRequest {
            message: "display must be at least 1".to_string(),
        });
    }

    Ok(Json(compute_trends(id, &analyses, &benchmarks, display)))
}

/// Score the user's clients against a name, date of birth and gender
#[utoipa::path(
    post,
    path = "/api/v1/clients/match",
    tag = "clients",
    summary = "Match clients",
    request_body = MatchCandidate,
    responses(
        (status = 200, description = "Ranked candidates and the suggested decision", body = MatchOutcome),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized"),
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn match_client(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(candidate): Json<MatchCandidate>,
) -> Result<Json<MatchOutcome>> {
    if candidate.name.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "name is required for matching".to_string(),
        });
    }

    let mut tx = db::begin_scoped(&state.db, current_user.id).await?;
    let clients = Clients::new(&mut tx, current_user.id).list_all_for_matching().await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(run_matcher(&candidate, &clients, &state)))
}

/// Match `candidate` against stored clients with the configured thresholds.
pub(crate) fn run_matcher(candidate: &MatchCandidate, clients: &[ClientDBResponse], state: &AppState) -> MatchOutcome {
    let records: Vec<ClientRecord<'_>> = clients
        .iter()
        .map(|c| ClientRecord {
            id: c.id,
            name: &c.name,
            date_of_birth: c.date_of_birth,
            gender: c.gender,
        })
        .collect();
    let outcome = match_clients(candidate, &records, &state.config.matching);
    tracing::debug!(
        candidates = outcome.candidates.len(),
        decision = ?outcome.decision,
        "Matched candidate against {} clients",
        records.len()
    );
    outcome
}
