use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{
    AppState,
    api::models::{
        benchmarks::{BenchmarkCreate, BenchmarkResponse, BenchmarkUpdate, ListBenchmarksQuery, SeedQuery, SeedResponse},
        pagination::PaginatedResponse,
        users::CurrentUser,
    },
    benchmarks::DEFAULT_BENCHMARKS,
    db::{
        self,
        errors::DbError,
        handlers::{CustomBenchmarks, Repository, Settings, custom_benchmarks::CustomBenchmarkFilter},
        models::custom_benchmarks::{CustomBenchmarkCreateDBRequest, CustomBenchmarkUpdateDBRequest},
    },
    errors::{Error, Result},
    types::{BenchmarkId, abbrev_uuid},
};

fn benchmark_not_found(id: BenchmarkId) -> Error {
    Error::NotFound {
        resource: "Benchmark".to_string(),
        id: id.to_string(),
    }
}

fn validate_range(optimal_min: Option<f64>, optimal_max: Option<f64>) -> Result<()> {
    if optimal_min.is_some_and(|v| !v.is_finite()) || optimal_max.is_some_and(|v| !v.is_finite()) {
        return Err(Error::BadRequest {
            message: "Optimal bounds must be finite numbers".to_string(),
        });
    }
    if let (Some(min), Some(max)) = (optimal_min, optimal_max)
        && min > max
    {
        return Err(Error::BadRequest {
            message: "optimal_min cannot be greater than optimal_max".to_string(),
        });
    }
    Ok(())
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[utoipa::path(
    get,
    path = "/api/v1/benchmarks",
    tag = "benchmarks",
    summary = "List benchmarks",
    params(ListBenchmarksQuery),
    responses(
        (status = 200, description = "Page of benchmarks, grouped by category", body = PaginatedResponse<BenchmarkResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_benchmarks(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ListBenchmarksQuery>,
) -> Result<Json<PaginatedResponse<BenchmarkResponse>>> {
    let (skip, limit) = query.pagination.params();
    let mut filter = CustomBenchmarkFilter::new(skip, limit);
    if let Some(category) = trimmed(query.category) {
        filter = filter.with_category(category);
    }

    let mut tx = db::begin_scoped(&state.db, current_user.id).await?;
    let mut repo = CustomBenchmarks::new(&mut tx, current_user.id);
    let benchmarks = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    let data = benchmarks.into_iter().map(BenchmarkResponse::from).collect();
    Ok(Json(PaginatedResponse::new(data, total_count, skip, limit)))
}

#[utoipa::path(
    post,
    path = "/api/v1/benchmarks",
    tag = "benchmarks",
    summary = "Create benchmark",
    request_body = BenchmarkCreate,
    responses(
        (status = 201, description = "Benchmark created", body = BenchmarkResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "A benchmark for this biomarker already exists"),
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_benchmark(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(create): Json<BenchmarkCreate>,
) -> Result<(StatusCode, Json<BenchmarkResponse>)> {
    let biomarker_name = create.biomarker_name.trim().to_string();
    if biomarker_name.is_empty() {
        return Err(Error::BadRequest {
            message: "biomarker_name cannot be empty".to_string(),
        });
    }
    validate_range(create.optimal_min, create.optimal_max)?;

    let request = CustomBenchmarkCreateDBRequest {
        biomarker_name,
        unit: trimmed(create.unit),
        optimal_min: create.optimal_min,
        optimal_max: create.optimal_max,
        category: trimmed(create.category),
        notes: trimmed(create.notes),
    };

    let mut tx = db::begin_scoped(&state.db, current_user.id).await?;
    let benchmark = CustomBenchmarks::new(&mut tx, current_user.id).create(&request).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok((StatusCode::CREATED, Json(BenchmarkResponse::from(benchmark))))
}

#[utoipa::path(
    patch,
    path = "/api/v1/benchmarks/{id}",
    tag = "benchmarks",
    summary = "Update benchmark",
    params(("id" = String, Path, description = "Benchmark ID")),
    request_body = BenchmarkUpdate,
    responses(
        (status = 200, description = "Updated benchmark", body = BenchmarkResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Benchmark not found"),
        (status = 409, description = "A benchmark for this biomarker already exists"),
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn update_benchmark(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<BenchmarkId>,
    Json(update): Json<BenchmarkUpdate>,
) -> Result<Json<BenchmarkResponse>> {
    let biomarker_name = match update.biomarker_name {
        Some(name) if name.trim().is_empty() => {
            return Err(Error::BadRequest {
                message: "biomarker_name cannot be empty".to_string(),
            });
        }
        other => other,
    };
    // Bounds are checked against each other here when both are sent; the table constraint
    // covers a single bound moving past the stored one.
    validate_range(update.optimal_min.flatten(), update.optimal_max.flatten())?;

    let request = CustomBenchmarkUpdateDBRequest {
        biomarker_name,
        unit: update.unit.map(trimmed),
        optimal_min: update.optimal_min,
        optimal_max: update.optimal_max,
        category: update.category.map(trimmed),
        notes: update.notes.map(trimmed),
    };

    let mut tx = db::begin_scoped(&state.db, current_user.id).await?;
    let benchmark = CustomBenchmarks::new(&mut tx, current_user.id)
        .update(id, &request)
        .await
        .map_err(|e| match e {
            DbError::NotFound => benchmark_not_found(id),
            e => e.into(),
        })?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(BenchmarkResponse::from(benchmark)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/benchmarks/{id}",
    tag = "benchmarks",
    summary = "Delete benchmark",
    params(("id" = String, Path, description = "Benchmark ID")),
    responses(
        (status = 204, description = "Benchmark deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Benchmark not found"),
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn delete_benchmark(State(state): State<AppState>, current_user: CurrentUser, Path(id): Path<BenchmarkId>) -> Result<StatusCode> {
    let mut tx = db::begin_scoped(&state.db, current_user.id).await?;
    if !CustomBenchmarks::new(&mut tx, current_user.id).delete(id).await? {
        return Err(benchmark_not_found(id));
    }
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(StatusCode::NO_CONTENT)
}

/// Seed the built-in default benchmarks
///
/// Runs once per user. Later calls insert nothing unless `force=true`, which adds any defaults
/// the user does not have a benchmark for. Existing benchmarks are never overwritten.
#[utoipa::path(
    post,
    path = "/api/v1/benchmarks/seed",
    tag = "benchmarks",
    summary = "Seed default benchmarks",
    params(SeedQuery),
    responses(
        (status = 200, description = "Seeding result", body = SeedResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id)))]
pub async fn seed_benchmarks(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<SeedQuery>,
) -> Result<Json<SeedResponse>> {
    let mut tx = db::begin_scoped(&state.db, current_user.id).await?;

    let seeded = Settings::new(&mut tx, current_user.id).mark_benchmarks_seeded().await?;
    let inserted = if seeded || query.force.unwrap_or(false) {
        CustomBenchmarks::new(&mut tx, current_user.id).insert_defaults(DEFAULT_BENCHMARKS).await?
    } else {
        0
    };

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    tracing::info!(seeded, inserted, "Seeded default benchmarks");

    Ok(Json(SeedResponse { seeded, inserted }))
}
