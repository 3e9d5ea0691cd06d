//! Database repository for custom benchmarks.

use crate::benchmarks::DefaultBenchmark;
use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::custom_benchmarks::{CustomBenchmarkCreateDBRequest, CustomBenchmarkDBResponse, CustomBenchmarkUpdateDBRequest},
};
use crate::types::{BenchmarkId, UserId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, QueryBuilder};
use tracing::instrument;
use uuid::Uuid;

const BENCHMARK_COLUMNS: &str =
    "id, user_id, biomarker_name, unit, optimal_min, optimal_max, category, notes, created_at, updated_at";

/// Filter for listing benchmarks
#[derive(Debug, Clone)]
pub struct CustomBenchmarkFilter {
    pub skip: i64,
    pub limit: i64,
    pub category: Option<String>,
}

impl CustomBenchmarkFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            category: None,
        }
    }

    pub fn with_category(mut self, category: String) -> Self {
        self.category = Some(category);
        self
    }
}

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct CustomBenchmark {
    pub id: BenchmarkId,
    pub user_id: UserId,
    pub biomarker_name: String,
    pub unit: Option<String>,
    pub optimal_min: Option<f64>,
    pub optimal_max: Option<f64>,
    pub category: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CustomBenchmark> for CustomBenchmarkDBResponse {
    fn from(b: CustomBenchmark) -> Self {
        Self {
            id: b.id,
            user_id: b.user_id,
            biomarker_name: b.biomarker_name,
            unit: b.unit,
            optimal_min: b.optimal_min,
            optimal_max: b.optimal_max,
            category: b.category,
            notes: b.notes,
            created_at: b.created_at,
            updated_at: b.updated_at,
        }
    }
}

/// Benchmarks owned by one user.
pub struct CustomBenchmarks<'c> {
    db: &'c mut PgConnection,
    user_id: UserId,
}

fn push_category(query: &mut QueryBuilder<'_, sqlx::Postgres>, category: &Option<String>) {
    if let Some(category) = category {
        query.push(" AND LOWER(category) = ");
        query.push_bind(category.trim().to_lowercase());
    }
}

/// `(set, value)` pair for a nullable column in a partial update.
fn nullable<T: Clone>(field: &Option<Option<T>>) -> (bool, Option<T>) {
    match field {
        None => (false, None),
        Some(value) => (true, value.clone()),
    }
}

#[async_trait::async_trait]
impl<'c> Repository for CustomBenchmarks<'c> {
    type CreateRequest = CustomBenchmarkCreateDBRequest;
    type UpdateRequest = CustomBenchmarkUpdateDBRequest;
    type Response = CustomBenchmarkDBResponse;
    type Id = BenchmarkId;
    type Filter = CustomBenchmarkFilter;

    #[instrument(skip(self, request), fields(biomarker = %request.biomarker_name), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let benchmark = sqlx::query_as::<_, CustomBenchmark>(&format!(
            r#"
            INSERT INTO custom_benchmarks (id, user_id, biomarker_name, unit, optimal_min, optimal_max, category, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {BENCHMARK_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(self.user_id)
        .bind(request.biomarker_name.trim())
        .bind(&request.unit)
        .bind(request.optimal_min)
        .bind(request.optimal_max)
        .bind(&request.category)
        .bind(&request.notes)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(CustomBenchmarkDBResponse::from(benchmark))
    }

    #[instrument(skip(self), fields(benchmark_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let benchmark = sqlx::query_as::<_, CustomBenchmark>(&format!(
            "SELECT {BENCHMARK_COLUMNS} FROM custom_benchmarks WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(self.user_id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(benchmark.map(CustomBenchmarkDBResponse::from))
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new(format!("SELECT {BENCHMARK_COLUMNS} FROM custom_benchmarks WHERE user_id = "));
        query.push_bind(self.user_id);
        push_category(&mut query, &filter.category);

        query.push(" ORDER BY category NULLS LAST, LOWER(biomarker_name) LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let benchmarks = query.build_query_as::<CustomBenchmark>().fetch_all(&mut *self.db).await?;

        Ok(benchmarks.into_iter().map(CustomBenchmarkDBResponse::from).collect())
    }

    #[instrument(skip(self, filter), err)]
    async fn count(&mut self, filter: &Self::Filter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM custom_benchmarks WHERE user_id = ");
        query.push_bind(self.user_id);
        push_category(&mut query, &filter.category);

        let count: i64 = query.build_query_scalar().fetch_one(&mut *self.db).await?;

        Ok(count)
    }

    #[instrument(skip(self), fields(benchmark_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM custom_benchmarks WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(self.user_id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(benchmark_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let (set_unit, unit) = nullable(&request.unit);
        let (set_min, optimal_min) = nullable(&request.optimal_min);
        let (set_max, optimal_max) = nullable(&request.optimal_max);
        let (set_category, category) = nullable(&request.category);
        let (set_notes, notes) = nullable(&request.notes);

        let benchmark = sqlx::query_as::<_, CustomBenchmark>(&format!(
            r#"
            UPDATE custom_benchmarks SET
                biomarker_name = COALESCE($3, biomarker_name),
                unit = CASE WHEN $4 THEN $5 ELSE unit END,
                optimal_min = CASE WHEN $6 THEN $7 ELSE optimal_min END,
                optimal_max = CASE WHEN $8 THEN $9 ELSE optimal_max END,
                category = CASE WHEN $10 THEN $11 ELSE category END,
                notes = CASE WHEN $12 THEN $13 ELSE notes END,
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {BENCHMARK_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(self.user_id)
        .bind(request.biomarker_name.as_deref().map(str::trim))
        .bind(set_unit)
        .bind(unit)
        .bind(set_min)
        .bind(optimal_min)
        .bind(set_max)
        .bind(optimal_max)
        .bind(set_category)
        .bind(category)
        .bind(set_notes)
        .bind(notes)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(CustomBenchmarkDBResponse::from(benchmark))
    }
}

impl<'c> CustomBenchmarks<'c> {
    pub fn new(db: &'c mut PgConnection, user_id: UserId) -> Self {
        Self { db, user_id }
    }

    /// Every benchmark of the user, for range status in trends.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&self.user_id)), err)]
    pub async fn list_all(&mut self) -> Result<Vec<CustomBenchmarkDBResponse>> {
        let benchmarks = sqlx::query_as::<_, CustomBenchmark>(&format!(
            "SELECT {BENCHMARK_COLUMNS} FROM custom_benchmarks WHERE user_id = $1 ORDER BY LOWER(biomarker_name)"
        ))
        .bind(self.user_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(benchmarks.into_iter().map(CustomBenchmarkDBResponse::from).collect())
    }

    /// Insert the defaults the user does not already have a benchmark for. Returns how many
    /// were inserted.
    #[instrument(skip(self, defaults), fields(defaults = defaults.len()), err)]
    pub async fn insert_defaults(&mut self, defaults: &[DefaultBenchmark]) -> Result<u64> {
        if defaults.is_empty() {
            return Ok(0);
        }

        let mut query = QueryBuilder::new("INSERT INTO custom_benchmarks (id, user_id, biomarker_name, unit, optimal_min, optimal_max, category) ");
        query.push_values(defaults, |mut row, default| {
            row.push_bind(Uuid::new_v4())
                .push_bind(self.user_id)
                .push_bind(default.name)
                .push_bind(default.unit)
                .push_bind(default.optimal_min)
                .push_bind(default.optimal_max)
                .push_bind(default.category);
        });
        query.push(" ON CONFLICT DO NOTHING");

        let result = query.build().execute(&mut *self.db).await?;

        Ok(result.rows_affected())
    }
}
