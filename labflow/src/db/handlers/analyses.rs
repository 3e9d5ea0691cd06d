//! Database repository for stored analyses. Analyses are immutable: there is no update.

use crate::db::{
    errors::Result,
    models::analyses::{AnalysisCreateDBRequest, AnalysisDBResponse},
};
use crate::types::{AnalysisId, Biomarker, ClientId, UserId, abbrev_uuid};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgConnection, QueryBuilder, types::Json};
use tracing::instrument;
use uuid::Uuid;

const ANALYSIS_COLUMNS: &str = "id, user_id, client_id, lab_test_date, source_filename, biomarkers, created_at";

/// Filter for listing analyses
#[derive(Debug, Clone)]
pub struct AnalysisFilter {
    pub skip: i64,
    pub limit: i64,
    pub client_id: Option<ClientId>,
}

impl AnalysisFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            client_id: None,
        }
    }

    pub fn with_client(mut self, client_id: ClientId) -> Self {
        self.client_id = Some(client_id);
        self
    }
}

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct Analysis {
    pub id: AnalysisId,
    pub user_id: UserId,
    pub client_id: ClientId,
    pub lab_test_date: Option<NaiveDate>,
    pub source_filename: Option<String>,
    pub biomarkers: Json<Vec<Biomarker>>,
    pub created_at: DateTime<Utc>,
}

impl From<Analysis> for AnalysisDBResponse {
    fn from(analysis: Analysis) -> Self {
        Self {
            id: analysis.id,
            user_id: analysis.user_id,
            client_id: analysis.client_id,
            lab_test_date: analysis.lab_test_date,
            source_filename: analysis.source_filename,
            biomarkers: analysis.biomarkers.0,
            created_at: analysis.created_at,
        }
    }
}

/// Analyses owned by one user.
pub struct Analyses<'c> {
    db: &'c mut PgConnection,
    user_id: UserId,
}

impl<'c> Analyses<'c> {
    pub fn new(db: &'c mut PgConnection, user_id: UserId) -> Self {
        Self { db, user_id }
    }

    #[instrument(skip(self, request), fields(client_id = %abbrev_uuid(&request.client_id), biomarkers = request.biomarkers.len()), err)]
    pub async fn create(&mut self, request: &AnalysisCreateDBRequest) -> Result<AnalysisDBResponse> {
        let analysis = sqlx::query_as::<_, Analysis>(&format!(
            r#"
            INSERT INTO analyses (id, user_id, client_id, lab_test_date, source_filename, biomarkers)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {ANALYSIS_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(self.user_id)
        .bind(request.client_id)
        .bind(request.lab_test_date)
        .bind(&request.source_filename)
        .bind(Json(&request.biomarkers))
        .fetch_one(&mut *self.db)
        .await?;

        Ok(AnalysisDBResponse::from(analysis))
    }

    #[instrument(skip(self), fields(analysis_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: AnalysisId) -> Result<Option<AnalysisDBResponse>> {
        let analysis = sqlx::query_as::<_, Analysis>(&format!(
            "SELECT {ANALYSIS_COLUMNS} FROM analyses WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(self.user_id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(analysis.map(AnalysisDBResponse::from))
    }

    /// Newest first
    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    pub async fn list(&mut self, filter: &AnalysisFilter) -> Result<Vec<AnalysisDBResponse>> {
        let mut query = QueryBuilder::new(format!("SELECT {ANALYSIS_COLUMNS} FROM analyses WHERE user_id = "));
        query.push_bind(self.user_id);
        if let Some(client_id) = filter.client_id {
            query.push(" AND client_id = ");
            query.push_bind(client_id);
        }

        query.push(" ORDER BY COALESCE(lab_test_date, created_at::date) DESC, created_at DESC, id LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let analyses = query.build_query_as::<Analysis>().fetch_all(&mut *self.db).await?;

        Ok(analyses.into_iter().map(AnalysisDBResponse::from).collect())
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &AnalysisFilter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM analyses WHERE user_id = ");
        query.push_bind(self.user_id);
        if let Some(client_id) = filter.client_id {
            query.push(" AND client_id = ");
            query.push_bind(client_id);
        }

        let count: i64 = query.build_query_scalar().fetch_one(&mut *self.db).await?;

        Ok(count)
    }

    #[instrument(skip(self), fields(analysis_id = %abbrev_uuid(&id)), err)]
    pub async fn delete(&mut self, id: AnalysisId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM analyses WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(self.user_id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Every analysis of one client, oldest first, for trend computation.
    #[instrument(skip(self), fields(client_id = %abbrev_uuid(&client_id)), err)]
    pub async fn list_for_client(&mut self, client_id: ClientId) -> Result<Vec<AnalysisDBResponse>> {
        let analyses = sqlx::query_as::<_, Analysis>(&format!(
            r#"
            SELECT {ANALYSIS_COLUMNS} FROM analyses
            WHERE user_id = $1 AND client_id = $2
            ORDER BY COALESCE(lab_test_date, created_at::date), created_at
            "#
        ))
        .bind(self.user_id)
        .bind(client_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(analyses.into_iter().map(AnalysisDBResponse::from).collect())
    }
}
