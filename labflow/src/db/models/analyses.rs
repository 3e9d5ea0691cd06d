//! Database models for stored analyses.

use crate::types::{AnalysisId, Biomarker, ClientId, UserId};
use chrono::{DateTime, NaiveDate, Utc};

/// Database request for storing an analysis. Analyses are immutable once stored.
#[derive(Debug, Clone)]
pub struct AnalysisCreateDBRequest {
    pub client_id: ClientId,
    pub lab_test_date: Option<NaiveDate>,
    pub source_filename: Option<String>,
    pub biomarkers: Vec<Biomarker>,
}

/// Database response for an analysis
#[derive(Debug, Clone)]
pub struct AnalysisDBResponse {
    pub id: AnalysisId,
    pub user_id: UserId,
    pub client_id: ClientId,
    pub lab_test_date: Option<NaiveDate>,
    pub source_filename: Option<String>,
    pub biomarkers: Vec<Biomarker>,
    pub created_at: DateTime<Utc>,
}
