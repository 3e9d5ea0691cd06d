//! Database models for custom benchmarks (per-user optimal ranges).

use crate::types::{BenchmarkId, UserId};
use chrono::{DateTime, Utc};

/// Database request for creating a benchmark
#[derive(Debug, Clone)]
pub struct CustomBenchmarkCreateDBRequest {
    pub biomarker_name: String,
    pub unit: Option<String>,
    pub optimal_min: Option<f64>,
    pub optimal_max: Option<f64>,
    pub category: Option<String>,
    pub notes: Option<String>,
}

/// Database request for updating a benchmark. Nullable columns use nested options.
#[derive(Debug, Clone, Default)]
pub struct CustomBenchmarkUpdateDBRequest {
    pub biomarker_name: Option<String>,
    pub unit: Option<Option<String>>,
    pub optimal_min: Option<Option<f64>>,
    pub optimal_max: Option<Option<f64>>,
    pub category: Option<Option<String>>,
    pub notes: Option<Option<String>>,
}

/// Database response for a benchmark
#[derive(Debug, Clone)]
pub struct CustomBenchmarkDBResponse {
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
