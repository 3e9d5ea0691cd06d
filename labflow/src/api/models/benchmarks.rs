//! API models for custom benchmarks.

use crate::api::models::pagination::Pagination;
use crate::db::models::custom_benchmarks::CustomBenchmarkDBResponse;
use crate::types::BenchmarkId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::rust::double_option;
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

/// Query parameters for listing benchmarks
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListBenchmarksQuery {
    /// Pagination parameters
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Only benchmarks in this category (case-insensitive)
    pub category: Option<String>,
}

/// Query parameters for seeding the default benchmarks
#[serde_as]
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct SeedQuery {
    /// Insert missing defaults even if the user has seeded before
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub force: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BenchmarkCreate {
    #[schema(example = "Vitamin D")]
    pub biomarker_name: String,
    pub unit: Option<String>,
    pub optimal_min: Option<f64>,
    pub optimal_max: Option<f64>,
    pub category: Option<String>,
    pub notes: Option<String>,
}

/// Partial benchmark update. `null` clears a nullable field.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct BenchmarkUpdate {
    pub biomarker_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub unit: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[schema(value_type = Option<f64>)]
    pub optimal_min: Option<Option<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[schema(value_type = Option<f64>)]
    pub optimal_max: Option<Option<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub category: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub notes: Option<Option<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BenchmarkResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: BenchmarkId,
    pub biomarker_name: String,
    pub unit: Option<String>,
    pub optimal_min: Option<f64>,
    pub optimal_max: Option<f64>,
    pub category: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CustomBenchmarkDBResponse> for BenchmarkResponse {
    fn from(db: CustomBenchmarkDBResponse) -> Self {
        Self {
            id: db.id,
            biomarker_name: db.biomarker_name,
            unit: db.unit,
            optimal_min: db.optimal_min,
            optimal_max: db.optimal_max,
            category: db.category,
            notes: db.notes,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SeedResponse {
    /// True when this call performed the user's first seeding
    pub seeded: bool,
    /// Number of default benchmarks inserted
    pub inserted: u64,
}
