//! API models for per-user settings.

use crate::db::models::settings::SettingsDBResponse;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::rust::double_option;
use utoipa::ToSchema;

/// Settings as shown to their owner. The stored API key itself is never returned.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SettingsResponse {
    /// Whether an extraction API key is stored for this user
    pub has_api_key: bool,
    /// Masked form of the stored key, e.g. `sk-...9xQz`
    pub api_key_hint: Option<String>,
    /// Model override for extraction; the service default is used when unset
    pub extraction_model: Option<String>,
    /// Save uploads without confirmation when exactly one client matches with high confidence
    pub auto_accept_matches: bool,
    /// Number of biomarkers shown on the trends view
    pub trend_biomarker_count: i32,
    /// Whether the default benchmarks have been seeded
    pub benchmarks_seeded: bool,
    pub updated_at: DateTime<Utc>,
}

impl From<SettingsDBResponse> for SettingsResponse {
    fn from(db: SettingsDBResponse) -> Self {
        Self {
            has_api_key: db.api_key_encrypted.is_some(),
            api_key_hint: db.api_key_hint,
            extraction_model: db.extraction_model,
            auto_accept_matches: db.auto_accept_matches,
            trend_biomarker_count: db.trend_biomarker_count,
            benchmarks_seeded: db.benchmarks_seeded,
            updated_at: db.updated_at,
        }
    }
}

/// Partial settings update. Omitted fields are left unchanged; `null` clears a nullable field.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct SettingsUpdate {
    /// New extraction API key, or `null` to remove the stored one
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub api_key: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub extraction_model: Option<Option<String>>,
    pub auto_accept_matches: Option<bool>,
    #[schema(minimum = 1, maximum = 24)]
    pub trend_biomarker_count: Option<i32>,
}
