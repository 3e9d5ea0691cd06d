//! Database models for per-user settings.

use crate::types::UserId;
use chrono::{DateTime, Utc};

/// An API key ready for storage: the ciphertext and the masked hint shown back to the user.
#[derive(Debug, Clone)]
pub struct StoredApiKey {
    pub encrypted: String,
    pub hint: String,
}

/// Partial update. `None` leaves a field untouched; `Some(None)` clears a nullable field.
#[derive(Debug, Clone, Default)]
pub struct SettingsUpdateDBRequest {
    pub api_key: Option<Option<StoredApiKey>>,
    pub extraction_model: Option<Option<String>>,
    pub auto_accept_matches: Option<bool>,
    pub trend_biomarker_count: Option<i32>,
}

/// Database response for a user's settings row
#[derive(Debug, Clone)]
pub struct SettingsDBResponse {
    pub user_id: UserId,
    pub api_key_encrypted: Option<String>,
    pub api_key_hint: Option<String>,
    pub extraction_model: Option<String>,
    pub auto_accept_matches: bool,
    pub trend_biomarker_count: i32,
    pub benchmarks_seeded: bool,
    pub updated_at: DateTime<Utc>,
}
