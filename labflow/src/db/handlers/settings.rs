//! Database repository for per-user settings.

use crate::db::{
    errors::Result,
    models::settings::{SettingsDBResponse, SettingsUpdateDBRequest},
};
use crate::types::{UserId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};
use tracing::instrument;

const SETTINGS_COLUMNS: &str = "user_id, api_key_encrypted, api_key_hint, extraction_model, auto_accept_matches, \
     trend_biomarker_count, benchmarks_seeded, updated_at";

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct SettingsRow {
    pub user_id: UserId,
    pub api_key_encrypted: Option<String>,
    pub api_key_hint: Option<String>,
    pub extraction_model: Option<String>,
    pub auto_accept_matches: bool,
    pub trend_biomarker_count: i32,
    pub benchmarks_seeded: bool,
    pub updated_at: DateTime<Utc>,
}

impl From<SettingsRow> for SettingsDBResponse {
    fn from(row: SettingsRow) -> Self {
        Self {
            user_id: row.user_id,
            api_key_encrypted: row.api_key_encrypted,
            api_key_hint: row.api_key_hint,
            extraction_model: row.extraction_model,
            auto_accept_matches: row.auto_accept_matches,
            trend_biomarker_count: row.trend_biomarker_count,
            benchmarks_seeded: row.benchmarks_seeded,
            updated_at: row.updated_at,
        }
    }
}

pub struct Settings<'c> {
    db: &'c mut PgConnection,
    user_id: UserId,
}

impl<'c> Settings<'c> {
    pub fn new(db: &'c mut PgConnection, user_id: UserId) -> Self {
        Self { db, user_id }
    }

    /// The user's settings. The row always exists once the user does.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&self.user_id)), err)]
    pub async fn get(&mut self) -> Result<SettingsDBResponse> {
        let row = sqlx::query_as::<_, SettingsRow>(&format!("SELECT {SETTINGS_COLUMNS} FROM settings WHERE user_id = $1"))
            .bind(self.user_id)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(SettingsDBResponse::from(row))
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&self.user_id)), err)]
    pub async fn update(&mut self, request: &SettingsUpdateDBRequest) -> Result<SettingsDBResponse> {
        let (set_api_key, api_key_encrypted, api_key_hint) = match &request.api_key {
            None => (false, None, None),
            Some(None) => (true, None, None),
            Some(Some(key)) => (true, Some(key.encrypted.as_str()), Some(key.hint.as_str())),
        };
        let (set_model, extraction_model) = match &request.extraction_model {
            None => (false, None),
            Some(model) => (true, model.as_deref()),
        };

        let row = sqlx::query_as::<_, SettingsRow>(&format!(
            r#"
            UPDATE settings SET
                api_key_encrypted = CASE WHEN $2 THEN $3 ELSE api_key_encrypted END,
                api_key_hint = CASE WHEN $2 THEN $4 ELSE api_key_hint END,
                extraction_model = CASE WHEN $5 THEN $6 ELSE extraction_model END,
                auto_accept_matches = COALESCE($7, auto_accept_matches),
                trend_biomarker_count = COALESCE($8, trend_biomarker_count),
                updated_at = NOW()
            WHERE user_id = $1
            RETURNING {SETTINGS_COLUMNS}
            "#
        ))
        .bind(self.user_id)
        .bind(set_api_key)
        .bind(api_key_encrypted)
        .bind(api_key_hint)
        .bind(set_model)
        .bind(extraction_model)
        .bind(request.auto_accept_matches)
        .bind(request.trend_biomarker_count)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(SettingsDBResponse::from(row))
    }

    /// Flip `benchmarks_seeded` on. Returns false if it was already on, so concurrent seed
    /// requests agree on which one does the work.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&self.user_id)), err)]
    pub async fn mark_benchmarks_seeded(&mut self) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE settings SET benchmarks_seeded = TRUE, updated_at = NOW() WHERE user_id = $1 AND NOT benchmarks_seeded",
        )
        .bind(self.user_id)
        .execute(&mut *self.db)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::errors::DbError;
    use crate::db::models::settings::StoredApiKey;
    use crate::test::utils::create_test_user;
    use sqlx::PgPool;

    #[sqlx::test]
    async fn test_defaults_from_trigger(pool: PgPool) {
        let user = create_test_user(&pool, "settings@example.com").await;
        let mut conn = pool.acquire().await.unwrap();

        let settings = Settings::new(&mut conn, user.id).get().await.unwrap();
        assert!(settings.auto_accept_matches);
        assert_eq!(settings.trend_biomarker_count, 6);
        assert!(!settings.benchmarks_seeded);
        assert!(settings.api_key_encrypted.is_none());
    }

    #[sqlx::test]
    async fn test_partial_update_and_clear(pool: PgPool) {
        let user = create_test_user(&pool, "settings@example.com").await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Settings::new(&mut conn, user.id);

        let updated = repo
            .update(&SettingsUpdateDBRequest {
                api_key: Some(Some(StoredApiKey {
                    encrypted: "ciphertext".to_string(),
                    hint: "sk-...abcd".to_string(),
                })),
                extraction_model: Some(Some("gpt-4o".to_string())),
                trend_biomarker_count: Some(10),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(updated.api_key_hint.as_deref(), Some("sk-...abcd"));
        assert_eq!(updated.extraction_model.as_deref(), Some("gpt-4o"));
        assert_eq!(updated.trend_biomarker_count, 10);
        assert!(updated.auto_accept_matches);

        // Untouched fields survive; Some(None) clears
        let updated = repo
            .update(&SettingsUpdateDBRequest {
                api_key: Some(None),
                auto_accept_matches: Some(false),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(updated.api_key_encrypted.is_none());
        assert!(updated.api_key_hint.is_none());
        assert_eq!(updated.extraction_model.as_deref(), Some("gpt-4o"));
        assert!(!updated.auto_accept_matches);
    }

    #[sqlx::test]
    async fn test_trend_count_range_enforced(pool: PgPool) {
        let user = create_test_user(&pool, "settings@example.com").await;
        let mut conn = pool.acquire().await.unwrap();

        let err = Settings::new(&mut conn, user.id)
            .update(&SettingsUpdateDBRequest {
                trend_biomarker_count: Some(25),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::CheckViolation { .. }));
    }

    #[sqlx::test]
    async fn test_mark_benchmarks_seeded_once(pool: PgPool) {
        let user = create_test_user(&pool, "settings@example.com").await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Settings::new(&mut conn, user.id);

        assert!(repo.mark_benchmarks_seeded().await.unwrap());
        assert!(!repo.mark_benchmarks_seeded().await.unwrap());
        assert!(repo.get().await.unwrap().benchmarks_seeded);
    }
}
