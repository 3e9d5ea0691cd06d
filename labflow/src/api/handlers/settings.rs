use axum::{Json, extract::State};

use crate::{
    AppState,
    api::models::{
        settings::{SettingsResponse, SettingsUpdate},
        users::CurrentUser,
    },
    crypto,
    db::{
        self,
        handlers::Settings,
        models::settings::{SettingsUpdateDBRequest, StoredApiKey},
    },
    errors::{Error, Result},
};

const TREND_COUNT_RANGE: std::ops::RangeInclusive<i32> = 1..=24;

/// Get the settings of the authenticated user
#[utoipa::path(
    get,
    path = "/api/v1/settings",
    tag = "settings",
    summary = "Get settings",
    responses(
        (status = 200, description = "Current settings", body = SettingsResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_settings(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<SettingsResponse>> {
    let mut tx = db::begin_scoped(&state.db, current_user.id).await?;
    let settings = Settings::new(&mut tx, current_user.id).get().await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(SettingsResponse::from(settings)))
}

/// Update the settings of the authenticated user
///
/// A new `api_key` is encrypted before it is stored; only a masked hint is ever returned.
#[utoipa::path(
    patch,
    path = "/api/v1/settings",
    tag = "settings",
    summary = "Update settings",
    request_body = SettingsUpdate,
    responses(
        (status = 200, description = "Updated settings", body = SettingsResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized"),
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn update_settings(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(update): Json<SettingsUpdate>,
) -> Result<Json<SettingsResponse>> {
    if let Some(count) = update.trend_biomarker_count
        && !TREND_COUNT_RANGE.contains(&count)
    {
        return Err(Error::BadRequest {
            message: format!(
                "trend_biomarker_count must be between {} and {}",
                TREND_COUNT_RANGE.start(),
                TREND_COUNT_RANGE.end()
            ),
        });
    }

    let api_key = match update.api_key {
        None => None,
        Some(None) => Some(None),
        Some(Some(key)) => {
            let key = key.trim();
            if key.is_empty() {
                return Err(Error::BadRequest {
                    message: "api_key cannot be empty; send null to remove the stored key".to_string(),
                });
            }
            let secret_key = state.config.secret_key.as_deref().ok_or_else(|| Error::Internal {
                operation: "encrypt API key: secret_key is not configured".to_string(),
            })?;
            Some(Some(StoredApiKey {
                encrypted: crypto::encrypt_secret(secret_key, key)?,
                hint: crypto::mask_api_key(key),
            }))
        }
    };

    let extraction_model = update
        .extraction_model
        .map(|model| model.map(|m| m.trim().to_string()).filter(|m| !m.is_empty()));

    let request = SettingsUpdateDBRequest {
        api_key,
        extraction_model,
        auto_accept_matches: update.auto_accept_matches,
        trend_biomarker_count: update.trend_biomarker_count,
    };

    let mut tx = db::begin_scoped(&state.db, current_user.id).await?;
    let settings = Settings::new(&mut tx, current_user.id).update(&request).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(SettingsResponse::from(settings)))
}
