use axum::{Json, extract::State};

use crate::{
    AppState,
    api::models::users::{CurrentUser, UserResponse},
    db::handlers::Users,
    errors::{Error, Result},
};

/// Get the authenticated user
#[utoipa::path(
    get,
    path = "/api/v1/me",
    tag = "users",
    summary = "Get current user",
    responses(
        (status = 200, description = "The authenticated user", body = UserResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_me(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<UserResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    // A valid token for a deleted account is no longer a session
    let user = Users::new(&mut pool_conn)
        .get_by_id(current_user.id)
        .await?
        .ok_or_else(|| Error::Unauthenticated {
            message: Some("Account no longer exists".to_string()),
        })?;

    Ok(Json(UserResponse::from(user)))
}
