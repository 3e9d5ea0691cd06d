use crate::{
    AppState,
    api::models::users::CurrentUser,
    auth::session,
    config::Config,
    errors::{Error, Result},
};
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use tracing::{debug, instrument, trace};

/// Extract user from the session cookie if present and valid
/// Returns:
/// - None: No session cookie present
/// - Some(Ok(user)): Valid token found and verified
/// - Some(Err(error)): Cookie present but invalid or expired
#[instrument(skip(parts, config))]
fn try_cookie_auth(parts: &Parts, config: &Config) -> Option<Result<CurrentUser>> {
    let cookie_header = parts.headers.get(header::COOKIE)?;

    let cookie_str = match cookie_header.to_str() {
        Ok(s) => s,
        Err(e) => {
            return Some(Err(Error::BadRequest {
                message: format!("Invalid cookie header: {e}"),
            }));
        }
    };
    let cookie_name = &config.auth.session.cookie_name;

    let mut last_error = None;
    for cookie in cookie_str.split(';') {
        if let Some((name, value)) = cookie.trim().split_once('=')
            && name == cookie_name
        {
            match session::verify_session_token(value, config) {
                Ok(user) => return Some(Ok(user)),
                // Keep looking: a stale cookie can sit next to a fresh one
                Err(e) => last_error = Some(e),
            }
        }
    }
    last_error.map(Err)
}

/// Extract user from an `Authorization: Bearer <token>` header
#[instrument(skip(parts, config))]
fn try_bearer_auth(parts: &Parts, config: &Config) -> Option<Result<CurrentUser>> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ").or_else(|| value.strip_prefix("bearer "))?;
    Some(session::verify_session_token(token.trim(), config))
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let mut any_auth_attempted = false;

        for (method, attempt) in [
            ("bearer", try_bearer_auth(parts, &state.config)),
            ("cookie", try_cookie_auth(parts, &state.config)),
        ] {
            match attempt {
                Some(Ok(user)) => {
                    debug!("Authenticated user {} via {}", user.id, method);
                    return Ok(user);
                }
                Some(Err(e)) => {
                    trace!("{} authentication failed: {:?}", method, e);
                    any_auth_attempted = true;
                }
                None => trace!("No {} credentials presented", method),
            }
        }

        Err(Error::Unauthenticated {
            message: any_auth_attempted.then(|| "Invalid or expired session".to_string()),
        })
    }
}
