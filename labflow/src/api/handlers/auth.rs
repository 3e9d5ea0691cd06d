use axum::{Json, extract::State};

use crate::{
    AppState,
    api::models::{
        auth::{
            AuthResponse, AuthSuccessResponse, LoginInfo, LoginRequest, LoginResponse, LogoutResponse, RegisterRequest, RegisterResponse,
            RegistrationInfo,
        },
        users::UserResponse,
    },
    auth::{password, session},
    config::Config,
    db::{handlers::Users, models::users::UserCreateDBRequest},
    errors::Error,
};

fn invalid_credentials() -> Error {
    Error::Unauthenticated {
        message: Some("Invalid email or password".to_string()),
    }
}

/// Get registration information
#[utoipa::path(
    get,
    path = "/authentication/register",
    tag = "authentication",
    responses(
        (status = 200, description = "Registration info", body = RegistrationInfo),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_registration_info(State(state): State<AppState>) -> Result<Json<RegistrationInfo>, Error> {
    let enabled = state.config.auth.allow_registration;
    Ok(Json(RegistrationInfo {
        enabled,
        message: if enabled {
            "Registration is enabled".to_string()
        } else {
            "Registration is disabled".to_string()
        },
    }))
}

/// Register a new user account
#[utoipa::path(
    post,
    path = "/authentication/register",
    request_body = RegisterRequest,
    tag = "authentication",
    responses(
        (status = 201, description = "User registered successfully", body = AuthResponse),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "User already exists"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn register(State(state): State<AppState>, Json(request): Json<RegisterRequest>) -> Result<RegisterResponse, Error> {
    if !state.config.auth.allow_registration {
        return Err(Error::BadRequest {
            message: "User registration is disabled".to_string(),
        });
    }

    let email = request.email.trim().to_string();
    if email.is_empty() || !email.contains('@') {
        return Err(Error::BadRequest {
            message: "A valid email address is required".to_string(),
        });
    }

    // Validate password length
    let password_config = &state.config.auth.password;
    let password_length = request.password.chars().count();
    if password_length < password_config.min_length {
        return Err(Error::BadRequest {
            message: format!("Password must be at least {} characters", password_config.min_length),
        });
    }
    if password_length > password_config.max_length {
        return Err(Error::BadRequest {
            message: format!("Password must be no more than {} characters", password_config.max_length),
        });
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let mut user_repo = Users::new(&mut tx);
    if user_repo.get_by_email(&email).await?.is_some() {
        return Err(Error::Conflict {
            message: "An account with this email address already exists".to_string(),
        });
    }

    // Hash the password on a blocking thread to avoid blocking async runtime
    let password_hash = password::hash_password_blocking(request.password).await?;

    let display_name = request.display_name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
    let created_user = user_repo
        .create(&UserCreateDBRequest {
            email,
            display_name,
            password_hash,
        })
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    tracing::info!(user_id = %created_user.id, "Registered new user");

    let user_response = UserResponse::from(created_user);
    let current_user = user_response.clone().into();
    let token = session::create_session_token(&current_user, &state.config)?;
    let cookie = create_session_cookie(&token, &state.config);

    let auth_response = AuthResponse {
        user: user_response,
        token,
        message: "Registration successful".to_string(),
    };

    Ok(RegisterResponse { auth_response, cookie })
}

/// Get login information
#[utoipa::path(
    get,
    path = "/authentication/login",
    tag = "authentication",
    responses(
        (status = 200, description = "Login info", body = LoginInfo),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_login_info() -> Result<Json<LoginInfo>, Error> {
    Ok(Json(LoginInfo {
        enabled: true,
        message: "Email and password login is enabled".to_string(),
    }))
}

/// Login with email and password
#[utoipa::path(
    post,
    path = "/authentication/login",
    request_body = LoginRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<LoginResponse, Error> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let user = Users::new(&mut pool_conn)
        .get_by_email(&request.email)
        .await?
        .ok_or_else(invalid_credentials)?;
    drop(pool_conn);

    // Verify password on a blocking thread to avoid blocking async runtime
    let is_valid = password::verify_password_blocking(request.password, user.password_hash.clone()).await?;
    if !is_valid {
        return Err(invalid_credentials());
    }

    let user_response = UserResponse::from(user);
    let current_user = user_response.clone().into();
    let token = session::create_session_token(&current_user, &state.config)?;
    let cookie = create_session_cookie(&token, &state.config);

    let auth_response = AuthResponse {
        user: user_response,
        token,
        message: "Login successful".to_string(),
    };

    Ok(LoginResponse { auth_response, cookie })
}

/// Logout (clear session)
#[utoipa::path(
    post,
    path = "/authentication/logout",
    tag = "authentication",
    responses(
        (status = 200, description = "Logout successful", body = AuthSuccessResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<AppState>) -> Result<LogoutResponse, Error> {
    // Expired cookie clears the session
    let cookie = session_cookie(&state.config, "", 0);

    let auth_response = AuthSuccessResponse {
        message: "Logout successful".to_string(),
    };

    Ok(LogoutResponse { auth_response, cookie })
}

fn session_cookie(config: &Config, value: &str, max_age: u64) -> String {
    let session_config = &config.auth.session;
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite={}; Max-Age={}",
        session_config.cookie_name, value, session_config.cookie_same_site, max_age
    );
    if session_config.cookie_secure {
        cookie.push_str("; Secure");
    }
    cookie
}

fn create_session_cookie(token: &str, config: &Config) -> String {
    session_cookie(config, token, config.auth.jwt_expiry.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::utils::{create_test_config, test_app_state};
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use sqlx::PgPool;

    fn auth_server(state: AppState) -> TestServer {
        let app = axum::Router::new()
            .route("/auth/register", axum::routing::post(register))
            .route("/auth/login", axum::routing::post(login))
            .route("/auth/logout", axum::routing::post(logout))
            .with_state(state);
        TestServer::new(app).unwrap()
    }

    fn register_request(email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
            display_name: Some("Test User".to_string()),
        }
    }

    #[sqlx::test]
    async fn test_register_success(pool: PgPool) {
        let server = auth_server(test_app_state(pool, create_test_config()));

        let response = server.post("/auth/register").json(&register_request("test@example.com", "password123")).await;

        response.assert_status(StatusCode::CREATED);
        let cookie = response.headers().get("set-cookie").unwrap().to_str().unwrap().to_string();
        assert!(cookie.starts_with("labflow_session="));
        assert!(cookie.contains("HttpOnly"));

        let body: AuthResponse = response.json();
        assert_eq!(body.user.email, "test@example.com");
        assert_eq!(body.message, "Registration successful");
        assert!(!body.token.is_empty());
    }

    #[sqlx::test]
    async fn test_register_disabled(pool: PgPool) {
        let mut config = create_test_config();
        config.auth.allow_registration = false;
        let server = auth_server(test_app_state(pool, config));

        let response = server.post("/auth/register").json(&register_request("test@example.com", "password123")).await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[sqlx::test]
    async fn test_register_password_length_enforced(pool: PgPool) {
        let server = auth_server(test_app_state(pool, create_test_config()));

        let response = server.post("/auth/register").json(&register_request("test@example.com", "short")).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(response.text().contains("at least 8"));

        let long = "x".repeat(65);
        let response = server.post("/auth/register").json(&register_request("test@example.com", &long)).await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[sqlx::test]
    async fn test_register_duplicate_email_conflicts(pool: PgPool) {
        let server = auth_server(test_app_state(pool, create_test_config()));

        server
            .post("/auth/register")
            .json(&register_request("dup@example.com", "password123"))
            .await
            .assert_status(StatusCode::CREATED);

        let response = server.post("/auth/register").json(&register_request("DUP@example.com", "password123")).await;
        response.assert_status(StatusCode::CONFLICT);
    }

    #[sqlx::test]
    async fn test_login_success_and_failure(pool: PgPool) {
        let server = auth_server(test_app_state(pool, create_test_config()));
        server
            .post("/auth/register")
            .json(&register_request("login@example.com", "password123"))
            .await
            .assert_status(StatusCode::CREATED);

        let response = server
            .post("/auth/login")
            .json(&LoginRequest {
                email: "login@example.com".to_string(),
                password: "password123".to_string(),
            })
            .await;
        response.assert_status_ok();
        let body: AuthResponse = response.json();
        assert_eq!(body.message, "Login successful");

        let response = server
            .post("/auth/login")
            .json(&LoginRequest {
                email: "login@example.com".to_string(),
                password: "wrong-password".to_string(),
            })
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);

        let response = server
            .post("/auth/login")
            .json(&LoginRequest {
                email: "nobody@example.com".to_string(),
                password: "password123".to_string(),
            })
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[sqlx::test]
    async fn test_logout_expires_cookie(pool: PgPool) {
        let server = auth_server(test_app_state(pool, create_test_config()));

        let response = server.post("/auth/logout").await;
        response.assert_status_ok();
        let cookie = response.headers().get("set-cookie").unwrap().to_str().unwrap().to_string();
        assert!(cookie.contains("Max-Age=0"));
    }
}
