//! # labflow: lab report intake and biomarker tracking
//!
//! `labflow` is the backend for practitioners who receive blood-test reports as PDFs. A report is
//! uploaded, its biomarkers are pulled out by an external AI model, the patient named on it is
//! fuzzy-matched against the practitioner's existing clients, and the result is stored so that
//! trends can be charted against optimal ranges the practitioner controls.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for the HTTP layer and
//! uses PostgreSQL for all persistence. Every row belongs to a user; repositories filter on the
//! owner and row level security policies enforce the same rule inside the database (see [`db`]).
//!
//! ### Request Flow
//!
//! Requests to `/api/v1/*` pass through the [`CurrentUser`](api::models::users::CurrentUser)
//! extractor, which accepts a session JWT either from the session cookie or from an
//! `Authorization: Bearer` header. Handlers open a transaction scoped to that user with
//! [`db::begin_scoped`] and talk to the database through repositories.
//!
//! An upload (`POST /api/v1/uploads`) runs in three steps:
//!
//! 1. the file is checked and sent to the [`extraction`] service, with no transaction open while
//!    the model works;
//! 2. the extracted patient details are scored against the user's clients by [`matching`];
//! 3. a confident match is saved straight away when the user has opted in, otherwise the
//!    extraction is returned for review and saved later through `POST /api/v1/analyses`.
//!
//! ### Core Components
//!
//! - [`api`]: HTTP handlers and request/response models
//! - [`auth`]: password hashing, session tokens and the current-user extractor
//! - [`db`]: repositories and database records
//! - [`extraction`]: the AI client and the parser for what it returns
//! - [`matching`]: name similarity and client scoring
//! - [`trends`]: per-biomarker history and status against optimal ranges
//! - [`benchmarks`]: the default optimal ranges users can seed
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use labflow::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = labflow::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     labflow::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await
//! }
//! ```
//!
//! ## Database Setup
//!
//! Migrations run automatically on startup. They can also be run by hand:
//!
//! ```no_run
//! # use sqlx::PgPool;
//! # async fn example(pool: PgPool) -> Result<(), sqlx::migrate::MigrateError> {
//! labflow::migrator().run(&pool).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.
pub mod api;
pub mod auth;
pub mod benchmarks;
pub mod config;
pub mod crypto;
pub mod db;
pub mod errors;
pub mod extraction;
pub mod matching;
mod openapi;
pub mod telemetry;
pub mod trends;
pub mod types;

#[cfg(test)]
mod test;

use crate::{config::CorsOrigin, extraction::DocumentExtractor, openapi::ApiDoc};
use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::{self, HeaderValue},
    routing::{delete, get, post},
};
use bon::Builder;
pub use config::Config;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use types::{AnalysisId, BenchmarkId, ClientId, UserId};

/// Multipart framing on top of the PDF itself.
const UPLOAD_OVERHEAD_BYTES: usize = 64 * 1024;

/// Application state shared across all request handlers.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .db(pool)
///     .config(config)
///     .extractor(extraction::create_extractor(&config.extraction)?)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    /// Turns uploaded PDFs into biomarkers
    pub extractor: Arc<dyn DocumentExtractor>,
}

/// Get the labflow database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let allowed = &config.auth.cors.allowed_origins;
    let allow_origin = if allowed.iter().any(|origin| matches!(origin, CorsOrigin::Wildcard)) {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::with_capacity(allowed.len());
        for origin in allowed {
            if let CorsOrigin::Url(url) = origin {
                origins.push(url.as_str().trim_end_matches('/').parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            http::Method::GET,
            http::Method::POST,
            http::Method::PATCH,
            http::Method::DELETE,
        ])
        .allow_headers([http::header::CONTENT_TYPE, http::header::AUTHORIZATION])
        .allow_credentials(config.auth.cors.allow_credentials)
        .expose_headers(vec![http::header::LOCATION]);

    if let Some(max_age) = config.auth.cors.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the main application router with all endpoints and middleware.
///
/// - Authentication routes at the root (`/authentication/*`)
/// - The user-facing API under `/api/v1`
/// - The OpenAPI document at `/api-docs/openapi.json`, rendered at `/api/docs`
/// - CORS and request tracing around everything
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    use api::handlers::{analyses, auth, benchmarks, clients, settings, uploads, users};

    let auth_routes = Router::new()
        .route(
            "/authentication/register",
            get(auth::get_registration_info).post(auth::register),
        )
        .route("/authentication/login", get(auth::get_login_info).post(auth::login))
        .route("/authentication/logout", post(auth::logout));

    // Uploads carry a whole PDF, every other route keeps axum's default limit
    let upload_limit = state.config.extraction.max_pdf_size.saturating_add(UPLOAD_OVERHEAD_BYTES);
    let upload_routes = Router::new().route(
        "/uploads",
        post(uploads::upload_report).layer(DefaultBodyLimit::max(upload_limit)),
    );

    let api_routes = Router::new()
        .route("/me", get(users::get_me))
        .route("/settings", get(settings::get_settings).patch(settings::update_settings))
        // Clients
        .route("/clients", get(clients::list_clients).post(clients::create_client))
        .route("/clients/match", post(clients::match_client))
        .route(
            "/clients/{id}",
            get(clients::get_client)
                .patch(clients::update_client)
                .delete(clients::delete_client),
        )
        .route("/clients/{id}/analyses", get(clients::list_client_analyses))
        .route("/clients/{id}/trends", get(clients::get_client_trends))
        // Analyses
        .merge(upload_routes)
        .route("/analyses", get(analyses::list_analyses).post(analyses::confirm_analysis))
        .route("/analyses/{id}", get(analyses::get_analysis).delete(analyses::delete_analysis))
        // Benchmarks
        .route(
            "/benchmarks",
            get(benchmarks::list_benchmarks).post(benchmarks::create_benchmark),
        )
        .route("/benchmarks/seed", post(benchmarks::seed_benchmarks))
        .route(
            "/benchmarks/{id}",
            delete(benchmarks::delete_benchmark).patch(benchmarks::update_benchmark),
        );

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .merge(auth_routes)
        .nest("/api/v1", api_routes)
        .with_state(state.clone())
        .merge(Scalar::with_url("/api/docs", ApiDoc::openapi()));

    let cors_layer = create_cors_layer(&state.config)?;

    let router = router.layer(
        ServiceBuilder::new()
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                    .on_request(DefaultOnRequest::new().level(Level::INFO))
                    .on_response(DefaultOnResponse::new().level(Level::INFO)),
            )
            .layer(cors_layer),
    );

    Ok(router)
}

/// Connect to PostgreSQL and bring the schema up to date.
#[instrument(skip_all)]
async fn setup_database(config: &Config) -> anyhow::Result<PgPool> {
    let pool = config.database.pool.pool_options().connect(&config.database.url).await?;
    migrator().run(&pool).await?;
    Ok(pool)
}

/// The HTTP service with everything it needs to run.
///
/// 1. **Create**: [`Application::new`] connects to the database, runs migrations and builds the
///    extraction client
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and starts handling requests
/// 3. **Shutdown**: When the shutdown signal resolves, in-flight requests finish and the pool is
///    closed
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting labflow with configuration: {:#?}", config);

        let pool = setup_database(&config).await?;
        let extractor = extraction::create_extractor(&config.extraction)?;

        Self::new_with_parts(config, pool, extractor)
    }

    /// Build an application around an existing pool and extractor.
    ///
    /// The pool is expected to be migrated already.
    pub fn new_with_parts(config: Config, pool: PgPool, extractor: Arc<dyn DocumentExtractor>) -> anyhow::Result<Self> {
        let app_state = AppState::builder()
            .db(pool.clone())
            .config(config.clone())
            .extractor(extractor)
            .build();

        let router = build_router(&app_state)?;

        Ok(Self { router, config, pool })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "labflow listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
