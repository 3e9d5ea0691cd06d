//! Test utilities for integration testing
use crate::{
    AppState, Application,
    api::models::users::CurrentUser,
    auth::{password, session},
    config::{Config, DatabaseConfig, ExtractionConfig, PoolSettings},
    db::{
        handlers::Users,
        models::users::{UserCreateDBRequest, UserDBResponse},
    },
    extraction::{DocumentExtractor, ExtractedReport, ExtractionError, ExtractionRequest},
    types::{Biomarker, BiomarkerFlag, Gender},
};
use async_trait::async_trait;
use axum_test::TestServer;
use chrono::NaiveDate;
use sqlx::PgPool;
use std::sync::{Arc, Mutex};

pub const TEST_PASSWORD: &str = "password123";
pub const FALLBACK_API_KEY: &str = "sk-service-fallback-key";

pub fn create_test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        database: DatabaseConfig {
            url: "Something".to_string(), // sqlx::test hands us the pool directly
            pool: PoolSettings {
                max_connections: 4,
                min_connections: 0,
                ..Default::default()
            },
        },
        secret_key: Some("test-secret-key-for-testing-only".to_string()),
        extraction: ExtractionConfig {
            api_key: Some(FALLBACK_API_KEY.to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// What the stub returns from `extract`.
#[derive(Debug, Clone)]
pub enum StubOutcome {
    Report(ExtractedReport),
    NoBiomarkers,
    Upstream(String),
}

/// A [`DocumentExtractor`] that never leaves the process and remembers which API keys it saw.
#[derive(Debug, Clone)]
pub struct StubExtractor {
    outcome: StubOutcome,
    seen_api_keys: Arc<Mutex<Vec<String>>>,
}

impl Default for StubExtractor {
    fn default() -> Self {
        Self::returning(sample_report())
    }
}

impl StubExtractor {
    pub fn returning(report: ExtractedReport) -> Self {
        Self::with_outcome(StubOutcome::Report(report))
    }

    pub fn with_outcome(outcome: StubOutcome) -> Self {
        Self {
            outcome,
            seen_api_keys: Arc::default(),
        }
    }

    pub fn seen_api_keys(&self) -> Vec<String> {
        self.seen_api_keys.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentExtractor for StubExtractor {
    async fn extract(&self, request: ExtractionRequest<'_>) -> Result<ExtractedReport, ExtractionError> {
        self.seen_api_keys.lock().unwrap().push(request.api_key.to_string());
        match &self.outcome {
            StubOutcome::Report(report) => Ok(report.clone()),
            StubOutcome::NoBiomarkers => Err(ExtractionError::NoBiomarkers),
            StubOutcome::Upstream(message) => Err(ExtractionError::Upstream {
                status: Some(500),
                message: message.clone(),
            }),
        }
    }
}

pub fn biomarker(name: &str, value: f64, unit: &str) -> Biomarker {
    Biomarker {
        name: name.to_string(),
        value,
        unit: Some(unit.to_string()),
        reference_min: None,
        reference_max: None,
        flag: None,
    }
}

/// A report for Jane Doe with two biomarkers.
pub fn sample_report() -> ExtractedReport {
    ExtractedReport {
        patient_name: Some("Jane Doe".to_string()),
        date_of_birth: NaiveDate::from_ymd_opt(1985, 3, 14),
        gender: Some(Gender::Female),
        lab_test_date: NaiveDate::from_ymd_opt(2024, 1, 10),
        biomarkers: vec![
            Biomarker {
                flag: Some(BiomarkerFlag::High),
                reference_min: Some(70.0),
                reference_max: Some(99.0),
                ..biomarker("Glucose", 101.0, "mg/dL")
            },
            biomarker("Vitamin D", 38.0, "ng/mL"),
        ],
    }
}

/// Smallest byte string that passes upload validation.
pub fn sample_pdf() -> Vec<u8> {
    b"%PDF-1.4\n1 0 obj\n<<>>\nendobj\ntrailer\n<<>>\n%%EOF\n".to_vec()
}

pub fn test_app_state(pool: PgPool, config: Config) -> AppState {
    AppState::builder()
        .db(pool)
        .config(config)
        .extractor(Arc::new(StubExtractor::default()))
        .build()
}

pub fn create_test_app(pool: PgPool, extractor: StubExtractor) -> TestServer {
    create_test_app_with_config(pool, create_test_config(), extractor)
}

pub fn create_test_app_with_config(pool: PgPool, config: Config, extractor: StubExtractor) -> TestServer {
    Application::new_with_parts(config, pool, Arc::new(extractor))
        .expect("Failed to create application")
        .into_test_server()
}

/// Insert a user whose password is [`TEST_PASSWORD`].
pub async fn create_test_user(pool: &PgPool, email: &str) -> UserDBResponse {
    let password_hash = password::hash_password(TEST_PASSWORD).expect("Failed to hash password");
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Users::new(&mut conn)
        .create(&UserCreateDBRequest {
            email: email.to_string(),
            display_name: Some("Test User".to_string()),
            password_hash,
        })
        .await
        .expect("Failed to create test user")
}

/// `Authorization` header carrying a fresh session token for `user`.
pub fn auth_header(user: &UserDBResponse, config: &Config) -> (String, String) {
    let current = CurrentUser {
        id: user.id,
        email: user.email.clone(),
        display_name: user.display_name.clone(),
    };
    let token = session::create_session_token(&current, config).expect("Failed to create session token");
    ("authorization".to_string(), format!("Bearer {token}"))
}
