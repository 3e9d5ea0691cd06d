use crate::db::errors::DbError;
use crate::extraction::ExtractionError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Authentication required but not provided
    #[error("Not authenticated")]
    Unauthenticated { message: Option<String> },

    /// Invalid request data or business rule violation
    #[error("{message}")]
    BadRequest { message: String },

    /// Requested resource not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// Request body or uploaded document exceeds the configured limit
    #[error("{message}")]
    PayloadTooLarge { message: String },

    /// Well-formed request whose content could not be used (e.g. a report with no biomarkers)
    #[error("{message}")]
    Unprocessable { message: String },

    /// A feature is used before the service or the user has configured it
    #[error("{message}")]
    NotConfigured { message: String },

    /// The external extraction service failed or returned something unusable
    #[error("Upstream error: {message}")]
    Upstream { message: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),

    /// Conflict error, e.g., for unique constraint violations
    #[error("Conflict: {message}")]
    Conflict { message: String },
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::Unprocessable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Error::NotConfigured { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Error::Upstream { .. } => StatusCode::BAD_GATEWAY,
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Database(db_err) => match db_err {
                DbError::NotFound => StatusCode::NOT_FOUND,
                DbError::UniqueViolation { .. } => StatusCode::CONFLICT,
                DbError::ForeignKeyViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::CheckViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Conflict { .. } => StatusCode::CONFLICT,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::Unauthenticated { message } => message.clone().unwrap_or_else(|| "Authentication required".to_string()),
            Error::BadRequest { message }
            | Error::PayloadTooLarge { message }
            | Error::Unprocessable { message }
            | Error::NotConfigured { message } => message.clone(),
            Error::Upstream { message } => format!("Extraction service error: {message}"),
            Error::NotFound { resource, id } => {
                format!("{resource} with ID {id} not found")
            }
            Error::Internal { .. } => "Internal server error".to_string(),
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "Resource not found".to_string(),
                DbError::UniqueViolation { .. } => unique_violation_message(db_err).0,
                DbError::ForeignKeyViolation { .. } => "Invalid reference to related resource".to_string(),
                DbError::CheckViolation { constraint, .. } => match constraint.as_deref() {
                    Some("custom_benchmarks_range_ordered") => "optimal_min cannot be greater than optimal_max".to_string(),
                    Some("settings_trend_biomarker_count_range") => "trend_biomarker_count must be between 1 and 24".to_string(),
                    Some("clients_name_not_blank") => "Client name cannot be empty".to_string(),
                    _ => "Invalid data provided".to_string(),
                },
                DbError::Other(_) => "Database error occurred".to_string(),
            },
            Error::Other(_) => "Internal server error".to_string(),
            Error::Conflict { message } => message.clone(),
        }
    }
}

/// Determine a user-friendly message and resource name for a unique violation.
fn unique_violation_message(db_err: &DbError) -> (String, &'static str) {
    let DbError::UniqueViolation {
        constraint,
        table,
        conflicting_value,
        ..
    } = db_err
    else {
        return ("Resource already exists".to_string(), "unknown");
    };

    match (table.as_deref(), constraint.as_deref()) {
        (Some("users"), Some(c)) if c.contains("email") => ("An account with this email address already exists".to_string(), "user"),
        (Some("clients"), _) => (
            "A client with this name and date of birth already exists".to_string(),
            "client",
        ),
        (Some("custom_benchmarks"), _) => match conflicting_value {
            Some(name) => (format!("A benchmark for '{name}' already exists"), "benchmark"),
            None => ("A benchmark for this biomarker already exists".to_string(), "benchmark"),
        },
        _ => ("Resource already exists".to_string(), "unknown"),
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Database(DbError::Other(_)) | Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Database(_) => {
                tracing::warn!("Database constraint error: {}", self);
            }
            Error::Upstream { .. } => {
                tracing::warn!("Extraction service error: {}", self);
            }
            Error::Unauthenticated { .. } => {
                tracing::info!("Authentication error: {}", self);
            }
            Error::NotConfigured { .. } => {
                tracing::info!("Feature not configured: {}", self);
            }
            Error::BadRequest { .. } | Error::NotFound { .. } | Error::PayloadTooLarge { .. } | Error::Unprocessable { .. } => {
                tracing::debug!("Client error: {}", self);
            }
            Error::Conflict { .. } => {
                tracing::warn!("Conflict error: {}", self);
            }
        }

        let status = self.status_code();

        match &self {
            Error::Conflict { message } => {
                let body = serde_json::json!({ "message": message });
                (status, axum::response::Json(body)).into_response()
            }
            // Handle database unique violations with minimal structured JSON
            Error::Database(db_err @ DbError::UniqueViolation { .. }) => {
                let (message, resource) = unique_violation_message(db_err);
                let body = serde_json::json!({
                    "message": message,
                    "resource": resource
                });

                (status, axum::response::Json(body)).into_response()
            }
            _ => {
                // For all other errors, return simple text message
                let user_message = self.user_message();
                (status, user_message).into_response()
            }
        }
    }
}

impl From<ExtractionError> for Error {
    fn from(err: ExtractionError) -> Self {
        match err {
            ExtractionError::MissingApiKey => Error::NotConfigured {
                message: "AI extraction is not configured. Add an API key in settings or ask your administrator to configure one."
                    .to_string(),
            },
            ExtractionError::InvalidDocument(message) => Error::BadRequest { message },
            ExtractionError::TooLarge { size, max } => Error::PayloadTooLarge {
                message: format!("Document is {size} bytes, which exceeds the {max} byte limit"),
            },
            ExtractionError::Upstream { status, message } => Error::Upstream {
                message: match status {
                    Some(status) => format!("{status}: {message}"),
                    None => message,
                },
            },
            ExtractionError::Timeout => Error::Upstream {
                message: "The extraction service timed out".to_string(),
            },
            ExtractionError::MalformedResponse(message) => Error::Upstream {
                message: format!("Could not read extraction result: {message}"),
            },
            ExtractionError::NoBiomarkers => Error::Unprocessable {
                message: "No biomarkers found in document".to_string(),
            },
        }
    }
}

/// Convert from String errors (e.g., from external functions)
impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Internal { operation: msg }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
