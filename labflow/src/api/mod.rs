//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! - **Authentication** (`/authentication/*`): registration, login, logout
//! - **Account** (`/api/v1/me`, `/api/v1/settings`)
//! - **Clients** (`/api/v1/clients/*`): client records, their analyses and trends, matching
//! - **Uploads** (`/api/v1/uploads`): lab report intake
//! - **Analyses** (`/api/v1/analyses/*`): confirmed, stored lab results
//! - **Benchmarks** (`/api/v1/benchmarks/*`): per-user optimal ranges
//!
//! # OpenAPI Documentation
//!
//! All endpoints are documented with `utoipa`. The document is served at
//! `/api-docs/openapi.json` and rendered at `/api/docs`.

pub mod handlers;
pub mod models;
