//! OpenAPI documentation for the HTTP API.
//!
//! [`ApiDoc`] collects every handler annotated with `#[utoipa::path]`. It is served as JSON at
//! `/api-docs/openapi.json` and rendered with Scalar at `/api/docs`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::api;
use crate::{extraction, matching, trends, types};

/// Session token as a bearer header, or the session cookie set by login.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "BearerAuth".to_string(),
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Session token returned by `/authentication/login` or `/authentication/register`:\n\n\
                            ```\nAuthorization: Bearer YOUR_TOKEN\n```",
                        ))
                        .build(),
                ),
            );
            components.security_schemes.insert(
                "CookieAuth".to_string(),
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                    "labflow_session",
                    "Session cookie set by login and registration",
                ))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "labflow API",
        description = "Lab report intake: PDF biomarker extraction, client matching and trend analysis."
    ),
    modifiers(&SecurityAddon),
    paths(
        api::handlers::auth::get_registration_info,
        api::handlers::auth::register,
        api::handlers::auth::get_login_info,
        api::handlers::auth::login,
        api::handlers::auth::logout,
        api::handlers::users::get_me,
        api::handlers::settings::get_settings,
        api::handlers::settings::update_settings,
        api::handlers::clients::list_clients,
        api::handlers::clients::create_client,
        api::handlers::clients::get_client,
        api::handlers::clients::update_client,
        api::handlers::clients::delete_client,
        api::handlers::clients::list_client_analyses,
        api::handlers::clients::get_client_trends,
        api::handlers::clients::match_client,
        api::handlers::uploads::upload_report,
        api::handlers::analyses::confirm_analysis,
        api::handlers::analyses::list_analyses,
        api::handlers::analyses::get_analysis,
        api::handlers::analyses::delete_analysis,
        api::handlers::benchmarks::list_benchmarks,
        api::handlers::benchmarks::create_benchmark,
        api::handlers::benchmarks::update_benchmark,
        api::handlers::benchmarks::delete_benchmark,
        api::handlers::benchmarks::seed_benchmarks,
    ),
    components(
        schemas(
            api::models::auth::RegisterRequest,
            api::models::auth::LoginRequest,
            api::models::auth::AuthResponse,
            api::models::auth::AuthSuccessResponse,
            api::models::auth::RegistrationInfo,
            api::models::auth::LoginInfo,
            api::models::users::UserResponse,
            api::models::settings::SettingsResponse,
            api::models::settings::SettingsUpdate,
            api::models::clients::ClientCreate,
            api::models::clients::ClientUpdate,
            api::models::clients::ClientResponse,
            api::models::analyses::AnalysisResponse,
            api::models::analyses::AnalysisConfirm,
            api::models::analyses::ClientSelection,
            api::models::analyses::ConfirmedAnalysisResponse,
            api::models::uploads::UploadResponse,
            api::models::benchmarks::BenchmarkCreate,
            api::models::benchmarks::BenchmarkUpdate,
            api::models::benchmarks::BenchmarkResponse,
            api::models::benchmarks::SeedResponse,
            extraction::ExtractedReport,
            matching::MatchCandidate,
            matching::MatchOutcome,
            matching::MatchDecision,
            matching::ClientMatch,
            matching::Confidence,
            matching::AttributeMatch,
            trends::TrendReport,
            trends::BiomarkerTrend,
            trends::TrendPoint,
            trends::Direction,
            trends::RangeStatus,
            types::Biomarker,
            types::BiomarkerFlag,
            types::Gender,
        )
    ),
    tags(
        (name = "authentication", description = "Registration, login and logout"),
        (name = "users", description = "The authenticated account"),
        (name = "settings", description = "Per-user settings"),
        (name = "clients", description = "Clients, their analyses and trends, and patient matching"),
        (name = "uploads", description = "Lab report upload and extraction"),
        (name = "analyses", description = "Stored lab analyses"),
        (name = "benchmarks", description = "Custom optimal ranges per biomarker"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_every_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&str> = doc.paths.paths.keys().map(String::as_str).collect();

        for expected in [
            "/authentication/register",
            "/authentication/login",
            "/authentication/logout",
            "/api/v1/me",
            "/api/v1/settings",
            "/api/v1/clients",
            "/api/v1/clients/{id}",
            "/api/v1/clients/{id}/analyses",
            "/api/v1/clients/{id}/trends",
            "/api/v1/clients/match",
            "/api/v1/uploads",
            "/api/v1/analyses",
            "/api/v1/analyses/{id}",
            "/api/v1/benchmarks",
            "/api/v1/benchmarks/{id}",
            "/api/v1/benchmarks/seed",
        ] {
            assert!(paths.contains(&expected), "missing {expected}");
        }

        let schemes = &doc.components.as_ref().unwrap().security_schemes;
        assert!(schemes.contains_key("BearerAuth"));
        assert!(schemes.contains_key("CookieAuth"));
    }

    #[test]
    fn test_client_ids_are_documented_as_uuid_strings() {
        let doc = serde_json::to_value(ApiDoc::openapi()).unwrap();

        let selection = doc["components"]["schemas"]["ClientSelection"].to_string();
        assert!(selection.contains("existing"), "{selection}");
        assert!(selection.contains("\"format\":\"uuid\""), "{selection}");

        let parameters = doc["paths"]["/api/v1/analyses"]["get"]["parameters"].as_array().unwrap();
        let client_id = parameters.iter().find(|p| p["name"] == "client_id").unwrap();
        assert_eq!(client_id["in"], "query");
        assert_eq!(client_id["schema"]["format"], "uuid");
    }
}
