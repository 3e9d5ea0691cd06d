pub mod utils;

use axum::http::StatusCode;
use axum_test::{
    TestServer,
    multipart::{MultipartForm, Part},
};
use serde_json::{Value, json};
use sqlx::PgPool;
use utils::{
    FALLBACK_API_KEY, StubExtractor, StubOutcome, auth_header, biomarker, create_test_app, create_test_app_with_config, create_test_config,
    create_test_user, sample_pdf, sample_report,
};

fn pdf_form(filename: &str) -> MultipartForm {
    MultipartForm::new().add_part("file", Part::bytes(sample_pdf()).file_name(filename).mime_type("application/pdf"))
}

async fn register(server: &TestServer, email: &str) -> String {
    let response = server
        .post("/authentication/register")
        .json(&json!({ "email": email, "password": "password123" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    body["token"].as_str().expect("token in register response").to_string()
}

fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// End-to-end: a first upload for an unknown patient needs confirmation, confirming creates the
/// client, and a second upload for the same patient is matched and saved on its own.
#[sqlx::test]
#[test_log::test]
async fn test_e2e_upload_confirm_then_auto_accept(pool: PgPool) {
    let server = create_test_app(pool, StubExtractor::default());
    let token = register(&server, "practitioner@example.com").await;

    let first = server
        .post("/api/v1/uploads")
        .add_header("authorization", bearer(&token))
        .multipart(pdf_form("jane-jan.pdf"))
        .await;
    first.assert_status_ok();
    let first: Value = first.json();
    assert_eq!(first["status"], "needs_confirmation");
    assert_eq!(first["match"]["decision"]["action"], "new_client");
    assert_eq!(first["source_filename"], "jane-jan.pdf");
    assert_eq!(first["extraction"]["patient_name"], "Jane Doe");

    let confirmed = server
        .post("/api/v1/analyses")
        .add_header("authorization", bearer(&token))
        .json(&json!({
            "client": { "new": {
                "name": first["extraction"]["patient_name"],
                "date_of_birth": first["extraction"]["date_of_birth"],
                "gender": first["extraction"]["gender"],
            }},
            "lab_test_date": first["extraction"]["lab_test_date"],
            "source_filename": first["source_filename"],
            "biomarkers": first["extraction"]["biomarkers"],
        }))
        .await;
    confirmed.assert_status(StatusCode::CREATED);
    let confirmed: Value = confirmed.json();
    assert_eq!(confirmed["client_created"], true);
    let client_id = confirmed["client"]["id"].as_str().unwrap().to_string();
    assert_eq!(confirmed["analysis"]["client_id"], client_id.as_str());
    assert_eq!(confirmed["analysis"]["biomarkers"].as_array().unwrap().len(), 2);

    let second = server
        .post("/api/v1/uploads")
        .add_header("authorization", bearer(&token))
        .multipart(pdf_form("jane-feb.pdf"))
        .await;
    second.assert_status(StatusCode::CREATED);
    let second: Value = second.json();
    assert_eq!(second["status"], "saved");
    assert_eq!(second["client"]["id"], client_id.as_str());
    assert_eq!(second["match"]["decision"]["action"], "auto_accept");
    assert_eq!(second["match"]["candidates"][0]["confidence"], "high");

    let analyses = server
        .get(&format!("/api/v1/clients/{client_id}/analyses"))
        .add_header("authorization", bearer(&token))
        .await;
    analyses.assert_status_ok();
    let analyses: Value = analyses.json();
    assert_eq!(analyses["total_count"], 2);

    let trends = server
        .get(&format!("/api/v1/clients/{client_id}/trends"))
        .add_header("authorization", bearer(&token))
        .await;
    trends.assert_status_ok();
    let trends: Value = trends.json();
    assert_eq!(trends["analysis_count"], 2);
    let glucose = trends["biomarkers"]
        .as_array()
        .unwrap()
        .iter()
        .find(|b| b["name"] == "Glucose")
        .expect("glucose series");
    assert_eq!(glucose["count"], 2);
    assert_eq!(glucose["latest"], 101.0);
}

#[sqlx::test]
async fn test_upload_waits_for_confirmation_when_auto_accept_disabled(pool: PgPool) {
    let config = create_test_config();
    let user = create_test_user(&pool, "careful@example.com").await;
    let (name, value) = auth_header(&user, &config);
    let server = create_test_app_with_config(pool, config, StubExtractor::default());

    server
        .patch("/api/v1/settings")
        .add_header(name.clone(), value.clone())
        .json(&json!({ "auto_accept_matches": false }))
        .await
        .assert_status_ok();

    let client = server
        .post("/api/v1/clients")
        .add_header(name.clone(), value.clone())
        .json(&json!({ "name": "Jane Doe", "date_of_birth": "1985-03-14", "gender": "female" }))
        .await;
    client.assert_status(StatusCode::CREATED);
    let client: Value = client.json();

    let upload = server
        .post("/api/v1/uploads")
        .add_header(name.clone(), value.clone())
        .multipart(pdf_form("jane.pdf"))
        .await;
    upload.assert_status_ok();
    let upload: Value = upload.json();
    assert_eq!(upload["status"], "needs_confirmation");
    // The matcher still recommends the client; only the save is held back
    assert_eq!(upload["match"]["decision"]["action"], "auto_accept");
    assert_eq!(upload["match"]["candidates"][0]["client_id"], client["id"]);

    let analyses = server.get("/api/v1/analyses").add_header(name, value).await;
    let analyses: Value = analyses.json();
    assert_eq!(analyses["total_count"], 0);
}

#[sqlx::test]
async fn test_upload_without_patient_name_proposes_new_client(pool: PgPool) {
    let config = create_test_config();
    let user = create_test_user(&pool, "anon@example.com").await;
    let (name, value) = auth_header(&user, &config);
    let report = crate::extraction::ExtractedReport {
        patient_name: None,
        ..sample_report()
    };
    let server = create_test_app_with_config(pool, config, StubExtractor::returning(report));

    let upload = server.post("/api/v1/uploads").add_header(name, value).multipart(pdf_form("anon.pdf")).await;
    upload.assert_status_ok();
    let upload: Value = upload.json();
    assert_eq!(upload["match"]["decision"]["action"], "new_client");
    assert!(upload["match"]["candidates"].as_array().unwrap().is_empty());
}

#[sqlx::test]
async fn test_upload_rejects_bad_files(pool: PgPool) {
    let config = create_test_config();
    let user = create_test_user(&pool, "files@example.com").await;
    let (name, value) = auth_header(&user, &config);
    let extractor = StubExtractor::default();
    let server = create_test_app_with_config(pool, config, extractor.clone());

    let not_pdf = MultipartForm::new().add_part("file", Part::bytes(b"hello, world".to_vec()).file_name("notes.txt"));
    let response = server
        .post("/api/v1/uploads")
        .add_header(name.clone(), value.clone())
        .multipart(not_pdf)
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(response.text().contains("not a PDF"));

    let wrong_field = MultipartForm::new().add_part("document", Part::bytes(sample_pdf()).file_name("report.pdf"));
    let response = server.post("/api/v1/uploads").add_header(name, value).multipart(wrong_field).await;
    response.assert_status(StatusCode::BAD_REQUEST);

    assert!(extractor.seen_api_keys().is_empty(), "nothing should reach the extractor");
}

#[sqlx::test]
async fn test_upload_rejects_oversized_pdf(pool: PgPool) {
    let mut config = create_test_config();
    config.extraction.max_pdf_size = 16;
    let user = create_test_user(&pool, "big@example.com").await;
    let (name, value) = auth_header(&user, &config);
    let server = create_test_app_with_config(pool, config, StubExtractor::default());

    let response = server.post("/api/v1/uploads").add_header(name, value).multipart(pdf_form("big.pdf")).await;
    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
}

#[sqlx::test]
async fn test_upload_extraction_failures(pool: PgPool) {
    let config = create_test_config();
    let user = create_test_user(&pool, "failures@example.com").await;
    let (name, value) = auth_header(&user, &config);

    let server = create_test_app_with_config(
        pool.clone(),
        config.clone(),
        StubExtractor::with_outcome(StubOutcome::NoBiomarkers),
    );
    let response = server
        .post("/api/v1/uploads")
        .add_header(name.clone(), value.clone())
        .multipart(pdf_form("empty.pdf"))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let server = create_test_app_with_config(
        pool,
        config,
        StubExtractor::with_outcome(StubOutcome::Upstream("model overloaded".to_string())),
    );
    let response = server.post("/api/v1/uploads").add_header(name, value).multipart(pdf_form("busy.pdf")).await;
    response.assert_status(StatusCode::BAD_GATEWAY);
}

#[sqlx::test]
async fn test_upload_without_any_api_key_is_not_configured(pool: PgPool) {
    let mut config = create_test_config();
    config.extraction.api_key = None;
    let user = create_test_user(&pool, "nokey@example.com").await;
    let (name, value) = auth_header(&user, &config);
    let extractor = StubExtractor::default();
    let server = create_test_app_with_config(pool, config, extractor.clone());

    let response = server.post("/api/v1/uploads").add_header(name, value).multipart(pdf_form("r.pdf")).await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    assert!(extractor.seen_api_keys().is_empty());
}

#[sqlx::test]
async fn test_user_api_key_is_masked_and_preferred(pool: PgPool) {
    let config = create_test_config();
    let user = create_test_user(&pool, "ownkey@example.com").await;
    let (name, value) = auth_header(&user, &config);
    let extractor = StubExtractor::default();
    let server = create_test_app_with_config(pool, config, extractor.clone());

    // Falls back to the service key first
    server
        .post("/api/v1/uploads")
        .add_header(name.clone(), value.clone())
        .multipart(pdf_form("a.pdf"))
        .await
        .assert_status_ok();

    let settings = server
        .patch("/api/v1/settings")
        .add_header(name.clone(), value.clone())
        .json(&json!({ "api_key": "sk-user-own-key-9xQz" }))
        .await;
    settings.assert_status_ok();
    let raw = settings.text();
    assert!(!raw.contains("sk-user-own-key-9xQz"), "key must never be echoed back");
    let settings: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(settings["has_api_key"], true);
    assert_eq!(settings["api_key_hint"], "sk-...9xQz");

    // Still no clients, so this one waits for confirmation as well
    let second = server
        .post("/api/v1/uploads")
        .add_header(name.clone(), value.clone())
        .multipart(pdf_form("b.pdf"))
        .await;
    second.assert_status_ok();
    assert_eq!(second.json::<Value>()["status"], "needs_confirmation");

    assert_eq!(
        extractor.seen_api_keys(),
        vec![FALLBACK_API_KEY.to_string(), "sk-user-own-key-9xQz".to_string()]
    );

    // Clearing the key goes back to the fallback
    let cleared = server
        .patch("/api/v1/settings")
        .add_header(name, value)
        .json(&json!({ "api_key": null }))
        .await;
    let cleared: Value = cleared.json();
    assert_eq!(cleared["has_api_key"], false);
    assert!(cleared["api_key_hint"].is_null());
}

#[sqlx::test]
async fn test_users_cannot_see_each_others_data(pool: PgPool) {
    let config = create_test_config();
    let alice = create_test_user(&pool, "alice@example.com").await;
    let bob = create_test_user(&pool, "bob@example.com").await;
    let (alice_name, alice_value) = auth_header(&alice, &config);
    let (bob_name, bob_value) = auth_header(&bob, &config);
    let server = create_test_app_with_config(pool, config, StubExtractor::default());

    let client = server
        .post("/api/v1/clients")
        .add_header(alice_name, alice_value)
        .json(&json!({ "name": "Jane Doe" }))
        .await;
    client.assert_status(StatusCode::CREATED);
    let client: Value = client.json();
    let client_id = client["id"].as_str().unwrap();

    for path in [
        format!("/api/v1/clients/{client_id}"),
        format!("/api/v1/clients/{client_id}/trends"),
    ] {
        server
            .get(&path)
            .add_header(bob_name.clone(), bob_value.clone())
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    let listed: Value = server
        .get("/api/v1/clients")
        .add_header(bob_name.clone(), bob_value.clone())
        .await
        .json();
    assert_eq!(listed["total_count"], 0);

    let matched: Value = server
        .post("/api/v1/clients/match")
        .add_header(bob_name.clone(), bob_value.clone())
        .json(&json!({ "name": "Jane Doe" }))
        .await
        .json();
    assert!(matched["candidates"].as_array().unwrap().is_empty());

    let confirm = server
        .post("/api/v1/analyses")
        .add_header(bob_name.clone(), bob_value.clone())
        .json(&json!({
            "client": { "existing": client_id },
            "biomarkers": [biomarker("Glucose", 90.0, "mg/dL")],
        }))
        .await;
    confirm.assert_status(StatusCode::NOT_FOUND);

    server
        .delete(&format!("/api/v1/clients/{client_id}"))
        .add_header(bob_name, bob_value)
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[sqlx::test]
async fn test_seed_benchmarks_once_then_force(pool: PgPool) {
    let config = create_test_config();
    let user = create_test_user(&pool, "seed@example.com").await;
    let (name, value) = auth_header(&user, &config);
    let server = create_test_app_with_config(pool, config, StubExtractor::default());
    let defaults = crate::benchmarks::DEFAULT_BENCHMARKS.len() as u64;

    let first: Value = server
        .post("/api/v1/benchmarks/seed")
        .add_header(name.clone(), value.clone())
        .await
        .json();
    assert_eq!(first["seeded"], true);
    assert_eq!(first["inserted"], defaults);

    let again: Value = server
        .post("/api/v1/benchmarks/seed")
        .add_header(name.clone(), value.clone())
        .await
        .json();
    assert_eq!(again["seeded"], false);
    assert_eq!(again["inserted"], 0);

    // Remove one default, then force re-adds only that one
    let listed: Value = server
        .get("/api/v1/benchmarks")
        .add_query_param("category", "Thyroid")
        .add_header(name.clone(), value.clone())
        .await
        .json();
    let tsh_id = listed["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|b| b["biomarker_name"] == "TSH")
        .and_then(|b| b["id"].as_str())
        .unwrap()
        .to_string();
    server
        .delete(&format!("/api/v1/benchmarks/{tsh_id}"))
        .add_header(name.clone(), value.clone())
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let forced: Value = server
        .post("/api/v1/benchmarks/seed")
        .add_query_param("force", "true")
        .add_header(name.clone(), value.clone())
        .await
        .json();
    assert_eq!(forced["seeded"], false);
    assert_eq!(forced["inserted"], 1);

    let settings: Value = server.get("/api/v1/settings").add_header(name, value).await.json();
    assert_eq!(settings["benchmarks_seeded"], true);
}

#[sqlx::test]
async fn test_trends_use_custom_benchmarks_and_display_limit(pool: PgPool) {
    let config = create_test_config();
    let user = create_test_user(&pool, "trends@example.com").await;
    let (name, value) = auth_header(&user, &config);
    let server = create_test_app_with_config(pool, config, StubExtractor::default());

    server
        .post("/api/v1/benchmarks")
        .add_header(name.clone(), value.clone())
        .json(&json!({ "biomarker_name": "glucose", "optimal_min": 75.0, "optimal_max": 90.0 }))
        .await
        .assert_status(StatusCode::CREATED);

    let client: Value = server
        .post("/api/v1/clients")
        .add_header(name.clone(), value.clone())
        .json(&json!({ "name": "Sam Patel" }))
        .await
        .json();
    let client_id = client["id"].as_str().unwrap().to_string();

    for (date, glucose) in [("2024-01-01", 100.0), ("2024-03-01", 88.0)] {
        server
            .post("/api/v1/analyses")
            .add_header(name.clone(), value.clone())
            .json(&json!({
                "client": { "existing": client_id },
                "lab_test_date": date,
                "biomarkers": [biomarker("Glucose", glucose, "mg/dL"), biomarker("Ferritin", 60.0, "ng/mL")],
            }))
            .await
            .assert_status(StatusCode::CREATED);
    }
    // One-off measurement, ranks below the two that were measured twice
    server
        .post("/api/v1/analyses")
        .add_header(name.clone(), value.clone())
        .json(&json!({
            "client": { "existing": client_id },
            "lab_test_date": "2024-02-01",
            "biomarkers": [biomarker("TSH", 1.5, "mIU/L")],
        }))
        .await
        .assert_status(StatusCode::CREATED);

    let trends: Value = server
        .get(&format!("/api/v1/clients/{client_id}/trends"))
        .add_query_param("display", 2)
        .add_header(name.clone(), value.clone())
        .await
        .json();
    assert_eq!(trends["analysis_count"], 3);
    let shown = trends["biomarkers"].as_array().unwrap();
    assert_eq!(shown.len(), 2);
    assert_eq!(trends["other_biomarkers"], json!(["TSH"]));

    let glucose = shown.iter().find(|b| b["name"] == "Glucose").unwrap();
    assert_eq!(glucose["first"], 100.0);
    assert_eq!(glucose["latest"], 88.0);
    assert_eq!(glucose["direction"], "down");
    assert_eq!(glucose["status"], "optimal");
    assert_eq!(glucose["optimal_max"], 90.0);

    server
        .get(&format!("/api/v1/clients/{client_id}/trends"))
        .add_query_param("display", 0)
        .add_header(name, value)
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[sqlx::test]
async fn test_login_cookie_reaches_api(pool: PgPool) {
    let server = create_test_app(pool, StubExtractor::default());
    register(&server, "cookie@example.com").await;

    let login = server
        .post("/authentication/login")
        .json(&json!({ "email": "cookie@example.com", "password": "password123" }))
        .await;
    login.assert_status_ok();
    let cookie = login.headers()["set-cookie"].to_str().unwrap().to_string();
    let session = cookie.split(';').next().unwrap().to_string();

    let me = server.get("/api/v1/me").add_header("cookie", session).await;
    me.assert_status_ok();
    let me: Value = me.json();
    assert_eq!(me["email"], "cookie@example.com");

    let logout = server.post("/authentication/logout").await;
    logout.assert_status_ok();
    assert!(logout.headers()["set-cookie"].to_str().unwrap().contains("Max-Age=0"));
}

#[sqlx::test]
async fn test_openapi_document_lists_routes(pool: PgPool) {
    let server = create_test_app(pool, StubExtractor::default());

    let openapi: Value = server.get("/api-docs/openapi.json").await.json();
    for path in ["/api/v1/uploads", "/api/v1/analyses", "/api/v1/clients/{id}/trends", "/api/v1/benchmarks/seed"] {
        assert!(openapi["paths"][path].is_object(), "missing {path}");
    }
    assert!(openapi["components"]["securitySchemes"]["BearerAuth"].is_object());
}
