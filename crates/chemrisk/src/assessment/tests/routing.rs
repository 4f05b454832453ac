use super::common::*;
use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::assessment::client::Endpoint;
use crate::assessment::controller::GENERIC_FAILURE_MESSAGE;

async fn login(router: &axum::Router) -> String {
    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/session/login",
            None,
            json!({ "email": "analyst@example.com", "password": PASSWORD }),
        ))
        .await
        .expect("route executes");
    let (status, body) = read_json(response).await;
    assert_eq!(status, StatusCode::OK);
    body["token"].as_str().expect("token issued").to_string()
}

fn importer_body() -> Value {
    json!({ "fields": Value::Object(importer_fields()) })
}

#[tokio::test]
async fn assessments_require_a_session() {
    let (router, _) = dashboard(Arc::new(ScriptedScoring::replying(
        Endpoint::ImporterRisk,
        importer_reply(),
    )));

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/assessments/importer",
            None,
            importer_body(),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn importer_route_returns_result_view_and_explanation() {
    let scoring = Arc::new(ScriptedScoring::replying(
        Endpoint::ImporterRisk,
        importer_reply(),
    ));
    let (router, _) = dashboard(Arc::clone(&scoring));
    let token = login(&router).await;

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/assessments/importer",
            Some(&token),
            json!({ "fields": Value::Object(importer_fields()), "explanation_method": "lime" }),
        ))
        .await
        .expect("route executes");
    let (status, body) = read_json(response).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["form"], json!("importer"));
    assert_eq!(body["result"]["category"], json!("risky"));
    assert_eq!(body["result"]["risk_percentage"], json!(87));
    assert_eq!(body["view"]["badge"], json!("danger"));
    assert_eq!(
        body["explanation"]["feature_importances"][0]["feature"],
        json!("pastViolations > 1.00")
    );
    assert!(scoring.calls_to(Endpoint::ExplainLime).is_empty());

    let forwarded = &scoring.calls_to(Endpoint::ImporterRisk)[0];
    assert!(forwarded.get("importerLicenseId").is_none());
    assert!(!forwarded.to_string().contains(&token));
}

#[tokio::test]
async fn validation_failures_return_fields_and_summary() {
    let scoring = Arc::new(ScriptedScoring::default());
    let (router, _) = dashboard(Arc::clone(&scoring));
    let token = login(&router).await;

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/assessments/end-user",
            Some(&token),
            json!({ "fields": { "customer_name": "Acme Labs", "issued_qty": "many" } }),
        ))
        .await
        .expect("route executes");
    let (status, body) = read_json(response).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body["fields"]["issued_qty"],
        json!("Issued Quantity must be a valid number")
    );
    assert_eq!(body["fields"]["product_code"], json!("Product Code is required"));
    assert_eq!(body["summary"].as_array().map(Vec::len), Some(3));
    assert!(scoring.calls().is_empty());
}

#[tokio::test]
async fn remote_failures_map_to_bad_gateway_without_detail() {
    let scoring = Arc::new(ScriptedScoring::default().with(Endpoint::Analyze, Scripted::Status(500)));
    let (router, _) = dashboard(scoring);
    let token = login(&router).await;

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/assessments/recipe",
            Some(&token),
            json!({ "chemicals": [{ "name": "Chlorine", "quantity": 5, "unit": "kg" }] }),
        ))
        .await
        .expect("route executes");
    let (status, body) = read_json(response).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body, json!({ "error": GENERIC_FAILURE_MESSAGE }));
}

#[tokio::test]
async fn future_route_sends_a_single_row_table() {
    let scoring = Arc::new(ScriptedScoring::replying(
        Endpoint::Predict,
        json!({ "predicted_risk": "High" }),
    ));
    let (router, _) = dashboard(Arc::clone(&scoring));
    let token = login(&router).await;

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/assessments/future",
            Some(&token),
            json!({ "fields": {
                "hs_code": "282619",
                "chemical_name": "Iodine",
                "country_of_origin": "Japan",
                "risk_category": "Low",
                "compliance_history": "Good",
                "financial_stability": "High",
                "import_frequency": 4,
                "import_quantity": 300,
                "compliance_score": 88.5,
                "past_violations": 0,
                "import_trend": -0.2
            } }),
        ))
        .await
        .expect("route executes");
    let (status, body) = read_json(response).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["category"], json!("high"));
    let sent = &scoring.calls_to(Endpoint::Predict)[0];
    assert_eq!(sent.as_array().map(Vec::len), Some(1));
    assert_eq!(sent[0]["Country_of_Origin"], json!("Japan"));
}

#[tokio::test]
async fn logout_invalidates_the_token() {
    let (router, sessions) = dashboard(Arc::new(ScriptedScoring::default()));
    let token = login(&router).await;
    assert_eq!(sessions.active_sessions(), 1);

    let response = router
        .clone()
        .oneshot(json_request("GET", "/api/v1/session", Some(&token), Value::Null))
        .await
        .expect("route executes");
    let (status, body) = read_json(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], json!("analyst@example.com"));

    let response = router
        .clone()
        .oneshot(json_request("DELETE", "/api/v1/session", Some(&token), Value::Null))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(sessions.active_sessions(), 0);

    let response = router
        .oneshot(json_request("GET", "/api/v1/session", Some(&token), Value::Null))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_password_is_unauthorized_and_duplicate_signup_conflicts() {
    let (router, _) = dashboard(Arc::new(ScriptedScoring::default()));

    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/session/login",
            None,
            json!({ "email": "analyst@example.com", "password": "guess" }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let signup = json!({ "name": "Ana Lyst", "email": "ana@example.com", "password": PASSWORD });
    let response = router
        .clone()
        .oneshot(json_request("POST", "/api/v1/session/signup", None, signup.clone()))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = router
        .oneshot(json_request("POST", "/api/v1/session/signup", None, signup))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CONFLICT);
}
