//! Integration tests for the reconciliation HTTP API.
//!
//! Each test drives a fresh router with `oneshot`, so report ids start at 1.

use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    Router,
};
use ledgerdiff::server::{router, AppState};
use ledgerdiff::ServerConfig;
use serde_json::Value;
use tower::ServiceExt;

const BOUNDARY: &str = "ledgerdiff-test-boundary";

const SOURCE: &str = "id,name,tax\n1,Goku,100\n2,Gohan,200\n";
const TARGET: &str = "id,name,tax\n1,goku,999\n3,Vegeta,50\n";

fn app() -> Router {
    router(AppState::new(ServerConfig::default()))
}

fn multipart_body(parts: &[(&str, &str)]) -> String {
    let mut body = String::new();
    for (name, content) in parts {
        body.push_str(&format!("--{}\r\n", BOUNDARY));
        if *name == "output_format" {
            body.push_str(&format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name));
        } else {
            body.push_str(&format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}.csv\"\r\nContent-Type: text/csv\r\n\r\n",
                name, name
            ));
        }
        body.push_str(content);
        body.push_str("\r\n");
    }
    body.push_str(&format!("--{}--\r\n", BOUNDARY));
    body
}

async fn upload(app: &Router, parts: &[(&str, &str)]) -> Response<Body> {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/reconcile")
                .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", BOUNDARY))
                .body(Body::from(multipart_body(parts)))
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn get(app: &Router, uri: &str) -> Response<Body> {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

fn content_type(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[tokio::test]
async fn test_health() {
    let app = app();
    let response = get(&app, "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["reports"], 0);

    upload(&app, &[("source_file", SOURCE), ("target_file", TARGET)]).await;
    assert_eq!(body_json(get(&app, "/health").await).await["reports"], 1);
}

#[tokio::test]
async fn test_identical_files_are_clean() {
    let app = app();
    let response = upload(&app, &[("source_file", SOURCE), ("target_file", SOURCE)]).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["id"], "1");
    assert_eq!(body["missing_in_target"], serde_json::json!([]));
    assert_eq!(body["missing_in_source"], serde_json::json!([]));
    assert_eq!(body["discrepancies"], serde_json::json!([]));
    assert_eq!(body["report_url"], "http://localhost:3000/api/reconcile/1?output=html");
}

#[tokio::test]
async fn test_partial_mismatch_json() {
    let app = app();
    let response = upload(&app, &[("source_file", SOURCE), ("target_file", TARGET)]).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(content_type(&response).starts_with("application/json"));
    let body = body_json(response).await;

    assert_eq!(
        body["missing_in_target"],
        serde_json::json!([{ "id": "2", "name": "gohan", "tax": "200" }])
    );
    assert_eq!(
        body["missing_in_source"],
        serde_json::json!([{ "id": "3", "name": "vegeta", "tax": "50" }])
    );
    assert_eq!(
        body["discrepancies"],
        serde_json::json!([{ "id": "1", "differences": { "tax": { "source": "100", "target": "999" } } }])
    );
}

#[tokio::test]
async fn test_csv_output_is_attachment() {
    let app = app();
    let response = upload(
        &app,
        &[("source_file", SOURCE), ("target_file", TARGET), ("output_format", "csv")],
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(content_type(&response).starts_with("text/csv"));
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert_eq!(disposition, "attachment; filename=\"reconciliation.csv\"");

    let body = body_text(response).await;
    assert!(body.starts_with("Section,Record\r\n"));
    assert!(body.contains("missing_in_target,\"{'id': '2', 'name': 'gohan', 'tax': '200'}\""));
    assert!(body.contains("discrepancy,"));
}

#[tokio::test]
async fn test_unknown_output_falls_back_to_json() {
    let app = app();
    let response = upload(
        &app,
        &[("source_file", SOURCE), ("target_file", TARGET), ("output_format", "xml")],
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(content_type(&response).starts_with("application/json"));
    assert_eq!(body_json(response).await["id"], "1");
}

#[tokio::test]
async fn test_missing_file_is_bad_request() {
    let app = app();
    let response = upload(&app, &[("source_file", SOURCE)]).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["status"], "error");
    assert!(body["error"].as_str().unwrap().contains("target_file"));

    // Nothing was stored.
    assert_eq!(body_json(get(&app, "/api/reconcile").await).await["meta"]["total"], 0);
}

#[tokio::test]
async fn test_empty_files_reconcile_cleanly() {
    let app = app();
    let response = upload(&app, &[("source_file", ""), ("target_file", "")]).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["discrepancies"], serde_json::json!([]));
}

#[tokio::test]
async fn test_unknown_report_is_not_found() {
    let app = app();
    let response = get(&app, "/api/reconcile/99").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["detail"], "Report not found.");

    upload(&app, &[("source_file", SOURCE), ("target_file", TARGET)]).await;
    assert_eq!(get(&app, "/api/reconcile/1").await.status(), StatusCode::OK);
    assert_eq!(get(&app, "/api/reconcile/01").await.status(), StatusCode::NOT_FOUND);
    assert_eq!(get(&app, "/api/reconcile/abc").await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_ids_are_sequential_and_listed() {
    let app = app();
    let first = body_json(upload(&app, &[("source_file", SOURCE), ("target_file", TARGET)]).await).await;
    let second = body_json(upload(&app, &[("source_file", SOURCE), ("target_file", SOURCE)]).await).await;
    assert_eq!(first["id"], "1");
    assert_eq!(second["id"], "2");

    let listing = body_json(get(&app, "/api/reconcile").await).await;
    assert_eq!(listing["meta"]["total"], 2);
    assert_eq!(listing["reports"][0]["id"], "1");
    assert_eq!(
        listing["reports"][0]["outcome"],
        "1 missing in target, 1 missing in source, 1 discrepancies"
    );
    assert_eq!(listing["reports"][1]["url"], "http://localhost:3000/api/reconcile/2?output=html");
}

#[tokio::test]
async fn test_stored_report_in_each_format() {
    let app = app();
    upload(&app, &[("source_file", SOURCE), ("target_file", TARGET)]).await;

    let json = get(&app, "/api/reconcile/1").await;
    assert!(content_type(&json).starts_with("application/json"));
    assert_eq!(body_json(json).await["discrepancies"][0]["id"], "1");

    let html = get(&app, "/api/reconcile/1?output=html").await;
    assert_eq!(html.status(), StatusCode::OK);
    assert!(content_type(&html).starts_with("text/html"));
    let page = body_text(html).await;
    assert!(page.starts_with("<!DOCTYPE html>"));
    assert!(page.contains("Discrepancies (1)"));

    let csv = get(&app, "/api/reconcile/1?output=csv").await;
    assert!(content_type(&csv).starts_with("text/csv"));
    assert!(body_text(csv).await.starts_with("Section,Record\r\n"));
}
