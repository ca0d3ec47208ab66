use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use reqwest::StatusCode as UpstreamStatus;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

use super::ScriptedTransport;
use crate::metadata::{Resolver, RetryPolicy};

fn app(script: Vec<Result<UpstreamStatus, crate::metadata::types::TransportError>>, body: &str) -> axum::Router {
    let resolver = Resolver::with_transport(
        ScriptedTransport::new(script).with_body(body),
        RetryPolicy::default(),
    );
    crate::web::router(Arc::new(resolver))
}

fn post_json(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/metadata")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_success_response_shape() {
    let response = app(
        vec![Ok(UpstreamStatus::OK)],
        r#"<title>Example Domain</title>"#,
    )
    .oneshot(post_json(r#"{"url":"example.com"}"#))
    .await
    .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["title"], "Example Domain");
    assert!(json["description"].is_null());
    assert_eq!(json["icon"], "https://example.com/favicon.ico");
    assert_eq!(json["isFallback"], false);
    assert_eq!(json["normalizedUrl"], "https://example.com");
}

#[tokio::test]
async fn test_empty_url_is_bad_request() {
    for body in [r#"{"url":""}"#, r#"{}"#, r#"{"url":"   "}"#] {
        let response = app(vec![], "").oneshot(post_json(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {body}");
        let json = body_json(response).await;
        assert_eq!(json, serde_json::json!({"error": "URL is required"}));
    }
}

#[tokio::test]
async fn test_invalid_url_is_bad_request() {
    let response = app(vec![], "")
        .oneshot(post_json(r#"{"url":"badurl!!!"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Invalid URL format");
    assert_eq!(json["normalizedUrl"], "https://badurl!!!.com");
}

#[tokio::test]
async fn test_blocked_upstream_still_succeeds() {
    let response = app(vec![Ok(UpstreamStatus::FORBIDDEN)], "")
        .oneshot(post_json(r#"{"url":"https://www.example.com"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["isFallback"], true);
    assert_eq!(json["title"], "Example");
    assert!(json["description"].is_null());
}

#[tokio::test]
async fn test_undecodable_body_is_internal_error() {
    let response = app(vec![], "")
        .oneshot(post_json(r#"{"url": 42}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json, serde_json::json!({"error": "Failed to fetch metadata"}));
}
