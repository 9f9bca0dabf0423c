//! Management API end to end, driven through the router without a socket.

mod common;

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header::AUTHORIZATION, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use common::Fixture;
use lb_config_store::admin::{handlers::VERSION_HEADER, setup_admin_router, AppState};
use lb_config_store::config::AdminConfig;

const KEY: &str = "test-key";

fn app(fx: &Fixture) -> Router {
    let state = AppState::new(Arc::new(fx.open()), KEY);
    setup_admin_router(state, &AdminConfig::default())
}

fn request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {}", KEY));
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn version_of(response: &Response) -> i64 {
    response
        .headers()
        .get(VERSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .expect("configuration-version header")
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_requires_bearer_token() {
    let fx = Fixture::new(1);
    let app = app(&fx);

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/v1/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/v1/status")
                .header(AUTHORIZATION, "Bearer wrong")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_status_reports_version() {
    let fx = Fixture::new(4);
    let response = app(&fx).oneshot(request("GET", "/v1/status", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["configuration_version"], 4);
    assert_eq!(body["open_transactions"], 0);
}

#[tokio::test]
async fn test_transaction_flow_and_stale_write() {
    let fx = Fixture::new(5);
    let app = app(&fx);

    let response = app
        .clone()
        .oneshot(request("POST", "/v1/transactions?version=5", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(version_of(&response), 5);
    let txn = json_body(response).await;
    let id = txn["id"].as_str().unwrap().to_string();
    assert_eq!(txn["_version"], 5);
    assert_eq!(txn["status"], "in_progress");

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/v1/sections/backend?transaction_id={}", id),
            Some(json!({ "name": "app1", "directives": [{ "keyword": "balance", "value": "roundrobin" }] })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(request("PUT", &format!("/v1/transactions/{}", id), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(version_of(&response), 6);

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/v1/sections/backend?version=5",
            Some(json!({ "name": "app1" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = json_body(response).await;
    assert_eq!(body["code"], "version_mismatch");

    let response = app
        .oneshot(request("GET", "/v1/sections/backend/app1", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(version_of(&response), 6);
    let section = json_body(response).await;
    assert_eq!(section["directives"][0]["value"], "roundrobin");
}

#[tokio::test]
async fn test_server_crud_with_implicit_transactions() {
    let fx = Fixture::new(1);
    let app = app(&fx);

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/v1/backends/web/servers?version=1",
            Some(json!({ "name": "web2", "address": "10.0.0.2:8080", "params": ["check"] })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(version_of(&response), 2);

    let response = app
        .clone()
        .oneshot(request("GET", "/v1/backends/web/servers", None))
        .await
        .unwrap();
    let servers = json_body(response).await;
    assert_eq!(servers.as_array().unwrap().len(), 2);

    let response = app
        .clone()
        .oneshot(request("DELETE", "/v1/backends/web/servers/web1?version=2", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(version_of(&response), 3);

    let response = app
        .oneshot(request("GET", "/v1/backends/web/servers/web1", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(fx.live_text().contains("server web2 10.0.0.2:8080 check"));
}

#[tokio::test]
async fn test_raw_and_discard() {
    let fx = Fixture::new(1);
    let app = app(&fx);

    let response = app.clone().oneshot(request("GET", "/v1/raw", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(version_of(&response), 1);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], common::SAMPLE.as_bytes());

    let response = app
        .clone()
        .oneshot(request("POST", "/v1/transactions?id=cleanup", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(request("DELETE", "/v1/transactions/cleanup", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    let response = app
        .oneshot(request("PUT", "/v1/transactions/cleanup", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(fx.staged_files().is_empty());
}

#[tokio::test]
async fn test_write_without_target_is_rejected() {
    let fx = Fixture::new(1);
    let response = app(&fx)
        .oneshot(request("POST", "/v1/sections/backend", Some(json!({ "name": "x" }))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(fx.live_text().lines().next(), Some("# _version=1"));
}

#[tokio::test]
async fn test_read_and_write_methods_share_paths() {
    let fx = Fixture::new(1);
    let app = app(&fx);

    let response = app
        .clone()
        .oneshot(request("POST", "/v1/transactions?id=shared", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(request("GET", "/v1/transactions/shared", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(request("PUT", "/v1/transactions/shared", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(version_of(&response), 2);

    let response = app
        .clone()
        .oneshot(request("GET", "/v1/transactions/shared", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(request("PATCH", "/v1/transactions/shared", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
