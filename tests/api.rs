mod common;

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use tower::ServiceExt;

use common::*;
use govex::api::{create_router, AppState};
use govex::domain::Regime;

async fn app(token: Option<&str>) -> axum::Router {
    let mut config = test_config();
    config.server.api_token = token.map(str::to_string);
    let h = harness(
        config,
        healthy_history(),
        ScriptedBroker::paper(),
        vec![long("EUR_USD", Regime::Trending)],
        london_open(),
    )
    .await;
    create_router(AppState::new(Arc::new(h.engine)))
}

fn execute(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/execute")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_environment() {
    let response = app(None)
        .await
        .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["environment"], "paper");
}

#[tokio::test]
async fn execute_runs_a_tick() {
    let response = app(None).await.oneshot(execute("")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json(response).await;
    assert!(body["tick_id"].is_string());
    assert_eq!(body["governance"]["state"], "NORMAL");
    assert_eq!(body["candidates"][0]["status"], "filled");
}

#[tokio::test]
async fn short_direction_is_a_bad_request() {
    let response = app(None)
        .await
        .oneshot(execute(r#"{"direction": "short"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app(None).await.oneshot(execute("{not json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn configured_token_is_required() {
    let response = app(Some("s3cret")).await.oneshot(execute("")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let mut request = execute("");
    request
        .headers_mut()
        .insert(header::AUTHORIZATION, "Bearer wrong".parse().unwrap());
    let response = app(Some("s3cret")).await.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let mut request = execute("");
    request
        .headers_mut()
        .insert(header::AUTHORIZATION, "Bearer s3cret".parse().unwrap());
    let response = app(Some("s3cret")).await.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
