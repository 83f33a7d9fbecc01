#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Forwarding semantics against real localhost upstreams: path rewriting,
//! header filtering, verbatim relay of upstream responses, and the error
//! taxonomy for upstreams that misbehave.

mod common;

use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use axum::routing::{any, get, post};
use common::{
    body_json, body_string, echo_upstream, get as get_req, open_gateway_config, spawn_upstream,
};
use gateway::build_router;
use tower::ServiceExt;

#[tokio::test]
async fn path_is_rewritten_and_query_preserved() {
    let base = spawn_upstream(echo_upstream()).await;
    let router = build_router(&open_gateway_config(&base)).unwrap();

    let response = router
        .oneshot(get_req("/api/server/orders/?page=2&size=50"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let echoed = body_json(response).await;
    assert_eq!(echoed["path"], "/api/orders/");
    assert_eq!(echoed["query"], "page=2&size=50");
}

#[tokio::test]
async fn method_and_body_pass_through_verbatim() {
    let upstream = Router::new().route(
        "/api/orders/",
        post(|body: String| async move {
            (
                StatusCode::CREATED,
                [(header::CONTENT_TYPE, "application/json")],
                format!(r#"{{"received":{}}}"#, serde_json::to_string(&body).unwrap()),
            )
        }),
    );
    let base = spawn_upstream(upstream).await;
    let router = build_router(&open_gateway_config(&base)).unwrap();

    let payload = r#"{"sku":"X-42","qty":3}"#;
    let response = router
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/server/orders/")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();

    // Upstream status, content type, and body relay unchanged
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
        Some("application/json")
    );
    assert_eq!(body_json(response).await["received"], payload);
}

#[tokio::test]
async fn only_allow_listed_headers_are_forwarded() {
    let base = spawn_upstream(echo_upstream()).await;
    let router = build_router(&open_gateway_config(&base)).unwrap();

    let response = router
        .oneshot(
            Request::builder()
                .uri("/api/server/orders/")
                .header(header::CONTENT_TYPE, "application/json")
                .header("x-custom", "should-not-cross")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let echoed = body_json(response).await;
    assert_eq!(echoed["content_type"], "application/json");
    assert_eq!(echoed["x_custom"], serde_json::Value::Null);
}

#[tokio::test]
async fn upstream_error_responses_relay_verbatim() {
    let upstream = Router::new().route(
        "/api/orders/{id}",
        get(|| async {
            (
                StatusCode::NOT_FOUND,
                [(header::CONTENT_TYPE, "application/json")],
                r#"{"error":"order not found"}"#,
            )
        }),
    );
    let base = spawn_upstream(upstream).await;
    let router = build_router(&open_gateway_config(&base)).unwrap();

    let response = router.oneshot(get_req("/api/server/orders/99")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_string(response).await, r#"{"error":"order not found"}"#);
}

#[tokio::test]
async fn unreachable_upstream_maps_to_bad_gateway() {
    // Port 1 refuses connections
    let router = build_router(&open_gateway_config("http://127.0.0.1:1")).unwrap();

    let response = router.oneshot(get_req("/api/server/orders/")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
        Some("application/problem+json")
    );
}

#[tokio::test]
async fn slow_upstream_maps_to_gateway_timeout() {
    let upstream = Router::new().route(
        "/api/orders/",
        any(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            "too late"
        }),
    );
    let base = spawn_upstream(upstream).await;
    let mut cfg = open_gateway_config(&base);
    cfg.upstream.timeout_secs = 1;
    let router = build_router(&cfg).unwrap();

    let response = router.oneshot(get_req("/api/server/orders/")).await.unwrap();

    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
}

#[tokio::test]
async fn oversized_upstream_response_fails_distinctly() {
    let upstream = Router::new().route(
        "/api/orders/",
        any(|| async { "x".repeat(4096) }),
    );
    let base = spawn_upstream(upstream).await;
    let mut cfg = open_gateway_config(&base);
    cfg.upstream.max_response_bytes = 64;
    let router = build_router(&cfg).unwrap();

    let response = router.oneshot(get_req("/api/server/orders/")).await.unwrap();

    // Not a relayed upstream error and not a plain Bad Gateway: the
    // buffer-limit violation surfaces as its own failure
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let problem = body_json(response).await;
    assert_eq!(problem["title"], "Upstream Response Too Large");
}

#[tokio::test]
async fn forwarding_is_stateless_across_requests() {
    let base = spawn_upstream(echo_upstream()).await;
    let router = build_router(&open_gateway_config(&base)).unwrap();

    for _ in 0..2 {
        let response = router
            .clone()
            .oneshot(get_req("/api/server/orders/?page=1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["query"], "page=1");
    }
}

#[tokio::test]
async fn paths_outside_the_prefix_are_not_proxied() {
    let base = spawn_upstream(echo_upstream()).await;
    let router = build_router(&open_gateway_config(&base)).unwrap();

    let response = router.oneshot(get_req("/api/orders/")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
