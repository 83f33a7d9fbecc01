//! Router construction and HTTP serving.
//!
//! The middleware chain is composed here explicitly, in one place, so the
//! pass-through vs short-circuit contract of every layer is visible at a
//! glance instead of being implied by framework registration order.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::middleware::from_fn_with_state;
use axum::routing::{any, get};
use axum::{Json, Router};
use tokio_util::sync::CancellationToken;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{AuthnState, TokenVerifier, authn_middleware};
use crate::config::GatewayConfig;
use crate::cors::build_cors_layer;
use crate::policy::{AuthzState, RoutePolicy, authz_middleware};
use crate::proxy::{UpstreamForwarder, proxy_handler};

/// Build the complete gateway router from configuration.
///
/// # Errors
/// Returns an error when the route policy, CORS layer, or upstream client
/// cannot be built from the configuration.
pub fn build_router(config: &GatewayConfig) -> Result<Router> {
    let verifier = Arc::new(TokenVerifier::new(&config.auth.secret));
    let policy = RoutePolicy::from_config(&config.auth)?;
    let forwarder = Arc::new(UpstreamForwarder::from_config(&config.upstream)?);

    // `Router::layer` behaves like Tower layers: the **last** added layer is
    // the **outermost** one and runs **first** on the request path.
    //
    // Desired request execution order (outermost -> innermost):
    // SetRequestId -> PropagateRequestId -> Trace -> Timeout -> BodyLimit
    // -> CORS -> Authn (fail-open) -> Authz (route policy) -> Router
    //
    // Therefore layers are added in the reverse order below.

    let prefix = config.upstream.route_prefix.trim_end_matches('/').to_owned();
    let proxied = Router::new()
        .route(&prefix, any(proxy_handler))
        .route(&format!("{prefix}/{{*rest}}"), any(proxy_handler))
        .with_state(forwarder)
        // 7) Authorization: the only layer that rejects (401/403)
        .layer(from_fn_with_state(AuthzState { policy }, authz_middleware))
        // 6) Authentication: fail-open, attaches AuthnContext, never rejects
        .layer(from_fn_with_state(
            AuthnState { verifier },
            authn_middleware,
        ));

    // Health endpoints are merged outside the auth layers so liveness
    // probes never need a token.
    let mut router = Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(|| async { "ok" }))
        .merge(proxied);

    // 5) CORS (outer to auth so OPTIONS preflight short-circuits)
    if config.cors.enabled {
        router = router.layer(build_cors_layer(&config.cors)?);
    }

    // 4) Request body limit
    router = router.layer(RequestBodyLimitLayer::new(config.server.body_limit_bytes));
    router = router.layer(DefaultBodyLimit::max(config.server.body_limit_bytes));

    // 3) Whole-request timeout
    router = router.layer(TimeoutLayer::with_status_code(
        StatusCode::GATEWAY_TIMEOUT,
        Duration::from_secs(config.server.request_timeout_secs),
    ));

    // 2) Trace span per request, correlated by request id
    router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(|req: &axum::http::Request<axum::body::Body>| {
                let request_id = req
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("n/a");
                tracing::info_span!(
                    "http_request",
                    method = %req.method(),
                    uri = %req.uri().path(),
                    request_id = %request_id,
                    status = tracing::field::Empty,
                    latency_ms = tracing::field::Empty,
                )
            })
            .on_response(
                |res: &axum::http::Response<axum::body::Body>,
                 latency: Duration,
                 span: &tracing::Span| {
                    span.record("status", res.status().as_u16());
                    span.record("latency_ms", latency.as_millis());
                },
            ),
    );

    // 1) Request id: generate when missing, then echo on the response
    router = router.layer(PropagateRequestIdLayer::x_request_id());
    router = router.layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

    Ok(router)
}

/// Background HTTP server: bind, log, serve until cancelled.
///
/// # Errors
/// Returns an error when the bind address is invalid, binding fails, or
/// the server loop terminates abnormally.
pub async fn serve(config: &GatewayConfig, router: Router, cancel: CancellationToken) -> Result<()> {
    let addr: SocketAddr = config
        .server
        .bind_addr
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid bind address '{}': {e}", config.server.bind_addr))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("HTTP server bound on {addr}");

    let shutdown = {
        let cancel = cancel.clone();
        async move {
            cancel.cancelled().await;
            tracing::info!("HTTP server shutting down gracefully (cancellation)");
        }
    };

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| anyhow::anyhow!(e))
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
