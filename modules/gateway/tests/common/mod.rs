#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

//! Shared helpers: a real localhost upstream, gateway configs, and token
//! signing for end-to-end requests driven through the router.

use axum::Router;
use axum::body::Body;
use axum::extract::Request;
use axum::http::header;
use axum::response::Response;
use gateway::auth::TokenClaims;
use gateway::config::{AuthConfig, CorsConfig, GatewayConfig, ServerConfig, UpstreamConfig};
use http_body_util::BodyExt;
use jsonwebtoken::{EncodingKey, Header, encode};
use secrecy::SecretString;
use serde_json::json;

pub const SECRET: &str = "integration-test-secret";

/// Bind an upstream service on an ephemeral port and serve it in the
/// background. Returns its base URL.
pub async fn spawn_upstream(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// An upstream that answers every `/api/...` request with a JSON echo of
/// what it received: method, path, query, and the forwarded headers.
pub fn echo_upstream() -> Router {
    async fn echo(req: Request) -> axum::Json<serde_json::Value> {
        axum::Json(json!({
            "method": req.method().as_str(),
            "path": req.uri().path(),
            "query": req.uri().query(),
            "authorization": req
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok()),
            "content_type": req
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
            "x_custom": req
                .headers()
                .get("x-custom")
                .and_then(|v| v.to_str().ok()),
        }))
    }

    Router::new()
        .route("/api", axum::routing::any(echo))
        .route("/api/{*rest}", axum::routing::any(echo))
}

/// Gateway config pointing at `base_url`, protected by default.
pub fn gateway_config(base_url: &str) -> GatewayConfig {
    GatewayConfig {
        server: ServerConfig::default(),
        auth: AuthConfig {
            secret: SecretString::from(SECRET),
            require_auth_by_default: true,
            public_routes: vec![],
            authority_routes: vec![],
        },
        cors: CorsConfig::default(),
        upstream: UpstreamConfig {
            base_url: base_url.to_owned(),
            ..UpstreamConfig::default()
        },
    }
}

/// Same, but with no default authentication requirement.
pub fn open_gateway_config(base_url: &str) -> GatewayConfig {
    let mut cfg = gateway_config(base_url);
    cfg.auth.require_auth_by_default = false;
    cfg
}

pub fn sign_token(sub: &str, role: Option<&str>, exp: Option<u64>) -> String {
    let claims = TokenClaims {
        sub: sub.to_owned(),
        role: role.map(ToOwned::to_owned),
        exp,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_string(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn get_with_token(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}
