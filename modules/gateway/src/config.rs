use secrecy::SecretString;
use serde::{Deserialize, Serialize};

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_owned()
}

fn default_body_limit_bytes() -> usize {
    16 * 1024 * 1024
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_require_auth_by_default() -> bool {
    true
}

fn default_route_prefix() -> String {
    "/api/server".to_owned()
}

fn default_upstream_prefix() -> String {
    "/api".to_owned()
}

fn default_upstream_timeout_secs() -> u64 {
    30
}

fn default_max_response_bytes() -> usize {
    16 * 1024 * 1024
}

/// Top-level gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    pub upstream: UpstreamConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Global request body size limit in bytes
    pub body_limit_bytes: usize,
    /// Whole-request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            body_limit_bytes: default_body_limit_bytes(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Authentication and authorization configuration.
///
/// The signing secret is process-wide immutable configuration, shared
/// read-only across concurrent requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Shared HMAC signing secret. Redacted in `Debug` output.
    #[serde(serialize_with = "redact_secret")]
    pub secret: SecretString,
    /// If true, routes without an explicit rule require authentication.
    #[serde(default = "default_require_auth_by_default")]
    pub require_auth_by_default: bool,
    /// Routes that bypass authorization entirely (login and friends).
    #[serde(default)]
    pub public_routes: Vec<RouteRule>,
    /// Routes that additionally require a specific authority.
    #[serde(default)]
    pub authority_routes: Vec<AuthorityRule>,
}

fn redact_secret<S: serde::Serializer>(_: &SecretString, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str("[REDACTED]")
}

/// A (method, path pattern) pair. Patterns use matchit syntax, e.g.
/// `/api/server/users/{id}` or `/api/server/catalog/{*rest}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RouteRule {
    pub method: String,
    pub path: String,
}

/// A route rule that also names the authority required to pass it.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuthorityRule {
    pub method: String,
    pub path: String,
    pub authority: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct CorsConfig {
    pub enabled: bool,
    /// Allowed origins: `["*"]` means any (incompatible with credentials)
    pub allowed_origins: Vec<String>,
    /// Allowed HTTP methods, e.g. `["GET","POST","OPTIONS","PUT","DELETE"]`
    pub allowed_methods: Vec<String>,
    /// Allowed request headers; `["*"]` means any
    pub allowed_headers: Vec<String>,
    /// Whether to allow credentials; required for the bearer-token
    /// pattern to work from a browser SPA
    pub allow_credentials: bool,
    /// Max age for preflight caching in seconds
    pub max_age_seconds: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_origins: vec!["http://localhost:5173".to_owned()],
            allowed_methods: vec![
                "GET".to_owned(),
                "POST".to_owned(),
                "PUT".to_owned(),
                "DELETE".to_owned(),
                "OPTIONS".to_owned(),
            ],
            allowed_headers: vec!["*".to_owned()],
            allow_credentials: true,
            max_age_seconds: 600,
        }
    }
}

/// Upstream service the proxy forwards to.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamConfig {
    /// Base address of the upstream service, scheme and authority only,
    /// e.g. `http://127.0.0.1:8000`.
    pub base_url: String,
    /// External path prefix the gateway exposes.
    #[serde(default = "default_route_prefix")]
    pub route_prefix: String,
    /// Upstream base path the external prefix is rewritten to.
    #[serde(default = "default_upstream_prefix")]
    pub upstream_prefix: String,
    /// Upstream round-trip timeout in seconds.
    #[serde(default = "default_upstream_timeout_secs")]
    pub timeout_secs: u64,
    /// Maximum in-memory size for a buffered upstream response body.
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            route_prefix: default_route_prefix(),
            upstream_prefix: default_upstream_prefix(),
            timeout_secs: default_upstream_timeout_secs(),
            max_response_bytes: default_max_response_bytes(),
        }
    }
}
