use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use thiserror::Error;

use crate::config::UpstreamConfig;
use crate::problem::Problem;

use super::rewrite::rewrite_path;

type HttpsClient = Client<hyper_rustls::HttpsConnector<HttpConnector>, Full<Bytes>>;

/// Failures originated by the forwarder itself.
///
/// Ordinary upstream 4xx/5xx responses are NOT errors; they are relayed
/// verbatim. These variants cover the cases where no upstream response
/// exists to relay, plus the gateway-side buffer-limit violations, which
/// fail distinctly from upstream errors.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("cannot build upstream request URI: {0}")]
    InvalidUri(String),

    #[error("failed to read request body: {0}")]
    RequestBody(String),

    #[error("request body exceeded the configured size limit")]
    RequestTooLarge,

    #[error("upstream unreachable: {0}")]
    Unreachable(String),

    #[error("upstream round trip exceeded {0:?}")]
    Timeout(Duration),

    #[error("failed to read upstream response body: {0}")]
    ResponseBody(String),

    #[error("upstream response exceeded the {limit}-byte buffer limit")]
    ResponseTooLarge { limit: usize },
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let (status, title) = match &self {
            Self::Unreachable(_) | Self::ResponseBody(_) => {
                (StatusCode::BAD_GATEWAY, "Bad Gateway")
            }
            Self::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "Gateway Timeout"),
            Self::ResponseTooLarge { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Upstream Response Too Large",
            ),
            Self::InvalidUri(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error"),
            Self::RequestBody(_) => (StatusCode::BAD_REQUEST, "Bad Request"),
            Self::RequestTooLarge => (StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large"),
        };
        Problem::new(status, title, self.to_string()).into_response()
    }
}

/// Relays requests under the configured external prefix to the upstream
/// service: rewrites the path, copies only the allow-listed headers,
/// buffers and forwards the body verbatim, and maps the upstream response
/// (success or error) back unchanged.
///
/// Shared immutable state; one instance serves all requests concurrently.
pub struct UpstreamForwarder {
    client: HttpsClient,
    base_url: String,
    route_prefix: String,
    upstream_prefix: String,
    timeout: Duration,
    max_response_bytes: usize,
}

impl UpstreamForwarder {
    /// Build the forwarder and its HTTP client from configuration.
    ///
    /// # Errors
    /// Returns an error when the base URL is not an absolute http(s) URI or
    /// the TLS root store cannot be loaded.
    pub fn from_config(cfg: &UpstreamConfig) -> Result<Self, anyhow::Error> {
        let base_url = cfg.base_url.trim_end_matches('/').to_owned();
        let parsed: Uri = base_url
            .parse()
            .map_err(|e| anyhow::anyhow!("upstream.base_url '{base_url}' is invalid: {e}"))?;
        if parsed.scheme_str() != Some("http") && parsed.scheme_str() != Some("https") {
            return Err(anyhow::anyhow!(
                "upstream.base_url must be an absolute http(s) URL, got '{base_url}'"
            ));
        }

        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()?
            .https_or_http()
            .enable_http1()
            .build();
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Ok(Self {
            client,
            base_url,
            route_prefix: cfg.route_prefix.clone(),
            upstream_prefix: cfg.upstream_prefix.clone(),
            timeout: Duration::from_secs(cfg.timeout_secs),
            max_response_bytes: cfg.max_response_bytes,
        })
    }

    /// Forward one request to the upstream and compose its response.
    ///
    /// At-most-once: no retries, no caching. Only the upstream round trip
    /// suspends; a timeout there maps to [`ProxyError::Timeout`] rather
    /// than an upstream error.
    ///
    /// # Errors
    /// See [`ProxyError`]; upstream HTTP error statuses are not errors.
    pub async fn forward(&self, req: Request) -> Result<Response, ProxyError> {
        let (parts, body) = req.into_parts();

        let rewritten = rewrite_path(&self.route_prefix, &self.upstream_prefix, parts.uri.path())
            .ok_or_else(|| ProxyError::InvalidUri(parts.uri.path().to_owned()))?;
        let target = match parts.uri.query() {
            Some(q) => format!("{}{}?{}", self.base_url, rewritten, q),
            None => format!("{}{}", self.base_url, rewritten),
        };
        let target: Uri = target
            .parse()
            .map_err(|e| ProxyError::InvalidUri(format!("{target}: {e}")))?;

        // Buffer the inbound body in full; the proxy is payload-shape
        // agnostic. The body-limit layer bounds the size, and without a
        // Content-Length header that bound surfaces here as a read error.
        let body_bytes = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) if is_length_limit(&e) => return Err(ProxyError::RequestTooLarge),
            Err(e) => return Err(ProxyError::RequestBody(e.to_string())),
        };

        let mut outbound = hyper::Request::builder()
            .method(parts.method.clone())
            .uri(target);
        // Narrow allow-list: nothing gateway-internal or hop-by-hop leaks
        // upstream.
        for name in [header::AUTHORIZATION, header::CONTENT_TYPE] {
            if let Some(value) = parts.headers.get(&name) {
                outbound = outbound.header(name.clone(), value.clone());
            }
        }
        let outbound = outbound
            .body(Full::new(body_bytes))
            .map_err(|e| ProxyError::InvalidUri(e.to_string()))?;

        tracing::debug!(
            method = %parts.method,
            path = %rewritten,
            "forwarding to upstream"
        );

        let upstream = tokio::time::timeout(self.timeout, self.client.request(outbound))
            .await
            .map_err(|_| ProxyError::Timeout(self.timeout))?
            .map_err(|e| ProxyError::Unreachable(e.to_string()))?;

        let status = upstream.status();
        let content_type = upstream.headers().get(header::CONTENT_TYPE).cloned();

        // Bounded buffering: a response beyond the cap is a gateway-side
        // limit violation, distinct from any upstream error.
        let limited = Limited::new(upstream.into_body(), self.max_response_bytes);
        let bytes = match limited.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) if e.is::<LengthLimitError>() => {
                return Err(ProxyError::ResponseTooLarge {
                    limit: self.max_response_bytes,
                });
            }
            Err(e) => return Err(ProxyError::ResponseBody(e.to_string())),
        };

        let mut response = Response::builder().status(status);
        if let Some(ct) = content_type {
            response = response.header(header::CONTENT_TYPE, ct);
        }
        response
            .body(Body::from(bytes))
            .map_err(|e| ProxyError::ResponseBody(e.to_string()))
    }
}

fn is_length_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(s) = source {
        if s.is::<LengthLimitError>() {
            return true;
        }
        source = s.source();
    }
    false
}

/// Axum handler wrapping [`UpstreamForwarder::forward`].
pub async fn proxy_handler(
    State(forwarder): State<Arc<UpstreamForwarder>>,
    req: Request,
) -> Response {
    match forwarder.forward(req).await {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(error = %err, "proxy forward failed");
            err.into_response()
        }
    }
}
