//! CORS layer construction from configuration.
//!
//! The browser SPA sends credentials (the bearer token) cross-origin, so
//! the default configuration names its origins explicitly and allows
//! credentials; a wildcard origin is only legal with credentials disabled.

use std::time::Duration;

use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};

use crate::config::CorsConfig;

/// Build a [`CorsLayer`] from configuration.
///
/// # Errors
/// Returns an error on an unparsable origin/method/header name, or when a
/// wildcard origin is combined with `allow_credentials` (the browser
/// rejects that combination, so it is refused at startup instead).
pub fn build_cors_layer(cfg: &CorsConfig) -> Result<CorsLayer, anyhow::Error> {
    let any_origin = cfg.allowed_origins.iter().any(|o| o == "*");
    if any_origin && cfg.allow_credentials {
        return Err(anyhow::anyhow!(
            "cors: wildcard origin cannot be combined with allow_credentials"
        ));
    }

    let origin = if any_origin {
        AllowOrigin::any()
    } else {
        let origins = cfg
            .allowed_origins
            .iter()
            .map(|o| {
                o.parse::<HeaderValue>()
                    .map_err(|e| anyhow::anyhow!("cors: bad origin '{o}': {e}"))
            })
            .collect::<Result<Vec<_>, _>>()?;
        AllowOrigin::list(origins)
    };

    let methods = cfg
        .allowed_methods
        .iter()
        .map(|m| {
            Method::from_bytes(m.to_uppercase().as_bytes())
                .map_err(|e| anyhow::anyhow!("cors: bad method '{m}': {e}"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let headers = if cfg.allowed_headers.iter().any(|h| h == "*") {
        // `*` is not a valid Allow-Headers value alongside credentials;
        // mirroring the preflight's requested headers is the equivalent.
        if cfg.allow_credentials {
            AllowHeaders::mirror_request()
        } else {
            AllowHeaders::any()
        }
    } else {
        let names = cfg
            .allowed_headers
            .iter()
            .map(|h| {
                h.parse::<HeaderName>()
                    .map_err(|e| anyhow::anyhow!("cors: bad header '{h}': {e}"))
            })
            .collect::<Result<Vec<_>, _>>()?;
        AllowHeaders::list(names)
    };

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(methods)
        .allow_headers(headers)
        .allow_credentials(cfg.allow_credentials)
        .max_age(Duration::from_secs(cfg.max_age_seconds)))
}
