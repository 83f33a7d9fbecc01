use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, Method, header};
use axum::middleware::Next;
use axum::response::Response;
use gateway_security::AuthnContext;

use super::verifier::{TokenError, TokenVerifier};

/// Shared state for the authentication middleware.
#[derive(Clone)]
pub struct AuthnState {
    pub verifier: Arc<TokenVerifier>,
}

/// Fail-open bearer-token authenticator.
///
/// Runs once per request, before any authorization decision:
/// 1. Pre-flight (OPTIONS) requests pass through untouched
/// 2. Missing `Authorization` header or a non-Bearer scheme → anonymous
///    context, request forwarded (the designed path for public routes)
/// 3. A verified token with a role claim → authenticated context bound to
///    (subject, normalized role)
/// 4. Any verification failure → anonymous context, request forwarded
///
/// This filter never rejects; converting "anonymous" into 401/403 is the
/// authorization layer's job.
pub async fn authn_middleware(
    State(state): State<AuthnState>,
    mut req: Request,
    next: Next,
) -> Response {
    if req.method() == Method::OPTIONS {
        return next.run(req).await;
    }

    let Some(token) = extract_bearer_token(req.headers()) else {
        req.extensions_mut().insert(AuthnContext::anonymous());
        return next.run(req).await;
    };

    let ctx = match state.verifier.verify(token) {
        Ok(identity) => {
            tracing::debug!(subject = %identity.subject, authority = %identity.authority, "bearer token verified");
            AuthnContext::builder()
                .subject(identity.subject)
                .authority(identity.authority)
                .build()
        }
        Err(err) => {
            // Deliberate fail-open: the request proceeds anonymous and the
            // route policy decides whether that is acceptable. The raw token
            // value is never logged.
            log_token_error(&err);
            AuthnContext::anonymous()
        }
    };

    req.extensions_mut().insert(ctx);
    next.run(req).await
}

fn log_token_error(err: &TokenError) {
    match err {
        TokenError::Expired => tracing::debug!("bearer token expired; proceeding anonymous"),
        TokenError::BadSignature => {
            tracing::debug!("bearer token signature rejected; proceeding anonymous");
        }
        TokenError::MissingRole => {
            tracing::debug!("bearer token has no role claim; proceeding anonymous");
        }
        TokenError::Malformed(msg) => {
            tracing::debug!(reason = %msg, "malformed bearer token; proceeding anonymous");
        }
    }
}

/// Extract the raw token from an `Authorization: Bearer <token>` header.
#[must_use]
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
}
