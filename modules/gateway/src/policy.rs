//! Route authorization policy.
//!
//! This is the layer that turns an anonymous request into a 401/403 on
//! protected routes. The authenticator upstream of it never rejects, so a
//! caller with a missing or bad token sees exactly the rejection a
//! protected route would give any anonymous caller.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use gateway_security::AuthnContext;

use crate::config::AuthConfig;
use crate::problem::Problem;

/// Route matcher for a specific HTTP method.
#[derive(Clone)]
struct RouteMatcher<T> {
    matcher: matchit::Router<T>,
}

impl<T> RouteMatcher<T> {
    fn new() -> Self {
        Self {
            matcher: matchit::Router::new(),
        }
    }

    fn insert(&mut self, path: &str, value: T) -> Result<(), matchit::InsertError> {
        self.matcher.insert(path, value)
    }

    fn find(&self, path: &str) -> Option<&T> {
        self.matcher.at(path).ok().map(|m| m.value)
    }
}

/// What a route demands of the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthRequirement {
    /// No authentication required (public route).
    None,
    /// Any authenticated caller passes.
    Authenticated,
    /// Caller must hold this authority.
    Authority(String),
}

/// Resolves the authorization requirement for a given (method, path).
#[derive(Clone)]
pub struct RoutePolicy {
    public_matchers: Arc<HashMap<Method, RouteMatcher<()>>>,
    authority_matchers: Arc<HashMap<Method, RouteMatcher<String>>>,
    require_auth_by_default: bool,
}

impl RoutePolicy {
    /// Build the policy from configuration. Patterns use matchit syntax
    /// (`{param}`, `{*rest}`).
    ///
    /// # Errors
    /// Returns an error on an unparsable method name or route pattern.
    pub fn from_config(cfg: &AuthConfig) -> Result<Self, anyhow::Error> {
        let mut public_matchers: HashMap<Method, RouteMatcher<()>> = HashMap::new();
        for rule in &cfg.public_routes {
            let method = parse_method(&rule.method)?;
            public_matchers
                .entry(method)
                .or_insert_with(RouteMatcher::new)
                .insert(&rule.path, ())
                .map_err(|e| anyhow::anyhow!("bad public route pattern '{}': {e}", rule.path))?;
        }

        let mut authority_matchers: HashMap<Method, RouteMatcher<String>> = HashMap::new();
        for rule in &cfg.authority_routes {
            let method = parse_method(&rule.method)?;
            let authority = rule.authority.trim().to_lowercase();
            authority_matchers
                .entry(method)
                .or_insert_with(RouteMatcher::new)
                .insert(&rule.path, authority)
                .map_err(|e| anyhow::anyhow!("bad authority route pattern '{}': {e}", rule.path))?;
        }

        Ok(Self {
            public_matchers: Arc::new(public_matchers),
            authority_matchers: Arc::new(authority_matchers),
            require_auth_by_default: cfg.require_auth_by_default,
        })
    }

    /// Resolve the requirement for a (method, path).
    ///
    /// Pre-flight OPTIONS requests are always public; explicit public rules
    /// beat the authenticated-by-default fallback; authority rules beat
    /// plain authentication.
    #[must_use]
    pub fn resolve(&self, method: &Method, path: &str) -> AuthRequirement {
        if method == Method::OPTIONS {
            return AuthRequirement::None;
        }

        if self
            .public_matchers
            .get(method)
            .is_some_and(|m| m.find(path).is_some())
        {
            return AuthRequirement::None;
        }

        if let Some(authority) = self
            .authority_matchers
            .get(method)
            .and_then(|m| m.find(path))
        {
            return AuthRequirement::Authority(authority.clone());
        }

        if self.require_auth_by_default {
            AuthRequirement::Authenticated
        } else {
            AuthRequirement::None
        }
    }
}

fn parse_method(name: &str) -> Result<Method, anyhow::Error> {
    Method::from_bytes(name.to_uppercase().as_bytes())
        .map_err(|e| anyhow::anyhow!("bad HTTP method '{name}': {e}"))
}

/// Shared state for the authorization middleware.
#[derive(Clone)]
pub struct AuthzState {
    pub policy: RoutePolicy,
}

/// Authorization middleware: enforces the route policy against the
/// `AuthnContext` the authenticator placed in request extensions.
pub async fn authz_middleware(
    State(state): State<AuthzState>,
    req: Request,
    next: Next,
) -> Response {
    let requirement = state.policy.resolve(req.method(), req.uri().path());

    if requirement == AuthRequirement::None {
        return next.run(req).await;
    }

    let ctx = req
        .extensions()
        .get::<AuthnContext>()
        .cloned()
        .unwrap_or_else(AuthnContext::anonymous);

    if !ctx.is_authenticated() {
        tracing::debug!(path = %req.uri().path(), "rejecting anonymous request to protected route");
        return Problem::new(
            StatusCode::UNAUTHORIZED,
            "Unauthorized",
            "Authentication required",
        )
        .into_response();
    }

    if let AuthRequirement::Authority(required) = requirement {
        if !ctx.has_authority(&required) {
            tracing::debug!(
                path = %req.uri().path(),
                required = %required,
                "rejecting caller lacking required authority"
            );
            return Problem::new(
                StatusCode::FORBIDDEN,
                "Forbidden",
                "Insufficient authority",
            )
            .into_response();
        }
    }

    next.run(req).await
}
