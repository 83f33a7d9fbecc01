//! Gateway core: stateless bearer-token authentication in front of a
//! transparent reverse proxy.
//!
//! Every inbound request passes the authenticator first
//! ([`auth::authn_middleware`], fail-open), then the route policy
//! ([`policy::authz_middleware`], which is the only layer that rejects),
//! and requests under the configured prefix are relayed to the upstream
//! REST service by [`proxy::UpstreamForwarder`].

pub mod auth;
pub mod config;
pub mod cors;
pub mod policy;
pub mod problem;
pub mod proxy;
pub mod server;

pub use config::GatewayConfig;
pub use server::{build_router, serve};
