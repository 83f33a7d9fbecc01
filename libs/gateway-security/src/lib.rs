//! Request-scoped security primitives for the gateway.
//!
//! The central type is [`AuthnContext`]: the per-request authentication
//! result produced by the bearer-token authenticator and consumed by the
//! authorization layer. It is an explicit value carried in request
//! extensions, never ambient global state.

mod context;

pub use context::{AuthnContext, AuthnContextBuilder};
