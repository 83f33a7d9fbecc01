//! Transparent reverse proxy for the upstream REST service.

mod forwarder;
mod rewrite;

pub use forwarder::{ProxyError, UpstreamForwarder, proxy_handler};
pub use rewrite::rewrite_path;
