//! Bearer-token authentication: signature verification and the fail-open
//! request filter.

mod middleware;
mod verifier;

pub use middleware::{AuthnState, authn_middleware, extract_bearer_token};
pub use verifier::{BearerIdentity, TokenClaims, TokenError, TokenVerifier};
