use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Claim set carried by a gateway bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Registered subject claim, the username the token was issued for.
    pub sub: String,
    /// Custom role claim, conventionally "admin" or "user". Free-form;
    /// the verifier normalizes it (trim + lowercase).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Expiry (seconds since epoch). Optional; validated when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
}

/// A successfully verified identity: (subject, normalized authority).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerIdentity {
    pub subject: String,
    pub authority: String,
}

/// Why a presented token did not yield an identity.
///
/// Every variant degrades to anonymous at the filter layer; the enum exists
/// so that "invalid token" is a representable value rather than a swallowed
/// exception, and so logs can tell an expired token from a forged one.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("signature verification failed")]
    BadSignature,

    #[error("token expired")]
    Expired,

    #[error("token carries no role claim")]
    MissingRole,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::BadSignature,
            _ => Self::Malformed(err.to_string()),
        }
    }
}

/// Stateless HMAC-SHA256 token verifier.
///
/// Holds the symmetric key derived from the shared signing secret; safe to
/// share across concurrent requests, no interior mutability.
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    #[must_use]
    pub fn new(secret: &SecretString) -> Self {
        let key = DecodingKey::from_secret(secret.expose_secret().as_bytes());
        let mut validation = Validation::new(Algorithm::HS256);
        // `exp` stays optional: tokens without it verify on signature alone,
        // tokens with it are rejected once past expiry.
        validation.required_spec_claims.clear();
        Self { key, validation }
    }

    /// Verify a raw token (the part after `"Bearer "`) and extract the
    /// identity it asserts.
    ///
    /// # Errors
    /// Returns a [`TokenError`] when the signature does not verify, the
    /// claims cannot be parsed, the token is expired, or no role claim is
    /// present.
    pub fn verify(&self, raw: &str) -> Result<BearerIdentity, TokenError> {
        let data = decode::<TokenClaims>(raw, &self.key, &self.validation)?;

        let Some(role) = data.claims.role else {
            return Err(TokenError::MissingRole);
        };
        let authority = role.trim().to_lowercase();
        if authority.is_empty() {
            return Err(TokenError::MissingRole);
        }

        Ok(BearerIdentity {
            subject: data.claims.sub,
            authority,
        })
    }
}
