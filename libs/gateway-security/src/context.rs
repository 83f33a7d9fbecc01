/// `AuthnContext` is the per-request authentication result.
///
/// Built once by the authenticator middleware at the start of request
/// handling and owned by the request's lifetime. A context is either
/// authenticated (subject and authority both present) or anonymous,
/// in which case downstream authorization must treat the caller as such.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AuthnContext {
    /// Subject: the identity string (username) the token was issued for.
    subject: Option<String>,
    /// Single role-derived authority, normalized to lowercase.
    authority: Option<String>,
}

impl AuthnContext {
    /// Create a new `AuthnContext` builder.
    #[must_use]
    pub fn builder() -> AuthnContextBuilder {
        AuthnContextBuilder::default()
    }

    /// Create an anonymous `AuthnContext` with no subject or authority.
    #[must_use]
    pub fn anonymous() -> Self {
        AuthnContextBuilder::default().build()
    }

    /// Whether the caller was authenticated.
    ///
    /// Invariant: a context is authenticated only when both the subject and
    /// the role-derived authority are present.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.subject.is_some() && self.authority.is_some()
    }

    /// Get the subject the token was issued for, if authenticated.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    /// Get the normalized authority, if authenticated.
    #[must_use]
    pub fn authority(&self) -> Option<&str> {
        self.authority.as_deref()
    }

    /// Whether the context holds the given authority.
    #[must_use]
    pub fn has_authority(&self, authority: &str) -> bool {
        self.authority.as_deref() == Some(authority)
    }
}

#[derive(Default)]
pub struct AuthnContextBuilder {
    subject: Option<String>,
    authority: Option<String>,
}

impl AuthnContextBuilder {
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    #[must_use]
    pub fn authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = Some(authority.into());
        self
    }

    #[must_use]
    pub fn build(self) -> AuthnContext {
        AuthnContext {
            subject: self.subject,
            authority: self.authority,
        }
    }
}
