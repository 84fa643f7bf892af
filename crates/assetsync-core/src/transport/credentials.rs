//! Bearer credentials attached to every request.

use crate::error::Result;

/// Supplies the bearer token for a request. Called once per request, so
/// implementations may refresh tokens as they see fit.
pub trait CredentialProvider: Send + Sync {
    fn bearer_token(&self) -> Result<Option<String>>;
}

#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticToken(***)")
    }
}

impl CredentialProvider for StaticToken {
    fn bearer_token(&self) -> Result<Option<String>> {
        Ok(Some(self.0.clone()))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoCredentials;

impl CredentialProvider for NoCredentials {
    fn bearer_token(&self) -> Result<Option<String>> {
        Ok(None)
    }
}
