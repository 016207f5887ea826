//! Session-scoped bearer token

use std::fmt;

use crate::error::{Error, Result};

/// Bearer token for remote inference. Held in memory for one session only;
/// `Debug` and `Display` never show the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a token, rejecting blank input
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into().trim().to_string();
        if token.is_empty() {
            return Err(Error::CredentialRequired);
        }
        Ok(Self(token))
    }

    /// Parse an `Authorization: Bearer <token>` header value
    pub fn from_authorization(header: &str) -> Result<Self> {
        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .ok_or_else(|| {
                Error::Authentication("Authorization header must use the Bearer scheme".to_string())
            })?;
        Self::new(token)
    }

    /// Raw token for request headers
    pub(crate) fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Bearer(***)")
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Bearer(***)")
    }
}
