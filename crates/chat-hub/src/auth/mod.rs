//! Identity validation.
//!
//! Token issuance happens elsewhere; the hub only turns a presented token
//! into an [`Identity`] or rejects it.

pub mod claims;
pub mod jwt;

pub use claims::Claims;
pub use jwt::JwtIdentityValidator;

use crate::errors::HubError;
use async_trait::async_trait;

/// A validated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
}

#[async_trait]
pub trait IdentityValidator: Send + Sync {
    /// Validate `token`. Failures are `HubError::InvalidToken`.
    async fn validate(&self, token: &str) -> Result<Identity, HubError>;
}

/// Mock identity validators for testing.
pub mod mock {
    use super::*;
    use std::collections::HashMap;

    /// Accepts a fixed set of tokens.
    #[derive(Debug, Default, Clone)]
    pub struct StaticIdentityValidator {
        tokens: HashMap<String, String>,
    }

    impl StaticIdentityValidator {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Accept `token` as `username`.
        #[must_use]
        pub fn with_token(mut self, token: &str, username: &str) -> Self {
            self.tokens.insert(token.to_string(), username.to_string());
            self
        }
    }

    #[async_trait]
    impl IdentityValidator for StaticIdentityValidator {
        async fn validate(&self, token: &str) -> Result<Identity, HubError> {
            self.tokens
                .get(token)
                .map(|username| Identity {
                    username: username.clone(),
                })
                .ok_or_else(|| HubError::InvalidToken("unknown token".to_string()))
        }
    }
}
