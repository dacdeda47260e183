//! Identity token minting.

use chat_hub::auth::Claims;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};

/// HS256 secret shared by every fixture in this crate.
pub const TEST_JWT_SECRET: &str = "hub-test-secret-that-is-long-enough-for-hs256";

/// Builder for hub identity tokens.
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new().for_user("alice").expires_in(60).sign();
/// ```
pub struct TestTokenBuilder {
    sub: String,
    exp: i64,
    iat: i64,
    secret: String,
}

impl TestTokenBuilder {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            sub: "test-user".to_string(),
            exp: (now + Duration::seconds(3600)).timestamp(),
            iat: now.timestamp(),
            secret: TEST_JWT_SECRET.to_string(),
        }
    }

    /// Set the username carried in `sub`.
    pub fn for_user(mut self, username: &str) -> Self {
        self.sub = username.to_string();
        self
    }

    /// Set expiration in seconds from now. Negative values mint an expired token.
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self
    }

    pub fn issued_at(mut self, timestamp: i64) -> Self {
        self.iat = timestamp;
        self
    }

    /// Sign with a different secret, for forged-token tests.
    pub fn signed_with(mut self, secret: &str) -> Self {
        self.secret = secret.to_string();
        self
    }

    pub fn sign(self) -> String {
        let claims = Claims {
            sub: self.sub,
            exp: self.exp,
            iat: self.iat,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .expect("HS256 encoding cannot fail for these claims")
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Valid one-hour token for `username`.
pub fn mint_token(username: &str) -> String {
    TestTokenBuilder::new().for_user(username).sign()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_hub::auth::{IdentityValidator, JwtIdentityValidator};
    use common::secret::SecretString;

    fn validator() -> JwtIdentityValidator {
        JwtIdentityValidator::new(
            &SecretString::from(TEST_JWT_SECRET.to_string()),
            std::time::Duration::from_secs(300),
        )
    }

    #[tokio::test]
    async fn test_minted_token_validates() {
        let identity = validator().validate(&mint_token("alice")).await.unwrap();
        assert_eq!(identity.username, "alice");
    }

    #[tokio::test]
    async fn test_expired_and_forged_tokens_rejected() {
        let expired = TestTokenBuilder::new()
            .for_user("alice")
            .expires_in(-3600)
            .sign();
        assert!(validator().validate(&expired).await.is_err());

        let forged = TestTokenBuilder::new()
            .for_user("alice")
            .signed_with("some-other-secret-of-sufficient-length")
            .sign();
        assert!(validator().validate(&forged).await.is_err());
    }
}
