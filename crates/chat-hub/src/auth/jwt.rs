//! HS256 identity token validation.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing
//! - Only HS256 is accepted
//! - `exp` is required; `iat` is checked with clock skew tolerance
//! - Every failure maps to the same generic message

use super::claims::Claims;
use super::{Identity, IdentityValidator};
use crate::errors::HubError;
use crate::protocol::inbound::MAX_TARGET_LEN;

use async_trait::async_trait;
use common::jwt::{check_token_size, validate_iat};
use common::secret::{ExposeSecret, SecretString};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use std::time::Duration;
use tracing::instrument;

const GENERIC_INVALID: &str = "The identity token is invalid or expired";

pub struct JwtIdentityValidator {
    decoding_key: DecodingKey,
    clock_skew: Duration,
}

impl JwtIdentityValidator {
    #[must_use]
    pub fn new(secret: &SecretString, clock_skew: Duration) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.expose_secret().as_bytes()),
            clock_skew,
        }
    }

    fn verify(&self, token: &str) -> Result<Claims, HubError> {
        check_token_size(token).map_err(|_| invalid())?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| {
                tracing::debug!(target: "hub.auth", error = %e, "Token verification failed");
                invalid()
            })?
            .claims;

        validate_iat(claims.iat, self.clock_skew).map_err(|e| {
            tracing::debug!(target: "hub.auth", error = ?e, "Token iat validation failed");
            invalid()
        })?;

        Ok(claims)
    }
}

#[async_trait]
impl IdentityValidator for JwtIdentityValidator {
    #[instrument(skip_all, name = "hub.auth.validate")]
    async fn validate(&self, token: &str) -> Result<Identity, HubError> {
        let claims = self.verify(token)?;
        let username = claims.sub.trim();

        if username.is_empty() || username.len() > MAX_TARGET_LEN {
            tracing::debug!(target: "hub.auth", "Token subject is not a usable username");
            return Err(invalid());
        }

        Ok(Identity {
            username: username.to_string(),
        })
    }
}

fn invalid() -> HubError {
    HubError::InvalidToken(GENERIC_INVALID.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_JWT_SIZE_BYTES};
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "unit-test-secret-unit-test-secret";

    fn validator() -> JwtIdentityValidator {
        JwtIdentityValidator::new(&SecretString::from(SECRET.to_string()), DEFAULT_CLOCK_SKEW)
    }

    fn token(sub: &str, iat_offset: i64, exp_offset: i64, secret: &str) -> String {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: sub.to_string(),
            iat: now + iat_offset,
            exp: now + exp_offset,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_valid_token() {
        let identity = validator()
            .validate(&token("alice", 0, 3600, SECRET))
            .await
            .unwrap();
        assert_eq!(identity.username, "alice");
    }

    #[tokio::test]
    async fn test_wrong_secret_rejected() {
        let result = validator()
            .validate(&token("alice", 0, 3600, "some-other-secret-value"))
            .await;
        assert!(matches!(result, Err(HubError::InvalidToken(_))));
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let result = validator()
            .validate(&token("alice", -7200, -3600, SECRET))
            .await;
        assert!(matches!(result, Err(HubError::InvalidToken(_))));
    }

    #[tokio::test]
    async fn test_future_iat_rejected() {
        let result = validator()
            .validate(&token("alice", 3600, 7200, SECRET))
            .await;
        assert!(matches!(result, Err(HubError::InvalidToken(_))));
    }

    #[tokio::test]
    async fn test_empty_subject_rejected() {
        let result = validator().validate(&token("  ", 0, 3600, SECRET)).await;
        assert!(matches!(result, Err(HubError::InvalidToken(_))));
    }

    #[tokio::test]
    async fn test_garbage_and_oversized_rejected() {
        let v = validator();
        assert!(v.validate("not-a-jwt").await.is_err());
        assert!(v.validate("").await.is_err());

        let oversized = "a".repeat(MAX_JWT_SIZE_BYTES + 1);
        assert!(matches!(
            v.validate(&oversized).await,
            Err(HubError::InvalidToken(_))
        ));
    }

    #[tokio::test]
    async fn test_errors_are_generic() {
        let err = validator().validate("x.y.z").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("Invalid token: {GENERIC_INVALID}")
        );
    }
}
