//! Customer bearer tokens and password-reset tokens (HS256 JWTs).

use chrono::{TimeDelta, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use nextgen_core::CustomerId;

/// Lifetime of a customer bearer token.
pub const CUSTOMER_TOKEN_LIFETIME: TimeDelta = TimeDelta::hours(1);

/// Lifetime of a password-reset token.
pub const RESET_TOKEN_LIFETIME: TimeDelta = TimeDelta::minutes(15);

const CUSTOMER_ACTOR: &str = "customer";

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("failed to sign token: {0}")]
    Sign(#[source] jsonwebtoken::errors::Error),

    #[error("invalid token: {0}")]
    Invalid(#[source] jsonwebtoken::errors::Error),

    #[error("token is not a customer token")]
    WrongActor,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppMetadata {
    pub customer_id: CustomerId,
}

/// Claims of a customer bearer token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CustomerClaims {
    pub actor_id: CustomerId,
    pub actor_type: String,
    pub auth_identity_id: String,
    pub app_metadata: AppMetadata,
    pub iat: i64,
    pub exp: i64,
}

/// Claims of a password-reset token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResetClaims {
    /// The email address whose password may be reset.
    pub entity_id: String,
    pub actor_type: String,
    pub provider: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signs and verifies tokens with the shared HS256 secret.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer").finish_non_exhaustive()
    }
}

impl TokenIssuer {
    #[must_use]
    pub fn new(secret: &SecretString) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
        }
    }

    /// Issue a one-hour bearer token for `customer_id`.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Sign` if encoding fails.
    pub fn customer_token(&self, customer_id: &CustomerId) -> Result<String, TokenError> {
        let iat = Utc::now().timestamp();
        let claims = CustomerClaims {
            actor_id: customer_id.clone(),
            actor_type: CUSTOMER_ACTOR.to_string(),
            auth_identity_id: format!("authid_{customer_id}"),
            app_metadata: AppMetadata {
                customer_id: customer_id.clone(),
            },
            iat,
            exp: iat + CUSTOMER_TOKEN_LIFETIME.num_seconds(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(TokenError::Sign)
    }

    /// Verify a bearer token and return the customer it was issued to.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Invalid` for a bad signature or expired token and
    /// `TokenError::WrongActor` for tokens not issued to a customer.
    pub fn verify_customer_token(&self, token: &str) -> Result<CustomerClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        let data = jsonwebtoken::decode::<CustomerClaims>(token, &self.decoding, &validation)
            .map_err(TokenError::Invalid)?;

        if data.claims.actor_type != CUSTOMER_ACTOR {
            return Err(TokenError::WrongActor);
        }
        Ok(data.claims)
    }

    /// Issue a 15-minute password-reset token for the `emailpass` identity
    /// `email`.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Sign` if encoding fails.
    pub fn password_reset_token(&self, email: &str) -> Result<String, TokenError> {
        let iat = Utc::now().timestamp();
        let claims = ResetClaims {
            entity_id: email.to_string(),
            actor_type: CUSTOMER_ACTOR.to_string(),
            provider: "emailpass".to_string(),
            iat,
            exp: iat + RESET_TOKEN_LIFETIME.num_seconds(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(TokenError::Sign)
    }

    /// # Errors
    ///
    /// Returns `TokenError::Invalid` if the token is malformed or expired.
    pub fn verify_password_reset_token(&self, token: &str) -> Result<ResetClaims, TokenError> {
        let validation = Validation::new(Algorithm::HS256);
        jsonwebtoken::decode::<ResetClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(TokenError::Invalid)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn issuer(secret: &str) -> TokenIssuer {
        TokenIssuer::new(&SecretString::from(secret.to_string()))
    }

    #[test]
    fn test_customer_token_claims() {
        let tokens = issuer("k3J9x!vQ2mZr8LpW4tYb7NcH1sDf6GaE");
        let id = CustomerId::new("cus_01ABC");
        let token = tokens.customer_token(&id).unwrap();

        let claims = tokens.verify_customer_token(&token).unwrap();
        assert_eq!(claims.actor_id, id);
        assert_eq!(claims.actor_type, "customer");
        assert_eq!(claims.auth_identity_id, "authid_cus_01ABC");
        assert_eq!(claims.app_metadata.customer_id, id);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_token_from_other_secret_is_rejected() {
        let a = issuer("k3J9x!vQ2mZr8LpW4tYb7NcH1sDf6GaE");
        let b = issuer("Zq8!wR3nT6yU1iO4pA7sD0fG2hJ5kL9x");
        let token = a.customer_token(&CustomerId::new("cus_1")).unwrap();

        assert!(matches!(
            b.verify_customer_token(&token),
            Err(TokenError::Invalid(_))
        ));
    }

    #[test]
    fn test_reset_token_is_not_a_customer_token() {
        let tokens = issuer("k3J9x!vQ2mZr8LpW4tYb7NcH1sDf6GaE");
        let reset = tokens.password_reset_token("ada@example.com").unwrap();

        let claims = tokens.verify_password_reset_token(&reset).unwrap();
        assert_eq!(claims.entity_id, "ada@example.com");
        assert_eq!(claims.provider, "emailpass");
        assert_eq!(claims.exp - claims.iat, 900);

        assert!(tokens.verify_customer_token(&reset).is_err());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let tokens = issuer("k3J9x!vQ2mZr8LpW4tYb7NcH1sDf6GaE");
        let past = Utc::now().timestamp() - 7200;
        let id = CustomerId::new("cus_1");
        let claims = CustomerClaims {
            actor_id: id.clone(),
            actor_type: "customer".to_string(),
            auth_identity_id: "authid_cus_1".to_string(),
            app_metadata: AppMetadata { customer_id: id },
            iat: past,
            exp: past + 3600,
        };
        let token =
            jsonwebtoken::encode(&Header::default(), &claims, &tokens.encoding).unwrap();

        assert!(tokens.verify_customer_token(&token).is_err());
    }
}
