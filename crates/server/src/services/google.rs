//! Google ID-token verification via the `tokeninfo` endpoint.
//!
//! Google checks the signature and expiry; this module checks the audience
//! and issuer and extracts the identity.

use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;

const TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

const GOOGLE_ISSUERS: &[&str] = &["accounts.google.com", "https://accounts.google.com"];

#[derive(Debug, Error)]
pub enum GoogleAuthError {
    #[error("Google sign-in is not configured")]
    NotConfigured,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid Google Token")]
    InvalidToken,

    #[error("Google token was issued for a different client")]
    AudienceMismatch,

    #[error("Google account must have an email")]
    MissingEmail,
}

/// Fields of the `tokeninfo` response we rely on.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenInfo {
    pub aud: String,
    pub iss: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// A verified Google identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleIdentity {
    pub email: String,
    pub name: Option<String>,
}

impl TokenInfo {
    fn into_identity(self, client_id: &str) -> Result<GoogleIdentity, GoogleAuthError> {
        if self.aud != client_id {
            return Err(GoogleAuthError::AudienceMismatch);
        }
        if !GOOGLE_ISSUERS.contains(&self.iss.as_str()) {
            return Err(GoogleAuthError::InvalidToken);
        }
        if self.email_verified.as_deref() == Some("false") {
            return Err(GoogleAuthError::InvalidToken);
        }
        let email = self
            .email
            .filter(|e| !e.trim().is_empty())
            .ok_or(GoogleAuthError::MissingEmail)?;
        Ok(GoogleIdentity {
            email,
            name: self.name,
        })
    }
}

#[derive(Clone)]
pub struct GoogleVerifier {
    client: reqwest::Client,
    client_id: Option<String>,
}

impl GoogleVerifier {
    #[must_use]
    pub const fn new(client: reqwest::Client, client_id: Option<String>) -> Self {
        Self { client, client_id }
    }

    /// Verify `id_token` and return the Google identity it carries.
    ///
    /// # Errors
    ///
    /// Returns `GoogleAuthError` if sign-in is not configured, Google rejects
    /// the token, or the token was minted for another client.
    #[instrument(skip_all)]
    pub async fn verify_id_token(&self, id_token: &str) -> Result<GoogleIdentity, GoogleAuthError> {
        let client_id = self
            .client_id
            .as_deref()
            .ok_or(GoogleAuthError::NotConfigured)?;

        let url = format!("{TOKENINFO_URL}?id_token={}", urlencoding::encode(id_token));
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            tracing::debug!(status = %response.status(), "Google rejected ID token");
            return Err(GoogleAuthError::InvalidToken);
        }

        let info: TokenInfo = response
            .json()
            .await
            .map_err(|_| GoogleAuthError::InvalidToken)?;
        info.into_identity(client_id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn info(aud: &str, email: Option<&str>) -> TokenInfo {
        TokenInfo {
            aud: aud.to_string(),
            iss: "https://accounts.google.com".to_string(),
            email: email.map(String::from),
            email_verified: Some("true".to_string()),
            name: Some("Ada Lovelace".to_string()),
        }
    }

    #[test]
    fn test_identity_from_matching_audience() {
        let identity = info("client-1", Some("ada@example.com"))
            .into_identity("client-1")
            .unwrap();
        assert_eq!(identity.email, "ada@example.com");
        assert_eq!(identity.name.as_deref(), Some("Ada Lovelace"));
    }

    #[test]
    fn test_audience_mismatch() {
        assert!(matches!(
            info("other", Some("ada@example.com")).into_identity("client-1"),
            Err(GoogleAuthError::AudienceMismatch)
        ));
    }

    #[test]
    fn test_missing_email() {
        assert!(matches!(
            info("client-1", None).into_identity("client-1"),
            Err(GoogleAuthError::MissingEmail)
        ));
    }

    #[test]
    fn test_foreign_issuer_rejected() {
        let mut token = info("client-1", Some("ada@example.com"));
        token.iss = "https://evil.example".to_string();
        assert!(matches!(
            token.into_identity("client-1"),
            Err(GoogleAuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_unconfigured_verifier() {
        let verifier = GoogleVerifier::new(reqwest::Client::new(), None);
        assert!(matches!(
            verifier.verify_id_token("abc").await,
            Err(GoogleAuthError::NotConfigured)
        ));
    }
}
