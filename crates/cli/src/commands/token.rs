//! Customer bearer tokens for local testing.
//!
//! # Environment Variables
//!
//! - `JWT_SECRET` - the same signing key the server uses

use secrecy::SecretString;
use thiserror::Error;

use nextgen_core::CustomerId;
use nextgen_server::services::{TokenError, TokenIssuer};

#[derive(Debug, Error)]
pub enum TokenCommandError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Customer ID must start with {0}_")]
    InvalidCustomerId(&'static str),

    #[error(transparent)]
    Token(#[from] TokenError),
}

fn customer_id(raw: &str) -> Result<CustomerId, TokenCommandError> {
    let raw = raw.trim();
    let prefix = format!("{}_", CustomerId::PREFIX);
    if raw.len() <= prefix.len() || !raw.starts_with(&prefix) {
        return Err(TokenCommandError::InvalidCustomerId(CustomerId::PREFIX));
    }
    Ok(CustomerId::new(raw))
}

/// Sign a customer token with `JWT_SECRET`.
///
/// # Errors
///
/// Returns an error if `JWT_SECRET` is unset, the ID is not a customer ID or
/// signing fails.
pub fn customer(raw_id: &str) -> Result<String, TokenCommandError> {
    dotenvy::dotenv().ok();

    let id = customer_id(raw_id)?;
    let secret = std::env::var("JWT_SECRET")
        .map(SecretString::from)
        .map_err(|_| TokenCommandError::MissingEnvVar("JWT_SECRET"))?;

    tracing::info!(customer_id = %id, "Issuing customer token");
    Ok(TokenIssuer::new(&secret).customer_token(&id)?)
}
