//! Authentication extractors.
//!
//! Customers authenticate with a bearer JWT issued by the auth routes.
//! Admin routes accept the static `ADMIN_API_TOKEN` as a bearer token.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use secrecy::ExposeSecret;
use sha2::{Digest, Sha256};

use nextgen_core::CustomerId;

use crate::error::{AppError, set_sentry_user};
use crate::state::AppState;

/// Extractor that requires a valid customer bearer token.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireCustomer(customer_id): RequireCustomer) -> impl IntoResponse {
///     format!("Hello, {customer_id}!")
/// }
/// ```
pub struct RequireCustomer(pub CustomerId);

impl<S> FromRequestParts<S> for RequireCustomer
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::Unauthorized("Unauthorized".to_string()))?;

        let claims = state.tokens().verify_customer_token(token).map_err(|e| {
            tracing::debug!(error = %e, "Rejected customer token");
            AppError::Unauthorized("Unauthorized".to_string())
        })?;

        set_sentry_user(&claims.actor_id);
        Ok(Self(claims.actor_id))
    }
}

/// Extractor that resolves the customer when a valid token is present.
///
/// Missing or invalid tokens yield `None` rather than a rejection.
pub struct OptionalCustomer(pub Option<CustomerId>);

impl<S> FromRequestParts<S> for OptionalCustomer
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let customer = bearer_token(parts)
            .and_then(|token| state.tokens().verify_customer_token(token).ok())
            .map(|claims| claims.actor_id);
        Ok(Self(customer))
    }
}

/// Extractor that requires the admin API token.
pub struct RequireAdmin;

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::Unauthorized("Unauthorized".to_string()))?;

        let expected = state.config().admin_api_token.expose_secret();
        if !tokens_match(token, expected) {
            tracing::warn!("Rejected admin token");
            return Err(AppError::Unauthorized("Unauthorized".to_string()));
        }
        Ok(Self)
    }
}

/// The token of an `Authorization: Bearer <token>` header.
fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Compare SHA-256 digests so timing does not depend on the token length or
/// on the position of the first differing byte.
fn tokens_match(presented: &str, expected: &str) -> bool {
    let a = Sha256::digest(presented.as_bytes());
    let b = Sha256::digest(expected.as_bytes());
    constant_time_compare(&a, &b)
}

fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts_with(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/store/orders");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&parts_with(Some("Bearer abc.def"))), Some("abc.def"));
        assert_eq!(bearer_token(&parts_with(Some("bearer   abc"))), Some("abc"));
        assert_eq!(bearer_token(&parts_with(Some("Basic abc"))), None);
        assert_eq!(bearer_token(&parts_with(Some("Bearer "))), None);
        assert_eq!(bearer_token(&parts_with(None)), None);
    }

    #[test]
    fn test_tokens_match() {
        assert!(tokens_match("admin-token-value", "admin-token-value"));
        assert!(!tokens_match("admin-token-value", "admin-token-valuf"));
        assert!(!tokens_match("short", "admin-token-value"));
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare(b"hello", b"hello"));
        assert!(!constant_time_compare(b"hello", b"world"));
        assert!(!constant_time_compare(b"hello", b"hell"));
    }
}
