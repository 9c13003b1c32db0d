//! Integration tests for the NextGen server.
//!
//! The tests drive a running server over HTTP and are `#[ignore]`d by
//! default.
//!
//! # Running Tests
//!
//! ```bash
//! cargo run -p nextgen-cli -- migrate
//! cargo run -p nextgen-server &
//! cargo test -p nextgen-integration-tests -- --ignored
//! ```
//!
//! # Environment Variables
//!
//! - `NEXTGEN_TEST_URL` - server base URL (default `http://localhost:9000`)
//! - `JWT_SECRET` - the server's signing key, for customer tokens
//! - `ADMIN_API_TOKEN` - the server's admin bearer token
//! - `NEXTGEN_TEST_CUSTOMER_ID`, `NEXTGEN_TEST_ORDER_ID`,
//!   `NEXTGEN_TEST_PRODUCT_ID`, `NEXTGEN_TEST_VARIANT_ID` - seeded records for
//!   the uniqueness tests; the order must belong to the customer and contain
//!   the variant

use reqwest::{Client, Response};
use secrecy::SecretString;
use serde_json::Value;

use nextgen_core::CustomerId;
use nextgen_server::services::TokenIssuer;

/// Base URL of the server under test, without trailing slash.
#[must_use]
pub fn base_url() -> String {
    std::env::var("NEXTGEN_TEST_URL")
        .unwrap_or_else(|_| "http://localhost:9000".to_string())
        .trim_end_matches('/')
        .to_string()
}

/// Absolute URL for `path`.
#[must_use]
pub fn url(path: &str) -> String {
    format!("{}{path}", base_url())
}

/// HTTP client for the tests.
///
/// # Panics
///
/// Panics if the client cannot be built.
#[must_use]
pub fn client() -> Client {
    Client::builder()
        .build()
        .expect("Failed to create HTTP client")
}

/// Bearer token for a freshly generated customer ID, signed with
/// `JWT_SECRET`.
///
/// # Panics
///
/// Panics if `JWT_SECRET` is unset or signing fails.
#[must_use]
pub fn customer_token() -> String {
    customer_token_for(&CustomerId::generate())
}

/// Bearer token for an existing customer, signed with `JWT_SECRET`.
///
/// # Panics
///
/// Panics if `JWT_SECRET` is unset or signing fails.
#[must_use]
pub fn customer_token_for(customer_id: &CustomerId) -> String {
    let secret = std::env::var("JWT_SECRET").expect("JWT_SECRET must be set");
    TokenIssuer::new(&SecretString::from(secret))
        .customer_token(customer_id)
        .expect("Failed to sign customer token")
}

/// ID of a seeded record, read from `var`.
///
/// # Panics
///
/// Panics if `var` is unset.
#[must_use]
pub fn fixture(var: &str) -> String {
    std::env::var(var).unwrap_or_else(|_| panic!("{var} must be set"))
}

/// The server's admin bearer token.
///
/// # Panics
///
/// Panics if `ADMIN_API_TOKEN` is unset.
#[must_use]
pub fn admin_token() -> String {
    std::env::var("ADMIN_API_TOKEN").expect("ADMIN_API_TOKEN must be set")
}

/// Parse a JSON error body and return its `message`.
///
/// # Panics
///
/// Panics if the body is not JSON.
pub async fn error_message(response: Response) -> String {
    let body: Value = response.json().await.expect("Error body is not JSON");
    body["message"].as_str().unwrap_or_default().to_string()
}
