//! Customer sign-in: mobile number with an SMS code, or a Google ID token.
//!
//! Every successful sign-in returns a customer bearer token.

use axum::{Json, Router, extract::State, routing::post};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

use nextgen_core::{Email, MobileNumber};

use super::required;
use crate::db::{CustomerRepository, RepositoryError};
use crate::error::{AppError, Result};
use crate::middleware::{ApiJson, otp_rate_limiter};
use crate::models::{Customer, NewCustomer};
use crate::state::AppState;

const MOBILE_NOT_FOUND: &str = "Customer with this mobile number not found";
const MOBILE_EXISTS: &str = "Customer with this mobile number already exists";
const EMAIL_NOT_FOUND: &str = "Customer with this email not found";
const EMAIL_EXISTS: &str = "Customer with this email already exists";

pub fn router() -> Router<AppState> {
    let mobile = Router::new()
        .route("/auth/mobile/login", post(mobile_login))
        .route("/auth/mobile/login/verify", post(mobile_login_verify))
        .route("/auth/mobile/register", post(mobile_register))
        .route("/auth/mobile/register/verify", post(mobile_register_verify))
        .layer(otp_rate_limiter());

    Router::new()
        .merge(mobile)
        .route("/auth/google/login", post(google_login))
        .route("/auth/google/register", post(google_register))
}

#[derive(Debug, Deserialize)]
pub struct MobileRequest {
    pub mobile: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MobileVerifyRequest {
    pub mobile: Option<String>,
    pub otp: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GoogleRequest {
    pub token: Option<String>,
}

fn parse_mobile(raw: Option<String>) -> Result<MobileNumber> {
    let raw = required(raw, "Mobile number is required")?;
    MobileNumber::parse(&raw).map_err(|e| AppError::BadRequest(e.to_string()))
}

/// Response for a completed sign-in.
fn signed_in(state: &AppState, customer: &Customer) -> Result<Json<Value>> {
    let token = state.tokens().customer_token(&customer.id)?;
    Ok(Json(json!({ "token": token, "customer": customer })))
}

async fn send_code(state: &AppState, mobile: &MobileNumber) -> Result<Json<Value>> {
    let code = state.sms_otp().issue(mobile.as_str()).await;
    state.sms().send_otp(mobile.as_str(), &code).await?;
    Ok(Json(json!({ "success": true, "message": "OTP sent successfully." })))
}

// =============================================================================
// Mobile
// =============================================================================

/// Text a sign-in code to an existing customer.
#[instrument(skip_all)]
async fn mobile_login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<MobileRequest>,
) -> Result<Json<Value>> {
    let mobile = parse_mobile(body.mobile)?;

    CustomerRepository::new(state.pool())
        .find_by_phone(&mobile)
        .await?
        .ok_or_else(|| AppError::BadRequest(MOBILE_NOT_FOUND.to_string()))?;

    send_code(&state, &mobile).await
}

#[instrument(skip_all)]
async fn mobile_login_verify(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<MobileVerifyRequest>,
) -> Result<Json<Value>> {
    let mobile = parse_mobile(body.mobile)?;
    let otp = required(body.otp, "OTP is required")?;

    let customer = CustomerRepository::new(state.pool())
        .find_by_phone(&mobile)
        .await?
        .ok_or_else(|| AppError::BadRequest(MOBILE_NOT_FOUND.to_string()))?;

    state.sms_otp().verify(mobile.as_str(), &otp).await?;
    tracing::info!(customer_id = %customer.id, "Mobile sign-in");
    signed_in(&state, &customer)
}

/// Text a registration code to a number with no customer yet.
#[instrument(skip_all)]
async fn mobile_register(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<MobileRequest>,
) -> Result<Json<Value>> {
    let mobile = parse_mobile(body.mobile)?;

    if CustomerRepository::new(state.pool())
        .find_by_phone(&mobile)
        .await?
        .is_some()
    {
        return Err(AppError::BadRequest(MOBILE_EXISTS.to_string()));
    }

    send_code(&state, &mobile).await
}

/// Verify the registration code and create the customer.
#[instrument(skip_all)]
async fn mobile_register_verify(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<MobileVerifyRequest>,
) -> Result<Json<Value>> {
    let mobile = parse_mobile(body.mobile)?;
    let otp = required(body.otp, "OTP is required")?;

    let customers = CustomerRepository::new(state.pool());
    if customers.find_by_phone(&mobile).await?.is_some() {
        return Err(AppError::BadRequest(MOBILE_EXISTS.to_string()));
    }

    state.sms_otp().verify(mobile.as_str(), &otp).await?;

    let customer = customers
        .create(&NewCustomer {
            phone: Some(mobile),
            has_account: true,
            ..NewCustomer::default()
        })
        .await
        .map_err(|e| exists_as(e, MOBILE_EXISTS))?;

    tracing::info!(customer_id = %customer.id, "Customer registered by mobile");
    signed_in(&state, &customer)
}

// =============================================================================
// Google
// =============================================================================

#[instrument(skip_all)]
async fn google_login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<GoogleRequest>,
) -> Result<Json<Value>> {
    let token = required(body.token, "Token is required")?;
    let identity = state.google().verify_id_token(&token).await?;
    let email = Email::parse(&identity.email).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let customer = CustomerRepository::new(state.pool())
        .find_by_email(&email)
        .await?
        .ok_or_else(|| AppError::BadRequest(EMAIL_NOT_FOUND.to_string()))?;

    tracing::info!(customer_id = %customer.id, "Google sign-in");
    signed_in(&state, &customer)
}

/// Create a customer from a verified Google identity.
#[instrument(skip_all)]
async fn google_register(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<GoogleRequest>,
) -> Result<Json<Value>> {
    let token = required(body.token, "Token is required")?;
    let identity = state.google().verify_id_token(&token).await?;
    let email = Email::parse(&identity.email).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let customers = CustomerRepository::new(state.pool());
    if customers.find_by_email(&email).await?.is_some() {
        return Err(AppError::BadRequest(EMAIL_EXISTS.to_string()));
    }

    let new_customer = NewCustomer {
        email: Some(email),
        has_account: true,
        ..NewCustomer::default()
    };
    let new_customer = match identity.name.as_deref() {
        Some(name) => new_customer.with_full_name(name),
        None => new_customer,
    };

    let customer = customers
        .create(&new_customer)
        .await
        .map_err(|e| exists_as(e, EMAIL_EXISTS))?;

    tracing::info!(customer_id = %customer.id, "Customer registered with Google");
    signed_in(&state, &customer)
}

/// A unique violation on create means another request registered first.
fn exists_as(err: RepositoryError, message: &str) -> AppError {
    match err {
        RepositoryError::Conflict(_) => AppError::BadRequest(message.to_string()),
        other => other.into(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::StatusCode;

    use super::*;

    #[test]
    fn test_parse_mobile_requires_value() {
        let err = parse_mobile(None).unwrap_err();
        assert_eq!(err.client_message(), "Mobile number is required");

        let err = parse_mobile(Some("  ".to_string())).unwrap_err();
        assert_eq!(err.client_message(), "Mobile number is required");
    }

    #[test]
    fn test_parse_mobile_validates_format() {
        assert_eq!(
            parse_mobile(Some("+447700900123".to_string())).unwrap().as_str(),
            "+447700900123"
        );
        // seven digits
        let err = parse_mobile(Some("0770-90".to_string())).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        let err = parse_mobile(Some("+44abc".to_string())).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_duplicate_registration_is_bad_request() {
        let err = exists_as(RepositoryError::Conflict("dup".to_string()), MOBILE_EXISTS);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.client_message(), MOBILE_EXISTS);

        let err = exists_as(RepositoryError::NotFound, MOBILE_EXISTS);
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
