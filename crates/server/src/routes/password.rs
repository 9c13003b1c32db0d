//! Password reset by emailed one-time code.
//!
//! A verified code is exchanged for a short-lived reset token; the reset
//! itself is done by the auth provider holding the password.

use axum::{Json, Router, extract::State, routing::post};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

use nextgen_core::Email;

use super::required;
use crate::db::CustomerRepository;
use crate::error::{AppError, Result};
use crate::middleware::{ApiJson, otp_rate_limiter};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/customer/auth/forgot-password", post(forgot_password))
        .route("/customer/auth/verify-otp", post(verify_otp))
        .layer(otp_rate_limiter())
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub email: Option<String>,
    pub otp: Option<String>,
}

fn parse_email(raw: &str) -> Result<Email> {
    Email::parse(raw).map_err(|e| AppError::BadRequest(e.to_string()))
}

#[instrument(skip_all)]
async fn forgot_password(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ForgotPasswordRequest>,
) -> Result<Json<Value>> {
    let email = parse_email(&required(body.email, "Email is required")?)?;

    CustomerRepository::new(state.pool())
        .find_registered_by_email(&email)
        .await?
        .ok_or_else(|| AppError::NotFound("No customer found with this email".to_string()))?;

    let code = state.email_otp().issue(email.as_str()).await;
    state
        .email()
        .send_password_reset_otp(email.as_str(), &code)
        .await?;

    tracing::info!(domain = email.domain(), "Password reset code sent");
    Ok(Json(json!({
        "success": true,
        "message": "A password reset OTP has been sent to your email address. Please check your inbox.",
    })))
}

/// Exchange a valid code for a password reset token.
#[instrument(skip_all)]
async fn verify_otp(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<VerifyOtpRequest>,
) -> Result<Json<Value>> {
    let missing = || AppError::BadRequest("Email and OTP are required".to_string());
    let email = body
        .email
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(missing)?;
    let otp = body
        .otp
        .filter(|o| !o.trim().is_empty())
        .ok_or_else(missing)?;
    let email = parse_email(&email)?;

    state.email_otp().verify(email.as_str(), otp.trim()).await?;
    let token = state.tokens().password_reset_token(email.as_str())?;

    Ok(Json(json!({
        "success": true,
        "message": "OTP verified successfully and password reset token generated",
        "token": token,
    })))
}
