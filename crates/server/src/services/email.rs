//! `SendGrid` mail client for password-reset codes.
//!
//! Without a `SendGrid` key the code is logged instead of mailed.

use secrecy::ExposeSecret;
use serde_json::json;
use thiserror::Error;
use tracing::instrument;

use crate::config::SendGridConfig;

const SEND_URL: &str = "https://api.sendgrid.com/v3/mail/send";

const RESET_SUBJECT: &str = "Password Reset Request - OTP Verification";

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("SendGrid API error ({status}): {message}")]
    Api { status: u16, message: String },
}

#[derive(Clone)]
pub struct EmailClient {
    client: reqwest::Client,
    sendgrid: Option<SendGridConfig>,
}

impl EmailClient {
    #[must_use]
    pub fn new(client: reqwest::Client, sendgrid: Option<SendGridConfig>) -> Self {
        if sendgrid.is_none() {
            tracing::warn!("SendGrid not configured, email codes will be logged instead of sent");
        }
        Self { client, sendgrid }
    }

    /// Mail a password-reset code to `to`.
    ///
    /// # Errors
    ///
    /// Returns error if `SendGrid` rejects the message or is unreachable.
    #[instrument(skip(self, code))]
    pub async fn send_password_reset_otp(&self, to: &str, code: &str) -> Result<(), EmailError> {
        let Some(sendgrid) = &self.sendgrid else {
            tracing::info!(to, code, "Email delivery disabled, OTP issued");
            return Ok(());
        };

        let response = self
            .client
            .post(SEND_URL)
            .bearer_auth(sendgrid.api_key.expose_secret())
            .json(&reset_message(&sendgrid.from_email, to, code))
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EmailError::Api {
                status: status.as_u16(),
                message,
            });
        }

        tracing::info!("Password reset OTP mailed");
        Ok(())
    }
}

/// `SendGrid` v3 mail body with plain-text and HTML parts.
fn reset_message(from: &str, to: &str, code: &str) -> serde_json::Value {
    json!({
        "personalizations": [{ "to": [{ "email": to }] }],
        "from": { "email": from },
        "subject": RESET_SUBJECT,
        "content": [
            {
                "type": "text/plain",
                "value": format!("Your OTP is {code}. It is valid for 5 minutes."),
            },
            {
                "type": "text/html",
                "value": format!("<p>Your OTP is <strong>{code}</strong>. It is valid for 5 minutes.</p>"),
            },
        ],
    })
}
