//! Twilio Messaging client for OTP delivery.
//!
//! Without Twilio credentials the client runs in development mode: the code
//! is written to the log instead of being sent.

use secrecy::ExposeSecret;
use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;

use crate::config::TwilioConfig;

const BASE_URL: &str = "https://api.twilio.com/2010-04-01";

#[derive(Debug, Error)]
pub enum SmsError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Twilio API error ({status}): {message}")]
    Api { status: u16, message: String },
}

#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: String,
}

#[derive(Debug, Deserialize)]
struct TwilioErrorBody {
    message: String,
}

/// Sends OTP text messages.
#[derive(Clone)]
pub struct SmsClient {
    client: reqwest::Client,
    twilio: Option<TwilioConfig>,
}

impl SmsClient {
    #[must_use]
    pub fn new(client: reqwest::Client, twilio: Option<TwilioConfig>) -> Self {
        if twilio.is_none() {
            tracing::warn!("Twilio not configured, SMS codes will be logged instead of sent");
        }
        Self { client, twilio }
    }

    /// Text `code` to `to`.
    ///
    /// # Errors
    ///
    /// Returns error if Twilio rejects the message or is unreachable.
    #[instrument(skip(self, code))]
    pub async fn send_otp(&self, to: &str, code: &str) -> Result<(), SmsError> {
        let Some(twilio) = &self.twilio else {
            tracing::info!(to, code, "SMS delivery disabled, OTP issued");
            return Ok(());
        };

        let url = format!(
            "{BASE_URL}/Accounts/{}/Messages.json",
            urlencoding::encode(&twilio.account_sid)
        );
        let body = otp_message(code);
        let form = [
            ("To", to),
            ("MessagingServiceSid", twilio.messaging_service_sid.as_str()),
            ("Body", body.as_str()),
        ];

        let response = self
            .client
            .post(&url)
            .basic_auth(&twilio.account_sid, Some(twilio.auth_token.expose_secret()))
            .form(&form)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<TwilioErrorBody>(&text)
                .map_or(text, |body| body.message);
            return Err(SmsError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let message: MessageResource = response.json().await?;
        tracing::info!(sid = %message.sid, "OTP text message queued");
        Ok(())
    }
}

fn otp_message(code: &str) -> String {
    format!("Your OTP is {code}")
}
