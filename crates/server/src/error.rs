//! Unified error handling with Sentry integration.
//!
//! Every handler returns `Result<T, AppError>`. Errors render as JSON
//! `{"error": <kind>, "message": <text>}`, with flow-specific extras such as
//! `retry`, `status` or `details`. Server-side failures are captured to Sentry
//! before responding; their details never reach the client.

use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value, json};
use thiserror::Error;

use nextgen_core::PaginationError;

use crate::db::RepositoryError;
use crate::services::{
    CheckoutError, EmailError, GoogleAuthError, OfferError, OtpError, SmsError, StorageError,
    StripeError, TokenError, WishlistError,
};

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Stripe API operation failed.
    #[error("Stripe error: {0}")]
    Stripe(#[from] StripeError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("SMS error: {0}")]
    Sms(#[from] SmsError),

    #[error("Email error: {0}")]
    Email(#[from] EmailError),

    #[error("Google auth error: {0}")]
    Google(#[from] GoogleAuthError),

    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    #[error("OTP error: {0}")]
    Otp(#[from] OtpError),

    #[error("Wishlist error: {0}")]
    Wishlist(#[from] WishlistError),

    #[error("Offer error: {0}")]
    Offer(#[from] OfferError),

    #[error("Invalid pagination: {0}")]
    Pagination(#[from] PaginationError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Caller is authenticated but may not touch this resource.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

const fn repository_status(err: &RepositoryError) -> StatusCode {
    match err {
        RepositoryError::NotFound => StatusCode::NOT_FOUND,
        RepositoryError::Conflict(_) => StatusCode::CONFLICT,
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn repository_message(err: &RepositoryError) -> String {
    match err {
        RepositoryError::NotFound => "Not found".to_string(),
        RepositoryError::Conflict(msg) => msg.clone(),
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
            "Internal server error".to_string()
        }
    }
}

/// Declined or invalid requests are the caller's problem; transport faults
/// and processor outages are ours.
fn stripe_status(err: &StripeError) -> StatusCode {
    match err {
        StripeError::Api { status: 404, .. } => StatusCode::NOT_FOUND,
        StripeError::Api { status, .. } if *status >= 400 && *status < 500 => {
            StatusCode::BAD_REQUEST
        }
        StripeError::UnsupportedCardId => StatusCode::BAD_REQUEST,
        StripeError::Api { .. } | StripeError::Http(_) | StripeError::Parse(_) => {
            StatusCode::BAD_GATEWAY
        }
    }
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Database(err)
            | Self::Checkout(CheckoutError::Ledger(err))
            | Self::Wishlist(WishlistError::Repository(err))
            | Self::Offer(OfferError::Repository(err)) => repository_status(err),
            Self::Checkout(err) => match err {
                CheckoutError::MissingFields
                | CheckoutError::IntentCanceled
                | CheckoutError::PaymentFailed { .. }
                | CheckoutError::RefundFailed(_) => StatusCode::BAD_REQUEST,
                CheckoutError::PaymentNotFound | CheckoutError::OrderNotFound => {
                    StatusCode::NOT_FOUND
                }
                CheckoutError::NotOwner(_) => StatusCode::FORBIDDEN,
                CheckoutError::Gateway(err) => stripe_status(err),
                CheckoutError::Amount(_) | CheckoutError::Ledger(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Stripe(err) => stripe_status(err),
            Self::Storage(_) | Self::Sms(_) | Self::Email(_) => StatusCode::BAD_GATEWAY,
            Self::Google(err) => match err {
                GoogleAuthError::InvalidToken | GoogleAuthError::AudienceMismatch => {
                    StatusCode::UNAUTHORIZED
                }
                GoogleAuthError::MissingEmail => StatusCode::BAD_REQUEST,
                GoogleAuthError::Http(_) => StatusCode::BAD_GATEWAY,
                GoogleAuthError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            },
            Self::Token(err) => match err {
                TokenError::Invalid(_) | TokenError::WrongActor => StatusCode::UNAUTHORIZED,
                TokenError::Sign(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Otp(_) | Self::Pagination(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Wishlist(err) => match err {
                WishlistError::CustomerNotFound
                | WishlistError::NoWishlist
                | WishlistError::ItemNotFound
                | WishlistError::WishlistNotFound => StatusCode::NOT_FOUND,
                WishlistError::AlreadyExists
                | WishlistError::InvalidRegion
                | WishlistError::ProductNotFound
                | WishlistError::AlreadyInWishlist => StatusCode::BAD_REQUEST,
                WishlistError::NotOwner => StatusCode::FORBIDDEN,
                WishlistError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Offer(_) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show the caller.
    #[must_use]
    pub fn client_message(&self) -> String {
        let status = self.status();
        if status.is_server_error() && status != StatusCode::BAD_GATEWAY {
            return match self {
                Self::Google(GoogleAuthError::NotConfigured) => {
                    "Google sign-in is not available".to_string()
                }
                _ => "Internal server error".to_string(),
            };
        }

        match self {
            Self::Database(err)
            | Self::Checkout(CheckoutError::Ledger(err))
            | Self::Wishlist(WishlistError::Repository(err))
            | Self::Offer(OfferError::Repository(err)) => repository_message(err),
            Self::Checkout(CheckoutError::Gateway(err)) | Self::Stripe(err) => err.client_message(),
            Self::Checkout(err) => err.to_string(),
            Self::Storage(_) => "Storage service error".to_string(),
            Self::Sms(_) | Self::Email(_) => "Failed to send OTP".to_string(),
            Self::Google(GoogleAuthError::Http(_)) => "Google sign-in unavailable".to_string(),
            Self::Google(GoogleAuthError::AudienceMismatch) => {
                GoogleAuthError::InvalidToken.to_string()
            }
            Self::Google(err) => err.to_string(),
            Self::Token(_) => "Unauthorized".to_string(),
            Self::Otp(err) => err.to_string(),
            Self::Wishlist(err) => err.to_string(),
            Self::Offer(err) => err.to_string(),
            Self::Pagination(err) => err.to_string(),
            Self::NotFound(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::BadRequest(msg)
            | Self::Conflict(msg)
            | Self::Internal(msg) => msg.clone(),
            Self::RateLimited => "Too many requests, please try again later".to_string(),
        }
    }

    /// Machine-readable `error` value. Payment and refund failures carry the
    /// flow message here, as clients match on it.
    fn kind(&self) -> &'static str {
        match self {
            Self::Checkout(CheckoutError::PaymentFailed { .. }) => return "Payment failed",
            Self::Checkout(CheckoutError::RefundFailed(_)) => return "Stripe refund failed",
            _ => {}
        }
        match self.status().as_u16() {
            400 => "invalid_request",
            401 => "unauthorized",
            403 => "forbidden",
            404 => "not_found",
            409 => "conflict",
            429 => "rate_limited",
            502 => "upstream_error",
            503 => "unavailable",
            _ => "internal_error",
        }
    }

    /// Flow-specific fields added next to `error` and `message`.
    fn extras(&self) -> Map<String, Value> {
        let mut extras = Map::new();
        match self {
            Self::Checkout(CheckoutError::IntentCanceled) => {
                extras.insert("retry".to_string(), Value::Bool(true));
            }
            Self::Checkout(CheckoutError::PaymentFailed { status }) => {
                extras.insert("status".to_string(), Value::String(status.clone()));
            }
            Self::Checkout(CheckoutError::RefundFailed(refund)) => {
                extras.insert(
                    "details".to_string(),
                    serde_json::to_value(refund).unwrap_or(Value::Null),
                );
            }
            _ => {}
        }
        extras
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, %status, "Request rejected");
        }

        let mut body = self.extras();
        body.insert("error".to_string(), json!(self.kind()));
        body.insert("message".to_string(), json!(self.client_message()));

        (status, Json(Value::Object(body))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a customer ID.
///
/// Called once a bearer token has been verified so errors are associated
/// with the customer.
pub fn set_sentry_user(user_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for a payment or account action.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: &[(&str, &str)]) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    for (key, value) in data {
        breadcrumb
            .data
            .insert((*key).to_string(), Value::String((*value).to_string()));
    }

    sentry::add_breadcrumb(breadcrumb);
}
