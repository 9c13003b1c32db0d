//! Body and query extractors that reject with the JSON error body.
//!
//! Drop-in replacements for `axum::Json` and `axum::extract::Query`: a
//! malformed body or query string becomes `AppError::BadRequest` instead of
//! axum's plain-text rejection.

use axum::extract::{FromRequest, FromRequestParts};

use crate::error::AppError;

/// JSON request body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Deserialized query string.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);
