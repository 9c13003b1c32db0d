//! HTTP middleware and auth extractors.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, transactions)
//! 2. `TraceLayer` (request span)
//! 3. Request ID (recorded on the span and Sentry scope)
//! 4. Body limit and CORS
//! 5. Rate limiting on OTP routes (governor)
//!
//! Authentication is per handler through the `RequireCustomer`,
//! `OptionalCustomer` and `RequireAdmin` extractors. Bodies and query strings
//! go through `ApiJson` and `ApiQuery` so rejections share the JSON error body.

pub mod auth;
pub mod extract;
pub mod rate_limit;
pub mod request_id;

pub use auth::{OptionalCustomer, RequireAdmin, RequireCustomer};
pub use extract::{ApiJson, ApiQuery};
pub use rate_limit::otp_rate_limiter;
pub use request_id::request_id_middleware;
