//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                                  - Liveness
//! GET  /health/ready                            - Database reachable
//!
//! # Store
//! GET  /store/category_banner?type=             - Category banners
//! GET  /store/product_banner                    - Product banners with offer products
//! GET  /store/special_offers_banner             - Special offer banners
//! GET  /store/deals                             - Deals of the day
//! GET  /store/products                          - Priced product listing
//! GET  /store/products/review-stats             - Rating stats for product_ids
//! GET  /store/products/{id}                     - Product detail (region_id required)
//! GET  /store/products/{id}/reviews             - Review summary
//! GET  /store/orders                            - Customer's orders
//! POST /store/orders/complete                   - Confirm payment and capture
//! POST /store/orders/cancel                     - Cancel and refund
//! POST /store/product/order/review-rating       - Review a purchased product
//! GET  /store/customers/me/wishlists            - Wishlist page
//! POST /store/customers/me/wishlists            - Create wishlist
//! POST /store/customers/me/wishlists/items      - Add product
//! DEL  /store/customers/me/wishlists/items/{id} - Remove item
//! POST /store/carts/{id}/payment-intent         - Create payment intent
//! DEL  /store/cart/remove/{id}                  - Delete own cart
//! GET  /store/payment-card                      - Payment methods
//! POST /store/payment-card                      - Add card
//! GET  /store/payment-card/me                   - Saved cards (cursor)
//! DEL  /store/payment-card/me                   - Delete card or method
//! PATCH /store/payment-card/me                  - Update card or method
//! POST /store/customer/me/profile-upload        - Profile image
//! DEL  /store/auth/session/logout               - Logout
//!
//! # Auth (OTP routes are rate limited)
//! POST /auth/mobile/login[/verify]
//! POST /auth/mobile/register[/verify]
//! POST /auth/google/login
//! POST /auth/google/register
//! POST /customer/auth/forgot-password
//! POST /customer/auth/verify-otp
//!
//! # Admin (static bearer token)
//! GET/POST /admin/{category,product,special_offers}_banner
//! DEL      /admin/{category,product,special_offers}_banner/{id}
//! POST/DEL /admin/uploads/category/image
//! DEL      /admin/delete-upload
//! GET      /admin/product/review-ratings/{id}
//! GET      /admin/product/wishlists/{id}
//! ```

pub mod auth;
pub mod banners;
pub mod customers;
pub mod orders;
pub mod password;
pub mod payments;
pub mod products;
pub mod reviews;
pub mod uploads;
pub mod wishlists;

use axum::{Router, extract::DefaultBodyLimit};

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Largest request body accepted, sized for banner and profile images.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Trimmed value of a required text field.
///
/// # Errors
///
/// Returns `AppError::BadRequest` with `message` if the field is absent or
/// blank.
pub fn required(value: Option<String>, message: &str) -> Result<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::BadRequest(message.to_string()))
}

/// Create all API routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(banners::router())
        .merge(products::router())
        .merge(reviews::router())
        .merge(wishlists::router())
        .merge(orders::router())
        .merge(payments::router())
        .merge(customers::router())
        .merge(uploads::router())
        .merge(auth::router())
        .merge(password::router())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}
