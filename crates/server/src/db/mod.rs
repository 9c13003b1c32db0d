//! Database operations for the commerce `PostgreSQL` database.
//!
//! ## Tables owned by this service
//!
//! - `category_banner`, `product_banner`, `special_offers_banner`
//! - `product_review` - unique per (order, customer, product, variant)
//! - `wishlist` - unique per customer
//! - `wishlist_item` - unique per (wishlist, product)
//!
//! ## Commerce tables read (and narrowly updated)
//!
//! - `customer`, `region`, `product`, `product_variant`, `price`, `price_list`
//! - `cart`, `order`, `order_transaction`, `payment`
//!
//! Queries are runtime-checked (`query_as` + `FromRow`) so the crate builds
//! without a live database.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p nextgen-cli -- migrate
//! ```

pub mod banners;
pub mod catalog;
pub mod customers;
pub mod orders;
pub mod reviews;
pub mod wishlists;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use banners::BannerRepository;
pub use catalog::CatalogRepository;
pub use customers::CustomerRepository;
pub use orders::OrderRepository;
pub use reviews::ReviewRepository;
pub use wishlists::WishlistRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., one wishlist per customer).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Map a unique-constraint violation to `RepositoryError::Conflict`.
pub(crate) fn conflict_on_unique(err: sqlx::Error, message: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(message.to_owned());
    }
    RepositoryError::Database(err)
}

/// Collect IDs into a `TEXT[]` bind parameter.
pub(crate) fn text_array<T: AsRef<str>>(ids: &[T]) -> Vec<String> {
    ids.iter().map(|id| id.as_ref().to_owned()).collect()
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
