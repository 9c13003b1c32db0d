//! Customer wishlists.

use chrono::{DateTime, Utc};
use serde::Serialize;

use nextgen_core::{CustomerId, ProductId, SortField, WishlistId, WishlistItemId};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Wishlist {
    pub id: WishlistId,
    pub customer_id: CustomerId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct WishlistItem {
    pub id: WishlistItemId,
    pub wishlist_id: WishlistId,
    pub product_id: ProductId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WishlistItem {
    /// Timestamp used when ordering items by `field`.
    #[must_use]
    pub const fn timestamp(&self, field: SortField) -> DateTime<Utc> {
        match field {
            SortField::CreatedAt => self.created_at,
            SortField::UpdatedAt => self.updated_at,
        }
    }
}
