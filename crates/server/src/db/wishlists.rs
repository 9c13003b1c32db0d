//! Wishlist repository.
//!
//! The one-wishlist-per-customer and one-item-per-product rules are enforced
//! by unique constraints; violations surface as `RepositoryError::Conflict`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use nextgen_core::{CustomerId, ProductId, WishlistId, WishlistItemId};

use super::{RepositoryError, conflict_on_unique, text_array};
use crate::models::{Wishlist, WishlistItem};

/// Repository for wishlist database operations.
pub struct WishlistRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> WishlistRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_customer(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Option<Wishlist>, RepositoryError> {
        let row = sqlx::query_as::<_, Wishlist>("SELECT * FROM wishlist WHERE customer_id = $1")
            .bind(customer_id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_id(&self, id: &WishlistId) -> Result<Option<Wishlist>, RepositoryError> {
        let row = sqlx::query_as::<_, Wishlist>("SELECT * FROM wishlist WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row)
    }

    /// Create the customer's wishlist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the customer already has one.
    pub async fn create(&self, customer_id: &CustomerId) -> Result<Wishlist, RepositoryError> {
        sqlx::query_as::<_, Wishlist>(
            "INSERT INTO wishlist (id, customer_id) VALUES ($1, $2) RETURNING *",
        )
        .bind(WishlistId::generate())
        .bind(customer_id)
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "Customer already has a wishlist"))
    }

    /// All items of a wishlist in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_items(
        &self,
        wishlist_id: &WishlistId,
    ) -> Result<Vec<WishlistItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, WishlistItem>(
            "SELECT * FROM wishlist_item WHERE wishlist_id = $1 ORDER BY created_at, id",
        )
        .bind(wishlist_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_item(
        &self,
        id: &WishlistItemId,
    ) -> Result<Option<WishlistItem>, RepositoryError> {
        let row = sqlx::query_as::<_, WishlistItem>("SELECT * FROM wishlist_item WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row)
    }

    /// Add a product to a wishlist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the product is already present.
    pub async fn add_item(
        &self,
        wishlist_id: &WishlistId,
        product_id: &ProductId,
    ) -> Result<WishlistItem, RepositoryError> {
        sqlx::query_as::<_, WishlistItem>(
            r"
            INSERT INTO wishlist_item (id, wishlist_id, product_id)
            VALUES ($1, $2, $3)
            RETURNING *
            ",
        )
        .bind(WishlistItemId::generate())
        .bind(wishlist_id)
        .bind(product_id)
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "This product is already in the wishlist"))
    }

    /// Delete an item, and its wishlist too if that leaves it empty.
    ///
    /// Runs in one transaction so a concurrent insert cannot land in a
    /// wishlist that is being removed. Returns `true` if the wishlist was
    /// deleted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the item no longer exists.
    pub async fn delete_item_and_prune(
        &self,
        item_id: &WishlistItemId,
        wishlist_id: &WishlistId,
    ) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Lock the parent row first so inserts into it wait for us.
        sqlx::query("SELECT id FROM wishlist WHERE id = $1 FOR UPDATE")
            .bind(wishlist_id)
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM wishlist_item WHERE id = $1")
            .bind(item_id)
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        let remaining: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM wishlist_item WHERE wishlist_id = $1")
                .bind(wishlist_id)
                .fetch_one(&mut *tx)
                .await?;

        let pruned = remaining == 0;
        if pruned {
            sqlx::query("DELETE FROM wishlist WHERE id = $1")
                .bind(wishlist_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(pruned)
    }

    /// Number of wishlist entries created for a product since `since`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_product_since(
        &self,
        product_id: &ProductId,
        since: DateTime<Utc>,
    ) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar(
            "SELECT COUNT(*) FROM wishlist_item WHERE product_id = $1 AND created_at >= $2",
        )
        .bind(product_id)
        .bind(since)
        .fetch_one(self.pool)
        .await?;

        Ok(count)
    }

    /// Per-product wishlist entry counts since `since`. Products with no
    /// entries are absent from the map.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_products_since(
        &self,
        product_ids: &[ProductId],
        since: DateTime<Utc>,
    ) -> Result<HashMap<ProductId, i64>, RepositoryError> {
        if product_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows: Vec<(ProductId, i64)> = sqlx::query_as(
            r"
            SELECT product_id, COUNT(*) FROM wishlist_item
            WHERE product_id = ANY($1) AND created_at >= $2
            GROUP BY product_id
            ",
        )
        .bind(text_array(product_ids))
        .bind(since)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }
}
