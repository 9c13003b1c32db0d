//! Product review repository.

use sqlx::PgPool;

use nextgen_core::{CustomerId, OrderId, ProductId, ReviewId, VariantId};

use super::{RepositoryError, conflict_on_unique, text_array};
use crate::models::{NewReview, ProductReview};

/// Repository for product review database operations.
pub struct ReviewRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Find the review left for one purchased variant, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_for_purchase(
        &self,
        order_id: &OrderId,
        customer_id: &CustomerId,
        product_id: &ProductId,
        variant_id: &VariantId,
    ) -> Result<Option<ProductReview>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductReview>(
            r"
            SELECT * FROM product_review
            WHERE order_id = $1 AND customer_id = $2 AND product_id = $3 AND variant_id = $4
            ",
        )
        .bind(order_id)
        .bind(customer_id)
        .bind(product_id)
        .bind(variant_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }

    /// Insert a review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the customer already reviewed
    /// this variant for this order.
    pub async fn create(&self, review: &NewReview) -> Result<ProductReview, RepositoryError> {
        sqlx::query_as::<_, ProductReview>(
            r"
            INSERT INTO product_review
                (id, order_id, customer_id, product_id, variant_id, rating, comment)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            ",
        )
        .bind(ReviewId::generate())
        .bind(&review.order_id)
        .bind(&review.customer_id)
        .bind(&review.product_id)
        .bind(&review.variant_id)
        .bind(review.rating.value())
        .bind(&review.comment)
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "review already submitted for this purchase"))
    }

    /// All reviews for a product, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_product(
        &self,
        product_id: &ProductId,
    ) -> Result<Vec<ProductReview>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductReview>(
            "SELECT * FROM product_review WHERE product_id = $1 ORDER BY created_at DESC, id",
        )
        .bind(product_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// All reviews for any of the given products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_products(
        &self,
        product_ids: &[ProductId],
    ) -> Result<Vec<ProductReview>, RepositoryError> {
        if product_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, ProductReview>(
            "SELECT * FROM product_review WHERE product_id = ANY($1)",
        )
        .bind(text_array(product_ids))
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }
}
