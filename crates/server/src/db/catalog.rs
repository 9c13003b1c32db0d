//! Catalog repository: products, variants, prices, regions and price lists.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use nextgen_core::{Pagination, PriceListId, ProductId, RegionId, VariantId};

use super::{RepositoryError, text_array};
use crate::models::{PriceList, PriceRow, Product, ProductVariant, Region};

const PRODUCT_COLUMNS: &str = "id, title, handle, subtitle, description, thumbnail, status, metadata, created_at, updated_at";

/// Repository for catalog reads.
pub struct CatalogRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CatalogRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Whether a live product exists with this ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn product_exists(&self, id: &ProductId) -> Result<bool, RepositoryError> {
        let exists = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM product WHERE id = $1 AND deleted_at IS NULL)",
        )
        .bind(id)
        .fetch_one(self.pool)
        .await?;

        Ok(exists)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM product WHERE id = ANY($1) AND deleted_at IS NULL"
        ))
        .bind(text_array(ids))
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// One page of published products, newest first, with the total count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_published(
        &self,
        page: Pagination,
    ) -> Result<(Vec<Product>, i64), RepositoryError> {
        let rows = sqlx::query_as::<_, Product>(&format!(
            r"
            SELECT {PRODUCT_COLUMNS} FROM product
            WHERE status = 'published' AND deleted_at IS NULL
            ORDER BY created_at DESC, id
            LIMIT $1 OFFSET $2
            "
        ))
        .bind(page.limit_i64())
        .bind(page.offset_i64())
        .fetch_all(self.pool)
        .await?;

        let total = sqlx::query_scalar(
            "SELECT COUNT(*) FROM product WHERE status = 'published' AND deleted_at IS NULL",
        )
        .fetch_one(self.pool)
        .await?;

        Ok((rows, total))
    }

    /// Products that own at least one of the given variants.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn products_for_variants(
        &self,
        variant_ids: &[VariantId],
    ) -> Result<Vec<Product>, RepositoryError> {
        if variant_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, Product>(&format!(
            r"
            SELECT {PRODUCT_COLUMNS} FROM product
            WHERE deleted_at IS NULL AND id IN (
                SELECT product_id FROM product_variant
                WHERE id = ANY($1) AND deleted_at IS NULL
            )
            ORDER BY created_at DESC, id
            "
        ))
        .bind(text_array(variant_ids))
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Live variants of the given products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn variants_for_products(
        &self,
        product_ids: &[ProductId],
    ) -> Result<Vec<ProductVariant>, RepositoryError> {
        if product_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, ProductVariant>(
            r"
            SELECT id, product_id, title, sku FROM product_variant
            WHERE product_id = ANY($1) AND deleted_at IS NULL
            ORDER BY created_at, id
            ",
        )
        .bind(text_array(product_ids))
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn variants_by_ids(
        &self,
        ids: &[VariantId],
    ) -> Result<Vec<ProductVariant>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, ProductVariant>(
            "SELECT id, product_id, title, sku FROM product_variant WHERE id = ANY($1)",
        )
        .bind(text_array(ids))
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Base prices and currently-active price-list prices for the variants in
    /// one currency.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn prices_for_variants(
        &self,
        variant_ids: &[VariantId],
        currency_code: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<PriceRow>, RepositoryError> {
        if variant_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, PriceRow>(
            r"
            SELECT p.variant_id, p.price_list_id, p.amount
            FROM price p
            LEFT JOIN price_list pl ON pl.id = p.price_list_id
            WHERE p.variant_id = ANY($1)
              AND lower(p.currency_code) = lower($2)
              AND p.deleted_at IS NULL
              AND (
                p.price_list_id IS NULL
                OR (
                    pl.deleted_at IS NULL
                    AND pl.status = 'active'
                    AND (pl.starts_at IS NULL OR pl.starts_at <= $3)
                    AND (pl.ends_at IS NULL OR pl.ends_at > $3)
                )
              )
            ",
        )
        .bind(text_array(variant_ids))
        .bind(currency_code)
        .bind(now)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_region(&self, id: &RegionId) -> Result<Option<Region>, RepositoryError> {
        let row = sqlx::query_as::<_, Region>(
            "SELECT id, name, currency_code FROM region WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }

    /// Every price list, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_price_lists(&self) -> Result<Vec<PriceList>, RepositoryError> {
        let rows = sqlx::query_as::<_, PriceList>(
            r"
            SELECT id, title, description, status, starts_at, ends_at
            FROM price_list
            WHERE deleted_at IS NULL
            ORDER BY created_at, id
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Variants carrying a price in the given price list.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn price_list_variant_ids(
        &self,
        price_list_id: &PriceListId,
    ) -> Result<Vec<VariantId>, RepositoryError> {
        let rows = sqlx::query_scalar(
            r"
            SELECT DISTINCT variant_id FROM price
            WHERE price_list_id = $1 AND deleted_at IS NULL
            ",
        )
        .bind(price_list_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }
}
