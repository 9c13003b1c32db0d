//! Banner repository: category, product and special-offer banners.

use sqlx::PgPool;

use nextgen_core::{CategoryBannerId, ProductBannerId, SpecialOfferBannerId};

use super::RepositoryError;
use crate::models::{
    CategoryBanner, NewCategoryBanner, NewProductBanner, NewSpecialOfferBanner, ProductBanner,
    SpecialOfferBanner,
};

/// Repository for banner database operations.
pub struct BannerRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> BannerRepository<'a> {
    /// Create a new banner repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Category banners
    // =========================================================================

    /// Insert a category banner.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create_category(
        &self,
        banner: &NewCategoryBanner,
    ) -> Result<CategoryBanner, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryBanner>(
            r"
            INSERT INTO category_banner
                (id, category_image, category_id, category_name, offer_description, button_text, type)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            ",
        )
        .bind(CategoryBannerId::generate())
        .bind(&banner.category_image)
        .bind(&banner.category_id)
        .bind(&banner.category_name)
        .bind(&banner.offer_description)
        .bind(&banner.button_text)
        .bind(&banner.banner_type)
        .fetch_one(self.pool)
        .await?;

        Ok(row)
    }

    /// List category banners, newest first. `None` lists every type.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_categories(
        &self,
        banner_type: Option<&str>,
    ) -> Result<Vec<CategoryBanner>, RepositoryError> {
        let rows = sqlx::query_as::<_, CategoryBanner>(
            r"
            SELECT * FROM category_banner
            WHERE ($1::text IS NULL OR type = $1)
            ORDER BY created_at DESC
            ",
        )
        .bind(banner_type)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Delete a category banner and return it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no banner has this ID.
    pub async fn delete_category(
        &self,
        id: &CategoryBannerId,
    ) -> Result<CategoryBanner, RepositoryError> {
        sqlx::query_as::<_, CategoryBanner>("DELETE FROM category_banner WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    // =========================================================================
    // Product banners
    // =========================================================================

    /// Insert a product banner.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create_product(
        &self,
        banner: &NewProductBanner,
    ) -> Result<ProductBanner, RepositoryError> {
        let row = sqlx::query_as::<_, ProductBanner>(
            r"
            INSERT INTO product_banner
                (id, product_banner_image, banner_title, offer_description, button_text)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            ",
        )
        .bind(ProductBannerId::generate())
        .bind(&banner.product_banner_image)
        .bind(&banner.banner_title)
        .bind(&banner.offer_description)
        .bind(&banner.button_text)
        .fetch_one(self.pool)
        .await?;

        Ok(row)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_products(&self) -> Result<Vec<ProductBanner>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductBanner>(
            "SELECT * FROM product_banner ORDER BY created_at DESC",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no banner has this ID.
    pub async fn delete_product(
        &self,
        id: &ProductBannerId,
    ) -> Result<ProductBanner, RepositoryError> {
        sqlx::query_as::<_, ProductBanner>("DELETE FROM product_banner WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    // =========================================================================
    // Special-offer banners
    // =========================================================================

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create_special_offer(
        &self,
        banner: &NewSpecialOfferBanner,
    ) -> Result<SpecialOfferBanner, RepositoryError> {
        let row = sqlx::query_as::<_, SpecialOfferBanner>(
            r"
            INSERT INTO special_offers_banner
                (id, offer_banner_image, offer_title, offer_description)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            ",
        )
        .bind(SpecialOfferBannerId::generate())
        .bind(&banner.offer_banner_image)
        .bind(&banner.offer_title)
        .bind(&banner.offer_description)
        .fetch_one(self.pool)
        .await?;

        Ok(row)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_special_offers(&self) -> Result<Vec<SpecialOfferBanner>, RepositoryError> {
        let rows = sqlx::query_as::<_, SpecialOfferBanner>(
            "SELECT * FROM special_offers_banner ORDER BY created_at DESC",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no banner has this ID.
    pub async fn delete_special_offer(
        &self,
        id: &SpecialOfferBannerId,
    ) -> Result<SpecialOfferBanner, RepositoryError> {
        sqlx::query_as::<_, SpecialOfferBanner>(
            "DELETE FROM special_offers_banner WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }
}
