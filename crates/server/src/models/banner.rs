//! Promotional banners managed from the admin and shown on the storefront.

use chrono::{DateTime, Utc};
use serde::Serialize;

use nextgen_core::{CategoryBannerId, ProductBannerId, SpecialOfferBannerId};

/// Category tile with an image, shown per store vertical (`Ecom`, `Eat`, ...).
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CategoryBanner {
    pub id: CategoryBannerId,
    pub category_image: String,
    pub category_id: String,
    pub category_name: String,
    pub offer_description: String,
    pub button_text: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub banner_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCategoryBanner {
    pub category_image: String,
    pub category_id: String,
    pub category_name: String,
    pub offer_description: String,
    pub button_text: String,
    pub banner_type: String,
}

/// Hero banner linked to a price list by title.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProductBanner {
    pub id: ProductBannerId,
    pub product_banner_image: String,
    pub banner_title: String,
    pub offer_description: String,
    pub button_text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProductBanner {
    pub product_banner_image: String,
    pub banner_title: String,
    pub offer_description: String,
    pub button_text: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SpecialOfferBanner {
    pub id: SpecialOfferBannerId,
    pub offer_banner_image: String,
    pub offer_title: String,
    pub offer_description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSpecialOfferBanner {
    pub offer_banner_image: String,
    pub offer_title: String,
    pub offer_description: String,
}
