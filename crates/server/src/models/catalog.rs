//! Product catalog and pricing read models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;

use nextgen_core::{PriceListId, ProductId, RegionId, VariantId};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    pub handle: String,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub status: String,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProductVariant {
    pub id: VariantId,
    pub product_id: ProductId,
    pub title: String,
    pub sku: Option<String>,
}

/// One stored price: a base price when `price_list_id` is `None`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PriceRow {
    pub variant_id: VariantId,
    pub price_list_id: Option<PriceListId>,
    pub amount: Decimal,
}

/// The price a customer pays for a variant in one currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalculatedPrice {
    pub calculated_amount: Decimal,
    pub original_amount: Decimal,
    pub currency_code: String,
    pub is_calculated_price_price_list: bool,
    pub price_list_id: Option<PriceListId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VariantWithPrice {
    #[serde(flatten)]
    pub variant: ProductVariant,
    pub calculated_price: Option<CalculatedPrice>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductWithVariants {
    #[serde(flatten)]
    pub product: Product,
    pub variants: Vec<VariantWithPrice>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Region {
    pub id: RegionId,
    pub name: String,
    pub currency_code: String,
}

/// A named promotion applying sale prices to a set of variants.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PriceList {
    pub id: PriceListId,
    pub title: String,
    pub description: String,
    pub status: String,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}
