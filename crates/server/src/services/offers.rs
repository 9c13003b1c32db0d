//! Calculated prices and the products behind promotional price lists.
//!
//! A variant's calculated price is the lowest of its base price and the
//! prices of currently-active price lists in the requested currency. The
//! catalog engine owns the prices; this module only reads them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use moka::future::Cache;
use rust_decimal::Decimal;
use sqlx::PgPool;
use thiserror::Error;

use nextgen_core::{PriceListId, ProductId, VariantId};

use crate::db::{CatalogRepository, RepositoryError};
use crate::models::{
    CalculatedPrice, PriceList, PriceRow, Product, ProductVariant, ProductWithVariants,
    VariantWithPrice,
};

/// Title fragment identifying the daily deals price list.
pub const DEALS_TITLE: &str = "deals of the day";

/// Title fragment identifying the price list behind the special-offer banner.
pub const SPECIAL_OFFER_TITLE: &str = "special offer";

#[derive(Debug, Error)]
pub enum OfferError {
    #[error("No products found in this offer.")]
    NoProducts,

    #[error("No product variants found in this offer.")]
    NoVariants,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Calculated price per variant from raw price rows in one currency.
///
/// Variants without any row are absent. When a variant has only price-list
/// prices, the lowest one also stands in as the original amount.
#[must_use]
pub fn calculate_prices(rows: &[PriceRow], currency_code: &str) -> HashMap<VariantId, CalculatedPrice> {
    let mut base: HashMap<&VariantId, Decimal> = HashMap::new();
    let mut best: HashMap<&VariantId, (Decimal, Option<&PriceListId>)> = HashMap::new();

    for row in rows {
        if row.price_list_id.is_none() {
            base.entry(&row.variant_id)
                .and_modify(|amount| *amount = (*amount).min(row.amount))
                .or_insert(row.amount);
        }
        let candidate = (row.amount, row.price_list_id.as_ref());
        best.entry(&row.variant_id)
            .and_modify(|current| {
                // A price-list price wins a tie so the sale is shown.
                if candidate.0 < current.0 || (candidate.0 == current.0 && candidate.1.is_some()) {
                    *current = candidate;
                }
            })
            .or_insert(candidate);
    }

    best.into_iter()
        .map(|(variant_id, (amount, price_list_id))| {
            let original = base.get(variant_id).copied().unwrap_or(amount);
            (
                variant_id.clone(),
                CalculatedPrice {
                    calculated_amount: amount,
                    original_amount: original,
                    currency_code: currency_code.to_string(),
                    is_calculated_price_price_list: price_list_id.is_some(),
                    price_list_id: price_list_id.cloned(),
                },
            )
        })
        .collect()
}

/// Group variants under their products, attaching calculated prices.
/// Products keep their input order.
#[must_use]
pub fn assemble(
    products: Vec<Product>,
    variants: Vec<ProductVariant>,
    prices: &HashMap<VariantId, CalculatedPrice>,
) -> Vec<ProductWithVariants> {
    let mut by_product: HashMap<ProductId, Vec<VariantWithPrice>> = HashMap::new();
    for variant in variants {
        let calculated_price = prices.get(&variant.id).cloned();
        by_product
            .entry(variant.product_id.clone())
            .or_default()
            .push(VariantWithPrice {
                variant,
                calculated_price,
            });
    }

    products
        .into_iter()
        .map(|product| {
            let variants = by_product.remove(&product.id).unwrap_or_default();
            ProductWithVariants { product, variants }
        })
        .collect()
}

/// Products with their variants priced in `currency_code`, in input order.
///
/// # Errors
///
/// Returns `RepositoryError` if a query fails.
pub async fn priced_products(
    pool: &PgPool,
    products: Vec<Product>,
    currency_code: &str,
) -> Result<Vec<ProductWithVariants>, RepositoryError> {
    let catalog = CatalogRepository::new(pool);
    let product_ids: Vec<ProductId> = products.iter().map(|p| p.id.clone()).collect();
    let variants = catalog.variants_for_products(&product_ids).await?;
    let variant_ids: Vec<VariantId> = variants.iter().map(|v| v.id.clone()).collect();
    let rows = catalog
        .prices_for_variants(&variant_ids, currency_code, Utc::now())
        .await?;

    Ok(assemble(
        products,
        variants,
        &calculate_prices(&rows, currency_code),
    ))
}

/// Price lists read by every banner and deals request, cached for a short
/// time-to-live.
#[derive(Clone)]
pub struct PriceListCache {
    cache: Cache<(), Arc<Vec<PriceList>>>,
}

impl PriceListCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Cache::builder().max_capacity(1).time_to_live(ttl).build(),
        }
    }

    /// All price lists, loaded from the database on a miss.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    pub async fn get(&self, pool: &PgPool) -> Result<Arc<Vec<PriceList>>, RepositoryError> {
        if let Some(lists) = self.cache.get(&()).await {
            return Ok(lists);
        }

        let lists = Arc::new(CatalogRepository::new(pool).list_price_lists().await?);
        self.cache.insert((), Arc::clone(&lists)).await;
        Ok(lists)
    }
}

/// First price list whose title contains `fragment`, ignoring case.
#[must_use]
pub fn find_by_title<'a>(price_lists: &'a [PriceList], fragment: &str) -> Option<&'a PriceList> {
    let needle = fragment.to_lowercase();
    price_lists
        .iter()
        .find(|pl| pl.title.to_lowercase().contains(&needle))
}

/// Priced products carrying a price in the given price list.
///
/// # Errors
///
/// Returns `OfferError::NoVariants` when the list prices nothing, and
/// `OfferError::NoProducts` when none of its variants belong to a live product.
pub async fn price_list_products(
    pool: &PgPool,
    price_list_id: &PriceListId,
    currency_code: &str,
) -> Result<Vec<ProductWithVariants>, OfferError> {
    let catalog = CatalogRepository::new(pool);
    let variant_ids = catalog.price_list_variant_ids(price_list_id).await?;
    if variant_ids.is_empty() {
        return Err(OfferError::NoVariants);
    }

    let products = catalog.products_for_variants(&variant_ids).await?;
    if products.is_empty() {
        return Err(OfferError::NoProducts);
    }

    Ok(priced_products(pool, products, currency_code).await?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use serde_json::json;

    use super::*;

    fn row(variant: &str, list: Option<&str>, amount: &str) -> PriceRow {
        PriceRow {
            variant_id: VariantId::new(variant),
            price_list_id: list.map(PriceListId::new),
            amount: Decimal::from_str(amount).unwrap(),
        }
    }

    fn price_list(id: &str, title: &str) -> PriceList {
        PriceList {
            id: PriceListId::new(id),
            title: title.to_string(),
            description: String::new(),
            status: "active".to_string(),
            starts_at: None,
            ends_at: None,
        }
    }

    fn product(id: &str) -> Product {
        Product {
            id: ProductId::new(id),
            title: id.to_string(),
            handle: id.to_string(),
            subtitle: None,
            description: None,
            thumbnail: None,
            status: "published".to_string(),
            metadata: json!({}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_sale_price_beats_base_price() {
        let prices = calculate_prices(
            &[
                row("variant_1", None, "20.00"),
                row("variant_1", Some("plist_sale"), "15.00"),
                row("variant_2", None, "9.99"),
            ],
            "gbp",
        );

        let sale = prices.get(&VariantId::new("variant_1")).unwrap();
        assert_eq!(sale.calculated_amount, Decimal::from(15));
        assert_eq!(sale.original_amount, Decimal::from(20));
        assert!(sale.is_calculated_price_price_list);
        assert_eq!(sale.price_list_id, Some(PriceListId::new("plist_sale")));

        let plain = prices.get(&VariantId::new("variant_2")).unwrap();
        assert!(!plain.is_calculated_price_price_list);
        assert_eq!(plain.calculated_amount, plain.original_amount);
    }

    #[test]
    fn test_more_expensive_list_price_is_ignored() {
        let prices = calculate_prices(
            &[
                row("variant_1", Some("plist_up"), "25.00"),
                row("variant_1", None, "20.00"),
            ],
            "gbp",
        );
        let price = prices.get(&VariantId::new("variant_1")).unwrap();
        assert_eq!(price.calculated_amount, Decimal::from(20));
        assert_eq!(price.price_list_id, None);
    }

    #[test]
    fn test_list_only_price_is_its_own_original() {
        let prices = calculate_prices(&[row("variant_1", Some("plist_a"), "5")], "eur");
        let price = prices.get(&VariantId::new("variant_1")).unwrap();
        assert_eq!(price.original_amount, Decimal::from(5));
        assert_eq!(price.currency_code, "eur");
    }

    #[test]
    fn test_assemble_groups_variants_in_product_order() {
        let variants = vec![
            ProductVariant {
                id: VariantId::new("variant_b1"),
                product_id: ProductId::new("prod_b"),
                title: "B1".to_string(),
                sku: None,
            },
            ProductVariant {
                id: VariantId::new("variant_a1"),
                product_id: ProductId::new("prod_a"),
                title: "A1".to_string(),
                sku: None,
            },
        ];
        let prices = calculate_prices(&[row("variant_a1", None, "3")], "gbp");
        let assembled = assemble(vec![product("prod_a"), product("prod_b"), product("prod_c")], variants, &prices);

        assert_eq!(assembled.len(), 3);
        let a = assembled.first().unwrap();
        assert_eq!(a.product.id, ProductId::new("prod_a"));
        assert!(a.variants.first().unwrap().calculated_price.is_some());
        assert!(assembled.get(1).unwrap().variants.first().unwrap().calculated_price.is_none());
        assert!(assembled.get(2).unwrap().variants.is_empty());
    }

    #[test]
    fn test_find_by_title_is_case_insensitive_substring() {
        let lists = vec![
            price_list("plist_1", "Summer Sale"),
            price_list("plist_2", "Today's DEALS OF THE DAY"),
        ];
        assert_eq!(find_by_title(&lists, DEALS_TITLE).unwrap().id, PriceListId::new("plist_2"));
        assert_eq!(find_by_title(&lists, "summer").unwrap().id, PriceListId::new("plist_1"));
        assert!(find_by_title(&lists, "winter").is_none());
    }

    #[test]
    fn test_priced_product_serializes_flat() {
        let prices = calculate_prices(&[row("variant_1", None, "12.50")], "gbp");
        let assembled = assemble(
            vec![product("prod_1")],
            vec![ProductVariant {
                id: VariantId::new("variant_1"),
                product_id: ProductId::new("prod_1"),
                title: "Default".to_string(),
                sku: Some("SKU-1".to_string()),
            }],
            &prices,
        );
        let value = serde_json::to_value(&assembled).unwrap();
        assert_eq!(value[0]["id"], "prod_1");
        assert_eq!(value[0]["variants"][0]["sku"], "SKU-1");
        assert_eq!(value[0]["variants"][0]["calculated_price"]["calculated_amount"], "12.50");
    }
}
