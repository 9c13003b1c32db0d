//! Storefront product routes: priced listing and detail with rating and
//! wishlist flags, plus public review listings.

use std::collections::{BTreeMap, HashMap};

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::instrument;

use nextgen_core::{CurrencyCode, Pagination, ProductId, RegionId, WishlistItemId};

use crate::db::CatalogRepository;
use crate::error::{AppError, Result};
use crate::middleware::{ApiQuery, OptionalCustomer};
use crate::models::ProductWithVariants;
use crate::services::reviews::{self, ReviewStats, ReviewSummary};
use crate::services::{offers, wishlists};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/store/products", get(list_products))
        .route("/store/products/review-stats", get(review_stats))
        .route("/store/products/{id}", get(show_product))
        .route("/store/products/{id}/reviews", get(product_reviews))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub region_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegionQuery {
    pub region_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    /// Comma-separated product IDs.
    pub product_ids: Option<String>,
}

/// Whether a product is in the signed-in customer's wishlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WishlistFlags {
    pub is_in_wishlist: bool,
    pub wishlist_item_id: Option<WishlistItemId>,
    pub wishlists_total: i64,
}

impl WishlistFlags {
    fn for_product(
        id: &ProductId,
        saved: &HashMap<ProductId, WishlistItemId>,
        popularity: &HashMap<ProductId, i64>,
    ) -> Self {
        let wishlist_item_id = saved.get(id).cloned();
        Self {
            is_in_wishlist: wishlist_item_id.is_some(),
            wishlist_item_id,
            wishlists_total: popularity.get(id).copied().unwrap_or(0),
        }
    }
}

/// A product as listed on the storefront.
#[derive(Debug, Serialize)]
pub struct ListedProduct {
    #[serde(flatten)]
    pub product: ProductWithVariants,
    pub ratings: ReviewStats,
    #[serde(flatten)]
    pub wishlist: WishlistFlags,
}

const NO_RATINGS: ReviewStats = ReviewStats {
    user_total_reviews: 0,
    avg_rating: 0.0,
};

/// Attach rating stats and wishlist flags to each product.
#[must_use]
pub fn decorate(
    products: Vec<ProductWithVariants>,
    stats: &BTreeMap<ProductId, ReviewStats>,
    saved: &HashMap<ProductId, WishlistItemId>,
    popularity: &HashMap<ProductId, i64>,
) -> Vec<ListedProduct> {
    products
        .into_iter()
        .map(|product| {
            let id = &product.product.id;
            ListedProduct {
                ratings: stats.get(id).copied().unwrap_or(NO_RATINGS),
                wishlist: WishlistFlags::for_product(id, saved, popularity),
                product,
            }
        })
        .collect()
}

/// Parse a comma-separated ID list, skipping blanks.
fn parse_product_ids(raw: &str) -> Vec<ProductId> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(ProductId::new)
        .collect()
}

/// Currency of a region, or `None` if the region is unknown.
async fn region_currency(state: &AppState, region_id: &str) -> Result<Option<String>> {
    Ok(CatalogRepository::new(state.pool())
        .get_region(&RegionId::new(region_id))
        .await?
        .map(|r| r.currency_code)
        .filter(|c| !c.trim().is_empty()))
}

async fn saved_for(
    state: &AppState,
    customer: Option<&nextgen_core::CustomerId>,
) -> Result<HashMap<ProductId, WishlistItemId>> {
    match customer {
        Some(id) => Ok(wishlists::saved_products(state.pool(), id).await?),
        None => Ok(HashMap::new()),
    }
}

/// One page of published products priced in the region's currency.
#[instrument(skip(state, customer))]
async fn list_products(
    OptionalCustomer(customer): OptionalCustomer,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<Value>> {
    let page = Pagination::from_query(query.limit, query.offset)?;

    let currency = match query.region_id.as_deref().filter(|r| !r.trim().is_empty()) {
        Some(region_id) => region_currency(&state, region_id).await?,
        None => None,
    }
    .unwrap_or_else(|| CurrencyCode::gbp().as_str().to_string());

    let (products, _total) = CatalogRepository::new(state.pool())
        .list_published(page)
        .await?;
    let product_ids: Vec<ProductId> = products.iter().map(|p| p.id.clone()).collect();

    let priced = offers::priced_products(state.pool(), products, &currency).await?;
    let stats = reviews::review_stats(state.pool(), &product_ids).await?;
    let popularity = wishlists::products_popularity(state.pool(), &product_ids).await?;
    let saved = saved_for(&state, customer.as_ref()).await?;

    let listed = decorate(priced, &stats, &saved, &popularity);
    Ok(Json(json!({
        "count": listed.len(),
        "products": listed,
        "offset": page.offset,
        "limit": page.limit,
    })))
}

/// One product priced for the required `region_id`.
#[instrument(skip(state, customer))]
async fn show_product(
    OptionalCustomer(customer): OptionalCustomer,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    ApiQuery(query): ApiQuery<RegionQuery>,
) -> Result<Json<Value>> {
    let region_id = query
        .region_id
        .filter(|r| !r.trim().is_empty())
        .ok_or_else(|| {
            AppError::BadRequest("The `region_id` query parameter is required.".to_string())
        })?;
    let currency = region_currency(&state, &region_id)
        .await?
        .ok_or_else(|| AppError::BadRequest(format!("Region not found: {region_id}")))?;

    let products = CatalogRepository::new(state.pool())
        .get_products(std::slice::from_ref(&id))
        .await?;
    let product = offers::priced_products(state.pool(), products, &currency)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    let saved = saved_for(&state, customer.as_ref()).await?;
    let total = wishlists::product_popularity(state.pool(), &id).await?;
    let popularity = HashMap::from([(id.clone(), total)]);
    let flags = WishlistFlags::for_product(&id, &saved, &popularity);

    Ok(Json(json!({
        "product": product,
        "is_in_wishlist": flags.is_in_wishlist,
        "wishlist_item_id": flags.wishlist_item_id,
        "wishlists_total": flags.wishlists_total,
    })))
}

#[instrument(skip(state))]
async fn product_reviews(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<ReviewSummary>> {
    let page = Pagination::from_query(query.limit, query.offset)?;
    let summary = reviews::product_review_summary(state.pool(), &id, page).await?;
    Ok(Json(summary))
}

#[instrument(skip(state))]
async fn review_stats(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<StatsQuery>,
) -> Result<Json<Value>> {
    let ids = query
        .product_ids
        .as_deref()
        .map(parse_product_ids)
        .filter(|ids| !ids.is_empty())
        .ok_or_else(|| AppError::BadRequest("product_ids is required".to_string()))?;

    let stats = reviews::review_stats(state.pool(), &ids).await?;
    Ok(Json(json!({ "stats": stats })))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use serde_json::Value;

    use super::*;
    use crate::models::Product;

    fn product(id: &str) -> ProductWithVariants {
        ProductWithVariants {
            product: Product {
                id: ProductId::new(id),
                title: format!("Product {id}"),
                handle: id.to_string(),
                subtitle: None,
                description: None,
                thumbnail: None,
                status: "published".to_string(),
                metadata: Value::Null,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            variants: Vec::new(),
        }
    }

    #[test]
    fn test_decorate_defaults_without_reviews_or_wishlist() {
        let listed = decorate(
            vec![product("prod_1")],
            &BTreeMap::new(),
            &HashMap::new(),
            &HashMap::new(),
        );
        let json = serde_json::to_value(&listed[0]).unwrap();
        assert_eq!(json["id"], "prod_1");
        assert_eq!(json["ratings"]["user_total_reviews"], 0);
        assert_eq!(json["ratings"]["avg_rating"], 0.0);
        assert_eq!(json["is_in_wishlist"], false);
        assert!(json["wishlist_item_id"].is_null());
        assert_eq!(json["wishlists_total"], 0);
    }

    #[test]
    fn test_decorate_marks_saved_products() {
        let saved = HashMap::from([(ProductId::new("prod_2"), WishlistItemId::new("wli_9"))]);
        let popularity = HashMap::from([(ProductId::new("prod_2"), 4)]);
        let stats = BTreeMap::from([(
            ProductId::new("prod_2"),
            ReviewStats {
                user_total_reviews: 2,
                avg_rating: 4.5,
            },
        )]);

        let listed = decorate(
            vec![product("prod_1"), product("prod_2")],
            &stats,
            &saved,
            &popularity,
        );

        assert!(!listed[0].wishlist.is_in_wishlist);
        assert!(listed[1].wishlist.is_in_wishlist);
        assert_eq!(
            listed[1].wishlist.wishlist_item_id,
            Some(WishlistItemId::new("wli_9"))
        );
        assert_eq!(listed[1].wishlist.wishlists_total, 4);
        assert_eq!(listed[1].ratings.user_total_reviews, 2);
    }

    #[test]
    fn test_parse_product_ids_skips_blanks() {
        let ids = parse_product_ids("prod_1, ,prod_2,");
        assert_eq!(ids, vec![ProductId::new("prod_1"), ProductId::new("prod_2")]);
    }
}
