//! Customer wishlists: one per customer, one entry per product.
//!
//! The lookups before each insert give the documented error messages; the
//! unique constraints behind `WishlistRepository` catch the races those
//! lookups cannot.

use std::collections::HashMap;

use chrono::{TimeDelta, Utc};
use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;

use nextgen_core::{CustomerId, ItemSort, Pagination, ProductId, RegionId, SortOrder, WishlistItemId};

use super::offers;
use crate::db::{CatalogRepository, CustomerRepository, RepositoryError, WishlistRepository};
use crate::models::{ProductWithVariants, Wishlist, WishlistItem};

/// How far back wishlist additions count towards a product's popularity.
pub const POPULARITY_WINDOW: TimeDelta = TimeDelta::days(30);

#[derive(Debug, Error)]
pub enum WishlistError {
    #[error("Customer not found")]
    CustomerNotFound,

    #[error("No wishlist found for customer")]
    NoWishlist,

    #[error("Customer already has a wishlist")]
    AlreadyExists,

    #[error("Invalid region or missing currency_code")]
    InvalidRegion,

    #[error("Product not found. Please check if the provided product ID is correct.")]
    ProductNotFound,

    #[error("This product is already in the wishlist")]
    AlreadyInWishlist,

    #[error("Wishlist item not found")]
    ItemNotFound,

    #[error("Associated wishlist not found")]
    WishlistNotFound,

    #[error("You do not have permission to delete this wishlist item")]
    NotOwner,

    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for WishlistError {
    fn from(err: RepositoryError) -> Self {
        Self::Repository(err)
    }
}

/// A wishlist item with its product, priced for the requested region.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichedItem {
    #[serde(flatten)]
    pub item: WishlistItem,
    pub product: Option<ProductWithVariants>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WishlistView<T> {
    #[serde(flatten)]
    pub wishlist: Wishlist,
    pub items: Vec<T>,
}

/// One page of a wishlist plus the total number of items in it.
#[derive(Debug, Clone, Serialize)]
pub struct WishlistPage {
    pub wishlist: WishlistView<EnrichedItem>,
    pub count: usize,
}

/// Sort items by the requested timestamp and cut out one page.
#[must_use]
pub fn sort_and_paginate(
    mut items: Vec<WishlistItem>,
    sort: ItemSort,
    page: Pagination,
) -> Vec<WishlistItem> {
    items.sort_by(|a, b| {
        let ordering = a.timestamp(sort.field).cmp(&b.timestamp(sort.field));
        match sort.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
    page.slice(&items).to_vec()
}

/// Pair each item with its product; items whose product is gone keep a
/// `null` product.
#[must_use]
pub fn enrich(
    items: Vec<WishlistItem>,
    products: &HashMap<ProductId, ProductWithVariants>,
) -> Vec<EnrichedItem> {
    items
        .into_iter()
        .map(|item| {
            let product = products.get(&item.product_id).cloned();
            EnrichedItem { item, product }
        })
        .collect()
}

/// Load one page of a customer's wishlist with products priced in the
/// region's currency.
///
/// # Errors
///
/// Returns `WishlistError` if the customer, wishlist or region is missing.
pub async fn customer_wishlist(
    pool: &PgPool,
    customer_id: &CustomerId,
    region_id: &RegionId,
    sort: ItemSort,
    page: Pagination,
) -> Result<WishlistPage, WishlistError> {
    if CustomerRepository::new(pool).get(customer_id).await?.is_none() {
        return Err(WishlistError::CustomerNotFound);
    }

    let repo = WishlistRepository::new(pool);
    let wishlist = repo
        .find_by_customer(customer_id)
        .await?
        .ok_or(WishlistError::NoWishlist)?;
    let items = repo.list_items(&wishlist.id).await?;
    let count = items.len();

    let empty = |wishlist| WishlistPage {
        wishlist: WishlistView {
            wishlist,
            items: Vec::new(),
        },
        count,
    };
    if items.is_empty() {
        return Ok(empty(wishlist));
    }

    let catalog = CatalogRepository::new(pool);
    let region = catalog
        .get_region(region_id)
        .await?
        .filter(|r| !r.currency_code.trim().is_empty())
        .ok_or(WishlistError::InvalidRegion)?;

    let page_items = sort_and_paginate(items, sort, page);
    if page_items.is_empty() {
        return Ok(empty(wishlist));
    }

    let product_ids: Vec<ProductId> = page_items.iter().map(|i| i.product_id.clone()).collect();
    let products = catalog.get_products(&product_ids).await?;
    let priced = offers::priced_products(pool, products, &region.currency_code)
        .await?
        .into_iter()
        .map(|p| (p.product.id.clone(), p))
        .collect();

    Ok(WishlistPage {
        wishlist: WishlistView {
            wishlist,
            items: enrich(page_items, &priced),
        },
        count,
    })
}

/// A unique violation on insert means a concurrent request created the
/// customer's wishlist first.
fn wishlist_exists(err: RepositoryError) -> WishlistError {
    match err {
        RepositoryError::Conflict(_) => WishlistError::AlreadyExists,
        other => other.into(),
    }
}

fn item_exists(err: RepositoryError) -> WishlistError {
    match err {
        RepositoryError::Conflict(_) => WishlistError::AlreadyInWishlist,
        other => other.into(),
    }
}

/// # Errors
///
/// Returns `WishlistError::AlreadyExists` if the customer has a wishlist.
pub async fn create_wishlist(
    pool: &PgPool,
    customer_id: &CustomerId,
) -> Result<Wishlist, WishlistError> {
    if CustomerRepository::new(pool).get(customer_id).await?.is_none() {
        return Err(WishlistError::CustomerNotFound);
    }

    let repo = WishlistRepository::new(pool);
    if repo.find_by_customer(customer_id).await?.is_some() {
        return Err(WishlistError::AlreadyExists);
    }

    let wishlist = repo.create(customer_id).await.map_err(wishlist_exists)?;
    tracing::info!(wishlist_id = %wishlist.id, "Wishlist created");
    Ok(wishlist)
}

/// Add a product and return the wishlist with all its items.
///
/// # Errors
///
/// Returns `WishlistError` if there is no wishlist, the product does not
/// exist, or it is already in the wishlist.
pub async fn add_item(
    pool: &PgPool,
    customer_id: &CustomerId,
    product_id: &ProductId,
) -> Result<WishlistView<WishlistItem>, WishlistError> {
    let repo = WishlistRepository::new(pool);
    let wishlist = repo
        .find_by_customer(customer_id)
        .await?
        .ok_or(WishlistError::NoWishlist)?;

    if !CatalogRepository::new(pool).product_exists(product_id).await? {
        return Err(WishlistError::ProductNotFound);
    }

    let items = repo.list_items(&wishlist.id).await?;
    if items.iter().any(|i| &i.product_id == product_id) {
        return Err(WishlistError::AlreadyInWishlist);
    }

    repo.add_item(&wishlist.id, product_id)
        .await
        .map_err(item_exists)?;

    let items = repo.list_items(&wishlist.id).await?;
    Ok(WishlistView { wishlist, items })
}

/// Remove an item the customer owns. Removing the last item deletes the
/// wishlist as well.
///
/// # Errors
///
/// Returns `WishlistError` if the item or wishlist is missing or belongs to
/// another customer.
pub async fn delete_item(
    pool: &PgPool,
    customer_id: &CustomerId,
    item_id: &WishlistItemId,
) -> Result<WishlistItem, WishlistError> {
    let repo = WishlistRepository::new(pool);
    let item = repo
        .find_item(item_id)
        .await?
        .ok_or(WishlistError::ItemNotFound)?;
    let wishlist = repo
        .find_by_id(&item.wishlist_id)
        .await?
        .ok_or(WishlistError::WishlistNotFound)?;

    if &wishlist.customer_id != customer_id {
        return Err(WishlistError::NotOwner);
    }

    let pruned = repo
        .delete_item_and_prune(item_id, &wishlist.id)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => WishlistError::ItemNotFound,
            other => other.into(),
        })?;
    tracing::info!(%item_id, pruned, "Wishlist item deleted");
    Ok(item)
}

/// Number of wishlist entries for a product added within the popularity window.
///
/// # Errors
///
/// Returns `RepositoryError` if the query fails.
pub async fn product_popularity(
    pool: &PgPool,
    product_id: &ProductId,
) -> Result<i64, RepositoryError> {
    WishlistRepository::new(pool)
        .count_product_since(product_id, Utc::now() - POPULARITY_WINDOW)
        .await
}

/// Popularity for several products; products nobody saved are absent.
///
/// # Errors
///
/// Returns `RepositoryError` if the query fails.
pub async fn products_popularity(
    pool: &PgPool,
    product_ids: &[ProductId],
) -> Result<HashMap<ProductId, i64>, RepositoryError> {
    WishlistRepository::new(pool)
        .count_products_since(product_ids, Utc::now() - POPULARITY_WINDOW)
        .await
}

/// The customer's wishlist entries keyed by product, for flagging products
/// in listings. Empty when the customer has no wishlist.
///
/// # Errors
///
/// Returns `RepositoryError` if a query fails.
pub async fn saved_products(
    pool: &PgPool,
    customer_id: &CustomerId,
) -> Result<HashMap<ProductId, WishlistItemId>, RepositoryError> {
    let repo = WishlistRepository::new(pool);
    let Some(wishlist) = repo.find_by_customer(customer_id).await? else {
        return Ok(HashMap::new());
    };
    Ok(repo
        .list_items(&wishlist.id)
        .await?
        .into_iter()
        .map(|item| (item.product_id, item.id))
        .collect())
}
