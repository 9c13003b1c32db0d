//! Wishlist routes for the signed-in customer, and the admin popularity
//! count for a product.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

use nextgen_core::{ItemSort, Pagination, ProductId, RegionId, WishlistItemId};

use crate::db::CatalogRepository;
use crate::error::{AppError, Result};
use crate::middleware::{ApiJson, ApiQuery, RequireAdmin, RequireCustomer};
use crate::services::wishlists;
use crate::state::AppState;

const DEFAULT_SORT: &str = "created_at:desc";

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/store/customers/me/wishlists",
            get(show_wishlist).post(create_wishlist),
        )
        .route("/store/customers/me/wishlists/items", post(add_item))
        .route(
            "/store/customers/me/wishlists/items/{id}",
            delete(delete_item),
        )
        .route("/admin/product/wishlists/{id}", get(product_popularity))
}

#[derive(Debug, Deserialize)]
pub struct WishlistQuery {
    pub region_id: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub sort: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: Option<String>,
}

fn success(message: &str) -> Json<Value> {
    Json(json!({ "message": message, "type": "success" }))
}

/// One page of the customer's wishlist, priced for `region_id`.
#[instrument(skip_all, fields(customer_id = %customer_id))]
async fn show_wishlist(
    RequireCustomer(customer_id): RequireCustomer,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<WishlistQuery>,
) -> Result<Json<Value>> {
    let region_id = query
        .region_id
        .filter(|r| !r.trim().is_empty())
        .map(RegionId::new)
        .ok_or_else(|| AppError::BadRequest("Missing region_id in query".to_string()))?;
    let page = Pagination::from_query(query.limit, query.offset)?;
    let sort = ItemSort::parse(query.sort.as_deref().unwrap_or(DEFAULT_SORT))?;

    let result =
        wishlists::customer_wishlist(state.pool(), &customer_id, &region_id, sort, page).await?;

    Ok(Json(json!({
        "wishlist": result.wishlist,
        "count": result.count,
        "offset": page.offset,
        "limit": page.limit,
    })))
}

#[instrument(skip_all, fields(customer_id = %customer_id))]
async fn create_wishlist(
    RequireCustomer(customer_id): RequireCustomer,
    State(state): State<AppState>,
) -> Result<Json<Value>> {
    wishlists::create_wishlist(state.pool(), &customer_id).await?;
    Ok(success("Wishlist created successfully"))
}

#[instrument(skip_all, fields(customer_id = %customer_id))]
async fn add_item(
    RequireCustomer(customer_id): RequireCustomer,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<AddItemRequest>,
) -> Result<Json<Value>> {
    let product_id = body
        .product_id
        .filter(|p| !p.trim().is_empty())
        .map(ProductId::new)
        .ok_or_else(|| AppError::BadRequest("The 'product_id' field is required.".to_string()))?;

    let wishlist = wishlists::add_item(state.pool(), &customer_id, &product_id).await?;
    tracing::info!(wishlist_id = %wishlist.wishlist.id, %product_id, "Wishlist item added");
    Ok(success("Wishlist item added successfully"))
}

#[instrument(skip_all, fields(customer_id = %customer_id))]
async fn delete_item(
    RequireCustomer(customer_id): RequireCustomer,
    State(state): State<AppState>,
    Path(id): Path<WishlistItemId>,
) -> Result<Json<Value>> {
    wishlists::delete_item(state.pool(), &customer_id, &id).await?;
    Ok(success("Wishlist item deleted successfully"))
}

/// How many wishlists saved the product within the popularity window.
#[instrument(skip(_admin, state))]
async fn product_popularity(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Value>> {
    if !CatalogRepository::new(state.pool())
        .product_exists(&id)
        .await?
    {
        return Err(AppError::NotFound("Product not found".to_string()));
    }

    let count = wishlists::product_popularity(state.pool(), &id).await?;
    Ok(Json(json!({
        "product_id": id,
        "count": count,
        "message": popularity_message(count),
    })))
}

fn popularity_message(count: i64) -> String {
    format!("This product is in {count} wishlist(s) for the past 30 days.")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use nextgen_core::{SortField, SortOrder};

    use super::*;

    #[test]
    fn test_default_sort_is_newest_first() {
        let sort = ItemSort::parse(DEFAULT_SORT).unwrap();
        assert_eq!(sort.field, SortField::CreatedAt);
        assert_eq!(sort.order, SortOrder::Desc);
    }

    #[test]
    fn test_popularity_message() {
        assert_eq!(
            popularity_message(3),
            "This product is in 3 wishlist(s) for the past 30 days."
        );
    }

    #[test]
    fn test_success_body() {
        let Json(body) = success("Wishlist created successfully");
        assert_eq!(body["type"], "success");
        assert_eq!(body["message"], "Wishlist created successfully");
    }
}
