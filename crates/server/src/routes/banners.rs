//! Banner routes: admin management with image upload, storefront listings
//! enriched with price-list products, and the deals of the day.

use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    routing::{delete, get},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::instrument;

use nextgen_core::{CategoryBannerId, ProductBannerId, SpecialOfferBannerId};

use super::uploads::UploadForm;
use crate::db::{BannerRepository, RepositoryError};
use crate::error::{AppError, Result};
use crate::middleware::{ApiQuery, RequireAdmin};
use crate::models::{
    CategoryBanner, NewCategoryBanner, NewProductBanner, NewSpecialOfferBanner, PriceList,
    ProductBanner, ProductWithVariants, SpecialOfferBanner,
};
use crate::services::OfferError;
use crate::services::offers::{self, DEALS_TITLE, SPECIAL_OFFER_TITLE};
use crate::services::storage::UploadFolder;
use crate::state::AppState;

/// Category banner type returned when the caller does not ask for one.
const DEFAULT_CATEGORY_TYPE: &str = "Ecom";

/// Pseudo-type that lists every category banner.
const ALL_CATEGORY_TYPES: &str = "All";

pub fn router() -> Router<AppState> {
    Router::new()
        // Storefront
        .route("/store/category_banner", get(list_category_banners))
        .route("/store/product_banner", get(store_product_banners))
        .route("/store/special_offers_banner", get(store_special_offer))
        .route("/store/deals", get(deals_of_the_day))
        // Admin
        .route(
            "/admin/category_banner",
            get(admin_list_category_banners).post(create_category_banner),
        )
        .route("/admin/category_banner/{id}", delete(delete_category_banner))
        .route(
            "/admin/product_banner",
            get(admin_list_product_banners).post(create_product_banner),
        )
        .route("/admin/product_banner/{id}", delete(delete_product_banner))
        .route(
            "/admin/special_offers_banner",
            get(admin_list_special_offers).post(create_special_offer),
        )
        .route(
            "/admin/special_offers_banner/{id}",
            delete(delete_special_offer),
        )
}

#[derive(Debug, Deserialize)]
pub struct CategoryQuery {
    #[serde(rename = "type")]
    pub banner_type: Option<String>,
}

/// Type filter for a category listing: `None` lists every type.
fn category_filter(requested: Option<&str>) -> Option<&str> {
    match requested.map(str::trim).filter(|t| !t.is_empty()) {
        Some(ALL_CATEGORY_TYPES) => None,
        Some(t) => Some(t),
        None => Some(DEFAULT_CATEGORY_TYPE),
    }
}

async fn category_banners(state: &AppState, query: &CategoryQuery) -> Result<Vec<CategoryBanner>> {
    Ok(BannerRepository::new(state.pool())
        .list_categories(category_filter(query.banner_type.as_deref()))
        .await?)
}

/// Products of a price list, treating a list without products as empty.
async fn products_or_empty(
    state: &AppState,
    price_list: &PriceList,
) -> Result<Vec<ProductWithVariants>> {
    match offers::price_list_products(
        state.pool(),
        &price_list.id,
        state.config().payment_currency.as_str(),
    )
    .await
    {
        Ok(products) => Ok(products),
        Err(OfferError::NoProducts | OfferError::NoVariants) => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

// =============================================================================
// Storefront
// =============================================================================

#[instrument(skip(state))]
async fn list_category_banners(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CategoryQuery>,
) -> Result<Json<Value>> {
    let banners = category_banners(&state, &query).await?;
    Ok(Json(json!({ "banners": banners })))
}

#[derive(Debug, Serialize)]
struct BannerWithProducts {
    #[serde(flatten)]
    banner: ProductBanner,
    products: Vec<ProductWithVariants>,
}

/// Product banners, each with the products of the price list whose title
/// contains the banner title.
#[instrument(skip_all)]
async fn store_product_banners(State(state): State<AppState>) -> Result<Json<Value>> {
    let banners = BannerRepository::new(state.pool()).list_products().await?;
    if banners.is_empty() {
        return Err(AppError::NotFound("No banners available.".to_string()));
    }

    let price_lists = state.price_lists().get(state.pool()).await?;

    let mut enriched = Vec::with_capacity(banners.len());
    for banner in banners {
        let products = match offers::find_by_title(&price_lists, &banner.banner_title) {
            Some(price_list) => products_or_empty(&state, price_list).await?,
            None => Vec::new(),
        };
        enriched.push(BannerWithProducts { banner, products });
    }

    Ok(Json(json!({ "banners": enriched })))
}

/// The newest special-offer banner with the products on special offer.
#[instrument(skip_all)]
async fn store_special_offer(State(state): State<AppState>) -> Result<Json<Value>> {
    let banner = BannerRepository::new(state.pool())
        .list_special_offers()
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::NotFound("No banners available.".to_string()))?;

    let price_lists = state.price_lists().get(state.pool()).await?;
    let offer = offers::find_by_title(&price_lists, SPECIAL_OFFER_TITLE)
        .ok_or_else(|| AppError::NotFound("No offers available.".to_string()))?;

    let products = offers::price_list_products(
        state.pool(),
        &offer.id,
        state.config().payment_currency.as_str(),
    )
    .await?;

    Ok(Json(json!({
        "banner": banner,
        "metadata": {
            "starts_at": offer.starts_at,
            "ends_at": offer.ends_at,
        },
        "products": products,
    })))
}

#[instrument(skip_all)]
async fn deals_of_the_day(State(state): State<AppState>) -> Result<Json<Value>> {
    let price_lists = state.price_lists().get(state.pool()).await?;
    let deal = offers::find_by_title(&price_lists, DEALS_TITLE)
        .ok_or_else(|| AppError::NotFound("No deals available today.".to_string()))?;

    let products = offers::price_list_products(
        state.pool(),
        &deal.id,
        state.config().payment_currency.as_str(),
    )
    .await?;

    Ok(Json(json!({ "deal": deal, "products": products })))
}

// =============================================================================
// Admin
// =============================================================================

#[instrument(skip(_admin, state))]
async fn admin_list_category_banners(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CategoryQuery>,
) -> Result<Json<Value>> {
    let banners = category_banners(&state, &query).await?;
    Ok(Json(json!({ "banners": banners })))
}

/// Create a category banner from a multipart form with a
/// `categoryBannerImage` file.
#[instrument(skip_all)]
async fn create_category_banner(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<CategoryBanner>> {
    let mut form = UploadForm::read(multipart, "categoryBannerImage").await?;
    let file = form
        .file
        .take()
        .ok_or_else(|| AppError::BadRequest("No file uploaded".to_string()))?;
    let image_url = file.store(&state, UploadFolder::CategoryBanner).await?;

    let banner_type = Some(form.text("type"))
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_CATEGORY_TYPE.to_string());
    let banner = BannerRepository::new(state.pool())
        .create_category(&NewCategoryBanner {
            category_image: image_url,
            category_id: form.text("categoryId"),
            category_name: form.text("category_name"),
            offer_description: form.text("offer_description"),
            button_text: form.text("button_text"),
            banner_type,
        })
        .await?;

    tracing::info!(banner_id = %banner.id, "Category banner created");
    Ok(Json(banner))
}

#[instrument(skip(_admin, state))]
async fn delete_category_banner(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<CategoryBannerId>,
) -> Result<Json<Value>> {
    let deleted = BannerRepository::new(state.pool())
        .delete_category(&id)
        .await
        .map_err(|e| not_found_as(e, "category banner not found"))?;

    Ok(Json(json!({
        "message": "Category banner deleted successfully",
        "deletedbanner": deleted,
    })))
}

#[instrument(skip_all)]
async fn admin_list_product_banners(
    _admin: RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Value>> {
    let banners = BannerRepository::new(state.pool()).list_products().await?;
    Ok(Json(json!({ "banners": banners })))
}

#[instrument(skip_all)]
async fn create_product_banner(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ProductBanner>> {
    let mut form = UploadForm::read(multipart, "productBannerImage").await?;
    let file = form
        .file
        .take()
        .ok_or_else(|| AppError::BadRequest("No file received".to_string()))?;
    let image_url = file.store(&state, UploadFolder::ProductBanner).await?;

    let banner = BannerRepository::new(state.pool())
        .create_product(&NewProductBanner {
            product_banner_image: image_url,
            banner_title: form.text("banner_title"),
            offer_description: form.text("offer_description"),
            button_text: form.text("button_text"),
        })
        .await?;

    tracing::info!(banner_id = %banner.id, "Product banner created");
    Ok(Json(banner))
}

#[instrument(skip(_admin, state))]
async fn delete_product_banner(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ProductBannerId>,
) -> Result<Json<Value>> {
    let deleted = BannerRepository::new(state.pool())
        .delete_product(&id)
        .await
        .map_err(|e| not_found_as(e, "product banner not found"))?;

    Ok(Json(json!({
        "message": "Product banner deleted successfully",
        "deletedbanner": deleted,
    })))
}

#[instrument(skip_all)]
async fn admin_list_special_offers(
    _admin: RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Value>> {
    let banners = BannerRepository::new(state.pool())
        .list_special_offers()
        .await?;
    Ok(Json(json!({ "banners": banners })))
}

#[instrument(skip_all)]
async fn create_special_offer(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<SpecialOfferBanner>> {
    let mut form = UploadForm::read(multipart, "specialOfferBannerImage").await?;
    let file = form
        .file
        .take()
        .ok_or_else(|| AppError::BadRequest("No file received".to_string()))?;
    let image_url = file.store(&state, UploadFolder::SpecialOfferBanner).await?;

    let banner = BannerRepository::new(state.pool())
        .create_special_offer(&NewSpecialOfferBanner {
            offer_banner_image: image_url,
            offer_title: form.text("offer_title"),
            offer_description: form.text("offer_description"),
        })
        .await?;

    tracing::info!(banner_id = %banner.id, "Special offer banner created");
    Ok(Json(banner))
}

#[instrument(skip(_admin, state))]
async fn delete_special_offer(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<SpecialOfferBannerId>,
) -> Result<Json<Value>> {
    let deleted = BannerRepository::new(state.pool())
        .delete_special_offer(&id)
        .await
        .map_err(|e| not_found_as(e, "special offer banner not found"))?;

    Ok(Json(json!({
        "message": "Special offer banner deleted successfully",
        "deletedbanner": deleted,
    })))
}

fn not_found_as(err: RepositoryError, message: &str) -> AppError {
    match err {
        RepositoryError::NotFound => AppError::NotFound(message.to_string()),
        other => other.into(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::StatusCode;

    use super::*;

    #[test]
    fn test_category_filter_defaults_to_ecom() {
        assert_eq!(category_filter(None), Some("Ecom"));
        assert_eq!(category_filter(Some("  ")), Some("Ecom"));
    }

    #[test]
    fn test_category_filter_all_lists_every_type() {
        assert_eq!(category_filter(Some("All")), None);
        assert_eq!(category_filter(Some("Eat")), Some("Eat"));
    }

    #[test]
    fn test_not_found_keeps_banner_message() {
        let err = not_found_as(RepositoryError::NotFound, "category banner not found");
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.client_message(), "category banner not found");

        let err = not_found_as(RepositoryError::Conflict("dup".to_string()), "unused");
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }
}
