//! Review routes: customers rate purchased products, admins read a
//! product's review summary.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

use nextgen_core::{CustomerId, OrderId, Pagination, ProductId, Rating, VariantId};

use crate::db::{OrderRepository, RepositoryError, ReviewRepository};
use crate::error::{AppError, Result};
use crate::middleware::{ApiJson, ApiQuery, RequireAdmin, RequireCustomer};
use crate::models::NewReview;
use crate::services::reviews::{self, ReviewSummary};
use crate::state::AppState;

const DUPLICATE_REVIEW: &str = "You have already submitted a review for this product in this order";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/store/product/order/review-rating", post(create_review))
        .route("/admin/product/review-ratings/{id}", get(admin_review_summary))
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateReviewRequest {
    pub order_id: Option<String>,
    pub product_id: Option<String>,
    pub variant_id: Option<String>,
    pub rating: Option<f64>,
    pub comment: Option<String>,
}

impl CreateReviewRequest {
    /// Validate the body into a review by `customer_id`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a missing field or a rating
    /// outside 1 to 5.
    pub fn into_review(self, customer_id: CustomerId) -> Result<NewReview> {
        let present = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        let (Some(order_id), Some(product_id), Some(variant_id), Some(rating)) = (
            present(self.order_id),
            present(self.product_id),
            present(self.variant_id),
            self.rating,
        ) else {
            return Err(AppError::BadRequest("Missing required fields".to_string()));
        };

        let rating = Rating::new(rating).map_err(|e| AppError::BadRequest(e.to_string()))?;

        Ok(NewReview {
            order_id: OrderId::new(order_id),
            customer_id,
            product_id: ProductId::new(product_id),
            variant_id: VariantId::new(variant_id),
            rating,
            comment: self.comment.unwrap_or_default(),
        })
    }
}

/// Rate a product from one of the customer's orders. One review per order,
/// product and variant.
#[instrument(skip_all, fields(customer_id = %customer_id))]
async fn create_review(
    RequireCustomer(customer_id): RequireCustomer,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateReviewRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    let review = body.into_review(customer_id)?;

    let owned = OrderRepository::new(state.pool())
        .find(&review.order_id)
        .await?
        .is_some_and(|order| order.is_owned_by(&review.customer_id));
    if !owned {
        return Err(AppError::Forbidden(
            "Unauthorized: Order does not belong to the customer".to_string(),
        ));
    }

    let repo = ReviewRepository::new(state.pool());
    let existing = repo
        .find_for_purchase(
            &review.order_id,
            &review.customer_id,
            &review.product_id,
            &review.variant_id,
        )
        .await?;
    if existing.is_some() {
        return Err(AppError::Conflict(DUPLICATE_REVIEW.to_string()));
    }

    let created = repo.create(&review).await.map_err(review_exists)?;
    tracing::info!(review_id = %created.id, "Review created");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Review or Rating submitted successfully",
            "review": created,
        })),
    ))
}

/// The unique index on order, customer, product and variant rejects a
/// second review that raced past the lookup.
fn review_exists(err: RepositoryError) -> AppError {
    match err {
        RepositoryError::Conflict(_) => AppError::Conflict(DUPLICATE_REVIEW.to_string()),
        other => other.into(),
    }
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[instrument(skip(_admin, state))]
async fn admin_review_summary(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<ReviewSummary>> {
    let page = Pagination::from_query(query.limit, query.offset)?;
    Ok(Json(
        reviews::product_review_summary(state.pool(), &id, page).await?,
    ))
}
