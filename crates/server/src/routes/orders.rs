//! Order routes: the customer's order history and the payment completion
//! and cancellation flows.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

use nextgen_core::{CustomerId, Pagination};

use crate::db::OrderRepository;
use crate::error::{Result, add_breadcrumb};
use crate::middleware::{ApiJson, ApiQuery, RequireCustomer};
use crate::services::checkout::{self, CancelOrderRequest, CheckoutError, CompleteOrderRequest};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/store/orders", get(list_orders))
        .route("/store/orders/complete", post(complete_order))
        .route("/store/orders/cancel", post(cancel_order))
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// The caller may only act for themselves.
fn ensure_same_customer(authenticated: &CustomerId, claimed: &CustomerId) -> Result<()> {
    if authenticated == claimed {
        Ok(())
    } else {
        Err(CheckoutError::NotOwner("complete").into())
    }
}

#[instrument(skip_all, fields(customer_id = %customer_id))]
async fn list_orders(
    RequireCustomer(customer_id): RequireCustomer,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<Value>> {
    let page = Pagination::from_query(query.limit, query.offset)?;
    let (orders, count) = OrderRepository::new(state.pool())
        .list_for_customer(&customer_id, page)
        .await?;

    Ok(Json(json!({
        "orders": orders,
        "count": count,
        "limit": page.limit,
        "offset": page.offset,
    })))
}

/// Confirm the payment for an order and mark it completed.
#[instrument(skip_all, fields(customer_id = %customer_id))]
async fn complete_order(
    RequireCustomer(customer_id): RequireCustomer,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CompleteOrderRequest>,
) -> Result<Json<Value>> {
    let input = body.validate()?;
    ensure_same_customer(&customer_id, &input.customer_id)?;

    add_breadcrumb(
        "checkout",
        "Completing order",
        &[
            ("order_id", input.order_id.as_str()),
            ("payment_intent_id", &input.payment_intent_id),
        ],
    );

    checkout::complete_order(
        state.stripe(),
        state.ledger(),
        &input,
        &state.config().base_url,
    )
    .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Payment confirmed!",
    })))
}

/// Cancel an order, refunding any over-collected amount.
#[instrument(skip_all, fields(customer_id = %customer_id))]
async fn cancel_order(
    RequireCustomer(customer_id): RequireCustomer,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CancelOrderRequest>,
) -> Result<Json<Value>> {
    let input = body.validate()?;

    add_breadcrumb(
        "checkout",
        "Cancelling order",
        &[("order_id", input.order_id.as_str())],
    );

    let cancellation =
        checkout::cancel_order(state.stripe(), state.ledger(), &input, &customer_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": cancellation.message(),
        "order": cancellation.order,
        "refund": cancellation.refund,
    })))
}
