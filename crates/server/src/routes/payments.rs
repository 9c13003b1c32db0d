//! Payment routes: payment intents for a cart and the customer's saved
//! cards, which live with the payment processor.

use std::collections::BTreeMap;

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

use nextgen_core::{CartId, CustomerId, Pagination, to_minor_units};

use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::{ApiJson, ApiQuery, RequireCustomer};
use crate::services::stripe::{CardKind, CardUpdate, NewPaymentIntent, StripeCard};
use crate::state::AppState;

/// Pay method handled by the processor; other methods need no intent.
const STRIPE_PAY_METHOD: &str = "stripe";

/// Largest page the processor returns.
const PROVIDER_PAGE_LIMIT: u32 = 100;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/store/carts/{id}/payment-intent", post(create_payment_intent))
        .route(
            "/store/payment-card",
            get(list_payment_methods).post(add_card),
        )
        .route(
            "/store/payment-card/me",
            get(list_saved_cards)
                .delete(delete_card)
                .patch(update_card),
        )
}

// =============================================================================
// Payment intents
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentRequest {
    pub user_id: Option<String>,
    pub pay_method: Option<String>,
    pub total_amount: Option<Decimal>,
}

#[derive(Debug)]
struct IntentInput {
    customer_id: CustomerId,
    pay_method: String,
    total_amount: Decimal,
}

impl PaymentIntentRequest {
    fn validate(self) -> Result<IntentInput> {
        let missing = || AppError::BadRequest("Missing required fields".to_string());
        let user_id = self.user_id.filter(|u| !u.trim().is_empty()).ok_or_else(missing)?;
        let pay_method = self
            .pay_method
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(missing)?;
        let total_amount = self
            .total_amount
            .filter(|a| !a.is_zero())
            .ok_or_else(missing)?;

        Ok(IntentInput {
            customer_id: CustomerId::new(user_id),
            pay_method,
            total_amount,
        })
    }
}

/// Create a payment intent for the cart total. Pay methods other than
/// `stripe` get null intent fields.
#[instrument(skip_all, fields(customer_id = %customer_id, cart_id = %cart_id))]
async fn create_payment_intent(
    RequireCustomer(customer_id): RequireCustomer,
    State(state): State<AppState>,
    Path(cart_id): Path<CartId>,
    ApiJson(body): ApiJson<PaymentIntentRequest>,
) -> Result<Json<Value>> {
    let input = body.validate()?;
    if input.customer_id != customer_id {
        return Err(AppError::Forbidden(
            "You are not authorized to pay for this cart.".to_string(),
        ));
    }

    if input.pay_method != STRIPE_PAY_METHOD {
        return Ok(Json(json!({
            "stripeClientSecret": null,
            "stripePaymentIntentId": null,
        })));
    }

    let currency = &state.config().payment_currency;
    let amount = to_minor_units(input.total_amount, currency)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    add_breadcrumb(
        "payment",
        "Creating payment intent",
        &[("cart_id", cart_id.as_str())],
    );

    let stripe_customer = state
        .stripe()
        .get_or_create_customer(customer_id.as_str())
        .await?;
    let intent = state
        .stripe()
        .create_payment_intent(&NewPaymentIntent {
            amount,
            currency: currency.as_str(),
            customer: Some(stripe_customer.id.as_str()),
            metadata: BTreeMap::from([
                ("cartId".to_string(), cart_id.to_string()),
                ("userId".to_string(), customer_id.to_string()),
            ]),
        })
        .await?;

    Ok(Json(json!({
        "stripeClientSecret": intent.client_secret,
        "stripePaymentIntentId": intent.id,
    })))
}

// =============================================================================
// Saved cards
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Card sources are paged by cursor: `offset` is the last card ID seen.
#[derive(Debug, Deserialize)]
pub struct CursorQuery {
    pub limit: Option<u32>,
    pub offset: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCardRequest {
    pub card_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteCardRequest {
    pub card_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCardRequest {
    #[serde(rename = "cardId")]
    pub card_id: Option<String>,
    #[serde(rename = "paymentMethodId")]
    pub payment_method_id: Option<String>,
    #[serde(flatten)]
    pub update: CardUpdate,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn contains_card(cards: &[StripeCard], id: &str) -> bool {
    cards.iter().any(|card| card.id == id)
}

async fn owns_payment_method(state: &AppState, customer_id: &CustomerId, id: &str) -> Result<bool> {
    let methods = state
        .stripe()
        .list_payment_methods(customer_id.as_str(), PROVIDER_PAGE_LIMIT)
        .await?;
    Ok(contains_card(&methods.data, id))
}

/// The customer's card payment methods.
#[instrument(skip_all, fields(customer_id = %customer_id))]
async fn list_payment_methods(
    RequireCustomer(customer_id): RequireCustomer,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<Value>> {
    let page = Pagination::from_query(query.limit, query.offset)?;
    let fetch = page
        .offset
        .saturating_add(page.limit)
        .min(PROVIDER_PAGE_LIMIT);
    let methods = state
        .stripe()
        .list_payment_methods(customer_id.as_str(), fetch)
        .await?;
    let data = page.slice(&methods.data);

    Ok(Json(json!({
        "data": data,
        "count": data.len(),
        "offset": page.offset,
        "limit": page.limit,
        "url": format!("/v1/customers/{customer_id}/payment-methods"),
    })))
}

/// Save a tokenized card on the customer.
#[instrument(skip_all, fields(customer_id = %customer_id))]
async fn add_card(
    RequireCustomer(customer_id): RequireCustomer,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<AddCardRequest>,
) -> Result<Json<StripeCard>> {
    let token = non_blank(body.card_token)
        .ok_or_else(|| AppError::BadRequest("Missing required fields".to_string()))?;

    let customer = state
        .stripe()
        .get_or_create_customer(customer_id.as_str())
        .await?;
    let card = state.stripe().create_source(&customer.id, &token).await?;
    tracing::info!(card_id = %card.id, "Card saved");
    Ok(Json(card))
}

/// Saved card sources, paged by cursor.
#[instrument(skip_all, fields(customer_id = %customer_id))]
async fn list_saved_cards(
    RequireCustomer(customer_id): RequireCustomer,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CursorQuery>,
) -> Result<Json<Value>> {
    let limit = match query.limit {
        Some(0) => return Err(AppError::BadRequest("Invalid limit value.".to_string())),
        Some(limit) => limit,
        None => Pagination::DEFAULT_LIMIT,
    };
    let cursor = non_blank(query.offset);

    let cards = state
        .stripe()
        .list_sources(customer_id.as_str(), limit, cursor.as_deref())
        .await?;

    Ok(Json(json!({
        "count": cards.data.len(),
        "data": cards.data,
        "offset": cursor,
        "limit": limit,
        "has_more": cards.has_more,
        "url": format!("/v1/customers/{customer_id}/sources"),
    })))
}

/// Remove a saved card by `card_` or `pm_` ID.
#[instrument(skip_all, fields(customer_id = %customer_id))]
async fn delete_card(
    RequireCustomer(customer_id): RequireCustomer,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<DeleteCardRequest>,
) -> Result<Json<Value>> {
    let card_id = non_blank(body.card_id)
        .ok_or_else(|| AppError::BadRequest("cardId is required".to_string()))?;

    if CardKind::of(&card_id) == Some(CardKind::PaymentMethod)
        && !owns_payment_method(&state, &customer_id, &card_id).await?
    {
        return Err(AppError::NotFound(
            "Payment method not found or unauthorized".to_string(),
        ));
    }

    let deleted = state
        .stripe()
        .delete_card(customer_id.as_str(), &card_id)
        .await?;
    tracing::info!(%card_id, "Card removed");

    Ok(Json(json!({ "success": true, "deleted": deleted })))
}

/// Update a card's holder name, expiry or metadata.
#[instrument(skip_all, fields(customer_id = %customer_id))]
async fn update_card(
    RequireCustomer(customer_id): RequireCustomer,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<UpdateCardRequest>,
) -> Result<Json<Value>> {
    let id = non_blank(body.card_id)
        .or_else(|| non_blank(body.payment_method_id))
        .ok_or_else(|| {
            AppError::BadRequest("Either cardId or paymentMethodId is required".to_string())
        })?;

    match CardKind::of(&id) {
        Some(CardKind::Source) => {
            let cards = state
                .stripe()
                .list_sources(customer_id.as_str(), PROVIDER_PAGE_LIMIT, None)
                .await?;
            if !contains_card(&cards.data, &id) {
                return Err(AppError::NotFound(
                    "Card not found or unauthorized".to_string(),
                ));
            }
            let card = state
                .stripe()
                .update_source(customer_id.as_str(), &id, &body.update)
                .await?;
            Ok(Json(json!({ "card": card })))
        }
        Some(CardKind::PaymentMethod) => {
            if !owns_payment_method(&state, &customer_id, &id).await? {
                return Err(AppError::NotFound(
                    "Payment method not found or unauthorized".to_string(),
                ));
            }
            let method = state
                .stripe()
                .update_payment_method(&id, &body.update)
                .await?;
            Ok(Json(json!({ "paymentMethod": method })))
        }
        None => Err(AppError::BadRequest(
            "Unsupported ID format. Only 'card_' and 'pm_' IDs are supported.".to_string(),
        )),
    }
}
