//! Orders, payments and carts as seen by the checkout flows.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;

use nextgen_core::{CartId, CustomerId, OrderId, PaymentId, PaymentSessionId, RegionId};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Order {
    pub id: OrderId,
    pub display_id: i64,
    pub customer_id: Option<CustomerId>,
    pub cart_id: Option<String>,
    pub email: Option<String>,
    pub status: String,
    pub currency_code: String,
    pub total: Decimal,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub canceled_at: Option<DateTime<Utc>>,
}

impl Order {
    #[must_use]
    pub fn is_owned_by(&self, customer_id: &CustomerId) -> bool {
        self.customer_id.as_ref() == Some(customer_id)
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Payment {
    pub id: PaymentId,
    pub payment_session_id: PaymentSessionId,
    pub order_id: Option<OrderId>,
    pub provider_id: String,
    pub amount: Decimal,
    pub currency_code: String,
    pub data: Value,
    pub metadata: Value,
    pub captured_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Cart {
    pub id: CartId,
    pub customer_id: Option<CustomerId>,
    pub region_id: Option<RegionId>,
    pub currency_code: String,
    pub created_at: DateTime<Utc>,
}
