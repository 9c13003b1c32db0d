//! Product reviews left by customers against a purchased variant.

use chrono::{DateTime, Utc};
use serde::Serialize;

use nextgen_core::{CustomerId, OrderId, ProductId, Rating, ReviewId, VariantId};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProductReview {
    pub id: ReviewId,
    pub order_id: OrderId,
    pub customer_id: CustomerId,
    pub product_id: ProductId,
    pub variant_id: VariantId,
    pub rating: f64,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewReview {
    pub order_id: OrderId,
    pub customer_id: CustomerId,
    pub product_id: ProductId,
    pub variant_id: VariantId,
    pub rating: Rating,
    pub comment: String,
}
