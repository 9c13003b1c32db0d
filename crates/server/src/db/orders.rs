//! Order, payment and cart repository.
//!
//! Only the narrow updates needed by the checkout flows live here: recording
//! processor identifiers, capture, status/metadata changes and cancellation.

use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::PgPool;

use nextgen_core::{CartId, CustomerId, OrderId, OrderStatus, Pagination, PaymentId, PaymentSessionId};

use super::RepositoryError;
use crate::models::{Cart, Order, Payment};

const ORDER_COLUMNS: &str = "id, display_id, customer_id, cart_id, email, status, currency_code, total, metadata, created_at, updated_at, canceled_at";
const PAYMENT_COLUMNS: &str = "id, payment_session_id, order_id, provider_id, amount, currency_code, data, metadata, captured_at";

/// Repository for order, payment and cart database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, Order>(&format!(
            r#"SELECT {ORDER_COLUMNS} FROM "order" WHERE id = $1"#
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }

    /// One page of a customer's orders, newest first, with the total count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_customer(
        &self,
        customer_id: &CustomerId,
        page: Pagination,
    ) -> Result<(Vec<Order>, i64), RepositoryError> {
        let rows = sqlx::query_as::<_, Order>(&format!(
            r#"
            SELECT {ORDER_COLUMNS} FROM "order"
            WHERE customer_id = $1
            ORDER BY created_at DESC, id
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(customer_id)
        .bind(page.limit_i64())
        .bind(page.offset_i64())
        .fetch_all(self.pool)
        .await?;

        let total = sqlx::query_scalar(r#"SELECT COUNT(*) FROM "order" WHERE customer_id = $1"#)
            .bind(customer_id)
            .fetch_one(self.pool)
            .await?;

        Ok((rows, total))
    }

    /// Sum of all transaction amounts recorded against the order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn transaction_total(&self, order_id: &OrderId) -> Result<Decimal, RepositoryError> {
        let total: Option<Decimal> =
            sqlx::query_scalar("SELECT SUM(amount) FROM order_transaction WHERE order_id = $1")
                .bind(order_id)
                .fetch_one(self.pool)
                .await?;

        Ok(total.unwrap_or_default())
    }

    /// Set the order status and shallow-merge `metadata` into its metadata.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn update_status(
        &self,
        id: &OrderId,
        status: Option<OrderStatus>,
        metadata: &Value,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE "order"
            SET status = COALESCE($2, status),
                metadata = COALESCE(metadata, '{}'::jsonb) || $3,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status.map(OrderStatus::as_str))
        .bind(metadata)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Mark the order canceled.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn cancel(&self, id: &OrderId) -> Result<Order, RepositoryError> {
        sqlx::query_as::<_, Order>(&format!(
            r#"
            UPDATE "order"
            SET status = 'canceled', canceled_at = COALESCE(canceled_at, now()), updated_at = now()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    // =========================================================================
    // Payments
    // =========================================================================

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn payment_by_session(
        &self,
        session_id: &PaymentSessionId,
    ) -> Result<Option<Payment>, RepositoryError> {
        let row = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payment WHERE payment_session_id = $1"
        ))
        .bind(session_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }

    /// Merge processor identifiers into `data` and domain tags into `metadata`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the payment does not exist.
    pub async fn record_payment(
        &self,
        id: &PaymentId,
        data: &Value,
        metadata: &Value,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE payment
            SET data = COALESCE(data, '{}'::jsonb) || $2,
                metadata = COALESCE(metadata, '{}'::jsonb) || $3,
                updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(data)
        .bind(metadata)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Capture a payment against an order and record the capture as an order
    /// transaction. Capturing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the payment does not exist.
    pub async fn capture_payment(
        &self,
        id: &PaymentId,
        order_id: &OrderId,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let captured: Option<Payment> = sqlx::query_as(&format!(
            r"
            UPDATE payment
            SET captured_at = now(), order_id = COALESCE(order_id, $2), updated_at = now()
            WHERE id = $1 AND captured_at IS NULL
            RETURNING {PAYMENT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(payment) = captured else {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM payment WHERE id = $1)")
                    .bind(id)
                    .fetch_one(&mut *tx)
                    .await?;
            return if exists {
                Ok(())
            } else {
                Err(RepositoryError::NotFound)
            };
        };

        sqlx::query(
            r"
            INSERT INTO order_transaction (id, order_id, amount, currency_code, reference, reference_id)
            VALUES ($1, $2, $3, $4, 'capture', $5)
            ",
        )
        .bind(nextgen_core::types::id::generate_prefixed("ordtrans"))
        .bind(order_id)
        .bind(payment.amount)
        .bind(&payment.currency_code)
        .bind(&payment.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    // =========================================================================
    // Carts
    // =========================================================================

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_cart(&self, id: &CartId) -> Result<Option<Cart>, RepositoryError> {
        let row = sqlx::query_as::<_, Cart>(
            r"
            SELECT id, customer_id, region_id, currency_code, created_at
            FROM cart WHERE id = $1 AND deleted_at IS NULL
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }

    /// Soft-delete a cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the cart does not exist.
    pub async fn delete_cart(&self, id: &CartId) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE cart SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL")
                .bind(id)
                .execute(self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
