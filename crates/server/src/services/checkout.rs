//! Order completion and cancellation against the payment processor.
//!
//! The flows talk to the processor through [`PaymentGateway`] and to the
//! order tables through [`OrderLedger`], so they can run against in-memory
//! fakes in tests.
//!
//! Neither flow compensates a partial failure: if the order update fails
//! after a successful charge or refund, the charge or refund stands.

use std::collections::BTreeMap;
use std::future::Future;

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use nextgen_core::{
    CartId, CurrencyCode, CurrencyError, CustomerId, OrderId, OrderStatus, PaymentId,
    PaymentSessionId, RefundStatus, to_minor_units,
};

use super::stripe::{NewRefund, Refund, StripeClient, StripeError};
use crate::db::{OrderRepository, RepositoryError};
use crate::models::{Order, Payment};

/// Metadata status written when a payment does not succeed.
const FAILED_STATUS: &str = "canceled-failed";

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Missing required fields")]
    MissingFields,

    #[error("Payment not found")]
    PaymentNotFound,

    #[error("Order not found")]
    OrderNotFound,

    #[error("This payment has already been canceled. Please restart the payment process.")]
    IntentCanceled,

    #[error("You are not authorized to {0} this order.")]
    NotOwner(&'static str),

    /// The processor did not report success; payment and order are marked failed.
    #[error("Payment failed")]
    PaymentFailed { status: String },

    /// The processor accepted the refund request but did not complete it.
    #[error("Stripe refund failed")]
    RefundFailed(Box<Refund>),

    #[error("payment processor error: {0}")]
    Gateway(#[from] StripeError),

    #[error(transparent)]
    Ledger(#[from] RepositoryError),

    #[error("invalid refund amount: {0}")]
    Amount(#[from] CurrencyError),
}

// =============================================================================
// Seams
// =============================================================================

/// The payment-processor calls the flows need.
pub trait PaymentGateway: Send + Sync {
    /// Current status of a payment intent (`succeeded`, `canceled`, ...).
    fn intent_status(&self, intent_id: &str)
    -> impl Future<Output = Result<String, StripeError>> + Send;

    fn attach_payment_method(
        &self,
        payment_method_id: &str,
        customer_id: &str,
    ) -> impl Future<Output = Result<(), StripeError>> + Send;

    /// Confirm the intent and return its resulting status.
    fn confirm(
        &self,
        intent_id: &str,
        payment_method_id: &str,
        return_url: &str,
    ) -> impl Future<Output = Result<String, StripeError>> + Send;

    fn refund(&self, refund: &NewRefund<'_>)
    -> impl Future<Output = Result<Refund, StripeError>> + Send;
}

/// The order and payment records the flows read and update.
pub trait OrderLedger: Send + Sync {
    fn find_order(&self, id: &OrderId)
    -> impl Future<Output = Result<Option<Order>, RepositoryError>> + Send;

    fn payment_by_session(
        &self,
        session_id: &PaymentSessionId,
    ) -> impl Future<Output = Result<Option<Payment>, RepositoryError>> + Send;

    /// Sum of the amounts of all transactions recorded on the order.
    fn transaction_total(
        &self,
        order_id: &OrderId,
    ) -> impl Future<Output = Result<Decimal, RepositoryError>> + Send;

    fn record_payment(
        &self,
        id: &PaymentId,
        data: &Value,
        metadata: &Value,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    fn capture_payment(
        &self,
        id: &PaymentId,
        order_id: &OrderId,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    fn update_order(
        &self,
        id: &OrderId,
        status: Option<OrderStatus>,
        metadata: &Value,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    fn cancel_order(&self, id: &OrderId)
    -> impl Future<Output = Result<Order, RepositoryError>> + Send;
}

impl PaymentGateway for StripeClient {
    async fn intent_status(&self, intent_id: &str) -> Result<String, StripeError> {
        Ok(self.retrieve_payment_intent(intent_id).await?.status)
    }

    async fn attach_payment_method(
        &self,
        payment_method_id: &str,
        customer_id: &str,
    ) -> Result<(), StripeError> {
        Self::attach_payment_method(self, payment_method_id, customer_id).await
    }

    async fn confirm(
        &self,
        intent_id: &str,
        payment_method_id: &str,
        return_url: &str,
    ) -> Result<String, StripeError> {
        Ok(self
            .confirm_payment_intent(intent_id, payment_method_id, return_url)
            .await?
            .status)
    }

    async fn refund(&self, refund: &NewRefund<'_>) -> Result<Refund, StripeError> {
        self.create_refund(refund).await
    }
}

/// [`OrderLedger`] backed by the commerce database.
#[derive(Clone)]
pub struct PgOrderLedger {
    pool: PgPool,
}

impl PgOrderLedger {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    const fn repo(&self) -> OrderRepository<'_> {
        OrderRepository::new(&self.pool)
    }
}

impl OrderLedger for PgOrderLedger {
    async fn find_order(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        self.repo().find(id).await
    }

    async fn payment_by_session(
        &self,
        session_id: &PaymentSessionId,
    ) -> Result<Option<Payment>, RepositoryError> {
        self.repo().payment_by_session(session_id).await
    }

    async fn transaction_total(&self, order_id: &OrderId) -> Result<Decimal, RepositoryError> {
        self.repo().transaction_total(order_id).await
    }

    async fn record_payment(
        &self,
        id: &PaymentId,
        data: &Value,
        metadata: &Value,
    ) -> Result<(), RepositoryError> {
        self.repo().record_payment(id, data, metadata).await
    }

    async fn capture_payment(&self, id: &PaymentId, order_id: &OrderId) -> Result<(), RepositoryError> {
        self.repo().capture_payment(id, order_id).await
    }

    async fn update_order(
        &self,
        id: &OrderId,
        status: Option<OrderStatus>,
        metadata: &Value,
    ) -> Result<(), RepositoryError> {
        self.repo().update_status(id, status, metadata).await
    }

    async fn cancel_order(&self, id: &OrderId) -> Result<Order, RepositoryError> {
        self.repo().cancel(id).await
    }
}

// =============================================================================
// Inputs
// =============================================================================

fn required(value: Option<String>) -> Result<String, CheckoutError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(CheckoutError::MissingFields)
}

/// Body of `POST /store/orders/complete`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteOrderRequest {
    pub cart_id: Option<String>,
    pub order_id: Option<String>,
    pub user_id: Option<String>,
    pub payment_intent_id: Option<String>,
    pub payment_session_id: Option<String>,
    pub payment_method_id: Option<String>,
    #[serde(rename = "type")]
    pub order_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CompleteOrder {
    pub cart_id: CartId,
    pub order_id: OrderId,
    pub customer_id: CustomerId,
    pub payment_intent_id: String,
    pub payment_session_id: PaymentSessionId,
    pub payment_method_id: String,
    /// Store vertical tag (`ecom`, `eat`, `meat`, `grocery`).
    pub order_type: String,
}

impl CompleteOrderRequest {
    /// # Errors
    ///
    /// Returns `CheckoutError::MissingFields` if any field is absent or blank.
    pub fn validate(self) -> Result<CompleteOrder, CheckoutError> {
        Ok(CompleteOrder {
            cart_id: CartId::new(required(self.cart_id)?),
            order_id: OrderId::new(required(self.order_id)?),
            customer_id: CustomerId::new(required(self.user_id)?),
            payment_intent_id: required(self.payment_intent_id)?,
            payment_session_id: PaymentSessionId::new(required(self.payment_session_id)?),
            payment_method_id: required(self.payment_method_id)?,
            order_type: required(self.order_type)?,
        })
    }
}

/// Body of `POST /store/orders/cancel`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOrderRequest {
    pub order_id: Option<String>,
    pub payment_intent_id: Option<String>,
    pub payment_session_id: Option<String>,
    #[serde(rename = "type")]
    pub order_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CancelOrder {
    pub order_id: OrderId,
    pub payment_intent_id: String,
    pub payment_session_id: PaymentSessionId,
    pub order_type: String,
}

impl CancelOrderRequest {
    /// # Errors
    ///
    /// Returns `CheckoutError::MissingFields` if any field is absent or blank.
    pub fn validate(self) -> Result<CancelOrder, CheckoutError> {
        Ok(CancelOrder {
            order_id: OrderId::new(required(self.order_id)?),
            payment_intent_id: required(self.payment_intent_id)?,
            payment_session_id: PaymentSessionId::new(required(self.payment_session_id)?),
            order_type: required(self.order_type)?,
        })
    }
}

// =============================================================================
// Flows
// =============================================================================

/// Return URL the processor redirects to after any extra authentication step.
#[must_use]
pub fn return_url(base_url: &str, order_id: &OrderId) -> String {
    format!("{base_url}/store/order/{order_id}")
}

/// Confirm the charge for an order and mark the order completed.
///
/// The order is only marked `completed` when the processor reports
/// `succeeded`. Any other status, or the processor rejecting the
/// confirmation, marks payment and order failed and returns
/// `CheckoutError::PaymentFailed`.
///
/// # Errors
///
/// Returns `CheckoutError` for missing records, a canceled intent, a failed
/// payment, or processor and database faults.
#[instrument(skip_all, fields(order_id = %input.order_id, payment_intent_id = %input.payment_intent_id))]
pub async fn complete_order<G: PaymentGateway, L: OrderLedger>(
    gateway: &G,
    ledger: &L,
    input: &CompleteOrder,
    base_url: &str,
) -> Result<String, CheckoutError> {
    let payment = ledger
        .payment_by_session(&input.payment_session_id)
        .await?
        .ok_or(CheckoutError::PaymentNotFound)?;

    if gateway.intent_status(&input.payment_intent_id).await? == "canceled" {
        return Err(CheckoutError::IntentCanceled);
    }

    let order = ledger
        .find_order(&input.order_id)
        .await?
        .ok_or(CheckoutError::OrderNotFound)?;
    if order.customer_id.is_some() && !order.is_owned_by(&input.customer_id) {
        return Err(CheckoutError::NotOwner("complete"));
    }

    gateway
        .attach_payment_method(&input.payment_method_id, input.customer_id.as_str())
        .await?;

    let status = match gateway
        .confirm(
            &input.payment_intent_id,
            &input.payment_method_id,
            &return_url(base_url, &input.order_id),
        )
        .await
    {
        Ok(status) => status,
        Err(StripeError::Api { code, message, .. }) => {
            tracing::warn!(?code, %message, "Payment confirmation rejected");
            code.unwrap_or_else(|| "failed".to_string())
        }
        Err(e) => return Err(e.into()),
    };

    let data = json!({
        "payment_intent_id": input.payment_intent_id,
        "payment_method_id": input.payment_method_id,
    });
    let mut metadata = json!({
        "type": input.order_type,
        "cart_id": input.cart_id,
        "order_id": input.order_id,
    });

    if status == "succeeded" {
        ledger.record_payment(&payment.id, &data, &metadata).await?;
        ledger.capture_payment(&payment.id, &input.order_id).await?;
        ledger
            .update_order(
                &input.order_id,
                Some(OrderStatus::Completed),
                &json!({ "type": input.order_type, "status": "completed" }),
            )
            .await?;

        tracing::info!("Payment confirmed and captured");
        return Ok(status);
    }

    metadata["status"] = json!(FAILED_STATUS);
    ledger.record_payment(&payment.id, &data, &metadata).await?;
    ledger
        .update_order(
            &input.order_id,
            Some(OrderStatus::Failed),
            &json!({ "type": input.order_type, "status": FAILED_STATUS }),
        )
        .await?;

    tracing::warn!(%status, "Payment did not succeed, order marked failed");
    Err(CheckoutError::PaymentFailed { status })
}

/// `order total − Σ transaction amounts`. Negative means more was collected
/// than is owed.
#[must_use]
pub fn outstanding_amount(order_total: Decimal, transactions_total: Decimal) -> Decimal {
    order_total - transactions_total
}

/// The amount to refund for an outstanding balance, if any.
#[must_use]
pub fn refund_due(outstanding: Decimal) -> Option<Decimal> {
    (outstanding < Decimal::ZERO).then(|| outstanding.abs())
}

/// A canceled order and the refund issued for it, if one was needed.
#[derive(Debug)]
pub struct Cancellation {
    pub order: Order,
    pub refund: Option<Refund>,
}

impl Cancellation {
    #[must_use]
    pub fn refund_status(&self) -> RefundStatus {
        if self.refund.is_some() {
            RefundStatus::Succeeded
        } else {
            RefundStatus::NotNeeded
        }
    }

    #[must_use]
    pub fn message(&self) -> &'static str {
        match self.refund_status() {
            RefundStatus::Succeeded => {
                "Order cancelled and refund processed successfully. It may take a few business days to reflect in the bank account."
            }
            RefundStatus::NotNeeded => "Order cancelled. No refund was necessary.",
        }
    }
}

/// Cancel a customer's order, refunding any over-collected amount first.
///
/// A refund is only reported `succeeded` when the processor says so; any
/// other refund status aborts before the order is touched.
///
/// # Errors
///
/// Returns `CheckoutError` for missing records, a foreign order, a failed
/// refund, or processor and database faults.
#[instrument(skip_all, fields(order_id = %input.order_id, customer_id = %customer_id))]
pub async fn cancel_order<G: PaymentGateway, L: OrderLedger>(
    gateway: &G,
    ledger: &L,
    input: &CancelOrder,
    customer_id: &CustomerId,
) -> Result<Cancellation, CheckoutError> {
    let order = ledger
        .find_order(&input.order_id)
        .await?
        .ok_or(CheckoutError::OrderNotFound)?;
    if !order.is_owned_by(customer_id) {
        return Err(CheckoutError::NotOwner("cancel"));
    }

    ledger
        .payment_by_session(&input.payment_session_id)
        .await?
        .ok_or(CheckoutError::PaymentNotFound)?;

    let transactions = ledger.transaction_total(&input.order_id).await?;
    let outstanding = outstanding_amount(order.total, transactions);

    // Overpayments below half a minor unit round to nothing to refund
    let refund_minor = match refund_due(outstanding) {
        Some(amount) => {
            let currency = CurrencyCode::parse(&order.currency_code)?;
            Some(to_minor_units(amount, &currency)?).filter(|minor| *minor > 0)
        }
        None => None,
    };

    let refund = match refund_minor {
        Some(amount) => {
            let metadata = BTreeMap::from([
                ("reason".to_string(), "Customer cancelled".to_string()),
                ("order_id".to_string(), input.order_id.to_string()),
                ("user_id".to_string(), customer_id.to_string()),
                ("type".to_string(), input.order_type.clone()),
            ]);
            let refund = gateway
                .refund(&NewRefund {
                    payment_intent: &input.payment_intent_id,
                    amount,
                    metadata,
                    idempotency_key: format!("refund-{}-{}", input.order_id, uuid::Uuid::new_v4()),
                })
                .await?;

            if !refund.succeeded() {
                tracing::warn!(refund_id = %refund.id, status = ?refund.status, "Refund did not succeed");
                return Err(CheckoutError::RefundFailed(Box::new(refund)));
            }
            Some(refund)
        }
        None => None,
    };

    let mut order = ledger.cancel_order(&input.order_id).await?;

    let refund_id = refund.as_ref().map_or("none", |r| r.id.as_str());
    let refund_status = if refund.is_some() {
        RefundStatus::Succeeded
    } else {
        RefundStatus::NotNeeded
    };
    let metadata = json!({
        "type": input.order_type,
        "refund_id": refund_id,
        "refund_status": refund_status.as_str(),
        "status": "canceled",
    });
    ledger
        .update_order(&input.order_id, None, &metadata)
        .await?;
    merge_object(&mut order.metadata, &metadata);

    tracing::info!(refunded = refund.is_some(), "Order cancelled");
    Ok(Cancellation { order, refund })
}

/// Shallow-merge `patch` into `target`, as `jsonb ||` does.
fn merge_object(target: &mut Value, patch: &Value) {
    let Value::Object(patch) = patch else {
        return;
    };
    if !target.is_object() {
        *target = Value::Object(serde_json::Map::new());
    }
    if let Value::Object(target) = target {
        for (key, value) in patch {
            target.insert(key.clone(), value.clone());
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;
    use std::sync::Mutex;

    use chrono::Utc;

    use super::*;

    // -------------------------------------------------------------------------
    // Fakes
    // -------------------------------------------------------------------------

    #[derive(Default)]
    struct FakeGateway {
        intent_status: String,
        confirm_result: Mutex<Option<Result<String, StripeError>>>,
        refund_status: String,
        refunds: Mutex<Vec<(String, i64, String)>>,
        attached: Mutex<Vec<(String, String)>>,
    }

    impl FakeGateway {
        fn new(intent_status: &str, confirm: Result<String, StripeError>) -> Self {
            Self {
                intent_status: intent_status.to_string(),
                confirm_result: Mutex::new(Some(confirm)),
                refund_status: "succeeded".to_string(),
                ..Self::default()
            }
        }
    }

    impl PaymentGateway for FakeGateway {
        async fn intent_status(&self, _intent_id: &str) -> Result<String, StripeError> {
            Ok(self.intent_status.clone())
        }

        async fn attach_payment_method(
            &self,
            payment_method_id: &str,
            customer_id: &str,
        ) -> Result<(), StripeError> {
            self.attached
                .lock()
                .unwrap()
                .push((payment_method_id.to_string(), customer_id.to_string()));
            Ok(())
        }

        async fn confirm(
            &self,
            _intent_id: &str,
            _payment_method_id: &str,
            _return_url: &str,
        ) -> Result<String, StripeError> {
            self.confirm_result
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Ok("succeeded".to_string()))
        }

        async fn refund(&self, refund: &NewRefund<'_>) -> Result<Refund, StripeError> {
            self.refunds.lock().unwrap().push((
                refund.payment_intent.to_string(),
                refund.amount,
                refund.idempotency_key.clone(),
            ));
            Ok(serde_json::from_value(json!({
                "id": "re_123",
                "status": self.refund_status,
                "amount": refund.amount,
                "currency": "gbp",
                "payment_intent": refund.payment_intent,
            }))
            .unwrap())
        }
    }

    struct FakeLedger {
        order: Option<Order>,
        payment: Option<Payment>,
        transactions: Decimal,
        recorded: Mutex<Vec<(Value, Value)>>,
        captured: Mutex<bool>,
        updates: Mutex<Vec<(Option<OrderStatus>, Value)>>,
        canceled: Mutex<bool>,
    }

    impl FakeLedger {
        fn new(order: Option<Order>, payment: Option<Payment>) -> Self {
            Self {
                order,
                payment,
                transactions: Decimal::ZERO,
                recorded: Mutex::default(),
                captured: Mutex::default(),
                updates: Mutex::default(),
                canceled: Mutex::default(),
            }
        }

        fn last_status(&self) -> Option<OrderStatus> {
            self.updates.lock().unwrap().last().and_then(|(s, _)| *s)
        }
    }

    impl OrderLedger for FakeLedger {
        async fn find_order(&self, _id: &OrderId) -> Result<Option<Order>, RepositoryError> {
            Ok(self.order.clone())
        }

        async fn payment_by_session(
            &self,
            _session_id: &PaymentSessionId,
        ) -> Result<Option<Payment>, RepositoryError> {
            Ok(self.payment.clone())
        }

        async fn transaction_total(&self, _order_id: &OrderId) -> Result<Decimal, RepositoryError> {
            Ok(self.transactions)
        }

        async fn record_payment(
            &self,
            _id: &PaymentId,
            data: &Value,
            metadata: &Value,
        ) -> Result<(), RepositoryError> {
            self.recorded
                .lock()
                .unwrap()
                .push((data.clone(), metadata.clone()));
            Ok(())
        }

        async fn capture_payment(
            &self,
            _id: &PaymentId,
            _order_id: &OrderId,
        ) -> Result<(), RepositoryError> {
            *self.captured.lock().unwrap() = true;
            Ok(())
        }

        async fn update_order(
            &self,
            _id: &OrderId,
            status: Option<OrderStatus>,
            metadata: &Value,
        ) -> Result<(), RepositoryError> {
            self.updates
                .lock()
                .unwrap()
                .push((status, metadata.clone()));
            Ok(())
        }

        async fn cancel_order(&self, _id: &OrderId) -> Result<Order, RepositoryError> {
            *self.canceled.lock().unwrap() = true;
            let mut order = self.order.clone().ok_or(RepositoryError::NotFound)?;
            order.status = "canceled".to_string();
            Ok(order)
        }
    }

    fn order(customer: &str, total: &str) -> Order {
        Order {
            id: OrderId::new("order_1"),
            display_id: 1,
            customer_id: Some(CustomerId::new(customer)),
            cart_id: Some("cart_1".to_string()),
            email: None,
            status: "pending".to_string(),
            currency_code: "gbp".to_string(),
            total: Decimal::from_str(total).unwrap(),
            metadata: json!({}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            canceled_at: None,
        }
    }

    fn payment() -> Payment {
        Payment {
            id: PaymentId::new("pay_1"),
            payment_session_id: PaymentSessionId::new("payses_1"),
            order_id: None,
            provider_id: "pp_stripe_stripe".to_string(),
            amount: Decimal::from(25),
            currency_code: "gbp".to_string(),
            data: json!({}),
            metadata: json!({}),
            captured_at: None,
        }
    }

    fn complete_input() -> CompleteOrder {
        CompleteOrderRequest {
            cart_id: Some("cart_1".to_string()),
            order_id: Some("order_1".to_string()),
            user_id: Some("cus_1".to_string()),
            payment_intent_id: Some("pi_1".to_string()),
            payment_session_id: Some("payses_1".to_string()),
            payment_method_id: Some("pm_1".to_string()),
            order_type: Some("ecom".to_string()),
        }
        .validate()
        .unwrap()
    }

    fn cancel_input() -> CancelOrder {
        CancelOrderRequest {
            order_id: Some("order_1".to_string()),
            payment_intent_id: Some("pi_1".to_string()),
            payment_session_id: Some("payses_1".to_string()),
            order_type: Some("eat".to_string()),
        }
        .validate()
        .unwrap()
    }

    // -------------------------------------------------------------------------
    // Completion
    // -------------------------------------------------------------------------

    #[test]
    fn test_blank_field_is_missing() {
        let request = CompleteOrderRequest {
            cart_id: Some("  ".to_string()),
            ..CompleteOrderRequest::default()
        };
        assert!(matches!(request.validate(), Err(CheckoutError::MissingFields)));
        assert!(matches!(
            CancelOrderRequest::default().validate(),
            Err(CheckoutError::MissingFields)
        ));
    }

    #[tokio::test]
    async fn test_complete_succeeded_marks_order_completed() {
        let gateway = FakeGateway::new("requires_confirmation", Ok("succeeded".to_string()));
        let ledger = FakeLedger::new(Some(order("cus_1", "25")), Some(payment()));

        let status = complete_order(&gateway, &ledger, &complete_input(), "https://api.shop.test")
            .await
            .unwrap();

        assert_eq!(status, "succeeded");
        assert!(*ledger.captured.lock().unwrap());
        assert_eq!(ledger.last_status(), Some(OrderStatus::Completed));

        let recorded = ledger.recorded.lock().unwrap();
        let (data, metadata) = recorded.first().unwrap();
        assert_eq!(data["payment_intent_id"], "pi_1");
        assert_eq!(data["payment_method_id"], "pm_1");
        assert_eq!(metadata, &json!({"type": "ecom", "cart_id": "cart_1", "order_id": "order_1"}));

        let attached = gateway.attached.lock().unwrap();
        assert_eq!(attached.first().unwrap(), &("pm_1".to_string(), "cus_1".to_string()));
    }

    #[tokio::test]
    async fn test_complete_non_success_never_marks_completed() {
        let gateway = FakeGateway::new("requires_confirmation", Ok("requires_action".to_string()));
        let ledger = FakeLedger::new(Some(order("cus_1", "25")), Some(payment()));

        let err = complete_order(&gateway, &ledger, &complete_input(), "https://api.shop.test")
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::PaymentFailed { ref status } if status == "requires_action"));
        assert!(!*ledger.captured.lock().unwrap());
        assert_eq!(ledger.last_status(), Some(OrderStatus::Failed));
        let recorded = ledger.recorded.lock().unwrap();
        assert_eq!(recorded.first().unwrap().1["status"], "canceled-failed");
    }

    #[tokio::test]
    async fn test_complete_declined_confirmation_marks_failed() {
        let declined = StripeError::Api {
            status: 402,
            code: Some("card_declined".to_string()),
            message: "Your card was declined.".to_string(),
        };
        let gateway = FakeGateway::new("requires_confirmation", Err(declined));
        let ledger = FakeLedger::new(Some(order("cus_1", "25")), Some(payment()));

        let err = complete_order(&gateway, &ledger, &complete_input(), "https://api.shop.test")
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::PaymentFailed { ref status } if status == "card_declined"));
        assert_eq!(ledger.last_status(), Some(OrderStatus::Failed));
    }

    #[tokio::test]
    async fn test_complete_rejects_canceled_intent() {
        let gateway = FakeGateway::new("canceled", Ok("succeeded".to_string()));
        let ledger = FakeLedger::new(Some(order("cus_1", "25")), Some(payment()));

        let err = complete_order(&gateway, &ledger, &complete_input(), "https://api.shop.test")
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::IntentCanceled));
        assert!(ledger.updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_complete_missing_records() {
        let gateway = FakeGateway::new("requires_confirmation", Ok("succeeded".to_string()));

        let no_payment = FakeLedger::new(Some(order("cus_1", "25")), None);
        assert!(matches!(
            complete_order(&gateway, &no_payment, &complete_input(), "https://x").await,
            Err(CheckoutError::PaymentNotFound)
        ));

        let no_order = FakeLedger::new(None, Some(payment()));
        assert!(matches!(
            complete_order(&gateway, &no_order, &complete_input(), "https://x").await,
            Err(CheckoutError::OrderNotFound)
        ));
    }

    #[tokio::test]
    async fn test_complete_rejects_foreign_order() {
        let gateway = FakeGateway::new("requires_confirmation", Ok("succeeded".to_string()));
        let ledger = FakeLedger::new(Some(order("cus_other", "25")), Some(payment()));

        assert!(matches!(
            complete_order(&gateway, &ledger, &complete_input(), "https://x").await,
            Err(CheckoutError::NotOwner("complete"))
        ));
        assert!(gateway.attached.lock().unwrap().is_empty());
    }

    #[test]
    fn test_return_url() {
        assert_eq!(
            return_url("https://api.shop.test", &OrderId::new("order_9")),
            "https://api.shop.test/store/order/order_9"
        );
    }

    // -------------------------------------------------------------------------
    // Cancellation
    // -------------------------------------------------------------------------

    #[test]
    fn test_outstanding_and_refund_due() {
        let d = |s: &str| Decimal::from_str(s).unwrap();
        assert_eq!(outstanding_amount(d("20"), d("25.50")), d("-5.50"));
        assert_eq!(refund_due(d("-5.50")), Some(d("5.50")));
        assert_eq!(refund_due(Decimal::ZERO), None);
        assert_eq!(refund_due(d("3")), None);
    }

    #[tokio::test]
    async fn test_cancel_without_overpayment_skips_refund() {
        let gateway = FakeGateway::new("succeeded", Ok("succeeded".to_string()));
        let ledger = FakeLedger::new(Some(order("cus_1", "25")), Some(payment()));

        let cancellation = cancel_order(&gateway, &ledger, &cancel_input(), &CustomerId::new("cus_1"))
            .await
            .unwrap();

        assert!(cancellation.refund.is_none());
        assert_eq!(cancellation.message(), "Order cancelled. No refund was necessary.");
        assert!(gateway.refunds.lock().unwrap().is_empty());
        assert_eq!(cancellation.order.metadata["refund_id"], "none");
        assert_eq!(cancellation.order.metadata["refund_status"], "not_needed");
        assert_eq!(cancellation.order.metadata["status"], "canceled");
    }

    #[tokio::test]
    async fn test_cancel_refunds_overpayment_in_minor_units() {
        let gateway = FakeGateway::new("succeeded", Ok("succeeded".to_string()));
        let mut ledger = FakeLedger::new(Some(order("cus_1", "20")), Some(payment()));
        ledger.transactions = Decimal::from_str("25.50").unwrap();

        let cancellation = cancel_order(&gateway, &ledger, &cancel_input(), &CustomerId::new("cus_1"))
            .await
            .unwrap();

        assert_eq!(cancellation.refund_status(), RefundStatus::Succeeded);
        let refunds = gateway.refunds.lock().unwrap();
        let (intent, amount, key) = refunds.first().unwrap();
        assert_eq!(intent, "pi_1");
        assert_eq!(*amount, 550);
        assert!(key.starts_with("refund-order_1-"));
        assert_eq!(cancellation.order.metadata["refund_id"], "re_123");
        assert!(*ledger.canceled.lock().unwrap());
    }

    #[tokio::test]
    async fn test_cancel_skips_refund_that_rounds_to_zero() {
        let gateway = FakeGateway::new("succeeded", Ok("succeeded".to_string()));
        let mut ledger = FakeLedger::new(Some(order("cus_1", "20")), Some(payment()));
        ledger.transactions = Decimal::from_str("20.004").unwrap();

        let cancellation = cancel_order(&gateway, &ledger, &cancel_input(), &CustomerId::new("cus_1"))
            .await
            .unwrap();

        assert!(cancellation.refund.is_none());
        assert!(gateway.refunds.lock().unwrap().is_empty());
        assert_eq!(cancellation.order.metadata["refund_status"], "not_needed");
        assert!(*ledger.canceled.lock().unwrap());
    }

    #[tokio::test]
    async fn test_cancel_aborts_when_refund_not_succeeded() {
        let mut gateway = FakeGateway::new("succeeded", Ok("succeeded".to_string()));
        gateway.refund_status = "pending".to_string();
        let mut ledger = FakeLedger::new(Some(order("cus_1", "20")), Some(payment()));
        ledger.transactions = Decimal::from(30);

        let err = cancel_order(&gateway, &ledger, &cancel_input(), &CustomerId::new("cus_1"))
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::RefundFailed(ref r) if r.status.as_deref() == Some("pending")));
        assert!(!*ledger.canceled.lock().unwrap());
        assert!(ledger.updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_requires_ownership() {
        let gateway = FakeGateway::new("succeeded", Ok("succeeded".to_string()));
        let ledger = FakeLedger::new(Some(order("cus_owner", "20")), Some(payment()));

        assert!(matches!(
            cancel_order(&gateway, &ledger, &cancel_input(), &CustomerId::new("cus_1")).await,
            Err(CheckoutError::NotOwner("cancel"))
        ));
        assert!(!*ledger.canceled.lock().unwrap());
    }

    #[test]
    fn test_merge_object_overwrites_keys() {
        let mut target = json!({"a": 1, "b": 2});
        merge_object(&mut target, &json!({"b": 3, "c": 4}));
        assert_eq!(target, json!({"a": 1, "b": 3, "c": 4}));

        let mut null = Value::Null;
        merge_object(&mut null, &json!({"x": true}));
        assert_eq!(null, json!({"x": true}));
    }
}
