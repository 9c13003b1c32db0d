//! Stripe API client for payment intents, refunds, customers and saved cards.
//!
//! Requests are form-encoded with bracketed keys (`metadata[order_id]=...`)
//! as the Stripe REST API expects. Response objects keep every field Stripe
//! returns so routes can pass them through to clients unchanged.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::RequestBuilder;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::instrument;

use crate::config::StripeConfig;

/// Stripe API base URL.
const BASE_URL: &str = "https://api.stripe.com/v1";

/// Errors that can occur when interacting with the Stripe API.
#[derive(Debug, Error)]
pub enum StripeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("Stripe API error ({status}): {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Card identifier is neither a `card_` source nor a `pm_` payment method.
    #[error("Unsupported card ID format")]
    UnsupportedCardId,
}

impl StripeError {
    /// Whether Stripe reported that the requested object does not exist.
    #[must_use]
    pub fn is_missing_resource(&self) -> bool {
        matches!(self, Self::Api { status: 404, .. })
            || matches!(self, Self::Api { code: Some(code), .. } if code == "resource_missing")
    }

    /// The message Stripe returned, suitable for showing to the customer.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::Api { message, .. } => message.clone(),
            Self::UnsupportedCardId => self.to_string(),
            Self::Http(_) | Self::Parse(_) => "Payment provider unavailable".to_string(),
        }
    }
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub status: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub payment_method: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Refund {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub payment_intent: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Refund {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.status.as_deref() == Some("succeeded")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    #[serde(default)]
    pub deleted: bool,
}

/// A `pm_` payment method or legacy `card_` source. Unlisted fields are kept
/// in `extra` so the object round-trips to API clients intact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeCard {
    pub id: String,
    pub object: String,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct List<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

// =============================================================================
// Request types
// =============================================================================

/// Parameters for a new payment intent.
#[derive(Debug, Clone)]
pub struct NewPaymentIntent<'a> {
    /// Amount in the currency's minor unit.
    pub amount: i64,
    pub currency: &'a str,
    pub customer: Option<&'a str>,
    pub metadata: BTreeMap<String, String>,
}

/// Parameters for a refund.
#[derive(Debug, Clone)]
pub struct NewRefund<'a> {
    pub payment_intent: &'a str,
    /// Amount in the currency's minor unit.
    pub amount: i64,
    pub metadata: BTreeMap<String, String>,
    pub idempotency_key: String,
}

/// Editable card fields. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CardUpdate {
    pub name: Option<String>,
    pub exp_month: Option<u8>,
    pub exp_year: Option<u16>,
    pub metadata: Option<BTreeMap<String, String>>,
}

impl CardUpdate {
    /// Form body for `POST /payment_methods/{id}`.
    fn payment_method_form(&self) -> Vec<(String, String)> {
        let mut form = Vec::new();
        if let Some(name) = &self.name {
            form.push(("billing_details[name]".to_string(), name.clone()));
        }
        if let Some(month) = self.exp_month {
            form.push(("card[exp_month]".to_string(), month.to_string()));
        }
        if let Some(year) = self.exp_year {
            form.push(("card[exp_year]".to_string(), year.to_string()));
        }
        push_metadata(&mut form, self.metadata.as_ref());
        form
    }

    /// Form body for `POST /customers/{id}/sources/{card}`.
    fn source_form(&self) -> Vec<(String, String)> {
        let mut form = Vec::new();
        if let Some(name) = &self.name {
            form.push(("name".to_string(), name.clone()));
        }
        if let Some(month) = self.exp_month {
            form.push(("exp_month".to_string(), month.to_string()));
        }
        if let Some(year) = self.exp_year {
            form.push(("exp_year".to_string(), year.to_string()));
        }
        push_metadata(&mut form, self.metadata.as_ref());
        form
    }
}

fn push_metadata(form: &mut Vec<(String, String)>, metadata: Option<&BTreeMap<String, String>>) {
    for (key, value) in metadata.into_iter().flatten() {
        form.push((format!("metadata[{key}]"), value.clone()));
    }
}

// =============================================================================
// Client
// =============================================================================

/// Stripe API client.
#[derive(Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    base_url: String,
}

impl StripeClient {
    /// Create a new Stripe API client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build or the key is not a
    /// valid header value.
    pub fn new(config: &StripeConfig, timeout: Duration) -> Result<Self, StripeError> {
        let mut headers = HeaderMap::new();

        let auth_value = format!("Bearer {}", config.secret_key.expose_secret());
        let mut auth = HeaderValue::from_str(&auth_value)
            .map_err(|e| StripeError::Parse(format!("Invalid API key format: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        if let Some(version) = &config.api_version {
            headers.insert(
                "Stripe-Version",
                HeaderValue::from_str(version)
                    .map_err(|e| StripeError::Parse(format!("Invalid API version: {e}")))?,
            );
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: BASE_URL.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, StripeError> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status.as_u16(), &body));
        }

        response
            .json()
            .await
            .map_err(|e| StripeError::Parse(e.to_string()))
    }

    // -------------------------------------------------------------------------
    // Payment intents
    // -------------------------------------------------------------------------

    /// Create a payment intent with automatic payment methods enabled.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self, params), fields(amount = params.amount, currency = params.currency))]
    pub async fn create_payment_intent(
        &self,
        params: &NewPaymentIntent<'_>,
    ) -> Result<PaymentIntent, StripeError> {
        let mut form = vec![
            ("amount".to_string(), params.amount.to_string()),
            ("currency".to_string(), params.currency.to_string()),
            (
                "automatic_payment_methods[enabled]".to_string(),
                "true".to_string(),
            ),
        ];
        if let Some(customer) = params.customer {
            form.push(("customer".to_string(), customer.to_string()));
        }
        push_metadata(&mut form, Some(&params.metadata));

        let intent: PaymentIntent = self
            .send(self.client.post(self.url("/payment_intents")).form(&form))
            .await?;
        tracing::info!(payment_intent_id = %intent.id, "Payment intent created");
        Ok(intent)
    }

    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self))]
    pub async fn retrieve_payment_intent(&self, id: &str) -> Result<PaymentIntent, StripeError> {
        let url = self.url(&format!("/payment_intents/{}", urlencoding::encode(id)));
        self.send(self.client.get(url)).await
    }

    /// Confirm a payment intent with the given payment method.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails or Stripe declines the confirmation.
    #[instrument(skip(self, return_url))]
    pub async fn confirm_payment_intent(
        &self,
        id: &str,
        payment_method: &str,
        return_url: &str,
    ) -> Result<PaymentIntent, StripeError> {
        let url = self.url(&format!(
            "/payment_intents/{}/confirm",
            urlencoding::encode(id)
        ));
        let form = [("payment_method", payment_method), ("return_url", return_url)];
        self.send(self.client.post(url).form(&form)).await
    }

    // -------------------------------------------------------------------------
    // Refunds
    // -------------------------------------------------------------------------

    /// Refund part or all of a payment intent.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self, params), fields(payment_intent = params.payment_intent, amount = params.amount))]
    pub async fn create_refund(&self, params: &NewRefund<'_>) -> Result<Refund, StripeError> {
        let mut form = vec![
            ("payment_intent".to_string(), params.payment_intent.to_string()),
            ("amount".to_string(), params.amount.to_string()),
        ];
        push_metadata(&mut form, Some(&params.metadata));

        let request = self
            .client
            .post(self.url("/refunds"))
            .header("Idempotency-Key", &params.idempotency_key)
            .form(&form);
        let refund: Refund = self.send(request).await?;
        tracing::info!(refund_id = %refund.id, status = ?refund.status, "Refund created");
        Ok(refund)
    }

    // -------------------------------------------------------------------------
    // Customers
    // -------------------------------------------------------------------------

    /// Fetch a customer, or `None` if Stripe has no customer with this ID.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails for any other reason.
    pub async fn retrieve_customer(&self, id: &str) -> Result<Option<Customer>, StripeError> {
        let url = self.url(&format!("/customers/{}", urlencoding::encode(id)));
        match self.send(self.client.get(url)).await {
            Ok(customer) => Ok(Some(customer)),
            Err(e) if e.is_missing_resource() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Fetch the Stripe customer whose ID matches our customer ID, creating
    /// it on first use.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self))]
    pub async fn get_or_create_customer(&self, id: &str) -> Result<Customer, StripeError> {
        if let Some(customer) = self.retrieve_customer(id).await? {
            return Ok(customer);
        }
        let form = [("id", id), ("metadata[userId]", id)];
        let customer: Customer = self
            .send(self.client.post(self.url("/customers")).form(&form))
            .await?;
        tracing::info!(customer_id = %customer.id, "Stripe customer created");
        Ok(customer)
    }

    // -------------------------------------------------------------------------
    // Payment methods
    // -------------------------------------------------------------------------

    /// Attach a payment method to a customer and make it their default for
    /// invoices.
    ///
    /// # Errors
    ///
    /// Returns error if either API request fails.
    #[instrument(skip(self))]
    pub async fn attach_payment_method(
        &self,
        payment_method: &str,
        customer: &str,
    ) -> Result<(), StripeError> {
        let url = self.url(&format!(
            "/payment_methods/{}/attach",
            urlencoding::encode(payment_method)
        ));
        let _: StripeCard = self
            .send(self.client.post(url).form(&[("customer", customer)]))
            .await?;

        let url = self.url(&format!("/customers/{}", urlencoding::encode(customer)));
        let form = [("invoice_settings[default_payment_method]", payment_method)];
        let _: Customer = self.send(self.client.post(url).form(&form)).await?;
        Ok(())
    }

    /// List a customer's card payment methods.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    pub async fn list_payment_methods(
        &self,
        customer: &str,
        limit: u32,
    ) -> Result<List<StripeCard>, StripeError> {
        let url = format!(
            "{}?customer={}&type=card&limit={}",
            self.url("/payment_methods"),
            urlencoding::encode(customer),
            limit.clamp(1, 100)
        );
        self.send(self.client.get(url)).await
    }

    /// # Errors
    ///
    /// Returns error if the API request fails.
    pub async fn update_payment_method(
        &self,
        payment_method: &str,
        update: &CardUpdate,
    ) -> Result<StripeCard, StripeError> {
        let url = self.url(&format!(
            "/payment_methods/{}",
            urlencoding::encode(payment_method)
        ));
        self.send(self.client.post(url).form(&update.payment_method_form()))
            .await
    }

    /// # Errors
    ///
    /// Returns error if the API request fails.
    pub async fn detach_payment_method(&self, payment_method: &str) -> Result<StripeCard, StripeError> {
        let url = self.url(&format!(
            "/payment_methods/{}/detach",
            urlencoding::encode(payment_method)
        ));
        self.send(self.client.post(url)).await
    }

    // -------------------------------------------------------------------------
    // Legacy card sources
    // -------------------------------------------------------------------------

    /// Save a tokenized card on the customer.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    pub async fn create_source(&self, customer: &str, token: &str) -> Result<StripeCard, StripeError> {
        let url = self.url(&format!("/customers/{}/sources", urlencoding::encode(customer)));
        self.send(self.client.post(url).form(&[("source", token)]))
            .await
    }

    /// List card sources with cursor pagination.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    pub async fn list_sources(
        &self,
        customer: &str,
        limit: u32,
        starting_after: Option<&str>,
    ) -> Result<List<StripeCard>, StripeError> {
        let mut url = format!(
            "{}?object=card&limit={}",
            self.url(&format!("/customers/{}/sources", urlencoding::encode(customer))),
            limit.clamp(1, 100)
        );
        if let Some(cursor) = starting_after {
            url.push_str("&starting_after=");
            url.push_str(&urlencoding::encode(cursor));
        }
        self.send(self.client.get(url)).await
    }

    /// # Errors
    ///
    /// Returns error if the API request fails.
    pub async fn update_source(
        &self,
        customer: &str,
        card: &str,
        update: &CardUpdate,
    ) -> Result<StripeCard, StripeError> {
        let url = self.url(&format!(
            "/customers/{}/sources/{}",
            urlencoding::encode(customer),
            urlencoding::encode(card)
        ));
        self.send(self.client.post(url).form(&update.source_form()))
            .await
    }

    /// # Errors
    ///
    /// Returns error if the API request fails.
    pub async fn delete_source(&self, customer: &str, card: &str) -> Result<Value, StripeError> {
        let url = self.url(&format!(
            "/customers/{}/sources/{}",
            urlencoding::encode(customer),
            urlencoding::encode(card)
        ));
        self.send(self.client.delete(url)).await
    }

    /// Remove a saved card: `card_` IDs are deleted as sources, `pm_` IDs are
    /// detached payment methods.
    ///
    /// # Errors
    ///
    /// Returns `StripeError::UnsupportedCardId` for any other prefix.
    pub async fn delete_card(&self, customer: &str, card_id: &str) -> Result<Value, StripeError> {
        match CardKind::of(card_id) {
            Some(CardKind::Source) => self.delete_source(customer, card_id).await,
            Some(CardKind::PaymentMethod) => {
                let detached = self.detach_payment_method(card_id).await?;
                serde_json::to_value(detached).map_err(|e| StripeError::Parse(e.to_string()))
            }
            None => Err(StripeError::UnsupportedCardId),
        }
    }
}

/// Which Stripe API owns a saved card, by ID prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardKind {
    Source,
    PaymentMethod,
}

impl CardKind {
    #[must_use]
    pub fn of(id: &str) -> Option<Self> {
        if id.starts_with("card_") {
            Some(Self::Source)
        } else if id.starts_with("pm_") {
            Some(Self::PaymentMethod)
        } else {
            None
        }
    }
}

/// Build an error from a non-2xx Stripe response body.
fn api_error(status: u16, body: &str) -> StripeError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => StripeError::Api {
            status,
            code: envelope.error.code,
            message: envelope
                .error
                .message
                .unwrap_or_else(|| "Stripe request failed".to_string()),
        },
        Err(_) => StripeError::Api {
            status,
            code: None,
            message: body.to_string(),
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    #[tokio::test]
    async fn test_stalled_request_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            // accept and never answer
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
        });

        let config = StripeConfig {
            secret_key: SecretString::from("sk_test_123"),
            api_version: None,
        };
        let mut stripe = StripeClient::new(&config, Duration::from_millis(200)).unwrap();
        stripe.base_url = format!("http://{addr}");

        let err = stripe.retrieve_payment_intent("pi_1").await.unwrap_err();
        assert!(matches!(err, StripeError::Http(ref e) if e.is_timeout()));
        server.abort();
    }

    #[test]
    fn test_api_error_parses_stripe_envelope() {
        let body = r#"{"error":{"code":"resource_missing","message":"No such customer: 'cus_x'","type":"invalid_request_error"}}"#;
        let err = api_error(404, body);
        assert!(err.is_missing_resource());
        assert_eq!(err.client_message(), "No such customer: 'cus_x'");
    }

    #[test]
    fn test_api_error_falls_back_to_raw_body() {
        let err = api_error(500, "upstream exploded");
        assert!(!err.is_missing_resource());
        assert!(matches!(err, StripeError::Api { ref message, .. } if message == "upstream exploded"));
    }

    #[test]
    fn test_card_kind_by_prefix() {
        assert_eq!(CardKind::of("card_123"), Some(CardKind::Source));
        assert_eq!(CardKind::of("pm_123"), Some(CardKind::PaymentMethod));
        assert_eq!(CardKind::of("src_123"), None);
    }

    #[test]
    fn test_card_update_forms() {
        let update = CardUpdate {
            name: Some("Ada Lovelace".to_string()),
            exp_month: Some(4),
            exp_year: Some(2030),
            metadata: Some(BTreeMap::from([("nickname".to_string(), "work".to_string())])),
        };

        let pm = update.payment_method_form();
        assert!(pm.contains(&("billing_details[name]".to_string(), "Ada Lovelace".to_string())));
        assert!(pm.contains(&("card[exp_month]".to_string(), "4".to_string())));
        assert!(pm.contains(&("metadata[nickname]".to_string(), "work".to_string())));

        let source = update.source_form();
        assert!(source.contains(&("exp_year".to_string(), "2030".to_string())));
        assert!(source.contains(&("name".to_string(), "Ada Lovelace".to_string())));
    }

    #[test]
    fn test_card_round_trips_unknown_fields() {
        let json = r#"{"id":"pm_1","object":"payment_method","customer":"cus_1","card":{"brand":"visa","last4":"4242"}}"#;
        let card: StripeCard = serde_json::from_str(json).unwrap();
        let back = serde_json::to_value(&card).unwrap();
        assert_eq!(back["card"]["last4"], "4242");
        assert_eq!(back["id"], "pm_1");
    }

    #[test]
    fn test_refund_succeeded() {
        let refund: Refund = serde_json::from_str(
            r#"{"id":"re_1","status":"pending","amount":500,"currency":"gbp"}"#,
        )
        .unwrap();
        assert!(!refund.succeeded());
    }
}
