//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;

use crate::config::ServerConfig;
use crate::services::{
    EmailClient, GoogleVerifier, ObjectStorage, OtpLength, OtpStore, PgOrderLedger, PriceListCache,
    SmsClient, StripeClient, StripeError, TokenIssuer,
};

/// How long storefront routes may serve a stale set of price lists.
const PRICE_LIST_TTL: Duration = Duration::from_secs(60);

/// Timeout for every outbound provider request.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Error building the provider clients.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
    #[error("invalid Stripe configuration: {0}")]
    Stripe(#[from] StripeError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections, provider clients and the
/// one-time password stores.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    pool: PgPool,
    stripe: StripeClient,
    storage: ObjectStorage,
    sms: SmsClient,
    email: EmailClient,
    google: GoogleVerifier,
    tokens: TokenIssuer,
    ledger: PgOrderLedger,
    price_lists: PriceListCache,
    sms_otp: OtpStore,
    email_otp: OtpStore,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built or the Stripe
    /// configuration is invalid.
    pub fn new(config: ServerConfig, pool: PgPool) -> Result<Self, StateError> {
        let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;

        let stripe = StripeClient::new(&config.stripe, HTTP_TIMEOUT)?;
        let storage = ObjectStorage::new(http.clone(), &config.storage);
        let sms = SmsClient::new(http.clone(), config.twilio.clone());
        let email = EmailClient::new(http.clone(), config.sendgrid.clone());
        let google = GoogleVerifier::new(http, config.google_client_id.clone());
        let tokens = TokenIssuer::new(&config.jwt_secret);
        let ledger = PgOrderLedger::new(pool.clone());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                stripe,
                storage,
                sms,
                email,
                google,
                tokens,
                ledger,
                price_lists: PriceListCache::new(PRICE_LIST_TTL),
                sms_otp: OtpStore::new(OtpLength::Six),
                email_otp: OtpStore::new(OtpLength::Four),
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn stripe(&self) -> &StripeClient {
        &self.inner.stripe
    }

    #[must_use]
    pub fn storage(&self) -> &ObjectStorage {
        &self.inner.storage
    }

    #[must_use]
    pub fn sms(&self) -> &SmsClient {
        &self.inner.sms
    }

    #[must_use]
    pub fn email(&self) -> &EmailClient {
        &self.inner.email
    }

    #[must_use]
    pub fn google(&self) -> &GoogleVerifier {
        &self.inner.google
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenIssuer {
        &self.inner.tokens
    }

    /// Order and payment records for the checkout flows.
    #[must_use]
    pub fn ledger(&self) -> &PgOrderLedger {
        &self.inner.ledger
    }

    #[must_use]
    pub fn price_lists(&self) -> &PriceListCache {
        &self.inner.price_lists
    }

    /// Pending mobile codes, keyed by phone number.
    #[must_use]
    pub fn sms_otp(&self) -> &OtpStore {
        &self.inner.sms_otp
    }

    /// Pending password-reset codes, keyed by email.
    #[must_use]
    pub fn email_otp(&self) -> &OtpStore {
        &self.inner.email_otp
    }
}
