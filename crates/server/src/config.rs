//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `NEXTGEN_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `NEXTGEN_BASE_URL` - Public URL of this API, used for payment return URLs
//! - `JWT_SECRET` - Customer token signing secret (min 32 chars, high entropy)
//! - `ADMIN_API_TOKEN` - Bearer token for `/admin` routes (min 32 chars, high entropy)
//! - `STRIPE_SECRET_KEY` - Stripe secret API key
//! - `AWS_S3_REGION` - Object storage region (e.g., eu-west-2)
//! - `AWS_ACCESS_KEY` - Object storage access key ID
//! - `AWS_SECRET_ACCESS` - Object storage secret access key
//! - `AWS_S3_BUCKET_NAME` - Bucket holding uploaded images
//!
//! ## Optional
//! - `NEXTGEN_HOST` - Bind address (default: 127.0.0.1)
//! - `NEXTGEN_PORT` - Listen port (default: 9000)
//! - `PAYMENT_CURRENCY` - Currency for payment intents and offers (default: gbp)
//! - `STRIPE_API_VERSION` - Pinned Stripe API version header
//! - `AWS_S3_ENDPOINT` - Path-style endpoint for S3-compatible storage (e.g., `MinIO`)
//! - `TWILIO_ACCOUNT_SID`, `TWILIO_AUTH_TOKEN`, `TWILIO_MESSAGING_SERVICE_SID` - SMS OTP delivery
//! - `SENDGRID_API_KEY`, `SENDGRID_FROM_EMAIL` - Email OTP delivery
//! - `GOOGLE_CLIENT_ID` - Expected audience of Google ID tokens
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`
//!
//! When the Twilio or `SendGrid` block is absent, one-time passwords are written
//! to the log instead of being delivered.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use nextgen_core::CurrencyCode;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_SIGNING_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Server application configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL, without trailing slash
    pub base_url: String,
    /// Browser origins allowed by CORS; empty allows any origin
    pub cors_origins: Vec<String>,
    /// HS256 key for customer and password-reset tokens
    pub jwt_secret: SecretString,
    /// Static bearer token accepted on `/admin` routes
    pub admin_api_token: SecretString,
    /// Currency used for payment intents and promotional offers
    pub payment_currency: CurrencyCode,
    pub stripe: StripeConfig,
    pub storage: StorageConfig,
    pub twilio: Option<TwilioConfig>,
    pub sendgrid: Option<SendGridConfig>,
    /// OAuth client ID that Google ID tokens must be issued for
    pub google_client_id: Option<String>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
    pub sentry_sample_rate: f32,
    pub sentry_traces_sample_rate: f32,
}

/// Stripe API configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct StripeConfig {
    pub secret_key: SecretString,
    pub api_version: Option<String>,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"[REDACTED]")
            .field("api_version", &self.api_version)
            .finish()
    }
}

/// S3-compatible object storage configuration.
#[derive(Clone)]
pub struct StorageConfig {
    pub region: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: SecretString,
    /// Path-style endpoint; virtual-hosted AWS URLs are used when absent
    pub endpoint: Option<String>,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Twilio Messaging configuration.
#[derive(Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: SecretString,
    pub messaging_service_sid: String,
}

impl std::fmt::Debug for TwilioConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwilioConfig")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"[REDACTED]")
            .field("messaging_service_sid", &self.messaging_service_sid)
            .finish()
    }
}

/// `SendGrid` mail configuration.
#[derive(Clone)]
pub struct SendGridConfig {
    pub api_key: SecretString,
    pub from_email: String,
}

impl std::fmt::Debug for SendGridConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendGridConfig")
            .field("api_key", &"[REDACTED]")
            .field("from_email", &self.from_email)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("NEXTGEN_DATABASE_URL")?;
        let host = get_env_or_default("NEXTGEN_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("NEXTGEN_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("NEXTGEN_PORT", "9000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("NEXTGEN_PORT".to_string(), e.to_string()))?;
        let base_url = get_required_env("NEXTGEN_BASE_URL")?
            .trim_end_matches('/')
            .to_string();
        url::Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("NEXTGEN_BASE_URL".to_string(), e.to_string())
        })?;

        let cors_origins = parse_origins(&get_env_or_default("STORE_CORS", ""));

        let jwt_secret = get_validated_secret("JWT_SECRET")?;
        validate_secret_length(&jwt_secret, "JWT_SECRET")?;
        let admin_api_token = get_validated_secret("ADMIN_API_TOKEN")?;
        validate_secret_length(&admin_api_token, "ADMIN_API_TOKEN")?;

        let payment_currency = CurrencyCode::parse(&get_env_or_default("PAYMENT_CURRENCY", "gbp"))
            .map_err(|e| {
                ConfigError::InvalidEnvVar("PAYMENT_CURRENCY".to_string(), e.to_string())
            })?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            cors_origins,
            jwt_secret,
            admin_api_token,
            payment_currency,
            stripe: StripeConfig::from_env()?,
            storage: StorageConfig::from_env()?,
            twilio: TwilioConfig::from_env()?,
            sendgrid: SendGridConfig::from_env()?,
            google_client_id: get_optional_env("GOOGLE_CLIENT_ID"),
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: get_rate("SENTRY_SAMPLE_RATE", 1.0)?,
            sentry_traces_sample_rate: get_rate("SENTRY_TRACES_SAMPLE_RATE", 0.1)?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl StripeConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            secret_key: get_required_secret("STRIPE_SECRET_KEY")?,
            api_version: get_optional_env("STRIPE_API_VERSION"),
        })
    }
}

impl StorageConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            region: get_required_env("AWS_S3_REGION")?,
            bucket: get_required_env("AWS_S3_BUCKET_NAME")?,
            access_key_id: get_required_env("AWS_ACCESS_KEY")?,
            secret_access_key: get_required_secret("AWS_SECRET_ACCESS")?,
            endpoint: get_optional_env("AWS_S3_ENDPOINT").map(|e| e.trim_end_matches('/').to_string()),
        })
    }
}

impl TwilioConfig {
    /// Twilio is optional as a block: all three variables or none.
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(account_sid) = get_optional_env("TWILIO_ACCOUNT_SID") else {
            return Ok(None);
        };
        Ok(Some(Self {
            account_sid,
            auth_token: get_required_secret("TWILIO_AUTH_TOKEN")?,
            messaging_service_sid: get_required_env("TWILIO_MESSAGING_SERVICE_SID")?,
        }))
    }
}

impl SendGridConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(api_key) = get_optional_env("SENDGRID_API_KEY") else {
            return Ok(None);
        };
        Ok(Some(Self {
            api_key: SecretString::from(api_key),
            from_email: get_required_env("SENDGRID_FROM_EMAIL")?,
        }))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Split a comma-separated origin list, dropping blanks and trailing slashes.
fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|o| o.trim().trim_end_matches('/'))
        .filter(|o| !o.is_empty())
        .map(String::from)
        .collect()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse a sampling rate in `0.0..=1.0`.
fn get_rate(key: &str, default: f32) -> Result<f32, ConfigError> {
    let Some(raw) = get_optional_env(key) else {
        return Ok(default);
    };
    let rate = raw
        .parse::<f32>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !(0.0..=1.0).contains(&rate) {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be between 0.0 and 1.0".to_string(),
        ));
    }
    Ok(rate)
}

/// Validate that a signing secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SIGNING_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SIGNING_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample_config() -> ServerConfig {
        ServerConfig {
            database_url: SecretString::from("postgres://localhost/nextgen"),
            host: "127.0.0.1".parse().unwrap(),
            port: 9000,
            base_url: "http://localhost:9000".to_string(),
            cors_origins: Vec::new(),
            jwt_secret: SecretString::from("x".repeat(32)),
            admin_api_token: SecretString::from("y".repeat(32)),
            payment_currency: CurrencyCode::gbp(),
            stripe: StripeConfig {
                secret_key: SecretString::from("sk_test_super_private_value"),
                api_version: None,
            },
            storage: StorageConfig {
                region: "eu-west-2".to_string(),
                bucket: "nextgen-uploads".to_string(),
                access_key_id: "AKIDEXAMPLE".to_string(),
                secret_access_key: SecretString::from("aws_private_value"),
                endpoint: None,
            },
            twilio: None,
            sendgrid: None,
            google_client_id: None,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.1,
        }
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-jwt-secret-here", "JWT_SECRET");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength(&"a".repeat(40), "JWT_SECRET");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "JWT_SECRET");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_secret_length() {
        assert!(validate_secret_length(&SecretString::from("short"), "JWT_SECRET").is_err());
        assert!(validate_secret_length(&SecretString::from("a".repeat(32)), "JWT_SECRET").is_ok());
    }

    #[test]
    fn test_socket_addr() {
        let addr = sample_config().socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 9000);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let debug_output = format!("{:?}", sample_config());

        assert!(debug_output.contains("nextgen-uploads"));
        assert!(debug_output.contains("AKIDEXAMPLE"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("sk_test_super_private_value"));
        assert!(!debug_output.contains("aws_private_value"));
    }

    #[test]
    fn test_parse_origins() {
        assert_eq!(
            parse_origins(" https://shop.example.com/, ,http://localhost:8000"),
            vec!["https://shop.example.com", "http://localhost:8000"]
        );
        assert!(parse_origins("").is_empty());
    }
}
