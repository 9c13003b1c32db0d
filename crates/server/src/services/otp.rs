//! In-memory one-time password store.
//!
//! Each key (a mobile number or an email address) holds at most one pending
//! code. Issuing overwrites the pending code. Verification is an atomic
//! per-key compute on the `moka` cache, so concurrent verifies of one key
//! cannot both succeed.
//!
//! Codes live for five minutes. The cache TTL bounds memory; the stored
//! `expires_at` decides validity so verification reports expiry precisely.
//! State is process-local and lost on restart.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use moka::future::Cache;
use moka::ops::compute::Op;
use rand::Rng;
use thiserror::Error;

/// How long an issued code stays valid.
pub const OTP_LIFETIME: TimeDelta = TimeDelta::minutes(5);

const MAX_PENDING: u64 = 100_000;

/// Why a code was rejected. The messages are shown to the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OtpError {
    /// No pending code for this key.
    #[error("OTP expired or invalid.")]
    Missing,
    /// The pending code expired; it has been discarded.
    #[error("OTP expired.")]
    Expired,
    /// Wrong code; the pending code is kept for another attempt.
    #[error("Invalid OTP.")]
    Mismatch,
}

/// Length of generated codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpLength {
    /// Six digits, sent by SMS.
    Six,
    /// Four digits, sent by email.
    Four,
}

impl OtpLength {
    fn generate(self) -> String {
        let mut rng = rand::rng();
        let code: u32 = match self {
            Self::Six => rng.random_range(100_000..=999_999),
            Self::Four => rng.random_range(1_000..=9_999),
        };
        code.to_string()
    }
}

#[derive(Debug, Clone)]
struct PendingCode {
    code: String,
    expires_at: DateTime<Utc>,
}

/// Pending one-time codes keyed by phone number or email.
#[derive(Clone)]
pub struct OtpStore {
    pending: Cache<String, PendingCode>,
    length: OtpLength,
}

impl OtpStore {
    #[must_use]
    pub fn new(length: OtpLength) -> Self {
        let ttl = OTP_LIFETIME
            .to_std()
            .unwrap_or(Duration::from_secs(300));
        let pending = Cache::builder()
            .max_capacity(MAX_PENDING)
            .time_to_live(ttl)
            .build();
        Self { pending, length }
    }

    /// Generate and store a fresh code for `key`, replacing any pending one.
    pub async fn issue(&self, key: &str) -> String {
        self.issue_at(key, Utc::now()).await
    }

    pub async fn issue_at(&self, key: &str, now: DateTime<Utc>) -> String {
        let code = self.length.generate();
        self.pending
            .insert(
                key.to_owned(),
                PendingCode {
                    code: code.clone(),
                    expires_at: now + OTP_LIFETIME,
                },
            )
            .await;
        code
    }

    /// Check `code` against the pending code for `key`.
    ///
    /// # Errors
    ///
    /// Returns the `OtpError` describing why the code was rejected.
    pub async fn verify(&self, key: &str, code: &str) -> Result<(), OtpError> {
        self.verify_at(key, code, Utc::now()).await
    }

    /// # Errors
    ///
    /// Returns the `OtpError` describing why the code was rejected.
    pub async fn verify_at(
        &self,
        key: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<(), OtpError> {
        let mut outcome = Err(OtpError::Missing);

        self.pending
            .entry_by_ref(key)
            .and_compute_with(|entry| {
                let op = match entry {
                    None => Op::Nop,
                    Some(entry) => {
                        let pending = entry.value();
                        if now > pending.expires_at {
                            outcome = Err(OtpError::Expired);
                            Op::Remove
                        } else if pending.code != code {
                            outcome = Err(OtpError::Mismatch);
                            Op::Nop
                        } else {
                            outcome = Ok(());
                            Op::Remove
                        }
                    }
                };
                std::future::ready(op)
            })
            .await;

        outcome
    }

    #[cfg(test)]
    fn contains(&self, key: &str) -> bool {
        self.pending.contains_key(key)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_issue_generates_codes_of_requested_length() {
        let sms = OtpStore::new(OtpLength::Six);
        let email = OtpStore::new(OtpLength::Four);

        let six = sms.issue("+447700900123").await;
        let four = email.issue("ada@example.com").await;

        assert_eq!(six.len(), 6);
        assert!(six.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(four.len(), 4);
        assert!(four.parse::<u32>().unwrap() >= 1000);
    }

    #[tokio::test]
    async fn test_verify_success_consumes_code() {
        let store = OtpStore::new(OtpLength::Six);
        let now = Utc::now();
        let code = store.issue_at("+447700900123", now).await;

        assert_eq!(store.verify_at("+447700900123", &code, now).await, Ok(()));
        assert_eq!(
            store.verify_at("+447700900123", &code, now).await,
            Err(OtpError::Missing)
        );
    }

    #[tokio::test]
    async fn test_mismatch_keeps_code() {
        let store = OtpStore::new(OtpLength::Six);
        let now = Utc::now();
        let code = store.issue_at("+447700900123", now).await;

        assert_eq!(
            store.verify_at("+447700900123", "000000", now).await,
            Err(OtpError::Mismatch)
        );
        assert!(store.contains("+447700900123"));
        assert_eq!(store.verify_at("+447700900123", &code, now).await, Ok(()));
    }

    #[tokio::test]
    async fn test_expired_code_is_discarded() {
        let store = OtpStore::new(OtpLength::Four);
        let issued = Utc::now();
        let code = store.issue_at("ada@example.com", issued).await;
        let later = issued + OTP_LIFETIME + TimeDelta::seconds(1);

        assert_eq!(
            store.verify_at("ada@example.com", &code, later).await,
            Err(OtpError::Expired)
        );
        assert!(!store.contains("ada@example.com"));
    }

    #[tokio::test]
    async fn test_reissue_overwrites_pending_code() {
        let store = OtpStore::new(OtpLength::Six);
        let now = Utc::now();
        let first = store.issue_at("+447700900123", now).await;
        let mut second = store.issue_at("+447700900123", now).await;
        while second == first {
            second = store.issue_at("+447700900123", now).await;
        }

        assert_eq!(
            store.verify_at("+447700900123", &first, now).await,
            Err(OtpError::Mismatch)
        );
        assert_eq!(store.verify_at("+447700900123", &second, now).await, Ok(()));
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let store = OtpStore::new(OtpLength::Six);
        let now = Utc::now();
        let code = store.issue_at("+447700900123", now).await;

        assert_eq!(
            store.verify_at("+447700900999", &code, now).await,
            Err(OtpError::Missing)
        );
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(OtpError::Missing.to_string(), "OTP expired or invalid.");
        assert_eq!(OtpError::Expired.to_string(), "OTP expired.");
        assert_eq!(OtpError::Mismatch.to_string(), "Invalid OTP.");
    }
}
