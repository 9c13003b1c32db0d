//! Customer records from the commerce platform.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use nextgen_core::{CustomerId, Email, MobileNumber};

/// Metadata key holding the customer's uploaded avatar URL.
pub const PROFILE_IMAGE_KEY: &str = "profile_image";

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Customer {
    pub id: CustomerId,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub has_account: bool,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    /// "First Last", with `Unknown` standing in for either missing part.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or("Unknown"),
            self.last_name.as_deref().unwrap_or("Unknown")
        )
    }

    #[must_use]
    pub fn profile_image(&self) -> Option<&str> {
        self.metadata.get(PROFILE_IMAGE_KEY).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewCustomer {
    pub email: Option<Email>,
    pub phone: Option<MobileNumber>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub has_account: bool,
}

impl NewCustomer {
    /// Split a full display name on the first space into first and last name.
    #[must_use]
    pub fn with_full_name(mut self, name: &str) -> Self {
        let name = name.trim();
        let (first, last) = name.split_once(' ').unwrap_or((name, ""));
        self.first_name = Some(first.to_string()).filter(|s| !s.is_empty());
        self.last_name = Some(last.trim().to_string()).filter(|s| !s.is_empty());
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn customer(first: Option<&str>, last: Option<&str>, metadata: Value) -> Customer {
        Customer {
            id: CustomerId::new("cus_1"),
            email: None,
            first_name: first.map(String::from),
            last_name: last.map(String::from),
            phone: None,
            has_account: true,
            metadata,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_display_name_fallbacks() {
        assert_eq!(
            customer(Some("Ada"), Some("Lovelace"), Value::Null).display_name(),
            "Ada Lovelace"
        );
        assert_eq!(
            customer(Some("Ada"), None, Value::Null).display_name(),
            "Ada Unknown"
        );
        assert_eq!(
            customer(None, None, Value::Null).display_name(),
            "Unknown Unknown"
        );
    }

    #[test]
    fn test_profile_image_from_metadata() {
        let c = customer(None, None, serde_json::json!({"profile_image": "https://img"}));
        assert_eq!(c.profile_image(), Some("https://img"));
        assert_eq!(customer(None, None, Value::Null).profile_image(), None);
    }

    #[test]
    fn test_with_full_name_splits_on_first_space() {
        let c = NewCustomer::default().with_full_name("Mary Ann Smith");
        assert_eq!(c.first_name.as_deref(), Some("Mary"));
        assert_eq!(c.last_name.as_deref(), Some("Ann Smith"));

        let single = NewCustomer::default().with_full_name("Cher");
        assert_eq!(single.first_name.as_deref(), Some("Cher"));
        assert_eq!(single.last_name, None);
    }
}
