//! Status enums for orders and refunds.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Order lifecycle status as stored on the `order` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Completed,
    Draft,
    Archived,
    Canceled,
    RequiresAction,
    Failed,
}

impl OrderStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Draft => "draft",
            Self::Archived => "archived",
            Self::Canceled => "canceled",
            Self::RequiresAction => "requires_action",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown order status '{0}'")]
pub struct UnknownOrderStatus(pub String);

impl std::str::FromStr for OrderStatus {
    type Err = UnknownOrderStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "pending" => Self::Pending,
            "completed" => Self::Completed,
            "draft" => Self::Draft,
            "archived" => Self::Archived,
            "canceled" => Self::Canceled,
            "requires_action" => Self::RequiresAction,
            "failed" => Self::Failed,
            other => return Err(UnknownOrderStatus(other.to_owned())),
        })
    }
}

/// Outcome of the refund step of an order cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    /// Nothing was owed back to the customer.
    NotNeeded,
    /// The processor confirmed the refund.
    Succeeded,
}

impl RefundStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotNeeded => "not_needed",
            Self::Succeeded => "succeeded",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_round_trips_through_str() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Completed,
            OrderStatus::Canceled,
            OrderStatus::RequiresAction,
            OrderStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("shipped".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_refund_status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&RefundStatus::NotNeeded).unwrap(),
            "\"not_needed\""
        );
        assert_eq!(RefundStatus::Succeeded.as_str(), "succeeded");
    }
}
