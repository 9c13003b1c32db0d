//! Product review rating.

use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum RatingError {
    #[error("Rating must be between 1 and 5")]
    OutOfRange(f64),
}

/// A star rating between 1 and 5 inclusive. Half stars are allowed.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Rating(f64);

impl Rating {
    pub const MIN: f64 = 1.0;
    pub const MAX: f64 = 5.0;

    /// # Errors
    ///
    /// Returns `RatingError::OutOfRange` for values outside `1.0..=5.0`
    /// (including NaN).
    pub fn new(value: f64) -> Result<Self, RatingError> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(RatingError::OutOfRange(value))
        }
    }

    #[must_use]
    pub const fn value(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Rating {
    type Error = RatingError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Rating> for f64 {
    fn from(rating: Rating) -> Self {
        rating.0
    }
}

/// Average of a set of ratings rounded to two decimal places, or `0.0` for
/// an empty set.
#[must_use]
pub fn average_rating(ratings: &[f64]) -> f64 {
    if ratings.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)] // review counts stay far below 2^52
    let mean = ratings.iter().sum::<f64>() / ratings.len() as f64;
    (mean * 100.0).round() / 100.0
}
