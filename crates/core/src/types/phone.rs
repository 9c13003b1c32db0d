//! Mobile phone numbers used for SMS one-time passwords.

use core::fmt;

use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MobileNumberError {
    #[error("mobile number cannot be empty")]
    Empty,
    #[error("mobile number may only contain digits and a leading +")]
    InvalidCharacter,
    #[error("mobile number must have between {min} and {max} digits")]
    InvalidLength { min: usize, max: usize },
}

/// A mobile number in E.164-like form.
///
/// Spaces, dashes, dots and parentheses are stripped, so `+44 7700-900 123`
/// and `+447700900123` are the same key in the OTP store.
///
/// ```
/// use nextgen_core::MobileNumber;
///
/// let phone = MobileNumber::parse("+44 (7700) 900-123").unwrap();
/// assert_eq!(phone.as_str(), "+447700900123");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct MobileNumber(String);

impl MobileNumber {
    pub const MIN_DIGITS: usize = 8;
    pub const MAX_DIGITS: usize = 15;

    /// Parse and normalize a mobile number.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, contains anything other than
    /// digits, separators and a single leading `+`, or has a digit count
    /// outside 8..=15.
    pub fn parse(s: &str) -> Result<Self, MobileNumberError> {
        let compact: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
            .collect();
        if compact.is_empty() {
            return Err(MobileNumberError::Empty);
        }

        let digits = compact.strip_prefix('+').unwrap_or(&compact);
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(MobileNumberError::InvalidCharacter);
        }
        if !(Self::MIN_DIGITS..=Self::MAX_DIGITS).contains(&digits.len()) {
            return Err(MobileNumberError::InvalidLength {
                min: Self::MIN_DIGITS,
                max: Self::MAX_DIGITS,
            });
        }

        Ok(Self(compact))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MobileNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for MobileNumber {
    type Error = MobileNumberError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<MobileNumber> for String {
    fn from(phone: MobileNumber) -> Self {
        phone.0
    }
}
