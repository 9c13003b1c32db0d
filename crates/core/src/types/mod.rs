//! Core types for NextGen.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod money;
pub mod pagination;
pub mod phone;
pub mod rating;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::{CurrencyCode, CurrencyError, to_minor_units};
pub use pagination::{ItemSort, Pagination, PaginationError, SortField, SortOrder};
pub use phone::{MobileNumber, MobileNumberError};
pub use rating::{Rating, RatingError, average_rating};
pub use status::*;
