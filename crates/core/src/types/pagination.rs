//! `limit`/`offset` pagination and `field:order` sort parsing for list routes.

use serde::Serialize;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PaginationError {
    #[error("limit must be greater than 0")]
    ZeroLimit,
    #[error("limit must be at most {max}")]
    LimitTooLarge { max: u32 },
    #[error("unsupported sort field '{0}'")]
    UnknownSortField(String),
    #[error("sort order must be 'asc' or 'desc', got '{0}'")]
    UnknownSortOrder(String),
}

/// Page window for list routes. Defaults to the first ten records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub limit: u32,
    pub offset: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: Self::DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl Pagination {
    pub const DEFAULT_LIMIT: u32 = 10;
    pub const MAX_LIMIT: u32 = 100;

    /// Build a page window from optional query parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if `limit` is zero or above [`Self::MAX_LIMIT`].
    pub const fn from_query(limit: Option<u32>, offset: Option<u32>) -> Result<Self, PaginationError> {
        let limit = match limit {
            Some(l) => l,
            None => Self::DEFAULT_LIMIT,
        };
        if limit == 0 {
            return Err(PaginationError::ZeroLimit);
        }
        if limit > Self::MAX_LIMIT {
            return Err(PaginationError::LimitTooLarge {
                max: Self::MAX_LIMIT,
            });
        }
        let offset = match offset {
            Some(o) => o,
            None => 0,
        };
        Ok(Self { limit, offset })
    }

    /// Returns the window of `items` covered by this page.
    #[must_use]
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = (self.offset as usize).min(items.len());
        let end = start.saturating_add(self.limit as usize).min(items.len());
        items.get(start..end).unwrap_or_default()
    }

    #[must_use]
    pub fn limit_i64(&self) -> i64 {
        i64::from(self.limit)
    }

    #[must_use]
    pub fn offset_i64(&self) -> i64 {
        i64::from(self.offset)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Timestamp fields wishlist items can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    CreatedAt,
    UpdatedAt,
}

/// A parsed `field:order` sort expression, e.g. `created_at:desc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ItemSort {
    pub field: SortField,
    pub order: SortOrder,
}

impl ItemSort {
    /// Parse `field[:order]`. A missing order means descending.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown fields or orders.
    pub fn parse(s: &str) -> Result<Self, PaginationError> {
        let (field, order) = s.split_once(':').unwrap_or((s, "desc"));
        let field = match field.trim() {
            "created_at" => SortField::CreatedAt,
            "updated_at" => SortField::UpdatedAt,
            other => return Err(PaginationError::UnknownSortField(other.to_owned())),
        };
        let order = match order.trim().to_ascii_lowercase().as_str() {
            "asc" => SortOrder::Asc,
            "desc" => SortOrder::Desc,
            other => return Err(PaginationError::UnknownSortOrder(other.to_owned())),
        };
        Ok(Self { field, order })
    }
}
