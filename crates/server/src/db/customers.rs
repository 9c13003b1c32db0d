//! Customer repository.

use serde_json::Value;
use sqlx::PgPool;

use nextgen_core::{CustomerId, Email, MobileNumber};

use super::{RepositoryError, conflict_on_unique};
use crate::models::{Customer, NewCustomer};

const CUSTOMER_COLUMNS: &str =
    "id, email, first_name, last_name, phone, has_account, metadata, created_at, updated_at";

/// Repository for customer database operations.
pub struct CustomerRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CustomerRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let row = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customer WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }

    /// Load several customers at once, keyed by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(&self, ids: &[CustomerId]) -> Result<Vec<Customer>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customer WHERE id = ANY($1) AND deleted_at IS NULL"
        ))
        .bind(super::text_array(ids))
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_phone(
        &self,
        phone: &MobileNumber,
    ) -> Result<Option<Customer>, RepositoryError> {
        let row = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customer WHERE phone = $1 AND deleted_at IS NULL"
        ))
        .bind(phone.as_str())
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }

    /// Find a customer with a registered account (not a guest checkout) by email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_registered_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<Customer>, RepositoryError> {
        let row = sqlx::query_as::<_, Customer>(&format!(
            r"
            SELECT {CUSTOMER_COLUMNS} FROM customer
            WHERE lower(email) = $1 AND has_account AND deleted_at IS NULL
            ORDER BY created_at
            LIMIT 1
            "
        ))
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }

    /// Find any customer, guest or registered, by email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_email(&self, email: &Email) -> Result<Option<Customer>, RepositoryError> {
        let row = sqlx::query_as::<_, Customer>(&format!(
            r"
            SELECT {CUSTOMER_COLUMNS} FROM customer
            WHERE lower(email) = $1 AND deleted_at IS NULL
            ORDER BY has_account DESC, created_at
            LIMIT 1
            "
        ))
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }

    /// Insert a customer.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the phone number is taken.
    pub async fn create(&self, customer: &NewCustomer) -> Result<Customer, RepositoryError> {
        sqlx::query_as::<_, Customer>(&format!(
            r"
            INSERT INTO customer (id, email, phone, first_name, last_name, has_account)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {CUSTOMER_COLUMNS}
            "
        ))
        .bind(CustomerId::generate())
        .bind(customer.email.as_ref().map(Email::as_str))
        .bind(customer.phone.as_ref().map(MobileNumber::as_str))
        .bind(customer.first_name.as_deref())
        .bind(customer.last_name.as_deref())
        .bind(customer.has_account)
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "customer with this phone already exists"))
    }

    /// Shallow-merge `patch` into the customer's metadata object.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the customer does not exist.
    pub async fn merge_metadata(
        &self,
        id: &CustomerId,
        patch: &Value,
    ) -> Result<Customer, RepositoryError> {
        sqlx::query_as::<_, Customer>(&format!(
            r"
            UPDATE customer
            SET metadata = COALESCE(metadata, '{{}}'::jsonb) || $2, updated_at = now()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {CUSTOMER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(patch)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }
}
