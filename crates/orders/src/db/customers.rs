//! Customer lookups.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use chatshop_core::{CustomerId, Phone};

use crate::models::Customer;
use crate::store::StoreError;

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: i32,
    first_name: String,
    last_name: String,
    phone: String,
    address: String,
    postal_code: String,
    customer_code: String,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<CustomerRow> for Customer {
    type Error = StoreError;

    fn try_from(row: CustomerRow) -> Result<Self, Self::Error> {
        let phone = Phone::parse(&row.phone).map_err(|e| {
            StoreError::DataCorruption(format!("invalid phone in database: {e}"))
        })?;

        Ok(Self {
            id: CustomerId::new(row.id),
            first_name: row.first_name,
            last_name: row.last_name,
            phone,
            address: row.address,
            postal_code: row.postal_code,
            customer_code: row.customer_code,
            notes: row.notes,
            created_at: row.created_at,
        })
    }
}

/// Folds a full name the same way as `chatshop_core::text::fold_name` for
/// the letters that matter in lookups.
const FOLDED_NAME: &str = r"translate(lower(first_name || ' ' || last_name), U&'\064A\0649\0643\200C\0640', U&'\06CC\06CC\06A9 ')";

/// Repository for customer database operations.
pub struct CustomerRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CustomerRepository<'a> {
    /// Create a new customer repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a customer by ID.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails.
    pub async fn get_by_id(&self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        let row = sqlx::query_as::<_, CustomerRow>(
            r"
            SELECT id, first_name, last_name, phone, address, postal_code,
                   customer_code, notes, created_at
            FROM customer
            WHERE id = $1
            ",
        )
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        row.map(Customer::try_from).transpose()
    }

    /// Get a customer by canonical phone.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails.
    pub async fn get_by_phone(&self, phone: &Phone) -> Result<Option<Customer>, StoreError> {
        let row = sqlx::query_as::<_, CustomerRow>(
            r"
            SELECT id, first_name, last_name, phone, address, postal_code,
                   customer_code, notes, created_at
            FROM customer
            WHERE phone = $1
            ",
        )
        .bind(phone.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(Customer::try_from).transpose()
    }

    /// Get a customer by external code.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails.
    pub async fn get_by_code(&self, code: &str) -> Result<Option<Customer>, StoreError> {
        let row = sqlx::query_as::<_, CustomerRow>(
            r"
            SELECT id, first_name, last_name, phone, address, postal_code,
                   customer_code, notes, created_at
            FROM customer
            WHERE customer_code = $1
            ",
        )
        .bind(code)
        .fetch_optional(self.pool)
        .await?;

        row.map(Customer::try_from).transpose()
    }

    /// Find customers whose folded full name contains any fragment.
    ///
    /// Keyset-paged by id: pass the last id of the previous page as `after`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails.
    pub async fn find_by_name_fragments(
        &self,
        fragments: &[String],
        after: Option<CustomerId>,
        limit: usize,
    ) -> Result<Vec<Customer>, StoreError> {
        if fragments.is_empty() {
            return Ok(Vec::new());
        }

        let patterns: Vec<String> = fragments
            .iter()
            .map(|f| format!("%{}%", escape_like(f)))
            .collect();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let sql = format!(
            r"
            SELECT id, first_name, last_name, phone, address, postal_code,
                   customer_code, notes, created_at
            FROM customer
            WHERE {FOLDED_NAME} LIKE ANY($1)
              AND ($2::INTEGER IS NULL OR id > $2)
            ORDER BY id
            LIMIT $3
            "
        );
        let rows = sqlx::query_as::<_, CustomerRow>(&sql)
            .bind(patterns)
            .bind(after.map(|id| id.as_i32()))
            .bind(limit)
            .fetch_all(self.pool)
            .await?;

        rows.into_iter().map(Customer::try_from).collect()
    }

    /// Insert a customer or update the existing one with the same phone.
    ///
    /// Used by the seed command only.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if the customer code belongs to another
    /// phone.
    /// Returns `StoreError::Database` for other database errors.
    pub async fn upsert(
        &self,
        first_name: &str,
        last_name: &str,
        phone: &Phone,
        address: &str,
        postal_code: &str,
        customer_code: &str,
    ) -> Result<Customer, StoreError> {
        let row = sqlx::query_as::<_, CustomerRow>(
            r"
            INSERT INTO customer (first_name, last_name, phone, address, postal_code, customer_code)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (phone) DO UPDATE
            SET first_name = EXCLUDED.first_name,
                last_name = EXCLUDED.last_name,
                address = EXCLUDED.address,
                postal_code = EXCLUDED.postal_code
            RETURNING id, first_name, last_name, phone, address, postal_code,
                      customer_code, notes, created_at
            ",
        )
        .bind(first_name)
        .bind(last_name)
        .bind(phone.as_str())
        .bind(address)
        .bind(postal_code)
        .bind(customer_code)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return StoreError::Conflict("customer code already exists".to_owned());
            }
            StoreError::Database(e)
        })?;

        row.try_into()
    }
}

/// Escape `LIKE` wildcards so fragments match literally.
fn escape_like(fragment: &str) -> String {
    let mut escaped = String::with_capacity(fragment.len());
    for c in fragment.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
