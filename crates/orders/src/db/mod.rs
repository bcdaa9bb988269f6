//! Postgres storage for the order commitment service.
//!
//! # Tables
//!
//! - `product` - Catalog products, base price and variant-less stock
//! - `variant` - SKUs with attribute hash, price override and stock
//! - `customer` - Customer records (read-only here)
//! - `customer_order` - Orders with status, snapshot and proposal nonce
//! - `order_item` - Item snapshots (SKU, quantity, unit price, attributes)
//!
//! # Migrations
//!
//! Migrations are stored in `crates/orders/migrations/` and run via:
//! ```bash
//! cargo run -p chatshop-cli -- migrate
//! ```
//!
//! # Locking
//!
//! Every write runs in one transaction. Stock rows are locked with
//! `SELECT ... FOR UPDATE` in [`StockTarget`] order (products by id, then
//! variants by SKU) before the sufficiency check, and the order row is locked
//! before a transition. `CHECK (stock_qty >= 0)` backs this up in the schema.
//!
//! [`StockTarget`]: crate::models::StockTarget

pub mod catalog;
pub mod customers;
pub mod orders;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use chatshop_core::{CustomerId, OrderId, OrderStatus, Phone, ProductId};

pub use catalog::CatalogRepository;
pub use customers::CustomerRepository;
pub use orders::OrderRepository;

use crate::models::{Customer, NewOrder, Order, Product, Variant};
use crate::store::{OrderStore, StoreError};

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Run the embedded orders migrations.
///
/// # Errors
///
/// Returns `sqlx::migrate::MigrateError` if a migration fails.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// [`OrderStore`] backed by Postgres.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn product_by_code(&self, code: &str) -> Result<Option<Product>, StoreError> {
        CatalogRepository::new(&self.pool).product_by_code(code).await
    }

    async fn variants_of(&self, product_id: ProductId) -> Result<Vec<Variant>, StoreError> {
        CatalogRepository::new(&self.pool).variants_of(product_id).await
    }

    async fn active_variant_by_hash(
        &self,
        product_id: ProductId,
        attributes_hash: &str,
    ) -> Result<Option<Variant>, StoreError> {
        CatalogRepository::new(&self.pool)
            .active_variant_by_hash(product_id, attributes_hash)
            .await
    }

    async fn customer_by_id(&self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        CustomerRepository::new(&self.pool).get_by_id(id).await
    }

    async fn customer_by_phone(&self, phone: &Phone) -> Result<Option<Customer>, StoreError> {
        CustomerRepository::new(&self.pool).get_by_phone(phone).await
    }

    async fn customer_by_code(&self, code: &str) -> Result<Option<Customer>, StoreError> {
        CustomerRepository::new(&self.pool).get_by_code(code).await
    }

    async fn customers_by_name_fragments(
        &self,
        fragments: &[String],
        after: Option<CustomerId>,
        limit: usize,
    ) -> Result<Vec<Customer>, StoreError> {
        CustomerRepository::new(&self.pool)
            .find_by_name_fragments(fragments, after, limit)
            .await
    }

    async fn order_by_id(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        OrderRepository::new(&self.pool).get_by_id(id).await
    }

    async fn order_by_code(&self, code: &str) -> Result<Option<Order>, StoreError> {
        OrderRepository::new(&self.pool).get_by_code(code).await
    }

    async fn order_by_nonce(&self, nonce: &str) -> Result<Option<Order>, StoreError> {
        OrderRepository::new(&self.pool).get_by_nonce(nonce).await
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        OrderRepository::new(&self.pool).insert(order).await
    }

    async fn transition_order(&self, id: OrderId, to: OrderStatus) -> Result<Order, StoreError> {
        OrderRepository::new(&self.pool).transition(id, to).await
    }
}
