//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! chatshop migrate
//! ```
//!
//! # Environment Variables
//!
//! - `ORDERS_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! # Migration Files
//!
//! ```text
//! crates/orders/migrations/
//! ├── 20261001000001_create_catalog.sql
//! ├── 20261001000002_create_customers.sql
//! └── 20261001000003_create_orders.sql
//! ```

use chatshop_orders::db;

use super::{CommandError, database_url};

/// Run the orders database migrations.
///
/// # Errors
///
/// Returns `CommandError` if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), CommandError> {
    let database_url = database_url()?;

    tracing::info!("Connecting to orders database...");
    let pool = db::create_pool(&database_url).await?;

    tracing::info!("Running orders migrations...");
    db::migrate(&pool).await?;

    tracing::info!("Orders migrations complete!");
    Ok(())
}
