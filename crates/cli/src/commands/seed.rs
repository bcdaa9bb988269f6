//! Seed the orders database with a demo catalog.
//!
//! Inserts product `A0001` with a required `color` enum, its variant
//! `A0001-RED` with two units in stock, and two demo customers who share a
//! first name so the disambiguation path can be tried by hand. Re-running
//! the command updates the same rows.

use rust_decimal::Decimal;
use tracing::info;

use chatshop_core::{AttributeKind, AttributeMap, AttributeSchema, AttributeSpec, Phone};
use chatshop_orders::db::{self, CatalogRepository, CustomerRepository};

use super::{CommandError, database_url};

/// Demo customers: first, last, phone, address, postal code, customer code.
const DEMO_CUSTOMERS: &[(&str, &str, &str, &str, &str, &str)] = &[
    (
        "علی",
        "رضایی",
        "09123330442",
        "تهران، خیابان ولیعصر",
        "1234567890",
        "CUST-1001",
    ),
    (
        "علی",
        "رحیمی",
        "09127770918",
        "اصفهان، خیابان چهارباغ",
        "8134567890",
        "CUST-1002",
    ),
];

/// Seed the demo catalog and customers.
///
/// # Errors
///
/// Returns `CommandError` if the database is unreachable or a write fails.
pub async fn demo() -> Result<(), CommandError> {
    let database_url = database_url()?;
    let pool = db::create_pool(&database_url).await?;

    let schema = AttributeSchema::new(vec![AttributeSpec {
        key: "color".to_owned(),
        title: "رنگ".to_owned(),
        required: true,
        kind: AttributeKind::Enum {
            allowed_values: vec!["red".to_owned(), "black".to_owned()],
        },
    }]);

    let catalog = CatalogRepository::new(&pool);
    let product = catalog
        .upsert_product("A0001", "ماگ سرامیکی", Decimal::from(450_000), 0, &schema)
        .await?;
    let variant = catalog
        .upsert_variant(
            product.id,
            "A0001-RED",
            &AttributeMap::from_pairs([("color", "red")]),
            None,
            2,
        )
        .await?;
    info!(product_id = %product.id, sku_code = %variant.sku_code, "Seeded catalog");

    let customers = CustomerRepository::new(&pool);
    for &(first, last, phone, address, postal, code) in DEMO_CUSTOMERS {
        let phone = Phone::parse(phone)
            .map_err(|e| CommandError::InvalidSeed(format!("{phone}: {e}")))?;
        let customer = customers
            .upsert(first, last, &phone, address, postal, code)
            .await?;
        info!(customer_id = %customer.id, customer_code = %customer.customer_code, "Seeded customer");
    }

    Ok(())
}
