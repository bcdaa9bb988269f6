//! Inventory ledger against a real `PostgreSQL` database.
//!
//! These tests require:
//! - A `PostgreSQL` database reachable through `ORDERS_DATABASE_URL`
//!   (or `DATABASE_URL`)
//!
//! Migrations are applied on connect. Every test seeds its own product under
//! a random code, so runs do not interfere.
//!
//! Run with: cargo test -p chatshop-integration-tests --test postgres -- --ignored

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use rust_decimal::Decimal;
use secrecy::SecretString;
use uuid::Uuid;

use chatshop_core::{AttributeMap, OrderStatus, Phone, ProductId};
use chatshop_integration_tests::{color_schema, red_mugs, signer};
use chatshop_orders::db::{self, CatalogRepository, CustomerRepository, PgStore};
use chatshop_orders::models::{NewOrder, NewOrderItem};
use chatshop_orders::services::{OrderError, OrderService, ProposalRequest, ResolverSettings};
use chatshop_orders::store::{OrderStore, StoreError, new_order_code};

struct PgContext {
    pool: sqlx::PgPool,
    service: OrderService,
    store: Arc<PgStore>,
    product_id: ProductId,
    code: String,
}

impl PgContext {
    /// Seed a product with one `red` variant holding `red_stock` units.
    async fn with_red_stock(red_stock: i32) -> Self {
        let url = std::env::var("ORDERS_DATABASE_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .expect("ORDERS_DATABASE_URL or DATABASE_URL must be set");
        let pool = db::create_pool(&SecretString::from(url))
            .await
            .expect("Failed to connect to database");
        db::migrate(&pool).await.expect("Failed to run migrations");

        let suffix: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();
        let code = format!("PG-{suffix}");
        let catalog = CatalogRepository::new(&pool);
        let product = catalog
            .upsert_product(&code, "Mug", Decimal::from(120), 0, &color_schema())
            .await
            .unwrap();
        catalog
            .upsert_variant(
                product.id,
                &format!("{code}-RED"),
                &AttributeMap::from_pairs([("color", "red")]),
                None,
                red_stock,
            )
            .await
            .unwrap();

        let store = Arc::new(PgStore::new(pool.clone()));
        let service = OrderService::new(store.clone(), signer(), ResolverSettings::default());
        Self {
            pool,
            service,
            store,
            product_id: product.id,
            code,
        }
    }

    fn request(&self, quantity: i32) -> ProposalRequest {
        ProposalRequest {
            product_code: self.code.clone(),
            ..red_mugs(quantity)
        }
    }

    async fn red_stock(&self) -> i32 {
        let variants = CatalogRepository::new(&self.pool)
            .variants_of(self.product_id)
            .await
            .unwrap();
        variants[0].stock_qty
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "Requires a PostgreSQL database"]
async fn test_row_locks_prevent_oversell() {
    let ctx = PgContext::with_red_stock(2).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = ctx.service.clone();
        let quote = service.propose(ctx.request(1)).await.unwrap();
        handles.push(tokio::spawn(async move {
            service
                .place(&quote.signed.confirmation_token, &quote.signed.proposal)
                .await
        }));
    }

    let mut placed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => placed += 1,
            Err(OrderError::InsufficientStock { available, .. }) => assert_eq!(available, 0),
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(placed, 2);
    assert_eq!(ctx.red_stock().await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "Requires a PostgreSQL database"]
async fn test_concurrent_replays_return_one_order() {
    // Exactly enough stock for one placement: a replay must never see
    // insufficient_stock
    let ctx = PgContext::with_red_stock(1).await;
    let quote = ctx.service.propose(ctx.request(1)).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..6 {
        let service = ctx.service.clone();
        let signed = quote.signed.clone();
        handles.push(tokio::spawn(async move {
            service
                .place(&signed.confirmation_token, &signed.proposal)
                .await
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap().id);
    }
    assert!(ids.iter().all(|id| *id == ids[0]));
    assert_eq!(ctx.red_stock().await, 0);
}

#[tokio::test]
#[ignore = "Requires a PostgreSQL database"]
async fn test_reused_nonce_is_duplicate_proposal() {
    let ctx = PgContext::with_red_stock(3).await;
    let quote = ctx.service.propose(ctx.request(1)).await.unwrap();
    let first = ctx
        .service
        .place(&quote.signed.confirmation_token, &quote.signed.proposal)
        .await
        .unwrap();

    let err = ctx
        .store
        .insert_order(NewOrder {
            order_code: new_order_code(),
            status: OrderStatus::Pending,
            customer_id: None,
            customer_snapshot: first.customer_snapshot.clone(),
            total_amount: first.total_amount,
            proposal_nonce: first.proposal_nonce.clone(),
            items: first
                .items
                .iter()
                .map(|item| NewOrderItem {
                    product_id: item.product_id,
                    sku_code: item.sku_code.clone(),
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    attributes: item.attributes.clone(),
                })
                .collect(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateProposal));
    assert_eq!(ctx.red_stock().await, 2);
}

#[tokio::test]
#[ignore = "Requires a PostgreSQL database"]
async fn test_cancel_after_sale_restores_stock() {
    let ctx = PgContext::with_red_stock(2).await;
    let quote = ctx.service.propose(ctx.request(2)).await.unwrap();
    let order = ctx
        .service
        .place(&quote.signed.confirmation_token, &quote.signed.proposal)
        .await
        .unwrap();
    assert_eq!(ctx.red_stock().await, 0);

    for to in [OrderStatus::Approved, OrderStatus::Sold] {
        ctx.service.update_status(order.id, to).await.unwrap();
    }
    assert_eq!(ctx.red_stock().await, 0);

    let err = ctx
        .service
        .update_status(order.id, OrderStatus::Pending)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "invalid_transition");

    let cancelled = ctx
        .service
        .update_status(order.id, OrderStatus::Cancelled)
        .await
        .unwrap();
    assert!(!cancelled.stock_consumed);
    assert_eq!(ctx.red_stock().await, 2);
}

#[tokio::test]
#[ignore = "Requires a PostgreSQL database"]
async fn test_name_fragments_page_past_the_first_page() {
    let ctx = PgContext::with_red_stock(1).await;
    let suffix: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();
    let first_name = format!("ali{suffix}");
    let phone_base = 10_000_000 + Uuid::new_v4().as_u128() % 80_000_000;
    let customers = CustomerRepository::new(&ctx.pool);

    for i in 0..60 {
        customers
            .upsert(
                &first_name,
                &format!("kazemi{i}"),
                &Phone::parse(&format!("091{}", phone_base + i)).unwrap(),
                "Tehran",
                "1111111111",
                &format!("PG-{suffix}-{i}"),
            )
            .await
            .unwrap();
    }
    let target = customers
        .upsert(
            &first_name,
            &format!("rezaei{suffix}"),
            &Phone::parse(&format!("091{}", phone_base + 60)).unwrap(),
            "Shiraz",
            "9999999999",
            &format!("PG-{suffix}-target"),
        )
        .await
        .unwrap();

    // The whole first name keeps other runs' rows out of the scan
    let fragments = vec![first_name.clone()];
    let first = ctx
        .store
        .customers_by_name_fragments(&fragments, None, 50)
        .await
        .unwrap();
    assert_eq!(first.len(), 50);
    assert!(first.iter().all(|c| c.id != target.id));

    let rest = ctx
        .store
        .customers_by_name_fragments(&fragments, first.last().map(|c| c.id), 50)
        .await
        .unwrap();
    assert_eq!(rest.len(), 11);
    assert_eq!(rest.last().map(|c| c.id), Some(target.id));
}
