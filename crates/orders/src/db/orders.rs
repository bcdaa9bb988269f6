//! Order rows and the inventory ledger.
//!
//! [`OrderRepository::insert`] and [`OrderRepository::transition`] are the
//! only statements that write `customer_order`, `order_item`, or a
//! `stock_qty` column.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgConnection, PgExecutor, PgPool};

use chatshop_core::{
    AttributeMap, CustomerFields, CustomerId, InventoryEffect, OrderId, OrderItemId, OrderStatus,
    ProductId,
};

use crate::models::{NewOrder, Order, OrderItem, StockTarget};
use crate::store::{StoreError, check_quantities, stock_demand};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    order_code: String,
    status: OrderStatus,
    customer_id: Option<i32>,
    customer_snapshot: Json<CustomerFields>,
    total_amount: Decimal,
    stock_consumed: bool,
    proposal_nonce: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Order {
        Order {
            id: OrderId::new(self.id),
            order_code: self.order_code,
            status: self.status,
            customer_id: self.customer_id.map(CustomerId::new),
            customer_snapshot: self.customer_snapshot.0,
            total_amount: self.total_amount,
            stock_consumed: self.stock_consumed,
            proposal_nonce: self.proposal_nonce,
            items,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: i32,
    order_id: i32,
    product_id: i32,
    sku_code: Option<String>,
    quantity: i32,
    unit_price: Decimal,
    attributes: Json<AttributeMap>,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: OrderItemId::new(row.id),
            order_id: OrderId::new(row.order_id),
            product_id: ProductId::new(row.product_id),
            sku_code: row.sku_code,
            quantity: row.quantity,
            unit_price: row.unit_price,
            attributes: row.attributes.0,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StockRow {
    stock_qty: i32,
    is_active: bool,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get an order with its items by ID.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails.
    pub async fn get_by_id(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, order_code, status, customer_id, customer_snapshot, total_amount,
                   stock_consumed, proposal_nonce, created_at, updated_at
            FROM customer_order
            WHERE id = $1
            ",
        )
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        self.with_items(row).await
    }

    /// Get an order with its items by external code.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails.
    pub async fn get_by_code(&self, code: &str) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, order_code, status, customer_id, customer_snapshot, total_amount,
                   stock_consumed, proposal_nonce, created_at, updated_at
            FROM customer_order
            WHERE order_code = $1
            ",
        )
        .bind(code)
        .fetch_optional(self.pool)
        .await?;

        self.with_items(row).await
    }

    /// Get the order created from a proposal nonce.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails.
    pub async fn get_by_nonce(&self, nonce: &str) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, order_code, status, customer_id, customer_snapshot, total_amount,
                   stock_consumed, proposal_nonce, created_at, updated_at
            FROM customer_order
            WHERE proposal_nonce = $1
            ",
        )
        .bind(nonce)
        .fetch_optional(self.pool)
        .await?;

        self.with_items(row).await
    }

    async fn with_items(&self, row: Option<OrderRow>) -> Result<Option<Order>, StoreError> {
        match row {
            Some(row) => {
                let items = items_of(self.pool, row.id).await?;
                Ok(Some(row.into_order(items)))
            }
            None => Ok(None),
        }
    }

    /// Insert an order and its items in one transaction.
    ///
    /// A `Pending` order locks and decrements its stock rows first.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InsufficientStock` if a stock row runs short.
    /// Returns `StoreError::DuplicateProposal` if the nonce was already used.
    /// Returns `StoreError::InvalidQuantity` if a line asks for less than one unit.
    /// Returns `StoreError::Database` for other database errors.
    pub async fn insert(&self, order: NewOrder) -> Result<Order, StoreError> {
        check_quantities(&order.items)?;
        let mut tx = self.pool.begin().await?;

        // Serialize writers of the same proposal, then answer a replay before
        // any stock row is locked.
        if let Some(nonce) = order.proposal_nonce.as_deref() {
            sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
                .bind(nonce)
                .execute(&mut *tx)
                .await?;
            let used: Option<i32> =
                sqlx::query_scalar("SELECT id FROM customer_order WHERE proposal_nonce = $1")
                    .bind(nonce)
                    .fetch_optional(&mut *tx)
                    .await?;
            if used.is_some() {
                return Err(StoreError::DuplicateProposal);
            }
        }

        let stock_consumed = order.status == OrderStatus::Pending;
        if stock_consumed {
            let demand = stock_demand(order.items.iter().map(|i| (i.stock_target(), i.quantity)));
            consume(&mut tx, &demand).await?;
        }

        let row = sqlx::query_as::<_, OrderRow>(
            r"
            INSERT INTO customer_order (order_code, status, customer_id, customer_snapshot,
                                        total_amount, stock_consumed, proposal_nonce)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, order_code, status, customer_id, customer_snapshot, total_amount,
                      stock_consumed, proposal_nonce, created_at, updated_at
            ",
        )
        .bind(&order.order_code)
        .bind(order.status)
        .bind(order.customer_id.map(|id| id.as_i32()))
        .bind(Json(&order.customer_snapshot))
        .bind(order.total_amount)
        .bind(stock_consumed)
        .bind(&order.proposal_nonce)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                if db_err.constraint() == Some("customer_order_proposal_nonce_key") {
                    return StoreError::DuplicateProposal;
                }
                return StoreError::Conflict("order code already exists".to_owned());
            }
            StoreError::Database(e)
        })?;

        let mut items = Vec::with_capacity(order.items.len());
        for item in &order.items {
            let item_row = sqlx::query_as::<_, OrderItemRow>(
                r"
                INSERT INTO order_item (order_id, product_id, sku_code, quantity,
                                        unit_price, attributes)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING id, order_id, product_id, sku_code, quantity, unit_price, attributes
                ",
            )
            .bind(row.id)
            .bind(item.product_id.as_i32())
            .bind(&item.sku_code)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(Json(&item.attributes))
            .fetch_one(&mut *tx)
            .await?;
            items.push(item_row.into());
        }

        tx.commit().await?;

        Ok(row.into_order(items))
    }

    /// Move an order to `to` in one transaction.
    ///
    /// The order row is locked first; legality and the inventory effect are
    /// decided from the status read under that lock.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the order does not exist.
    /// Returns `StoreError::InvalidTransition` if the move is not legal.
    /// Returns `StoreError::InsufficientStock` if entering `Pending` runs short.
    /// Returns `StoreError::Database` for other database errors.
    pub async fn transition(&self, id: OrderId, to: OrderStatus) -> Result<Order, StoreError> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, order_code, status, customer_id, customer_snapshot, total_amount,
                   stock_consumed, proposal_nonce, created_at, updated_at
            FROM customer_order
            WHERE id = $1
            FOR UPDATE
            ",
        )
        .bind(id.as_i32())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound)?;

        if !current.status.can_transition_to(to) {
            return Err(StoreError::InvalidTransition {
                from: current.status,
                to,
            });
        }

        let items = items_of(&mut *tx, current.id).await?;
        let demand = stock_demand(items.iter().map(|i| (i.stock_target(), i.quantity)));

        let stock_consumed = match current.status.inventory_effect(to, current.stock_consumed) {
            InventoryEffect::Consume => {
                consume(&mut tx, &demand).await?;
                true
            }
            InventoryEffect::Restore => {
                restore(&mut tx, &demand).await?;
                false
            }
            InventoryEffect::None => current.stock_consumed,
        };

        let updated = sqlx::query_as::<_, OrderRow>(
            r"
            UPDATE customer_order
            SET status = $2, stock_consumed = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING id, order_code, status, customer_id, customer_snapshot, total_amount,
                      stock_consumed, proposal_nonce, created_at, updated_at
            ",
        )
        .bind(id.as_i32())
        .bind(to)
        .bind(stock_consumed)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(updated.into_order(items))
    }
}

async fn items_of<'e, E>(executor: E, order_id: i32) -> Result<Vec<OrderItem>, StoreError>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, OrderItemRow>(
        r"
        SELECT id, order_id, product_id, sku_code, quantity, unit_price, attributes
        FROM order_item
        WHERE order_id = $1
        ORDER BY id
        ",
    )
    .bind(order_id)
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

/// Lock a stock row and read what can be sold from it.
///
/// Missing rows and inactive variants count as zero.
async fn lock_stock(conn: &mut PgConnection, target: &StockTarget) -> Result<i32, StoreError> {
    let row = match target {
        StockTarget::Product(id) => {
            sqlx::query_as::<_, StockRow>(
                "SELECT stock_qty, TRUE AS is_active FROM product WHERE id = $1 FOR UPDATE",
            )
            .bind(id.as_i32())
            .fetch_optional(&mut *conn)
            .await?
        }
        StockTarget::Variant(sku) => {
            sqlx::query_as::<_, StockRow>(
                "SELECT stock_qty, is_active FROM variant WHERE sku_code = $1 FOR UPDATE",
            )
            .bind(sku)
            .fetch_optional(&mut *conn)
            .await?
        }
    };

    Ok(row.filter(|r| r.is_active).map_or(0, |r| r.stock_qty))
}

async fn adjust_stock(
    conn: &mut PgConnection,
    target: &StockTarget,
    delta: i32,
) -> Result<u64, StoreError> {
    let result = match target {
        StockTarget::Product(id) => {
            sqlx::query(
                "UPDATE product SET stock_qty = stock_qty + $2, updated_at = NOW() WHERE id = $1",
            )
            .bind(id.as_i32())
            .bind(delta)
            .execute(&mut *conn)
            .await?
        }
        StockTarget::Variant(sku) => {
            sqlx::query(
                "UPDATE variant SET stock_qty = stock_qty + $2, updated_at = NOW() WHERE sku_code = $1",
            )
            .bind(sku)
            .bind(delta)
            .execute(&mut *conn)
            .await?
        }
    };

    Ok(result.rows_affected())
}

/// Lock every row in order, check all of them, then decrement.
async fn consume(
    conn: &mut PgConnection,
    demand: &BTreeMap<StockTarget, i32>,
) -> Result<(), StoreError> {
    for (target, requested) in demand {
        if *requested < 1 {
            return Err(StoreError::InvalidQuantity {
                target: target.clone(),
                quantity: *requested,
            });
        }
        let available = lock_stock(conn, target).await?;
        if available < *requested {
            return Err(StoreError::InsufficientStock {
                target: target.clone(),
                requested: *requested,
                available,
            });
        }
    }

    for (target, requested) in demand {
        adjust_stock(conn, target, -requested).await?;
    }

    Ok(())
}

async fn restore(
    conn: &mut PgConnection,
    demand: &BTreeMap<StockTarget, i32>,
) -> Result<(), StoreError> {
    for (target, quantity) in demand {
        if adjust_stock(conn, target, *quantity).await? == 0 {
            return Err(StoreError::DataCorruption(format!(
                "order item references missing {target}"
            )));
        }
    }
    Ok(())
}
