//! Storage seam for the order commitment service.
//!
//! Services only ever talk to an [`OrderStore`]. Reads are plain lookups;
//! the two writes ([`OrderStore::insert_order`] and
//! [`OrderStore::transition_order`]) are each a single atomic unit that
//! applies the inventory rule from [`OrderStatus::inventory_effect`]:
//!
//! - stock is checked and adjusted for every item in the same unit that
//!   writes the order row, or nothing is written at all
//! - rows are locked in [`StockTarget`] order so concurrent writers cannot
//!   deadlock and cannot both pass the sufficiency check
//!
//! Two implementations exist: [`crate::db::PgStore`] for Postgres and
//! [`MemoryStore`] for tests and local demos.

pub mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

use chatshop_core::{CustomerId, OrderId, OrderStatus, Phone, ProductId};

use crate::models::{Customer, NewOrder, NewOrderItem, Order, Product, StockTarget, Variant};

pub use memory::MemoryStore;

/// Errors returned by an [`OrderStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the store is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation other than the ones below.
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// A stock row holds less than an item requires.
    #[error("insufficient stock for {target}: requested {requested}, available {available}")]
    InsufficientStock {
        /// Row that ran short.
        target: StockTarget,
        /// Total quantity the write needed from it.
        requested: i32,
        /// Quantity on hand when the row was locked.
        available: i32,
    },

    /// The order's current status does not allow the requested one.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        /// Status found under lock.
        from: OrderStatus,
        /// Requested status.
        to: OrderStatus,
    },

    /// An order already exists for this proposal nonce.
    #[error("an order already exists for this proposal")]
    DuplicateProposal,

    /// An order line asks for zero or fewer units.
    #[error("invalid quantity {quantity} for {target}")]
    InvalidQuantity {
        /// Row the line draws from.
        target: StockTarget,
        /// Rejected quantity.
        quantity: i32,
    },
}

/// Persistent state used by the order services.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Check that the backing store is reachable.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Product by its unique code.
    async fn product_by_code(&self, code: &str) -> Result<Option<Product>, StoreError>;

    /// Every variant of a product, active or not, ordered by SKU.
    async fn variants_of(&self, product_id: ProductId) -> Result<Vec<Variant>, StoreError>;

    /// The active variant of a product with the given attribute hash.
    async fn active_variant_by_hash(
        &self,
        product_id: ProductId,
        attributes_hash: &str,
    ) -> Result<Option<Variant>, StoreError>;

    /// Customer by internal id.
    async fn customer_by_id(&self, id: CustomerId) -> Result<Option<Customer>, StoreError>;

    /// Customer by canonical phone.
    async fn customer_by_phone(&self, phone: &Phone) -> Result<Option<Customer>, StoreError>;

    /// Customer by external code.
    async fn customer_by_code(&self, code: &str) -> Result<Option<Customer>, StoreError>;

    /// Customers whose folded full name contains any of `fragments`.
    ///
    /// Fragments are already folded with [`chatshop_core::text::fold_name`].
    /// Results are ordered by id, start after `after` when given, and are
    /// capped at `limit`, so callers can page through every match.
    async fn customers_by_name_fragments(
        &self,
        fragments: &[String],
        after: Option<CustomerId>,
        limit: usize,
    ) -> Result<Vec<Customer>, StoreError>;

    /// Order by internal id, with items.
    async fn order_by_id(&self, id: OrderId) -> Result<Option<Order>, StoreError>;

    /// Order by external code, with items.
    async fn order_by_code(&self, code: &str) -> Result<Option<Order>, StoreError>;

    /// Order created from the proposal with this nonce.
    async fn order_by_nonce(&self, nonce: &str) -> Result<Option<Order>, StoreError>;

    /// Write a new order and its items.
    ///
    /// A `Pending` order consumes its item quantities in the same unit.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InsufficientStock`] if any stock row runs short
    /// - [`StoreError::DuplicateProposal`] if the nonce was already used
    /// - [`StoreError::InvalidQuantity`] if a line asks for less than one unit
    async fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError>;

    /// Move an order to `to`, applying the inventory effect of the move.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] if the order does not exist
    /// - [`StoreError::InvalidTransition`] if the move is not legal from the
    ///   status found under lock; nothing is changed
    /// - [`StoreError::InsufficientStock`] when entering `Pending` without
    ///   enough stock; nothing is changed
    async fn transition_order(&self, id: OrderId, to: OrderStatus) -> Result<Order, StoreError>;
}

/// Sum item quantities per stock row, in lock order.
pub(crate) fn stock_demand<I>(items: I) -> BTreeMap<StockTarget, i32>
where
    I: IntoIterator<Item = (StockTarget, i32)>,
{
    let mut demand = BTreeMap::new();
    for (target, quantity) in items {
        *demand.entry(target).or_insert(0) += quantity;
    }
    demand
}

/// Reject lines that would add stock when consumed.
///
/// # Errors
///
/// Returns [`StoreError::InvalidQuantity`] for the first line below one unit.
pub(crate) fn check_quantities(items: &[NewOrderItem]) -> Result<(), StoreError> {
    match items.iter().find(|item| item.quantity < 1) {
        Some(item) => Err(StoreError::InvalidQuantity {
            target: item.stock_target(),
            quantity: item.quantity,
        }),
        None => Ok(()),
    }
}

/// Generate an external order code, e.g. `ORD-3F9A1C0B2D`.
#[must_use]
pub fn new_order_code() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string().to_uppercase();
    format!("ORD-{}", id.chars().take(10).collect::<String>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_demand_merges_and_sorts() {
        let demand = stock_demand([
            (StockTarget::Variant("B".to_owned()), 1),
            (StockTarget::Product(ProductId::new(3)), 2),
            (StockTarget::Variant("B".to_owned()), 4),
        ]);
        let entries: Vec<_> = demand.into_iter().collect();
        assert_eq!(
            entries,
            vec![
                (StockTarget::Product(ProductId::new(3)), 2),
                (StockTarget::Variant("B".to_owned()), 5),
            ]
        );
    }

    #[test]
    fn test_order_code_shape() {
        let code = new_order_code();
        assert!(code.starts_with("ORD-"));
        assert_eq!(code.len(), 14);
        assert!(code.chars().skip(4).all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(code, new_order_code());
    }
}
