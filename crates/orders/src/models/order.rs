//! Order models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use chatshop_core::{
    AttributeMap, CustomerFields, CustomerId, OrderId, OrderItemId, OrderStatus, ProductId,
};

/// The stock row an order line draws from.
///
/// Ordered so that stores can lock rows in a deterministic sequence.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "key", rename_all = "snake_case")]
pub enum StockTarget {
    /// Base product stock (product has no variants).
    Product(ProductId),
    /// Variant stock by SKU.
    Variant(String),
}

impl std::fmt::Display for StockTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Product(id) => write!(f, "product {id}"),
            Self::Variant(sku) => write!(f, "sku {sku}"),
        }
    }
}

/// A committed order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Internal row id.
    pub id: OrderId,
    /// Stable external identifier.
    pub order_code: String,
    /// Lifecycle status.
    pub status: OrderStatus,
    /// Customer attached through a corroborated identifier.
    pub customer_id: Option<CustomerId>,
    /// Customer fields as they were at commit time.
    pub customer_snapshot: CustomerFields,
    /// Sum of item line totals.
    pub total_amount: Decimal,
    /// Whether the order currently holds stock.
    pub stock_consumed: bool,
    /// Nonce of the proposal this order was created from.
    pub proposal_nonce: Option<String>,
    /// Lines.
    pub items: Vec<OrderItem>,
    /// When the order was created.
    pub created_at: DateTime<Utc>,
    /// When the order was last updated.
    pub updated_at: DateTime<Utc>,
}

/// One order line. Price and attributes never change once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Internal row id.
    pub id: OrderItemId,
    /// Owning order.
    pub order_id: OrderId,
    /// Ordered product.
    pub product_id: ProductId,
    /// Resolved SKU, `None` for products without variants.
    pub sku_code: Option<String>,
    /// Units ordered.
    pub quantity: i32,
    /// Unit price captured at commit.
    pub unit_price: Decimal,
    /// Attributes captured at commit.
    pub attributes: AttributeMap,
}

impl OrderItem {
    /// The stock row this line was taken from.
    #[must_use]
    pub fn stock_target(&self) -> StockTarget {
        stock_target(self.product_id, self.sku_code.as_deref())
    }
}

/// An order about to be written.
#[derive(Debug, Clone)]
pub struct NewOrder {
    /// Generated external identifier.
    pub order_code: String,
    /// `Draft` or `Pending`; `Pending` consumes stock in the same transaction.
    pub status: OrderStatus,
    /// Corroborated customer, if any.
    pub customer_id: Option<CustomerId>,
    /// Customer fields from the proposal.
    pub customer_snapshot: CustomerFields,
    /// Order total.
    pub total_amount: Decimal,
    /// Proposal nonce, unique across orders.
    pub proposal_nonce: Option<String>,
    /// Lines.
    pub items: Vec<NewOrderItem>,
}

/// A line of a [`NewOrder`].
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    /// Ordered product.
    pub product_id: ProductId,
    /// Resolved SKU.
    pub sku_code: Option<String>,
    /// Units ordered.
    pub quantity: i32,
    /// Unit price snapshot.
    pub unit_price: Decimal,
    /// Attribute snapshot.
    pub attributes: AttributeMap,
}

impl NewOrderItem {
    /// The stock row this line draws from.
    #[must_use]
    pub fn stock_target(&self) -> StockTarget {
        stock_target(self.product_id, self.sku_code.as_deref())
    }
}

fn stock_target(product_id: ProductId, sku_code: Option<&str>) -> StockTarget {
    sku_code.map_or(StockTarget::Product(product_id), |sku| {
        StockTarget::Variant(sku.to_owned())
    })
}

/// What callers get back after a commit or status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderReceipt {
    /// Internal id.
    pub order_id: OrderId,
    /// External code.
    pub order_code: String,
    /// Status after the operation.
    pub status: OrderStatus,
    /// Order total.
    pub total_amount: Decimal,
    /// Attached customer, if corroborated.
    pub customer_id: Option<CustomerId>,
    /// Item snapshots.
    pub items: Vec<OrderItem>,
}

impl From<Order> for OrderReceipt {
    fn from(order: Order) -> Self {
        Self {
            order_id: order.id,
            order_code: order.order_code,
            status: order.status,
            total_amount: order.total_amount,
            customer_id: order.customer_id,
            items: order.items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_target_prefers_sku() {
        let item = NewOrderItem {
            product_id: ProductId::new(1),
            sku_code: Some("A0001-RED".to_owned()),
            quantity: 1,
            unit_price: Decimal::ONE,
            attributes: AttributeMap::new(),
        };
        assert_eq!(item.stock_target(), StockTarget::Variant("A0001-RED".to_owned()));

        let base = NewOrderItem {
            sku_code: None,
            ..item
        };
        assert_eq!(base.stock_target(), StockTarget::Product(ProductId::new(1)));
    }

    #[test]
    fn test_stock_target_lock_order() {
        let mut targets = vec![
            StockTarget::Variant("B".to_owned()),
            StockTarget::Product(ProductId::new(9)),
            StockTarget::Variant("A".to_owned()),
        ];
        targets.sort();
        assert_eq!(
            targets,
            vec![
                StockTarget::Product(ProductId::new(9)),
                StockTarget::Variant("A".to_owned()),
                StockTarget::Variant("B".to_owned()),
            ]
        );
    }
}
