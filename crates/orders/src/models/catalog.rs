//! Catalog models: products and their stocked variants.
//!
//! Catalog rows are written by catalog management; this service only reads
//! them and adjusts `stock_qty` through the inventory ledger.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use chatshop_core::{AttributeMap, AttributeSchema, ProductId, VariantId};

/// A product as offered in chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Internal row id.
    pub id: ProductId,
    /// Unique human-facing code, e.g. `A0001`.
    pub code: String,
    /// Display title.
    pub title: String,
    /// Base unit price.
    pub price: Decimal,
    /// Stock for products sold without variants.
    pub stock_qty: i32,
    /// Declared attributes.
    pub attribute_schema: AttributeSchema,
}

/// A specific purchasable variant of a product (SKU).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    /// Internal row id.
    pub id: VariantId,
    /// Owning product.
    pub product_id: ProductId,
    /// Unique SKU code, e.g. `A0001-RED`.
    pub sku_code: String,
    /// Canonical attribute values of this variant.
    pub attributes: AttributeMap,
    /// [`AttributeMap::content_hash`] of `attributes`.
    pub attributes_hash: String,
    /// Replaces the product's base price when set.
    pub price_override: Option<Decimal>,
    /// Units on hand, never negative.
    pub stock_qty: i32,
    /// Inactive variants are never resolved or sold.
    pub is_active: bool,
}

impl Variant {
    /// Unit price of this variant given its product.
    #[must_use]
    pub fn unit_price(&self, product: &Product) -> Decimal {
        self.price_override.unwrap_or(product.price)
    }
}
