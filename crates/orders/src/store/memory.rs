//! In-memory [`OrderStore`].
//!
//! All state sits behind one `tokio::sync::Mutex`, so every write is
//! serializable. Catalog and customer rows are added with the `add_*`
//! helpers; this service never creates them itself.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use chatshop_core::{
    AttributeMap, AttributeSchema, CustomerId, InventoryEffect, OrderId, OrderItemId,
    OrderStatus, Phone, ProductId, VariantId, text::fold_name,
};

use super::{OrderStore, StoreError, check_quantities, stock_demand};
use crate::models::{Customer, NewOrder, Order, OrderItem, Product, StockTarget, Variant};

#[derive(Default)]
struct Inner {
    products: BTreeMap<ProductId, Product>,
    variants: BTreeMap<String, Variant>,
    customers: BTreeMap<CustomerId, Customer>,
    orders: BTreeMap<OrderId, Order>,
    next_id: i32,
}

impl Inner {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn available(&self, target: &StockTarget) -> i32 {
        match target {
            StockTarget::Product(id) => self.products.get(id).map_or(0, |p| p.stock_qty),
            StockTarget::Variant(sku) => self
                .variants
                .get(sku)
                .filter(|v| v.is_active)
                .map_or(0, |v| v.stock_qty),
        }
    }

    fn has_row(&self, target: &StockTarget) -> bool {
        match target {
            StockTarget::Product(id) => self.products.contains_key(id),
            StockTarget::Variant(sku) => self.variants.contains_key(sku),
        }
    }

    fn stock_mut(&mut self, target: &StockTarget) -> Option<&mut i32> {
        match target {
            StockTarget::Product(id) => self.products.get_mut(id).map(|p| &mut p.stock_qty),
            StockTarget::Variant(sku) => self.variants.get_mut(sku).map(|v| &mut v.stock_qty),
        }
    }

    /// Check every row first, then decrement, so a short row changes nothing.
    fn consume(&mut self, items: &[OrderItem]) -> Result<(), StoreError> {
        let demand = stock_demand(items.iter().map(|i| (i.stock_target(), i.quantity)));
        for (target, requested) in &demand {
            if *requested < 1 {
                return Err(StoreError::InvalidQuantity {
                    target: target.clone(),
                    quantity: *requested,
                });
            }
            let available = self.available(target);
            if available < *requested {
                return Err(StoreError::InsufficientStock {
                    target: target.clone(),
                    requested: *requested,
                    available,
                });
            }
        }
        for (target, requested) in &demand {
            if let Some(stock) = self.stock_mut(target) {
                *stock -= requested;
            }
        }
        Ok(())
    }

    fn restore(&mut self, items: &[OrderItem]) -> Result<(), StoreError> {
        let demand = stock_demand(items.iter().map(|i| (i.stock_target(), i.quantity)));
        if let Some(target) = demand.keys().find(|t| !self.has_row(t)) {
            return Err(StoreError::DataCorruption(format!(
                "order item references missing {target}"
            )));
        }
        for (target, quantity) in &demand {
            if let Some(stock) = self.stock_mut(target) {
                *stock += quantity;
            }
        }
        Ok(())
    }
}

/// [`OrderStore`] kept in process memory.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a product to the catalog.
    pub async fn add_product(
        &self,
        code: &str,
        title: &str,
        price: Decimal,
        stock_qty: i32,
        attribute_schema: AttributeSchema,
    ) -> Product {
        let mut inner = self.inner.lock().await;
        let product = Product {
            id: ProductId::new(inner.next_id()),
            code: code.to_owned(),
            title: title.to_owned(),
            price,
            stock_qty,
            attribute_schema,
        };
        inner.products.insert(product.id, product.clone());
        product
    }

    /// Add an active variant to a product.
    pub async fn add_variant(
        &self,
        product_id: ProductId,
        sku_code: &str,
        attributes: AttributeMap,
        price_override: Option<Decimal>,
        stock_qty: i32,
    ) -> Variant {
        let mut inner = self.inner.lock().await;
        let variant = Variant {
            id: VariantId::new(inner.next_id()),
            product_id,
            sku_code: sku_code.to_owned(),
            attributes_hash: attributes.content_hash(),
            attributes,
            price_override,
            stock_qty,
            is_active: true,
        };
        inner
            .variants
            .insert(variant.sku_code.clone(), variant.clone());
        variant
    }

    /// Activate or deactivate a variant.
    pub async fn set_variant_active(&self, sku_code: &str, is_active: bool) {
        if let Some(variant) = self.inner.lock().await.variants.get_mut(sku_code) {
            variant.is_active = is_active;
        }
    }

    /// Add a customer record.
    #[allow(clippy::too_many_arguments)]
    pub async fn add_customer(
        &self,
        first_name: &str,
        last_name: &str,
        phone: Phone,
        address: &str,
        postal_code: &str,
        customer_code: &str,
    ) -> Customer {
        let mut inner = self.inner.lock().await;
        let customer = Customer {
            id: CustomerId::new(inner.next_id()),
            first_name: first_name.to_owned(),
            last_name: last_name.to_owned(),
            phone,
            address: address.to_owned(),
            postal_code: postal_code.to_owned(),
            customer_code: customer_code.to_owned(),
            notes: None,
            created_at: Utc::now(),
        };
        inner.customers.insert(customer.id, customer.clone());
        customer
    }

    /// Units on hand for a stock row, ignoring `is_active`.
    pub async fn stock_of(&self, target: &StockTarget) -> Option<i32> {
        let inner = self.inner.lock().await;
        match target {
            StockTarget::Product(id) => inner.products.get(id).map(|p| p.stock_qty),
            StockTarget::Variant(sku) => inner.variants.get(sku).map(|v| v.stock_qty),
        }
    }

    /// Number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.inner.lock().await.orders.len()
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn product_by_code(&self, code: &str) -> Result<Option<Product>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.products.values().find(|p| p.code == code).cloned())
    }

    async fn variants_of(&self, product_id: ProductId) -> Result<Vec<Variant>, StoreError> {
        let inner = self.inner.lock().await;
        // BTreeMap keyed by SKU keeps them ordered
        Ok(inner
            .variants
            .values()
            .filter(|v| v.product_id == product_id)
            .cloned()
            .collect())
    }

    async fn active_variant_by_hash(
        &self,
        product_id: ProductId,
        attributes_hash: &str,
    ) -> Result<Option<Variant>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .variants
            .values()
            .find(|v| {
                v.is_active && v.product_id == product_id && v.attributes_hash == attributes_hash
            })
            .cloned())
    }

    async fn customer_by_id(&self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        Ok(self.inner.lock().await.customers.get(&id).cloned())
    }

    async fn customer_by_phone(&self, phone: &Phone) -> Result<Option<Customer>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.customers.values().find(|c| &c.phone == phone).cloned())
    }

    async fn customer_by_code(&self, code: &str) -> Result<Option<Customer>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .customers
            .values()
            .find(|c| c.customer_code == code)
            .cloned())
    }

    async fn customers_by_name_fragments(
        &self,
        fragments: &[String],
        after: Option<CustomerId>,
        limit: usize,
    ) -> Result<Vec<Customer>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .customers
            .values()
            .filter(|c| after.is_none_or(|after| c.id > after))
            .filter(|c| {
                let folded = fold_name(&c.full_name());
                fragments.iter().any(|f| folded.contains(f.as_str()))
            })
            .take(limit)
            .cloned()
            .collect())
    }

    async fn order_by_id(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.inner.lock().await.orders.get(&id).cloned())
    }

    async fn order_by_code(&self, code: &str) -> Result<Option<Order>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.orders.values().find(|o| o.order_code == code).cloned())
    }

    async fn order_by_nonce(&self, nonce: &str) -> Result<Option<Order>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .orders
            .values()
            .find(|o| o.proposal_nonce.as_deref() == Some(nonce))
            .cloned())
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        check_quantities(&order.items)?;
        let mut inner = self.inner.lock().await;

        if let Some(nonce) = order.proposal_nonce.as_deref()
            && inner
                .orders
                .values()
                .any(|o| o.proposal_nonce.as_deref() == Some(nonce))
        {
            return Err(StoreError::DuplicateProposal);
        }
        if inner.orders.values().any(|o| o.order_code == order.order_code) {
            return Err(StoreError::Conflict("order code already exists".to_owned()));
        }

        let id = OrderId::new(inner.next_id());
        let mut items = Vec::with_capacity(order.items.len());
        for item in order.items {
            items.push(OrderItem {
                id: OrderItemId::new(inner.next_id()),
                order_id: id,
                product_id: item.product_id,
                sku_code: item.sku_code,
                quantity: item.quantity,
                unit_price: item.unit_price,
                attributes: item.attributes,
            });
        }

        let stock_consumed = order.status == OrderStatus::Pending;
        if stock_consumed {
            inner.consume(&items)?;
        }

        let now = Utc::now();
        let stored = Order {
            id,
            order_code: order.order_code,
            status: order.status,
            customer_id: order.customer_id,
            customer_snapshot: order.customer_snapshot,
            total_amount: order.total_amount,
            stock_consumed,
            proposal_nonce: order.proposal_nonce,
            items,
            created_at: now,
            updated_at: now,
        };
        inner.orders.insert(id, stored.clone());
        Ok(stored)
    }

    async fn transition_order(&self, id: OrderId, to: OrderStatus) -> Result<Order, StoreError> {
        let mut inner = self.inner.lock().await;
        let current = inner.orders.get(&id).cloned().ok_or(StoreError::NotFound)?;

        if !current.status.can_transition_to(to) {
            return Err(StoreError::InvalidTransition {
                from: current.status,
                to,
            });
        }

        let mut stock_consumed = current.stock_consumed;
        match current.status.inventory_effect(to, current.stock_consumed) {
            InventoryEffect::Consume => {
                inner.consume(&current.items)?;
                stock_consumed = true;
            }
            InventoryEffect::Restore => {
                inner.restore(&current.items)?;
                stock_consumed = false;
            }
            InventoryEffect::None => {}
        }

        let order = inner.orders.get_mut(&id).ok_or(StoreError::NotFound)?;
        order.status = to;
        order.stock_consumed = stock_consumed;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chatshop_core::CustomerFields;

    use super::*;
    use crate::models::NewOrderItem;

    fn snapshot() -> CustomerFields {
        CustomerFields {
            first_name: "Sara".to_owned(),
            last_name: "Ahmadi".to_owned(),
            phone: Phone::parse("09121112233").unwrap(),
            address: "Shiraz".to_owned(),
            postal_code: "7134567890".to_owned(),
            notes: None,
        }
    }

    fn new_order(sku: &str, product_id: ProductId, quantity: i32, status: OrderStatus) -> NewOrder {
        NewOrder {
            order_code: crate::store::new_order_code(),
            status,
            customer_id: None,
            customer_snapshot: snapshot(),
            total_amount: Decimal::from(quantity),
            proposal_nonce: None,
            items: vec![NewOrderItem {
                product_id,
                sku_code: Some(sku.to_owned()),
                quantity,
                unit_price: Decimal::ONE,
                attributes: AttributeMap::from_pairs([("color", "red")]),
            }],
        }
    }

    async fn store_with_sku(stock: i32) -> (MemoryStore, ProductId) {
        let store = MemoryStore::new();
        let product = store
            .add_product("A0001", "Mug", Decimal::ONE, 0, AttributeSchema::default())
            .await;
        store
            .add_variant(
                product.id,
                "A0001-RED",
                AttributeMap::from_pairs([("color", "red")]),
                None,
                stock,
            )
            .await;
        (store, product.id)
    }

    fn red() -> StockTarget {
        StockTarget::Variant("A0001-RED".to_owned())
    }

    #[tokio::test]
    async fn test_non_positive_quantity_never_adds_stock() {
        let (store, product_id) = store_with_sku(2).await;
        for quantity in [-3, 0] {
            for status in [OrderStatus::Pending, OrderStatus::Draft] {
                let err = store
                    .insert_order(new_order("A0001-RED", product_id, quantity, status))
                    .await
                    .unwrap_err();
                assert!(matches!(
                    err,
                    StoreError::InvalidQuantity { quantity: q, .. } if q == quantity
                ));
            }
        }
        assert_eq!(store.stock_of(&red()).await, Some(2));
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_pending_insert_consumes() {
        let (store, pid) = store_with_sku(2).await;
        let order = store
            .insert_order(new_order("A0001-RED", pid, 2, OrderStatus::Pending))
            .await
            .unwrap();
        assert!(order.stock_consumed);
        assert_eq!(store.stock_of(&red()).await, Some(0));
    }

    #[tokio::test]
    async fn test_short_stock_writes_nothing() {
        let (store, pid) = store_with_sku(2).await;
        let err = store
            .insert_order(new_order("A0001-RED", pid, 3, OrderStatus::Pending))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::InsufficientStock {
                requested: 3,
                available: 2,
                ..
            }
        ));
        assert_eq!(store.stock_of(&red()).await, Some(2));
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_draft_consumes_on_pending_and_restores_on_cancel() {
        let (store, pid) = store_with_sku(5).await;
        let draft = store
            .insert_order(new_order("A0001-RED", pid, 2, OrderStatus::Draft))
            .await
            .unwrap();
        assert_eq!(store.stock_of(&red()).await, Some(5));

        store
            .transition_order(draft.id, OrderStatus::Pending)
            .await
            .unwrap();
        assert_eq!(store.stock_of(&red()).await, Some(3));

        store
            .transition_order(draft.id, OrderStatus::Approved)
            .await
            .unwrap();
        store
            .transition_order(draft.id, OrderStatus::Sold)
            .await
            .unwrap();
        assert_eq!(store.stock_of(&red()).await, Some(3));

        let cancelled = store
            .transition_order(draft.id, OrderStatus::Cancelled)
            .await
            .unwrap();
        assert!(!cancelled.stock_consumed);
        assert_eq!(store.stock_of(&red()).await, Some(5));
    }

    #[tokio::test]
    async fn test_cancel_draft_leaves_stock() {
        let (store, pid) = store_with_sku(5).await;
        let draft = store
            .insert_order(new_order("A0001-RED", pid, 2, OrderStatus::Draft))
            .await
            .unwrap();
        store
            .transition_order(draft.id, OrderStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(store.stock_of(&red()).await, Some(5));
    }

    #[tokio::test]
    async fn test_illegal_transition_changes_nothing() {
        let (store, pid) = store_with_sku(5).await;
        let order = store
            .insert_order(new_order("A0001-RED", pid, 1, OrderStatus::Pending))
            .await
            .unwrap();
        let err = store
            .transition_order(order.id, OrderStatus::Sold)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::InvalidTransition {
                from: OrderStatus::Pending,
                to: OrderStatus::Sold
            }
        ));
        let reread = store.order_by_id(order.id).await.unwrap().unwrap();
        assert_eq!(reread.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_duplicate_nonce_rejected() {
        let (store, pid) = store_with_sku(5).await;
        let mut first = new_order("A0001-RED", pid, 1, OrderStatus::Pending);
        first.proposal_nonce = Some("n-1".to_owned());
        let mut second = first.clone();
        second.order_code = crate::store::new_order_code();

        store.insert_order(first).await.unwrap();
        let err = store.insert_order(second).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateProposal));
        assert_eq!(store.stock_of(&red()).await, Some(4));
        assert!(store.order_by_nonce("n-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_inactive_variant_has_no_stock() {
        let (store, pid) = store_with_sku(5).await;
        store.set_variant_active("A0001-RED", false).await;
        let err = store
            .insert_order(new_order("A0001-RED", pid, 1, OrderStatus::Pending))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::InsufficientStock { available: 0, .. }
        ));
    }

    #[tokio::test]
    async fn test_name_fragments_fold() {
        let store = MemoryStore::new();
        store
            .add_customer(
                "علي",
                "رضایی",
                Phone::parse("09120000001").unwrap(),
                "Tehran",
                "1111111111",
                "C-1",
            )
            .await;
        let found = store
            .customers_by_name_fragments(&["عل".to_owned()], None, 10)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        let none = store
            .customers_by_name_fragments(&["ما".to_owned()], None, 10)
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_name_fragments_page_by_id() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store
                .add_customer(
                    "علی",
                    &format!("کاظمی{i}"),
                    Phone::parse(&format!("0912000010{i}")).unwrap(),
                    "Tehran",
                    "1111111111",
                    &format!("C-{i}"),
                )
                .await;
        }
        let target = store
            .add_customer(
                "علی",
                "رضایی",
                Phone::parse("09120000442").unwrap(),
                "Tehran",
                "2222222222",
                "C-9",
            )
            .await;

        let fragments = ["عل".to_owned()];
        let first = store
            .customers_by_name_fragments(&fragments, None, 4)
            .await
            .unwrap();
        assert_eq!(first.len(), 4);
        assert!(first.windows(2).all(|w| w[0].id < w[1].id));

        let rest = store
            .customers_by_name_fragments(&fragments, first.last().map(|c| c.id), 4)
            .await
            .unwrap();
        assert_eq!(rest.len(), 2);
        assert!(rest[0].id > first[3].id);
        assert_eq!(rest[1].id, target.id);
    }
}
