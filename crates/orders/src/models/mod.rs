//! Domain models for the order commitment service.

pub mod catalog;
pub mod customer;
pub mod order;

pub use catalog::{Product, Variant};
pub use customer::Customer;
pub use order::{NewOrder, NewOrderItem, Order, OrderItem, OrderReceipt, StockTarget};
