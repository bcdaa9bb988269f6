//! Chatshop Core - Shared domain types.
//!
//! This crate provides the types used by every chatshop component:
//! - `orders` - Order commitment service (proposal, placement, lifecycle)
//! - `cli` - Command-line tools for migrations, seeding and manual signing
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. The order lifecycle graph and the inventory rule
//! attached to each transition live here so every storage backend applies the
//! same rule.
//!
//! # Modules
//!
//! - [`types`] - Typed ids, order status, attribute schemas and maps, phone
//!   numbers, customer contact fields and text normalization

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
