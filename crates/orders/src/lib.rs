//! Chatshop Orders library.
//!
//! The order commitment service behind a conversational shop: signed
//! proposals, variant and customer resolution, and the order lifecycle with
//! its inventory ledger. The binary serves it as a JSON API; the library form
//! lets the integration tests and the CLI drive it directly.
//!
//! # Modules
//!
//! - [`services`] - The five components and [`services::OrderService`]
//! - [`store`] - The storage seam and the in-memory store
//! - [`db`] - The Postgres store and migrations
//! - [`routes`] - HTTP handlers
//! - [`session`] - Caller-owned per-conversation state

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod session;
pub mod state;
pub mod store;
