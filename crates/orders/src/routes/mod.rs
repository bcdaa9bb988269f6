//! HTTP route handlers for the orders API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                              - Liveness
//! GET  /health/ready                        - Store connectivity
//!
//! # Proposals
//! POST /proposals                           - Validate and sign a proposal
//!
//! # Orders
//! POST /orders                              - Place a signed proposal (PENDING)
//! POST /orders/drafts                       - Record a signed proposal (DRAFT)
//! GET  /orders/{id}                         - Order receipt
//! POST /orders/{id}/status                  - Lifecycle transition
//!
//! # Customers
//! POST /customers/resolve                   - Resolve an identity query
//! GET  /customers/{id}                      - Select a disambiguated customer
//!
//! # Products
//! GET  /products/{code}/variants            - Active variants
//! POST /products/{code}/variants/search     - Resolve attributes to a variant
//! ```
//!
//! Errors are JSON: `{ "error": code, "message": text, "detail": {...} }`.

use axum::Router;

use crate::state::AppState;

pub mod customers;
pub mod health;
pub mod orders;
pub mod products;

/// Build the full router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(orders::router())
        .merge(customers::router())
        .merge(products::router())
}
