//! Customer resolution handlers.

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    routing::{get, post},
};
use serde::Deserialize;

use chatshop_core::CustomerId;

use crate::error::AppError;
use crate::models::Customer;
use crate::services::CustomerResolution;
use crate::state::AppState;

/// Build the customers router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/customers/resolve", post(resolve))
        .route("/customers/{id}", get(select))
}

/// Request for identity resolution.
#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    /// Phone, customer code, order code, or a name.
    pub query: String,
    /// Optional postal code, last four phone digits, or order code.
    #[serde(default)]
    pub verifier: Option<String>,
}

async fn resolve(
    State(state): State<AppState>,
    payload: Result<Json<ResolveRequest>, JsonRejection>,
) -> Result<Json<CustomerResolution>, AppError> {
    let Json(request) = payload?;
    let resolution = state
        .orders()
        .resolve_customer(&request.query, request.verifier.as_deref())
        .await?;
    Ok(Json(resolution))
}

/// Complete a disambiguation with the id of a masked candidate.
async fn select(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Customer>, AppError> {
    let customer = state.orders().select_customer(CustomerId::new(id)).await?;
    Ok(Json(customer))
}
