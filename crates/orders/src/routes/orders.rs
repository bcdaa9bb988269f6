//! Proposal and order handlers.

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;

use chatshop_core::{OrderId, OrderStatus};

use crate::error::AppError;
use crate::models::OrderReceipt;
use crate::services::{ProposalQuote, ProposalRequest, SignedProposal};
use crate::state::AppState;

/// Build the proposals and orders router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/proposals", post(propose))
        .route("/orders", post(place))
        .route("/orders/drafts", post(create_draft))
        .route("/orders/{id}", get(show))
        .route("/orders/{id}/status", post(update_status))
}

/// Request for a lifecycle transition.
#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: OrderStatus,
}

/// Validate a request and return a signed proposal.
async fn propose(
    State(state): State<AppState>,
    payload: Result<Json<ProposalRequest>, JsonRejection>,
) -> Result<Json<ProposalQuote>, AppError> {
    let Json(request) = payload?;
    let quote = state.orders().propose(request).await?;
    Ok(Json(quote))
}

/// Commit a signed proposal as a pending order.
async fn place(
    State(state): State<AppState>,
    payload: Result<Json<SignedProposal>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderReceipt>), AppError> {
    let Json(signed) = payload?;
    let order = state
        .orders()
        .place(&signed.confirmation_token, &signed.proposal)
        .await?;
    Ok((StatusCode::CREATED, Json(order.into())))
}

/// Record a signed proposal as a draft order.
async fn create_draft(
    State(state): State<AppState>,
    payload: Result<Json<SignedProposal>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderReceipt>), AppError> {
    let Json(signed) = payload?;
    let order = state
        .orders()
        .create_draft(&signed.confirmation_token, &signed.proposal)
        .await?;
    Ok((StatusCode::CREATED, Json(order.into())))
}

async fn show(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<OrderReceipt>, AppError> {
    let order = state.orders().order(OrderId::new(id)).await?;
    Ok(Json(order.into()))
}

async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    payload: Result<Json<StatusRequest>, JsonRejection>,
) -> Result<Json<OrderReceipt>, AppError> {
    let Json(request) = payload?;
    let order = state
        .orders()
        .update_status(OrderId::new(id), request.status)
        .await?;
    Ok(Json(order.into()))
}
