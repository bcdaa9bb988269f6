//! Variant lookup handlers.

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    routing::{get, post},
};
use serde::Deserialize;

use chatshop_core::AttributeMap;

use crate::error::AppError;
use crate::models::Variant;
use crate::services::VariantResolution;
use crate::state::AppState;

/// Build the products router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products/{code}/variants", get(list_variants))
        .route("/products/{code}/variants/search", post(find_variants))
}

/// Request for attribute resolution.
#[derive(Debug, Deserialize)]
pub struct VariantSearch {
    #[serde(default)]
    pub attributes: AttributeMap,
}

async fn list_variants(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<Vec<Variant>>, AppError> {
    Ok(Json(state.orders().list_variants(&code).await?))
}

async fn find_variants(
    State(state): State<AppState>,
    Path(code): Path<String>,
    payload: Result<Json<VariantSearch>, JsonRejection>,
) -> Result<Json<VariantResolution>, AppError> {
    let Json(search) = payload?;
    Ok(Json(
        state
            .orders()
            .find_variants(&code, &search.attributes)
            .await?,
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::routes::test_support::{app, send};

    #[tokio::test]
    async fn test_list_variants() {
        let (app, _) = app().await;
        let (status, body) = send(&app, "GET", "/products/A0001/variants", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["sku_code"], "A0001-RED");
    }

    #[tokio::test]
    async fn test_search_exact_and_ranked() {
        let (app, _) = app().await;
        let (status, body) = send(
            &app,
            "POST",
            "/products/A0001/variants/search",
            Some(json!({ "attributes": { "color": "red" } })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["exact"]["sku_code"], "A0001-RED");
        assert_eq!(body["ranked"][0]["score"], 1.0);
    }

    #[tokio::test]
    async fn test_unknown_product() {
        let (app, _) = app().await;
        let (status, body) = send(&app, "GET", "/products/NOPE/variants", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "product_not_found");
    }
}
