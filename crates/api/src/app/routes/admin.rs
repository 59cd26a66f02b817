//! Operator endpoints: stock adjustments and order removal.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, post},
    Json, Router,
};

use storefront_core::{OrderId, ProductId};
use storefront_infra::Engine;

use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/orders/:id", delete(delete_order))
        .route("/stock/restock", post(restock))
        .route("/stock/correct", post(correct_stock))
        .route("/stock/set", post(set_stock))
}

pub async fn delete_order(
    Extension(engine): Extension<Arc<Engine>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: OrderId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match engine.orders.delete_order(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn restock(
    Extension(engine): Extension<Arc<Engine>>,
    body: Result<Json<dto::RestockRequest>, JsonRejection>,
) -> axum::response::Response {
    let (product_id, delta) = match errors::json_body(body)
        .and_then(|b| Ok((dto::parse_id::<ProductId>(&b.product_id)?, b.delta)))
    {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match engine.inventory.restock(product_id, delta).await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn correct_stock(
    Extension(engine): Extension<Arc<Engine>>,
    body: Result<Json<dto::CorrectStockRequest>, JsonRejection>,
) -> axum::response::Response {
    let (product_id, quantity) = match errors::json_body(body)
        .and_then(|b| Ok((dto::parse_id::<ProductId>(&b.product_id)?, b.quantity)))
    {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match engine.inventory.correct_stock(product_id, quantity).await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn set_stock(
    Extension(engine): Extension<Arc<Engine>>,
    body: Result<Json<dto::SetStockRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match errors::json_body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    let product_id: ProductId = match dto::parse_id(&body.product_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match engine
        .inventory
        .set_stock_with_override(product_id, body.quantity, body.in_stock)
        .await
    {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}
