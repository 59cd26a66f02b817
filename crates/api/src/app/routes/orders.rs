use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use storefront_core::OrderId;
use storefront_infra::Engine;

use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(place_order))
        .route("/:id", get(get_order))
        .route("/:id/status", post(update_status))
}

pub async fn place_order(
    Extension(engine): Extension<Arc<Engine>>,
    body: Result<Json<dto::PlaceOrderRequest>, JsonRejection>,
) -> axum::response::Response {
    let command = match errors::json_body(body).and_then(dto::PlaceOrderRequest::into_command) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    match engine.orders.place_order(command).await {
        Ok(order) => (StatusCode::CREATED, Json(dto::OrderResponse::from(order))).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn get_order(
    Extension(engine): Extension<Arc<Engine>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: OrderId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match engine.orders.get_order(id).await {
        Ok(order) => Json(dto::OrderResponse::from(order)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn update_status(
    Extension(engine): Extension<Arc<Engine>>,
    Path(id): Path<String>,
    body: Result<Json<dto::UpdateStatusRequest>, JsonRejection>,
) -> axum::response::Response {
    let id: OrderId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let status = match errors::json_body(body).and_then(|b| b.status()) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    match engine.orders.update_status(id, status).await {
        Ok(order) => Json(dto::OrderResponse::from(order)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}
