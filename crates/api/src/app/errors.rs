use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use storefront_infra::EngineError;

/// Map an engine failure to a structured JSON response.
///
/// Storage and lock-contention details stay in the logs; clients only see a
/// generic message for those kinds.
pub fn engine_error_to_response(err: EngineError) -> Response {
    let status = match &err {
        EngineError::InsufficientStock(_)
        | EngineError::Conflict(_)
        | EngineError::DuplicateReview { .. }
        | EngineError::ProductInUse(_) => StatusCode::CONFLICT,
        EngineError::NotFound { .. } => StatusCode::NOT_FOUND,
        EngineError::Validation(_) => StatusCode::BAD_REQUEST,
        EngineError::InvalidTransition(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    };

    let message = match &err {
        EngineError::StorageUnavailable(detail) => {
            tracing::error!(error = %detail, "storage unavailable");
            "storage is temporarily unavailable".to_string()
        }
        EngineError::Conflict(detail) => {
            tracing::warn!(error = %detail, "request lost a write conflict");
            "the request conflicted with a concurrent update; retry it".to_string()
        }
        other => other.to_string(),
    };

    let mut body = json!({
        "kind": err.kind(),
        "message": message,
    });
    if let Some(product_id) = err.product_id() {
        body["productId"] = json!(product_id);
    }
    if let EngineError::InsufficientStock(shortfalls) = &err {
        body["shortfalls"] = json!(shortfalls);
    }

    (status, axum::Json(body)).into_response()
}

pub fn json_error(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "kind": kind,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn validation_error(message: impl Into<String>) -> Response {
    json_error(StatusCode::BAD_REQUEST, "validation_error", message)
}

/// Unwrap a JSON body, turning extractor failures into a structured 400.
pub fn json_body<T>(body: Result<axum::Json<T>, JsonRejection>) -> Result<T, Response> {
    body.map(|axum::Json(value)| value)
        .map_err(|rejection| validation_error(rejection.body_text()))
}
