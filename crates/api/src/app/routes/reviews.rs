use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};

use storefront_infra::Engine;

use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/:slug", post(submit_review).get(list_reviews))
}

pub async fn submit_review(
    Extension(engine): Extension<Arc<Engine>>,
    Path(slug): Path<String>,
    body: Result<Json<dto::SubmitReviewRequest>, JsonRejection>,
) -> axum::response::Response {
    let input = match errors::json_body(body).and_then(|b| b.into_new_review(slug)) {
        Ok(i) => i,
        Err(resp) => return resp,
    };

    match engine.reviews.submit_review(input).await {
        Ok(review) => (StatusCode::CREATED, Json(dto::ReviewResponse::from(review))).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn list_reviews(
    Extension(engine): Extension<Arc<Engine>>,
    Path(slug): Path<String>,
) -> axum::response::Response {
    match engine.reviews.list_reviews(&slug).await {
        Ok(reviews) => Json(
            reviews
                .into_iter()
                .map(dto::ReviewResponse::from)
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}
