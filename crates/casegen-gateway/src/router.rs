use axum::Router;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use super::error::ApiError;
use super::handlers::{
    artifact_handler, get_record_handler, health_handler, list_records_handler, upload_handler,
};
use super::server::AppState;

pub(crate) fn build_router(state: AppState, max_body_size: usize) -> Router {
    Router::new()
        .route("/documents", post(upload_handler))
        .route("/records", get(list_records_handler))
        .route("/records/{id}", get(get_record_handler))
        .route("/records/{id}/artifacts/{kind}", get(artifact_handler))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_size))
        .layer(middleware::map_response_with_state(state.clone(), oversized_body_as_bad_request))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The transport cap and the multipart reader answer 413 with a plain-text
/// body. Oversized uploads are reported like any other size rejection.
async fn oversized_body_as_bad_request(
    State(state): State<AppState>,
    response: Response,
) -> Response {
    if response.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::from(state.orchestrator.limits().too_large()).into_response()
    } else {
        response
    }
}
