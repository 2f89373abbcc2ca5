use std::any::Any;

use axum::{
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

use crate::api::middleware::request_id::{assign_request_id, make_request_span};
use crate::app_state::AppState;
use crate::errors::{internal_error, AppError};

/// Build the main application router
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .merge(crate::api::routes::hook_routes::hook_routes(&state))
        .fallback(handler_404)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
        .layer(middleware::from_fn(assign_request_id))
        .with_state(state)
}

fn handle_panic(_: Box<dyn Any + Send + 'static>) -> Response {
    internal_error("handler panicked").into_response()
}

async fn root() -> &'static str {
    "Server is running!"
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "OK" }))
}

async fn handler_404() -> impl IntoResponse {
    AppError::NotFound("The requested resource was not found".into())
}
