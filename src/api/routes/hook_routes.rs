//! Webhook routes (e.g., /hook)

use axum::{middleware, routing::post, Router};

use crate::api::controller::hook::HookController;
use crate::api::middleware::basic_auth::require_basic_auth;
use crate::app_state::AppState;

pub fn hook_routes(state: &AppState) -> Router<AppState> {
    let router = Router::new().route("/hook", post(HookController::handle_webhook));

    match &state.hook_auth {
        Some(auth) => router.route_layer(middleware::from_fn_with_state(auth.clone(), require_basic_auth)),
        None => router,
    }
}
