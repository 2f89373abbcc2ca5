//! Webhook controller: Alertmanager payloads in, relay notifications out

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use tracing::debug;

use crate::api::dto::alertmanager_dto::WebhookPayload;
use crate::app_state::AppState;
use crate::domain::forward::BatchOutcome;
use crate::errors::AppError;

pub struct HookController;

impl HookController {
    pub async fn handle_webhook(
        State(state): State<AppState>,
        body: Bytes,
    ) -> Result<(StatusCode, Json<Value>), AppError> {
        debug!(body = %String::from_utf8_lossy(&body), "received webhook");

        let payload: WebhookPayload = serde_json::from_slice(&body)
            .map_err(|e| AppError::BodyParsingError(e.to_string()))?;

        match state.alert_forwarder.handle_batch(payload).await {
            BatchOutcome::Empty | BatchOutcome::Delivered => {
                Ok((StatusCode::OK, Json(json!({ "status": "OK" }))))
            }
            BatchOutcome::Accepted => Ok((StatusCode::ACCEPTED, Json(json!({ "status": "Accepted" })))),
            BatchOutcome::Failed => Err(AppError::UpstreamError(
                "one or more alerts could not be delivered".into(),
            )),
        }
    }
}
