use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use crate::errors::AppError;
use crate::services::checkout::{self, WebhookResolution};
use crate::state::AppState;

fn ack(message: &str) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "success": true, "message": message }))
}

// POST /api/payment/webhook/turinvoice
//
// Everything authenticated and well-formed is acknowledged with 200 — even
// "not paid yet" and "no such order" — so the provider never enters a retry
// storm. Only malformed payloads (400) and bad secrets (401) are rejected.
pub async fn turinvoice_webhook(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, AppError> {
    let secret = payload["secret_key"]
        .as_str()
        .ok_or_else(|| AppError::Validation("missing secret_key".to_string()))?;

    let expected = &state.config.turinvoice_webhook_secret;
    if expected.is_empty() || secret != expected {
        tracing::warn!("webhook rejected: bad secret key");
        return Err(AppError::WebhookAuth);
    }

    let order_id = match &payload["id"] {
        serde_json::Value::String(s) if !s.is_empty() => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => return Err(AppError::Validation("missing order id".to_string())),
    };

    let order_state = payload["state"]
        .as_str()
        .ok_or_else(|| AppError::Validation("missing state".to_string()))?;

    if order_state != "paid" {
        tracing::info!(%order_id, state = order_state, "webhook state ignored");
        return Ok(ack("state acknowledged"));
    }

    match checkout::apply_paid_webhook(&state, &order_id, &payload.to_string()).await {
        Ok(WebhookResolution::Settled { booking_id }) => {
            tracing::info!(%order_id, ?booking_id, "payment reconciled via webhook");
            Ok(ack("payment reconciled"))
        }
        Ok(WebhookResolution::AlreadySettled) => {
            tracing::info!(%order_id, "webhook replay ignored");
            Ok(ack("already processed"))
        }
        Ok(WebhookResolution::NoMatchingPayment) => {
            tracing::info!(%order_id, "webhook before payment record; acknowledged");
            Ok(ack("no matching payment record"))
        }
        // An internal failure must not bounce the delivery; the provider
        // would retry forever. Log and acknowledge.
        Err(e) => {
            tracing::error!(%order_id, error = %e, "webhook processing failed");
            Ok(ack("accepted"))
        }
    }
}
