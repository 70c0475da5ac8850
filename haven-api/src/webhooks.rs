use axum::{extract::State, http::StatusCode, routing::post, Router};
use haven_core::ErrorKind;
use serde::Deserialize;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StripeWebhook {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub data: WebhookData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookData {
    pub object: PaymentIntentObject,
}

#[derive(Debug, Deserialize)]
pub struct PaymentIntentObject {
    pub id: String,
}

const HANDLED_EVENTS: [&str; 3] = [
    "payment_intent.succeeded",
    "payment_intent.payment_failed",
    "payment_intent.canceled",
];

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/webhooks/payments/stripe", post(handle_stripe_webhook))
}

/// POST /v1/webhooks/payments/stripe
///
/// The body is only used to learn which intent changed; its status is
/// re-read from the provider through `confirm_payment`.
async fn handle_stripe_webhook(
    State(state): State<AppState>,
    axum::Json(payload): axum::Json<StripeWebhook>,
) -> StatusCode {
    if !HANDLED_EVENTS.contains(&payload.type_.as_str()) {
        tracing::debug!(event_id = %payload.id, event_type = %payload.type_, "Ignoring webhook");
        return StatusCode::OK;
    }

    let intent_id = &payload.data.object.id;
    tracing::info!(event_id = %payload.id, event_type = %payload.type_, %intent_id, "Payment webhook received");

    match state.payments.confirm_payment(intent_id).await {
        Ok(outcome) => {
            tracing::info!(booking_id = %outcome.booking_id, status = ?outcome.status, "Payment webhook applied");
            StatusCode::OK
        }
        Err(err) => match err.kind() {
            // Provider retries on 5xx
            ErrorKind::Transient | ErrorKind::External => {
                tracing::error!(%intent_id, error = %err, "Payment webhook failed, provider will retry");
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => {
                tracing::warn!(%intent_id, error = %err, "Payment webhook could not be applied");
                StatusCode::OK
            }
        },
    }
}
