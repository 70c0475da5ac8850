use axum::{extract::State, routing::post, Extension, Json, Router};
use haven_booking::PaymentConfirmation;
use haven_core::payment::IntentStatus;
use haven_core::BookingError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bookings::owned_booking;
use crate::error::AppError;
use crate::middleware::GuestClaims;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateIntentRequest {
    pub booking_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct PaymentIntentResponse {
    pub intent_id: String,
    pub client_secret: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub status: IntentStatus,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmPaymentRequest {
    pub intent_id: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/payments/intents", post(create_intent))
        .route("/v1/payments/confirm", post(confirm_payment))
}

/// POST /v1/payments/intents
async fn create_intent(
    State(state): State<AppState>,
    Extension(claims): Extension<GuestClaims>,
    Json(req): Json<CreateIntentRequest>,
) -> Result<Json<PaymentIntentResponse>, AppError> {
    owned_booking(&state, &claims, req.booking_id).await?;
    let intent = state.payments.create_payment_intent(req.booking_id).await?;

    Ok(Json(PaymentIntentResponse {
        intent_id: intent.id,
        client_secret: intent.client_secret,
        amount: intent.amount,
        currency: intent.currency,
        status: intent.status,
    }))
}

/// POST /v1/payments/confirm
///
/// Called by the site after the card form returns. The outcome is read back
/// from the provider, not taken from the request.
async fn confirm_payment(
    State(state): State<AppState>,
    Extension(claims): Extension<GuestClaims>,
    Json(req): Json<ConfirmPaymentRequest>,
) -> Result<Json<PaymentConfirmation>, AppError> {
    let booking_id = state.payments.booking_for_intent(&req.intent_id).await?;
    match owned_booking(&state, &claims, booking_id).await {
        Ok(_) => {}
        Err(AppError::Booking(BookingError::NotFound(_))) => {
            tracing::warn!(intent_id = %req.intent_id, user_id = %claims.sub, "Confirm for someone else's booking");
            return Err(AppError::Forbidden("Payment does not belong to this account".to_string()));
        }
        Err(err) => return Err(err),
    }

    let outcome = state.payments.confirm_payment(&req.intent_id).await?;
    Ok(Json(outcome))
}
