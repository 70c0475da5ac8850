use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::NaiveDate;
use haven_core::{Booking, BookingRequest, GuestCounts, GuestInfo, PriceBreakdown};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::GuestClaims;
use crate::state::AppState;

/// Booking form as the site posts it. The guest's user id comes from the token.
#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub property_id: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guest_name: String,
    /// Falls back to the e-mail on the token.
    pub guest_email: Option<String>,
    pub guest_phone: Option<String>,
    pub guests: GuestCounts,
    pub pricing: PriceBreakdown,
    pub payment_method: Option<String>,
    pub special_requests: Option<String>,
}

impl CreateBookingRequest {
    fn into_request(self, claims: &GuestClaims) -> BookingRequest {
        BookingRequest {
            property_id: self.property_id,
            guest: GuestInfo {
                user_id: claims.sub.clone(),
                name: self.guest_name,
                email: self.guest_email.unwrap_or_else(|| claims.email.clone()).into(),
                phone: self.guest_phone.map(Into::into),
            },
            check_in: self.check_in,
            check_out: self.check_out,
            guests: self.guests,
            pricing: self.pricing,
            payment_method: self.payment_method,
            special_requests: self.special_requests,
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", post(create_booking).get(list_my_bookings))
        .route("/v1/bookings/{id}", get(get_booking))
        .route("/v1/bookings/{id}/cancel", post(cancel_booking))
}

/// POST /v1/bookings
async fn create_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<GuestClaims>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let booking = state.bookings.create_booking(req.into_request(&claims)).await?;
    info!(booking_id = %booking.id, user_id = %claims.sub, "Booking request accepted");
    Ok((StatusCode::CREATED, Json(booking)))
}

/// GET /v1/bookings
async fn list_my_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<GuestClaims>,
) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(state.bookings.list_for_user(&claims.sub).await?))
}

/// GET /v1/bookings/{id}
async fn get_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<GuestClaims>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(owned_booking(&state, &claims, id).await?))
}

/// POST /v1/bookings/{id}/cancel
async fn cancel_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<GuestClaims>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    owned_booking(&state, &claims, id).await?;
    Ok(Json(state.bookings.cancel_booking(id).await?))
}

/// Someone else's booking reads as missing.
pub(crate) async fn owned_booking(
    state: &AppState,
    claims: &GuestClaims,
    id: Uuid,
) -> Result<Booking, AppError> {
    let booking = state.bookings.get_booking(id).await?;
    if booking.guest.user_id != claims.sub {
        return Err(haven_core::BookingError::NotFound(id.to_string()).into());
    }
    Ok(booking)
}
