use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use haven_catalog::Quote;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub property_id: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub available: bool,
}

#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    pub property_id: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    /// Listing's default nightly price, used where no pricing rule applies.
    pub base_rate: i64,
    #[serde(default)]
    pub cleaning_fee: i64,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/properties/{id}/availability", get(check_availability))
        .route("/v1/quotes", post(quote))
}

/// GET /v1/properties/{id}/availability?check_in=..&check_out=..
///
/// Advisory only. The booking transaction checks again.
async fn check_availability(
    State(state): State<AppState>,
    Path(property_id): Path<String>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, AppError> {
    let available = state
        .bookings
        .check_availability(&property_id, query.check_in, query.check_out)
        .await?;

    Ok(Json(AvailabilityResponse {
        property_id,
        check_in: query.check_in,
        check_out: query.check_out,
        available,
    }))
}

/// POST /v1/quotes
async fn quote(
    State(state): State<AppState>,
    Json(req): Json<QuoteRequest>,
) -> Result<Json<Quote>, AppError> {
    let quote = state
        .pricing
        .quote(&req.property_id, req.check_in, req.check_out, req.base_rate, req.cleaning_fee)
        .await?;
    Ok(Json(quote))
}
