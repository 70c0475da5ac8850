use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use chrono::NaiveDate;
use haven_catalog::PricingRuleDraft;
use haven_core::payment::Refund;
use haven_core::{
    AdminNotification, BlockReason, Booking, BookingStatus, LedgerEntry, NotificationType, PricingRule,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::AdminClaims;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListBookingsQuery {
    pub status: Option<BookingStatus>,
    pub property_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: BookingStatus,
}

#[derive(Debug, Deserialize)]
pub struct RefundRequest {
    pub amount: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct BlockDatesRequest {
    pub dates: Vec<NaiveDate>,
    pub reason: BlockReason,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UnblockDatesRequest {
    pub dates: Vec<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct CalendarQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub active: bool,
}

#[derive(Debug, Deserialize)]
pub struct ListNotificationsQuery {
    pub limit: Option<usize>,
    #[serde(default)]
    pub unread_only: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateNotificationRequest {
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: u64,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        // Bookings
        .route("/v1/admin/bookings", get(list_bookings))
        .route("/v1/admin/bookings/{id}", delete(delete_booking))
        .route("/v1/admin/bookings/{id}/status", put(update_booking_status))
        .route("/v1/admin/bookings/{id}/refund", post(refund_booking))
        // Availability
        .route("/v1/admin/properties/{id}/blocks", post(block_dates))
        .route("/v1/admin/properties/{id}/unblock", post(unblock_dates))
        .route("/v1/admin/properties/{id}/calendar", get(calendar))
        // Pricing rules
        .route("/v1/admin/properties/{id}/pricing-rules", get(list_pricing_rules))
        .route("/v1/admin/pricing-rules", post(create_pricing_rule))
        .route(
            "/v1/admin/pricing-rules/{id}",
            put(update_pricing_rule).delete(delete_pricing_rule),
        )
        .route("/v1/admin/pricing-rules/{id}/active", put(set_pricing_rule_active))
        // Notifications
        .route(
            "/v1/admin/notifications",
            get(list_notifications).post(create_notification),
        )
        .route("/v1/admin/notifications/unread-count", get(unread_count))
        .route("/v1/admin/notifications/read-all", post(mark_all_read))
        .route("/v1/admin/notifications/{id}/read", post(mark_read))
}

// ============================================================================
// Bookings
// ============================================================================

/// GET /v1/admin/bookings?status=..&property_id=..
async fn list_bookings(
    State(state): State<AppState>,
    Query(query): Query<ListBookingsQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let mut bookings = match (&query.property_id, query.status) {
        (Some(property_id), _) => state.bookings.list_for_property(property_id).await?,
        (None, Some(status)) => state.bookings.list_by_status(status).await?,
        (None, None) => state.bookings.list_all().await?,
    };
    if let (Some(_), Some(status)) = (&query.property_id, query.status) {
        bookings.retain(|b| b.status == status);
    }
    Ok(Json(bookings))
}

/// PUT /v1/admin/bookings/{id}/status
async fn update_booking_status(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminClaims>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<Booking>, AppError> {
    tracing::info!(admin = %admin.sub, booking_id = %id, status = %req.status, "Admin status change");
    Ok(Json(state.bookings.update_booking_status(id, req.status).await?))
}

/// DELETE /v1/admin/bookings/{id}
async fn delete_booking(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminClaims>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let released = state.bookings.delete_booking(id).await?;
    tracing::info!(admin = %admin.sub, booking_id = %id, released, "Booking deleted by admin");
    Ok(Json(json!({ "deleted": id, "released_nights": released })))
}

/// POST /v1/admin/bookings/{id}/refund
async fn refund_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<RefundRequest>,
) -> Result<Json<Refund>, AppError> {
    Ok(Json(state.payments.refund_payment(id, req.amount).await?))
}

// ============================================================================
// Availability
// ============================================================================

/// POST /v1/admin/properties/{id}/blocks
async fn block_dates(
    State(state): State<AppState>,
    Path(property_id): Path<String>,
    Json(req): Json<BlockDatesRequest>,
) -> Result<Json<CountResponse>, AppError> {
    let count = state
        .availability
        .block_dates_manually(&property_id, &req.dates, req.reason, req.note)
        .await?;
    Ok(Json(CountResponse { count: count as u64 }))
}

/// POST /v1/admin/properties/{id}/unblock
async fn unblock_dates(
    State(state): State<AppState>,
    Path(property_id): Path<String>,
    Json(req): Json<UnblockDatesRequest>,
) -> Result<Json<CountResponse>, AppError> {
    let count = state
        .availability
        .unblock_dates_manually(&property_id, &req.dates)
        .await?;
    Ok(Json(CountResponse { count }))
}

/// GET /v1/admin/properties/{id}/calendar?start=..&end=..
async fn calendar(
    State(state): State<AppState>,
    Path(property_id): Path<String>,
    Query(query): Query<CalendarQuery>,
) -> Result<Json<BTreeMap<NaiveDate, LedgerEntry>>, AppError> {
    Ok(Json(
        state
            .availability
            .get_availability_calendar(&property_id, query.start, query.end)
            .await?,
    ))
}

// ============================================================================
// Pricing rules
// ============================================================================

/// GET /v1/admin/properties/{id}/pricing-rules
async fn list_pricing_rules(
    State(state): State<AppState>,
    Path(property_id): Path<String>,
) -> Result<Json<Vec<PricingRule>>, AppError> {
    Ok(Json(state.pricing.list_for_property(&property_id).await?))
}

/// POST /v1/admin/pricing-rules
async fn create_pricing_rule(
    State(state): State<AppState>,
    Json(draft): Json<PricingRuleDraft>,
) -> Result<(StatusCode, Json<PricingRule>), AppError> {
    let rule = state.pricing.create(draft).await?;
    Ok((StatusCode::CREATED, Json(rule)))
}

/// PUT /v1/admin/pricing-rules/{id}
async fn update_pricing_rule(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(draft): Json<PricingRuleDraft>,
) -> Result<Json<PricingRule>, AppError> {
    Ok(Json(state.pricing.update(id, draft).await?))
}

/// PUT /v1/admin/pricing-rules/{id}/active
async fn set_pricing_rule_active(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SetActiveRequest>,
) -> Result<Json<PricingRule>, AppError> {
    Ok(Json(state.pricing.set_active(id, req.active).await?))
}

/// DELETE /v1/admin/pricing-rules/{id}
async fn delete_pricing_rule(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.pricing.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Notifications
// ============================================================================

/// GET /v1/admin/notifications?limit=..&unread_only=..
async fn list_notifications(
    State(state): State<AppState>,
    Query(query): Query<ListNotificationsQuery>,
) -> Result<Json<Vec<AdminNotification>>, AppError> {
    Ok(Json(state.notifications.list(query.limit, query.unread_only).await?))
}

/// POST /v1/admin/notifications
async fn create_notification(
    State(state): State<AppState>,
    Json(req): Json<CreateNotificationRequest>,
) -> Result<(StatusCode, Json<AdminNotification>), AppError> {
    let notification = state
        .notifications
        .notify(req.notification_type, &req.title, &req.message, req.payload)
        .await?;
    Ok((StatusCode::CREATED, Json(notification)))
}

/// GET /v1/admin/notifications/unread-count
async fn unread_count(State(state): State<AppState>) -> Result<Json<CountResponse>, AppError> {
    Ok(Json(CountResponse {
        count: state.notifications.unread_count().await?,
    }))
}

/// POST /v1/admin/notifications/{id}/read
async fn mark_read(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode, AppError> {
    state.notifications.mark_read(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/admin/notifications/read-all
async fn mark_all_read(State(state): State<AppState>) -> Result<Json<CountResponse>, AppError> {
    Ok(Json(CountResponse {
        count: state.notifications.mark_all_read().await?,
    }))
}
