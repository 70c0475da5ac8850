use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use haven_catalog::PricingError;
use haven_core::payment::PaymentProviderError;
use haven_core::{BookingError, ErrorKind, StoreError};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Booking(#[from] BookingError),
    #[error(transparent)]
    Pricing(#[from] PricingError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Booking(err) => (booking_status(err), err.user_message()),
            AppError::Pricing(PricingError::Invalid(msg)) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Pricing(PricingError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "Pricing rule not found".to_string())
            }
            AppError::Pricing(PricingError::Store(StoreError::NotFound)) => {
                (StatusCode::NOT_FOUND, "Pricing rule not found".to_string())
            }
            AppError::Pricing(PricingError::Store(_)) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "The pricing service is temporarily unavailable, please try again".to_string(),
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error".to_string(),
            ),
        }
    }
}

fn booking_status(err: &BookingError) -> StatusCode {
    match err.kind() {
        ErrorKind::Validation => match err {
            BookingError::InvalidTransition { .. } => StatusCode::CONFLICT,
            _ => StatusCode::BAD_REQUEST,
        },
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Transient => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::External => match err {
            BookingError::PaymentProvider(PaymentProviderError::Declined { .. }) => {
                StatusCode::PAYMENT_REQUIRED
            }
            _ => StatusCode::BAD_GATEWAY,
        },
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = self.status_and_message();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "Request rejected");
        }

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
