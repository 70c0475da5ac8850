use chrono::NaiveDate;

use crate::payment::PaymentProviderError;

/// Failures reported by a store adapter.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    /// Another transaction committed a write this one read. Safe to retry.
    #[error("Transaction conflict")]
    Conflict,
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Record not found")]
    NotFound,
    #[error("Store backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Coarse classification used for user-facing messages and HTTP mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    Transient,
    External,
    NotFound,
}

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Invalid date range: {0}")]
    InvalidDateRange(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Dates unavailable for property {property_id}: {dates:?}")]
    DatesUnavailable {
        property_id: String,
        dates: Vec<NaiveDate>,
    },

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Payment provider error: {0}")]
    PaymentProvider(#[from] PaymentProviderError),
}

pub type BookingResult<T> = Result<T, BookingError>;

impl BookingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BookingError::InvalidDateRange(_)
            | BookingError::Validation(_)
            | BookingError::InvalidTransition { .. } => ErrorKind::Validation,
            BookingError::DatesUnavailable { .. } => ErrorKind::Conflict,
            BookingError::StoreUnavailable(_) => ErrorKind::Transient,
            BookingError::NotFound(_) => ErrorKind::NotFound,
            BookingError::PaymentProvider(PaymentProviderError::NotFound(_)) => ErrorKind::NotFound,
            BookingError::PaymentProvider(_) => ErrorKind::External,
        }
    }

    /// Message safe to show to a guest.
    pub fn user_message(&self) -> String {
        match self {
            BookingError::InvalidDateRange(detail) => {
                if detail.contains("nights") {
                    "Stay must be between 1 and 30 nights".to_string()
                } else {
                    "Please choose a valid check-in and check-out date".to_string()
                }
            }
            BookingError::Validation(detail) => detail.clone(),
            BookingError::DatesUnavailable { .. } => {
                "Selected dates are no longer available".to_string()
            }
            BookingError::StoreUnavailable(_) => {
                "The booking service is temporarily unavailable, please try again".to_string()
            }
            BookingError::NotFound(_) => "Booking not found".to_string(),
            BookingError::InvalidTransition { from, to } => {
                format!("A {} booking cannot be moved to {}", from, to)
            }
            BookingError::PaymentProvider(PaymentProviderError::Declined { reason }) => {
                format!("Payment declined: {}", reason)
            }
            BookingError::PaymentProvider(_) => {
                "Payment could not be processed, please try again".to_string()
            }
        }
    }

    /// Maps a store failure outside the booking transaction.
    pub fn from_store(err: StoreError, what: impl Into<String>) -> Self {
        match err {
            StoreError::NotFound => BookingError::NotFound(what.into()),
            StoreError::Conflict => {
                BookingError::StoreUnavailable("concurrent update, retry".to_string())
            }
            StoreError::Unavailable(msg) | StoreError::Backend(msg) => {
                BookingError::StoreUnavailable(msg)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_and_messages() {
        let err = BookingError::DatesUnavailable {
            property_id: "P1".to_string(),
            dates: vec![NaiveDate::from_ymd_opt(2024, 6, 12).unwrap()],
        };
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.user_message(), "Selected dates are no longer available");

        let err = BookingError::InvalidDateRange("34 nights exceeds maximum of 30 nights".to_string());
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.user_message(), "Stay must be between 1 and 30 nights");

        let err = BookingError::PaymentProvider(PaymentProviderError::Declined {
            reason: "insufficient_funds".to_string(),
        });
        assert_eq!(err.kind(), ErrorKind::External);
        assert_eq!(err.user_message(), "Payment declined: insufficient_funds");
    }

    #[test]
    fn test_from_store_mapping() {
        let err = BookingError::from_store(StoreError::NotFound, "abc");
        assert!(matches!(err, BookingError::NotFound(ref id) if id == "abc"));

        let err = BookingError::from_store(StoreError::Unavailable("timeout".into()), "abc");
        assert_eq!(err.kind(), ErrorKind::Transient);
    }
}
