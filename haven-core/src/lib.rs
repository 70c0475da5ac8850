pub mod availability;
pub mod booking;
pub mod clock;
pub mod dates;
pub mod error;
pub mod mail;
pub mod notification;
pub mod payment;
pub mod pricing;
pub mod repository;
pub mod rules;

pub use availability::{BlockReason, LedgerEntry};
pub use booking::{
    Booking, BookingRequest, BookingStatus, GuestCounts, GuestInfo, PaymentRecord, PaymentStatus,
    PaymentUpdate, PriceBreakdown,
};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{BookingError, BookingResult, ErrorKind, StoreError, StoreResult};
pub use notification::{AdminNotification, NotificationType};
pub use pricing::{PricingRule, RuleType};
pub use rules::{BookingRules, PricingPolicy};
