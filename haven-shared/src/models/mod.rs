pub mod events;

pub use events::{BookingCancelledEvent, BookingCreatedEvent, PaymentReceivedEvent};
