pub mod availability;
pub mod coordinator;
pub mod hooks;
pub mod notifications;
pub mod orchestrator;
pub mod templates;

#[cfg(test)]
mod test_support;

pub use availability::AvailabilityService;
pub use coordinator::BookingCoordinator;
pub use hooks::{AdminNotificationHook, BookingEvent, GuestEmailHook, PostCommitHook, PostCommitHooks};
pub use notifications::NotificationService;
pub use orchestrator::{MockPaymentAdapter, PaymentConfirmation, PaymentCoordinator};
pub use templates::EmailTemplates;
