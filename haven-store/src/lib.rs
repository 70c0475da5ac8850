pub mod app_config;
pub mod availability_repo;
pub mod booking_repo;
pub mod database;
pub mod mail_repo;
pub mod memory;
pub mod notification_repo;
pub mod pricing_repo;
pub mod stripe;

pub use availability_repo::PgAvailabilityRepository;
pub use booking_repo::PgBookingRepository;
pub use database::DbClient;
pub use mail_repo::PgMailOutbox;
pub use memory::MemoryStore;
pub use notification_repo::PgNotificationRepository;
pub use pricing_repo::PgPricingRuleRepository;
pub use stripe::StripePaymentAdapter;
