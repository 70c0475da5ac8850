use std::sync::Arc;

use haven_booking::{
    AdminNotificationHook, AvailabilityService, BookingCoordinator, EmailTemplates, GuestEmailHook,
    NotificationService, PaymentCoordinator, PostCommitHooks,
};
use haven_catalog::{PricingEngine, PricingRuleService};
use haven_core::mail::EmailSink;
use haven_core::payment::PaymentAdapter;
use haven_core::repository::{
    AvailabilityRepository, BookingRepository, NotificationRepository, PricingRuleRepository,
    TransactionalStore,
};
use haven_core::{BookingRules, Clock, PricingPolicy};
use haven_store::{
    DbClient, MemoryStore, PgAvailabilityRepository, PgBookingRepository, PgMailOutbox,
    PgNotificationRepository, PgPricingRuleRepository,
};

use crate::middleware::resiliency::ResiliencyState;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

/// Store adapters, picked once at startup.
#[derive(Clone)]
pub struct Backends {
    pub transactions: Arc<dyn TransactionalStore>,
    pub bookings: Arc<dyn BookingRepository>,
    pub availability: Arc<dyn AvailabilityRepository>,
    pub pricing_rules: Arc<dyn PricingRuleRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub mail: Arc<dyn EmailSink>,
}

impl Backends {
    pub fn memory(store: MemoryStore) -> Self {
        let store = Arc::new(store);
        Self {
            transactions: store.clone(),
            bookings: store.clone(),
            availability: store.clone(),
            pricing_rules: store.clone(),
            notifications: store.clone(),
            mail: store,
        }
    }

    pub fn postgres(db: &DbClient) -> Self {
        let pool = db.pool.clone();
        let bookings = Arc::new(PgBookingRepository::new(pool.clone()));
        Self {
            transactions: bookings.clone(),
            bookings,
            availability: Arc::new(PgAvailabilityRepository::new(pool.clone())),
            pricing_rules: Arc::new(PgPricingRuleRepository::new(pool.clone())),
            notifications: Arc::new(PgNotificationRepository::new(pool.clone())),
            mail: Arc::new(PgMailOutbox::new(pool)),
        }
    }
}

/// Everything `AppState::build` needs besides the stores.
pub struct Settings {
    pub rules: BookingRules,
    pub pricing: PricingPolicy,
    pub templates: EmailTemplates,
    pub auth: AuthConfig,
    /// Run notification and e-mail hooks off the request path.
    pub detach_hooks: bool,
}

#[derive(Clone)]
pub struct AppState {
    pub bookings: Arc<BookingCoordinator>,
    pub payments: Arc<PaymentCoordinator>,
    pub availability: Arc<AvailabilityService>,
    pub pricing: Arc<PricingRuleService>,
    pub notifications: Arc<NotificationService>,
    pub auth: AuthConfig,
    pub resiliency: Arc<ResiliencyState>,
}

impl AppState {
    pub fn build(
        backends: Backends,
        payment_adapter: Arc<dyn PaymentAdapter>,
        clock: Arc<dyn Clock>,
        settings: Settings,
    ) -> Self {
        let hooks = PostCommitHooks::new()
            .detached(settings.detach_hooks)
            .register(Arc::new(AdminNotificationHook::new(
                backends.notifications.clone(),
                clock.clone(),
            )))
            .register(Arc::new(GuestEmailHook::new(
                backends.mail.clone(),
                settings.templates,
            )));

        let bookings = Arc::new(
            BookingCoordinator::new(
                backends.transactions.clone(),
                backends.bookings.clone(),
                backends.availability.clone(),
                clock.clone(),
                settings.rules.clone(),
            )
            .with_hooks(hooks.clone()),
        );
        let payments = PaymentCoordinator::new(
            payment_adapter,
            backends.bookings.clone(),
            bookings.clone(),
            clock.clone(),
        )
        .with_hooks(hooks);

        Self {
            bookings,
            payments: Arc::new(payments),
            availability: Arc::new(AvailabilityService::new(backends.availability.clone(), clock.clone())),
            pricing: Arc::new(PricingRuleService::new(
                backends.pricing_rules.clone(),
                PricingEngine::new(settings.pricing).with_stay_rules(settings.rules),
                clock.clone(),
            )),
            notifications: Arc::new(NotificationService::new(backends.notifications.clone(), clock)),
            auth: settings.auth,
            resiliency: Arc::new(ResiliencyState::default()),
        }
    }
}
