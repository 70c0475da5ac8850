use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use haven_api::{app, AppState, AuthConfig, Backends, Settings};
use haven_booking::{EmailTemplates, MockPaymentAdapter};
use haven_core::payment::PaymentAdapter;
use haven_core::SystemClock;
use haven_store::app_config::{Config, PaymentProvider, StorageBackend};
use haven_store::{DbClient, MemoryStore, StripePaymentAdapter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "haven_api=debug,haven_booking=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Haven API on port {}", config.server.port);

    // Storage
    let backends = match config.storage.backend {
        StorageBackend::Postgres => {
            let db = DbClient::new(&config.database.url, config.database.max_connections)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;
            Backends::postgres(&db)
        }
        StorageBackend::Memory => {
            tracing::warn!("Using the in-memory store, nothing survives a restart");
            Backends::memory(MemoryStore::new())
        }
    };

    // Payments
    let payment_adapter: Arc<dyn PaymentAdapter> = match config.payments.provider {
        PaymentProvider::Stripe => {
            if config.payments.stripe_secret_key.is_empty() {
                anyhow::bail!("payments.stripe_secret_key is required for the stripe provider");
            }
            Arc::new(
                StripePaymentAdapter::new(&config.payments.api_base, &config.payments.stripe_secret_key)
                    .context("Failed to build Stripe client")?,
            )
        }
        PaymentProvider::Mock => {
            tracing::warn!("Using the mock payment provider");
            Arc::new(MockPaymentAdapter::new())
        }
    };

    let settings = Settings {
        rules: config.booking_rules.clone(),
        pricing: config.pricing.clone(),
        templates: EmailTemplates::new(
            config.notifications.from_name.clone(),
            config.notifications.admin_emails.clone(),
        ),
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
        detach_hooks: true,
    };

    let state = AppState::build(backends, payment_adapter, Arc::new(SystemClock), settings);
    let app = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
