use axum::{http::Method, middleware::from_fn_with_state, routing::get, Json, Router};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod admin;
pub mod bookings;
pub mod error;
pub mod middleware;
pub mod payments;
pub mod properties;
pub mod state;
pub mod webhooks;

pub use state::{AppState, AuthConfig, Backends, Settings};

use crate::middleware::{admin_auth_middleware, circuit_breaker_middleware, guest_auth_middleware};

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    let payments = payments::routes()
        .layer(from_fn_with_state(state.clone(), guest_auth_middleware))
        .layer(from_fn_with_state(state.clone(), circuit_breaker_middleware));

    let guest = bookings::routes().layer(from_fn_with_state(state.clone(), guest_auth_middleware));

    let admin = admin::routes().layer(from_fn_with_state(state.clone(), admin_auth_middleware));

    let public = properties::routes()
        .merge(
            webhooks::routes().layer(from_fn_with_state(state.clone(), circuit_breaker_middleware)),
        )
        .route("/health", get(|| async { Json(json!({ "status": "ok" })) }));

    Router::new()
        .merge(guest)
        .merge(payments)
        .merge(admin)
        .merge(public)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
