pub mod auth;
pub mod resiliency;

pub use auth::{admin_auth_middleware, guest_auth_middleware, AdminClaims, GuestClaims};
pub use resiliency::circuit_breaker_middleware;
