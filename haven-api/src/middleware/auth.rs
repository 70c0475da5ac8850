use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::state::AppState;

pub const GUEST_ROLE: &str = "GUEST";
pub const ADMIN_ROLES: [&str; 2] = ["ADMIN", "SUPER_ADMIN"];

// ============================================================================
// JWT Claims
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GuestClaims {
    pub sub: String, // user id bookings are filed under
    pub email: String,
    pub role: String,
    pub exp: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AdminClaims {
    pub sub: String,
    pub email: String,
    pub role: String,
    pub exp: usize,
}

trait HasRole {
    fn role(&self) -> &str;
}

impl HasRole for GuestClaims {
    fn role(&self) -> &str {
        &self.role
    }
}

impl HasRole for AdminClaims {
    fn role(&self) -> &str {
        &self.role
    }
}

fn verify<C: DeserializeOwned + HasRole>(
    state: &AppState,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    allowed: &[&str],
) -> Result<C, StatusCode> {
    // 1. Bearer token present
    let TypedHeader(Authorization(bearer)) = bearer.ok_or(StatusCode::UNAUTHORIZED)?;

    // 2. Signature and expiry
    let token_data = decode::<C>(
        bearer.token(),
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        tracing::debug!(error = %e, "Rejected bearer token");
        StatusCode::UNAUTHORIZED
    })?;

    // 3. Role
    if !allowed.contains(&token_data.claims.role()) {
        return Err(StatusCode::FORBIDDEN);
    }
    Ok(token_data.claims)
}

// ============================================================================
// Guest Authentication Middleware
// ============================================================================

pub async fn guest_auth_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let claims: GuestClaims = verify(&state, bearer, &[GUEST_ROLE])?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

// ============================================================================
// Admin Authentication Middleware
// ============================================================================

pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let claims: AdminClaims = verify(&state, bearer, &ADMIN_ROLES)?;
    tracing::debug!(admin = %claims.sub, "Admin request");
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
