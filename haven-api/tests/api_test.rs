use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{Duration, NaiveDate, Utc};
use haven_api::middleware::{AdminClaims, GuestClaims};
use haven_api::{app, AppState, AuthConfig, Backends, Settings};
use haven_booking::{EmailTemplates, MockPaymentAdapter};
use haven_core::payment::IntentStatus;
use haven_core::{BookingRules, FixedClock, PricingPolicy};
use haven_store::MemoryStore;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tower::ServiceExt;

const SECRET: &str = "test-secret";

struct TestApp {
    router: Router,
    store: MemoryStore,
    payments: Arc<MockPaymentAdapter>,
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn test_app() -> TestApp {
    let store = MemoryStore::new();
    let payments = Arc::new(MockPaymentAdapter::new());
    let state = AppState::build(
        Backends::memory(store.clone()),
        payments.clone(),
        Arc::new(FixedClock::on(d(2024, 5, 1))),
        Settings {
            rules: BookingRules::default(),
            pricing: PricingPolicy::default(),
            templates: EmailTemplates::new("Haven", vec!["ops@haven.example".to_string()]),
            auth: AuthConfig {
                secret: SECRET.to_string(),
                expiration: 3600,
            },
            detach_hooks: false,
        },
    );
    TestApp {
        router: app(state),
        store,
        payments,
    }
}

fn exp() -> usize {
    (Utc::now() + Duration::hours(1)).timestamp() as usize
}

fn guest_token(user_id: &str) -> String {
    let claims = GuestClaims {
        sub: user_id.to_string(),
        email: format!("{}@example.com", user_id),
        role: "GUEST".to_string(),
        exp: exp(),
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

fn admin_token() -> String {
    let claims = AdminClaims {
        sub: "admin-1".to_string(),
        email: "ops@haven.example".to_string(),
        role: "ADMIN".to_string(),
        exp: exp(),
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

async fn send(app: &TestApp, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

fn booking_body(property_id: &str, check_in: &str, check_out: &str, nights: i64) -> Value {
    let base = 50_000 * nights;
    json!({
        "property_id": property_id,
        "check_in": check_in,
        "check_out": check_out,
        "guest_name": "Ada Lovelace",
        "guests": { "adults": 2, "children": 0, "infants": 0 },
        "pricing": {
            "base": base,
            "cleaning_fee": 15000,
            "service_fee": 0,
            "taxes": 0,
            "total": base + 15000,
            "currency": "EUR"
        }
    })
}

#[tokio::test]
async fn test_health() {
    let app = test_app();
    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_overlapping_booking_is_rejected() {
    let app = test_app();
    let alice = guest_token("alice");
    let bob = guest_token("bob");

    let (status, first) = send(
        &app,
        "POST",
        "/v1/bookings",
        Some(&alice),
        Some(booking_body("villa-azure", "2024-06-10", "2024-06-15", 5)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["status"], "pending");
    assert_eq!(first["nights"], 5);
    assert_eq!(first["guest"]["user_id"], "alice");

    let (status, body) = send(
        &app,
        "POST",
        "/v1/bookings",
        Some(&bob),
        Some(booking_body("villa-azure", "2024-06-14", "2024-06-16", 2)),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Selected dates are no longer available");

    // Check-out day is free for the next guest
    let (status, _) = send(
        &app,
        "POST",
        "/v1/bookings",
        Some(&bob),
        Some(booking_body("villa-azure", "2024-06-15", "2024-06-17", 2)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, mine) = send(&app, "GET", "/v1/bookings", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine.as_array().unwrap().len(), 1);

    // Bob cannot see or cancel Alice's booking
    let uri = format!("/v1/bookings/{}/cancel", first["id"].as_str().unwrap());
    let (status, _) = send(&app, "POST", &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_long_stay_is_rejected() {
    let app = test_app();
    let (status, body) = send(
        &app,
        "POST",
        "/v1/bookings",
        Some(&guest_token("alice")),
        Some(booking_body("villa-azure", "2024-07-01", "2024-08-04", 34)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Stay must be between 1 and 30 nights");
    assert_eq!(app.store.booking_count().await, 0);
}

#[tokio::test]
async fn test_store_outage_is_service_unavailable() {
    let app = test_app();
    app.store.set_unavailable(true);
    let (status, _) = send(
        &app,
        "POST",
        "/v1/bookings",
        Some(&guest_token("alice")),
        Some(booking_body("villa-azure", "2024-06-10", "2024-06-12", 2)),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_auth_guards() {
    let app = test_app();

    let (status, _) = send(&app, "GET", "/v1/bookings", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, "GET", "/v1/bookings", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, "GET", "/v1/bookings", Some(&admin_token()), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, "GET", "/v1/admin/bookings", Some(&guest_token("alice")), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_payment_webhook_confirms_booking() {
    let app = test_app();
    let alice = guest_token("alice");

    let (_, booking) = send(
        &app,
        "POST",
        "/v1/bookings",
        Some(&alice),
        Some(booking_body("villa-azure", "2024-06-10", "2024-06-13", 3)),
    )
    .await;
    let booking_id = booking["id"].as_str().unwrap().to_string();

    let (status, intent) = send(
        &app,
        "POST",
        "/v1/payments/intents",
        Some(&alice),
        Some(json!({ "booking_id": booking_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(intent["amount"], 165_000);
    let intent_id = intent["intent_id"].as_str().unwrap().to_string();

    app.payments.set_status(&intent_id, IntentStatus::Succeeded).await.unwrap();

    let webhook = json!({
        "id": "evt_1",
        "type": "payment_intent.succeeded",
        "data": { "object": { "id": intent_id } }
    });
    let (status, _) = send(&app, "POST", "/v1/webhooks/payments/stripe", None, Some(webhook.clone())).await;
    assert_eq!(status, StatusCode::OK);
    // Delivered twice by the provider
    let (status, _) = send(&app, "POST", "/v1/webhooks/payments/stripe", None, Some(webhook)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, stored) = send(&app, "GET", &format!("/v1/bookings/{}", booking_id), Some(&alice), None).await;
    assert_eq!(stored["status"], "confirmed");
    assert_eq!(stored["payment"]["status"], "completed");

    let (_, count) = send(&app, "GET", "/v1/admin/notifications/unread-count", Some(&admin_token()), None).await;
    assert_eq!(count["count"], 2);

    let subjects: Vec<String> = app.store.outbox().await.into_iter().map(|m| m.subject).collect();
    assert_eq!(subjects.iter().filter(|s| s.contains("payment received")).count(), 1);
}

#[tokio::test]
async fn test_confirm_checks_ownership_before_applying() {
    let app = test_app();
    let alice = guest_token("alice");
    let bob = guest_token("bob");

    let (_, booking) = send(
        &app,
        "POST",
        "/v1/bookings",
        Some(&alice),
        Some(booking_body("villa-azure", "2024-06-10", "2024-06-13", 3)),
    )
    .await;
    let booking_id = booking["id"].as_str().unwrap().to_string();
    let (_, intent) = send(
        &app,
        "POST",
        "/v1/payments/intents",
        Some(&alice),
        Some(json!({ "booking_id": booking_id })),
    )
    .await;
    let intent_id = intent["intent_id"].as_str().unwrap().to_string();
    app.payments.set_status(&intent_id, IntentStatus::Succeeded).await.unwrap();

    let (status, _) = send(
        &app,
        "POST",
        "/v1/payments/confirm",
        Some(&bob),
        Some(json!({ "intent_id": intent_id })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Nothing was applied on Bob's behalf
    let (_, stored) = send(&app, "GET", &format!("/v1/bookings/{}", booking_id), Some(&alice), None).await;
    assert_eq!(stored["status"], "pending");
    assert_eq!(stored["payment"]["status"], "pending");

    let (status, outcome) = send(
        &app,
        "POST",
        "/v1/payments/confirm",
        Some(&alice),
        Some(json!({ "intent_id": intent_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["status"], "succeeded");
    let (_, stored) = send(&app, "GET", &format!("/v1/bookings/{}", booking_id), Some(&alice), None).await;
    assert_eq!(stored["status"], "confirmed");
}

#[tokio::test]
async fn test_admin_blocks_and_quotes() {
    let app = test_app();
    let admin = admin_token();

    let (status, body) = send(
        &app,
        "POST",
        "/v1/admin/properties/villa-azure/blocks",
        Some(&admin),
        Some(json!({ "dates": ["2024-08-01", "2024-08-02"], "reason": "maintenance", "note": "roof" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);

    let (_, availability) = send(
        &app,
        "GET",
        "/v1/properties/villa-azure/availability?check_in=2024-07-30&check_out=2024-08-02",
        None,
        None,
    )
    .await;
    assert_eq!(availability["available"], false);

    let (_, calendar) = send(
        &app,
        "GET",
        "/v1/admin/properties/villa-azure/calendar?start=2024-08-01&end=2024-08-31",
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(calendar.as_object().unwrap().len(), 2);
    assert_eq!(calendar["2024-08-01"]["reason"], "maintenance");

    let (status, _) = send(
        &app,
        "POST",
        "/v1/admin/pricing-rules",
        Some(&admin),
        Some(json!({
            "property_id": "villa-azure",
            "start_date": "2024-08-10",
            "end_date": "2024-08-11",
            "price": 80000,
            "rule_type": "peak"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, quote) = send(
        &app,
        "POST",
        "/v1/quotes",
        None,
        Some(json!({
            "property_id": "villa-azure",
            "check_in": "2024-08-09",
            "check_out": "2024-08-12",
            "base_rate": 50000,
            "cleaning_fee": 15000
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(quote["nights"], 3);
    assert_eq!(quote["breakdown"]["base"], 210_000);

    let (status, _) = send(
        &app,
        "POST",
        "/v1/quotes",
        None,
        Some(json!({
            "property_id": "villa-azure",
            "check_in": "0001-01-01",
            "check_out": "9999-12-31",
            "base_rate": 50000,
            "cleaning_fee": 15000
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "GET",
        "/v1/admin/properties/villa-azure/calendar?start=2024-01-01&end=2026-01-01",
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        "POST",
        "/v1/admin/pricing-rules",
        Some(&admin),
        Some(json!({
            "property_id": "villa-azure",
            "start_date": "2024-08-12",
            "end_date": "2024-08-10",
            "price": 80000,
            "rule_type": "seasonal"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("start_date"));
}

#[tokio::test]
async fn test_admin_cancel_releases_nights() {
    let app = test_app();
    let admin = admin_token();

    let (_, booking) = send(
        &app,
        "POST",
        "/v1/bookings",
        Some(&guest_token("alice")),
        Some(booking_body("villa-azure", "2024-06-10", "2024-06-12", 2)),
    )
    .await;
    let id = booking["id"].as_str().unwrap();

    let (status, updated) = send(
        &app,
        "PUT",
        &format!("/v1/admin/bookings/{}/status", id),
        Some(&admin),
        Some(json!({ "status": "cancelled" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "cancelled");
    assert!(app.store.ledger_snapshot().await.is_empty());

    let (_, listed) = send(&app, "GET", "/v1/admin/bookings?status=cancelled", Some(&admin), None).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/v1/admin/bookings/{}/status", id),
        Some(&admin),
        Some(json!({ "status": "completed" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}
