use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use perkly_api::middleware::RateLimiter;
use perkly_api::{app, AppState};
use perkly_offer::{EligibilityService, ServiceSettings};
use perkly_store::InMemoryRecordStore;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

fn id() -> String {
    Uuid::new_v4().to_string()
}

fn router() -> Router {
    let service = EligibilityService::new(
        Arc::new(InMemoryRecordStore::new()),
        ServiceSettings::default(),
    );
    app(AppState::new(service))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn offer_body(offer_id: &str, merchant_id: &str) -> Value {
    json!({
        "id": offer_id,
        "merchant_id": merchant_id,
        "mcc_whitelist": ["5812", "5814"],
        "active": true,
        "min_txn_count": 3,
        "lookback_days": 30,
        "starts_at": "2025-10-01T00:00:00Z",
        "ends_at": "2025-10-31T23:59:59Z"
    })
}

fn txn_body(user_id: &str, merchant_id: &str, mcc: &str, approved_at: &str) -> Value {
    json!({
        "id": id(),
        "user_id": user_id,
        "merchant_id": merchant_id,
        "mcc": mcc,
        "amount_cents": 2599,
        "approved_at": approved_at
    })
}

#[tokio::test]
async fn test_full_eligibility_flow() {
    let app = router();
    let offer_id = id();
    let merchant = id();
    let user = id();

    let (status, offer) = send(&app, post_json("/offers", offer_body(&offer_id, &merchant))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(offer["id"], offer_id.as_str());
    assert!(offer["created_at"].is_string());

    let other = id();
    let (status, body) = send(
        &app,
        post_json(
            "/transactions",
            json!({ "transactions": [
                txn_body(&user, &other, "5812", "2025-10-18T12:00:00Z"),
                txn_body(&user, &other, "5812", "2025-10-19T12:00:00Z"),
                txn_body(&user, &other, "5814", "2025-10-20T12:00:00Z"),
            ]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["inserted"], 3);

    let (status, body) = send(
        &app,
        get(&format!("/users/{}/eligible-offers?now=2025-10-21T10:00:00Z", user)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "user_id": user,
            "eligible_offers": [{
                "offer_id": offer_id,
                "reason": ">= 3 matching transactions in last 30 days (found 3)"
            }]
        })
    );
}

#[tokio::test]
async fn test_unknown_user_gets_empty_list() {
    let app = router();
    let user = id();

    let (status, body) = send(
        &app,
        get(&format!("/users/{}/eligible-offers?now=2025-10-21T10:00:00Z", user)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["eligible_offers"], json!([]));
}

#[tokio::test]
async fn test_invalid_offer_is_bad_request() {
    let app = router();
    let mut body = offer_body(&id(), &id());
    body["mcc_whitelist"] = json!(["5812", "5812"]);

    let (status, body) = send(&app, post_json("/offers", body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("mcc_whitelist"));
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = router();
    let req = Request::builder()
        .method("POST")
        .uri("/offers")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"id\": "))
        .unwrap();

    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_duplicate_transaction_is_conflict() {
    let app = router();
    let txn = txn_body(&id(), &id(), "5812", "2025-10-20T12:00:00Z");

    let (status, _) = send(&app, post_json("/transactions", json!({ "transactions": [txn.clone()] }))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, post_json("/transactions", json!({ "transactions": [txn] }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("duplicate"));
}

#[tokio::test]
async fn test_empty_batch_is_bad_request() {
    let app = router();
    let (status, _) = send(&app, post_json("/transactions", json!({ "transactions": [] }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_bad_user_id_and_bad_now_are_rejected() {
    let app = router();

    let (status, _) = send(&app, get("/users/not-a-uuid/eligible-offers")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        get(&format!("/users/{}/eligible-offers?now=yesterday", id())),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("now"));
}

#[tokio::test]
async fn test_health_reports_ok() {
    let app = router();
    let resp = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"OK");
}

#[tokio::test]
async fn test_rate_limited_client_gets_429() {
    let app = limited_router(2);
    let uri = format!("/users/{}/eligible-offers", id());

    assert_eq!(app.clone().oneshot(from(&uri, "203.0.113.9")).await.unwrap().status(), StatusCode::OK);
    assert_eq!(app.clone().oneshot(from(&uri, "203.0.113.9")).await.unwrap().status(), StatusCode::OK);
    assert_eq!(
        app.clone().oneshot(from(&uri, "203.0.113.9")).await.unwrap().status(),
        StatusCode::TOO_MANY_REQUESTS
    );
    assert_eq!(app.oneshot(from(&uri, "198.51.100.4")).await.unwrap().status(), StatusCode::OK);
}

#[tokio::test]
async fn test_health_is_not_rate_limited() {
    let app = limited_router(1);

    for _ in 0..3 {
        let resp = app.clone().oneshot(from("/health", "203.0.113.9")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let uri = format!("/users/{}/eligible-offers", id());
    assert_eq!(app.clone().oneshot(from(&uri, "203.0.113.9")).await.unwrap().status(), StatusCode::OK);
    assert_eq!(
        app.oneshot(from(&uri, "203.0.113.9")).await.unwrap().status(),
        StatusCode::TOO_MANY_REQUESTS
    );
}

fn limited_router(capacity: u32) -> Router {
    let service = EligibilityService::new(
        Arc::new(InMemoryRecordStore::new()),
        ServiceSettings::default(),
    );
    app(AppState::new(service).with_rate_limiter(RateLimiter::new(capacity, Duration::from_secs(3600))))
}

fn from(uri: &str, ip: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-forwarded-for", ip)
        .body(Body::empty())
        .unwrap()
}
