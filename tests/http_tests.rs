//! End-to-end tests through the router and middleware stack

mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use common::TestApp;
use rideway_server::middleware::{RateLimiter, REQUEST_ID};
use rideway_server::models::UserRole;
use rideway_server::ride::Actor;

fn router(app: &TestApp) -> Router {
    rideway_server::app(app.state.clone(), RateLimiter::new(1000))
}

fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

#[tokio::test]
async fn test_health_reports_store() {
    let app = TestApp::new().await;
    let router = router(&app);

    let (status, body) = send(&router, request(Method::GET, "/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store"], "memory");
    assert_eq!(body["connected_clients"], 0);
}

#[tokio::test]
async fn test_responses_carry_request_id_and_security_headers() {
    let app = TestApp::new().await;
    let response = router(&app)
        .oneshot(request(Method::GET, "/", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key(REQUEST_ID));
    assert_eq!(
        response.headers()["x-content-type-options"],
        "nosniff"
    );
    assert_eq!(response.headers()["x-frame-options"], "DENY");
}

#[tokio::test]
async fn test_missing_or_bad_token_rejected() {
    let app = TestApp::new().await;
    let router = router(&app);

    let (status, body) = send(&router, request(Method::GET, "/rides", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"]["code"].is_string());

    let (status, _) = send(
        &router,
        request(Method::GET, "/rides", Some("not-a-jwt"), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_customer_forbidden_on_admin_and_driver_routes() {
    let app = TestApp::new().await;
    let router = router(&app);
    let customer = app.customer().await;
    let token = app.token_for(&customer);

    let (status, _) = send(
        &router,
        request(Method::GET, "/admin/users", Some(&token), None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &router,
        request(Method::GET, "/rides/bookable", Some(&token), None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_token_role_must_match_account() {
    let app = TestApp::new().await;
    let router = router(&app);
    let customer = app.customer().await;
    // Same account, token claims admin
    let forged = app.token_for(&Actor::new(customer.user_id, UserRole::Admin));

    let (status, _) = send(
        &router,
        request(Method::GET, "/admin/users", Some(&forged), None),
    )
    .await;
    assert_ne!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_booking_flow_over_http() {
    let app = TestApp::new().await;
    let router = router(&app);
    let admin = app.admin().await;
    let customer = app.customer().await;
    let driver = app.online_driver(&admin).await;
    let customer_token = app.token_for(&customer);
    let driver_token = app.token_for(&driver);

    let (status, ride) = send(
        &router,
        request(
            Method::POST,
            "/rides",
            Some(&customer_token),
            Some(json!({
                "pickup_address": "Central Station",
                "dropoff_address": "Airport T1"
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(ride["status"], "pending");
    let ride_id = ride["id"].as_str().unwrap().to_string();

    let (status, ride) = send(
        &router,
        request(
            Method::POST,
            &format!("/rides/{}/vehicle", ride_id),
            Some(&customer_token),
            Some(json!({ "vehicle_class": "sedan" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ride["status"], "booked");
    assert_eq!(ride["fare"], "110");

    let (status, feed) = send(
        &router,
        request(Method::GET, "/rides/bookable", Some(&driver_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(feed
        .as_array()
        .unwrap()
        .iter()
        .any(|r| r["id"] == ride_id.as_str()));

    let (status, ride) = send(
        &router,
        request(
            Method::POST,
            &format!("/rides/{}/accept", ride_id),
            Some(&driver_token),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ride["status"], "accepted");
    assert_eq!(ride["driver_id"], driver.user_id.to_string());

    // A second driver is too late
    let rival = app.online_driver(&admin).await;
    let (status, body) = send(
        &router,
        request(
            Method::POST,
            &format!("/rides/{}/accept", ride_id),
            Some(&app.token_for(&rival)),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    let (status, _) = send(
        &router,
        request(
            Method::POST,
            &format!("/rides/{}/cancel", ride_id),
            Some(&customer_token),
            Some(json!({ "reason": "found another ride" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, history) = send(
        &router,
        request(
            Method::GET,
            &format!("/rides/{}/history", ride_id),
            Some(&customer_token),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let last = history.as_array().unwrap().last().unwrap().clone();
    assert_eq!(last["to_status"], "cancelled_by_customer");
    assert_eq!(last["note"], "found another ride");
}

#[tokio::test]
async fn test_invalid_ride_request_rejected() {
    let app = TestApp::new().await;
    let router = router(&app);
    let customer = app.customer().await;
    let token = app.token_for(&customer);

    let (status, body) = send(
        &router,
        request(
            Method::POST,
            "/rides",
            Some(&token),
            Some(json!({
                "pickup_address": "",
                "dropoff_address": "Airport T1"
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, _) = send(
        &router,
        request(
            Method::POST,
            "/rides",
            Some(&token),
            Some(json!({
                "pickup_address": "Somewhere",
                "pickup": { "lat": 123.0, "lng": 0.0 },
                "dropoff_address": "Elsewhere"
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_ride_is_not_found() {
    let app = TestApp::new().await;
    let router = router(&app);
    let customer = app.customer().await;
    let token = app.token_for(&customer);

    let (status, _) = send(
        &router,
        request(
            Method::GET,
            &format!("/rides/{}", uuid::Uuid::new_v4()),
            Some(&token),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rate_limit_returns_429() {
    let app = TestApp::new().await;
    // One request per second, bursts of two
    let router = rideway_server::app(app.state.clone(), RateLimiter::new(1));

    let mut statuses = Vec::new();
    for _ in 0..4 {
        let req = Request::builder()
            .uri("/")
            .header("x-forwarded-for", "198.51.100.4")
            .body(Body::empty())
            .unwrap();
        statuses.push(router.clone().oneshot(req).await.unwrap().status());
    }

    assert_eq!(statuses[0], StatusCode::OK);
    assert!(statuses.contains(&StatusCode::TOO_MANY_REQUESTS));

    // Health checks are never limited
    let (status, _) = send(&router, request(Method::GET, "/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
}
