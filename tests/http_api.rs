mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use common::Fixture;
use serde_json::{json, Value};
use tower::ServiceExt;

use seat_reservations::{
    models::{OrderId, SeatStatus},
    router,
};

fn app(fx: &Fixture) -> Router {
    router(fx.state.clone())
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap_or(Value::Null) };
    (status, body)
}

#[tokio::test]
async fn health_is_ok() {
    let fx = Fixture::new().await;
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app(&fx).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn reserve_then_conflict() {
    let fx = Fixture::new().await;
    let seats = fx.seed_seats(2).await;
    let body = json!({ "eventId": fx.event_id, "seatIds": seats, "holdMinutes": 10 });

    let (status, first) = send(app(&fx), post_json("/api/seats/reserve", body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["ok"], true);
    assert_eq!(first["seats"].as_array().unwrap().len(), 2);
    assert_eq!(first["seats"][0]["status"], "reserved");
    assert!(first["expiresAt"].is_string());

    let (status, second) = send(app(&fx), post_json("/api/seats/reserve", body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(second["ok"], false);
    assert_eq!(second["unavailable"][0]["seatId"], json!(seats[0]));
    assert_eq!(second["unavailable"][0]["reason"], "reserved");
}

#[tokio::test]
async fn invalid_reserve_requests_are_bad_requests() {
    let fx = Fixture::new().await;
    let seats = fx.seed_seats(1).await;

    let cases = [
        json!({ "eventId": fx.event_id, "seatIds": [] }),
        json!({ "eventId": fx.event_id, "seatIds": [seats[0], seats[0]] }),
        json!({ "eventId": fx.event_id, "seatIds": seats, "holdMinutes": 0 }),
        json!({ "eventId": fx.event_id, "seatIds": seats, "holdMinutes": 600 }),
        json!({ "eventId": fx.event_id, "seatIds": seats, "holdMinutes": -5 }),
        json!({ "eventId": fx.event_id, "seatIds": seats, "holdMinutes": "ten" }),
        json!({ "eventId": fx.event_id, "seatIds": ["not-a-uuid"] }),
        json!({ "seatIds": seats }),
    ];
    for body in cases {
        let (status, response) = send(app(&fx), post_json("/api/seats/reserve", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["success"], false);
    }
    assert_eq!(fx.status(seats[0]).await, SeatStatus::Available);
}

#[tokio::test]
async fn malformed_bodies_get_validation_errors() {
    let fx = Fixture::new().await;
    let order_uri = format!("/api/orders/{}/finalize", OrderId::new());

    let cases = [
        post_json("/api/seats/release", json!({ "seatIds": ["not-a-uuid"] })),
        post_json("/api/orders", json!({ "eventId": "nope", "seatIds": [] })),
        post_json(&order_uri, json!({ "outcome": "refunded" })),
        post_json("/api/webhook/payment", json!({ "status": "CONFIRMED" })),
        Request::builder()
            .method("POST")
            .uri("/api/seats/reserve")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap(),
    ];
    for request in cases {
        let (status, response) = send(app(&fx), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["success"], false);
        assert!(response["message"].is_string());
    }
}

#[tokio::test]
async fn overlong_session_header_is_rejected() {
    let fx = Fixture::new().await;
    let seats = fx.seed_seats(1).await;
    let mut request = post_json("/api/seats/reserve", json!({ "eventId": fx.event_id, "seatIds": seats }));
    request.headers_mut().insert("x-session-id", "x".repeat(200).parse().unwrap());

    let (status, _) = send(app(&fx), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn availability_shows_effective_status() {
    let fx = Fixture::new().await;
    let seats = fx.seed_seats(3).await;
    common::expect_reserved(fx.reserve(&seats[..1], None).await);
    let uri = format!("/api/events/{}/seats", fx.event_id);

    let get = || Request::builder().uri(uri.as_str()).body(Body::empty()).unwrap();

    let (status, body) = send(app(&fx), get()).await;
    assert_eq!(status, StatusCode::OK);
    let statuses: Vec<&str> = body.as_array().unwrap().iter().map(|s| s["status"].as_str().unwrap()).collect();
    assert_eq!(statuses, vec!["reserved", "available", "available"]);

    fx.advance_minutes(11);
    let (_, body) = send(app(&fx), get()).await;
    assert!(body
        .as_array()
        .unwrap()
        .iter()
        .all(|s| s["status"] == "available" && s["reservedUntil"].is_null()));
}

#[tokio::test]
async fn release_reports_seat_numbers() {
    let fx = Fixture::new().await;
    let seats = fx.seed_seats(2).await;
    let sold = fx.seed_sold().await;
    common::expect_reserved(fx.reserve(&seats, None).await);

    let (status, body) = send(
        app(&fx),
        post_json("/api/seats/release", json!({ "seatIds": [seats[0], sold] })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["released"], json!([{ "seatId": seats[0], "seatNumber": "A1" }]));
    assert!(body.get("failed").is_none());
    assert_eq!(fx.status(seats[1]).await, SeatStatus::Reserved);
}

#[tokio::test]
async fn sweep_returns_count() {
    let fx = Fixture::new().await;
    let seats = fx.seed_seats(2).await;
    common::expect_reserved(fx.reserve(&seats, None).await);
    fx.advance_minutes(11);

    let (status, body) = send(app(&fx), post_json("/api/seats/sweep", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
}

#[tokio::test]
async fn order_lifecycle_over_http() {
    let fx = Fixture::new().await;
    let seats = fx.seed_seats(2).await;
    let with_session = |mut request: Request<Body>| {
        request.headers_mut().insert("x-session-id", "session-1".parse().unwrap());
        request
    };

    let reserve = post_json("/api/seats/reserve", json!({ "eventId": fx.event_id, "seatIds": seats }));
    let (status, _) = send(app(&fx), with_session(reserve)).await;
    assert_eq!(status, StatusCode::OK);

    let place = post_json("/api/orders", json!({ "eventId": fx.event_id, "seatIds": seats }));
    let (status, order) = send(app(&fx), with_session(place)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["status"], "pending");
    let order_id = order["id"].as_str().unwrap().to_string();

    let finalize = post_json(&format!("/api/orders/{}/finalize", order_id), json!({ "outcome": "succeeded" }));
    let (status, body) = send(app(&fx), finalize).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["orderStatus"], "completed");
    assert_eq!(body["seatsChanged"], 2);

    let get = Request::builder().uri(format!("/api/orders/{}", order_id)).body(Body::empty()).unwrap();
    let (status, body) = send(app(&fx), get).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
}

#[tokio::test]
async fn finalize_unknown_order_is_404() {
    let fx = Fixture::new().await;
    let uri = format!("/api/orders/{}/finalize", OrderId::new());
    let (status, _) = send(app(&fx), post_json(&uri, json!({ "outcome": "failed" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn payment_without_gateway_is_bad_gateway() {
    let fx = Fixture::new().await;
    let order_id = fx.insert_pending_order(&fx.seed_seats(1).await, None).await;
    let uri = format!("/api/orders/{}/payment", order_id);
    let (status, _) = send(app(&fx), post_json(&uri, json!({}))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn webhook_acknowledges_unknown_payment() {
    let fx = Fixture::new().await;
    let body = json!({ "paymentId": "nope", "status": "CONFIRMED" });
    let (status, response) = send(app(&fx), post_json("/api/webhook/payment", body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["received"], true);
}

#[tokio::test]
async fn webhook_store_outage_asks_for_redelivery() {
    let fx = Fixture::new().await;
    fx.store.fail_next_calls(10);
    let body = json!({ "paymentId": "pay-1", "status": "CONFIRMED" });
    let (status, _) = send(app(&fx), post_json("/api/webhook/payment", body)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn store_outage_on_reserve_is_503() {
    let fx = Fixture::new().await;
    let seats = fx.seed_seats(1).await;
    fx.store.fail_next_calls(2);
    let body = json!({ "eventId": fx.event_id, "seatIds": seats });
    let (status, _) = send(app(&fx), post_json("/api/seats/reserve", body)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(fx.status(seats[0]).await, SeatStatus::Available);
}
