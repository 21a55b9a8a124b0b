use std::path::PathBuf;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tokio_test::{assert_err, assert_ok};
use tower::ServiceExt;

use courtside::api;
use courtside::engine::{Engine, ReservationPolicy};
use courtside::model::ReservationInfo;

/// 2025-01-01T10:00:00Z
const TEN_AM: i64 = 1_735_725_600_000;
const HOUR: i64 = 3_600_000;
const HALF_HOUR: i64 = 1_800_000;

fn test_wal_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("courtside_test_http");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    let _ = std::fs::remove_file(&path);
    path
}

fn app(wal: &str) -> Router {
    let engine = Engine::new(test_wal_path(wal), ReservationPolicy::default()).unwrap();
    api::router(Arc::new(engine))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
    };
    (status, value)
}

/// Creates Clay at 10/min with one court and returns the court id.
async fn clay_court(app: &Router) -> String {
    let (status, surface) = send(
        app,
        Method::POST,
        "/api/surfaces",
        Some(json!({"name": "Clay", "minutePrice": 10})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, court) = send(
        app,
        Method::POST,
        "/api/courts",
        Some(json!({"name": "Court 1", "surfaceId": surface["id"]})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(court["surface"]["minutePrice"], 10);
    court["id"].as_str().unwrap().to_string()
}

fn reservation_body(court: &str, phone: &str, start: i64, end: i64, doubles: bool) -> Value {
    json!({
        "courtId": court,
        "customerPhoneNumber": phone,
        "customerName": "Ana",
        "isDoubles": doubles,
        "startsAt": start,
        "endsAt": end,
    })
}

#[tokio::test]
async fn health_is_ok() {
    let app = app("health.wal");
    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("ok".into()));
}

#[tokio::test]
async fn booking_scenario_on_new_years_day() {
    let app = app("scenario.wal");
    let court = clay_court(&app).await;

    let (status, first) = send(
        &app,
        Method::POST,
        "/api/reservations",
        Some(reservation_body(&court, "555-0100", TEN_AM, TEN_AM + HOUR, false)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["price"], 600.0);

    let (status, err) = send(
        &app,
        Method::POST,
        "/api/reservations",
        Some(reservation_body(
            &court,
            "555-0101",
            TEN_AM + HALF_HOUR,
            TEN_AM + HOUR + HALF_HOUR,
            false,
        )),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["error"], "conflict");

    let (status, second) = send(
        &app,
        Method::POST,
        "/api/reservations",
        Some(reservation_body(&court, "555-0101", TEN_AM + HOUR, TEN_AM + 2 * HOUR, true)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(second["price"], 900.0);

    let info: ReservationInfo = assert_ok!(serde_json::from_value(second));
    assert_eq!(info.court.surface.name, "Clay");
    assert_eq!(info.customer.phone_number, "555-0101");

    let (status, listed) = send(&app, Method::GET, &format!("/api/reservations/court/{court}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn missing_fields_are_bad_requests() {
    let app = app("missing_fields.wal");
    let court = clay_court(&app).await;

    let (status, err) = send(
        &app,
        Method::POST,
        "/api/reservations",
        Some(json!({"courtId": court, "customerPhoneNumber": "1"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "validation");
    assert_eq!(err["message"], "customerName is required");

    let (status, _) = send(&app, Method::POST, "/api/surfaces", Some(json!({"name": "Grass"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, err) = send(
        &app,
        Method::POST,
        "/api/reservations",
        Some(reservation_body(&court, "1", TEN_AM + HOUR, TEN_AM, false)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["message"], "endsAt must be after startsAt");
}

#[tokio::test]
async fn malformed_input_is_rejected_as_json() {
    let app = app("malformed.wal");
    let (status, err) = send(&app, Method::GET, "/api/courts/id/not-a-ulid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "invalid_path");

    let (status, err) = send(
        &app,
        Method::POST,
        "/api/surfaces",
        Some(json!({"name": "Clay", "minutePrice": "ten"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "invalid_body");
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let app = app("not_found.wal");
    let missing = ulid::Ulid::new();

    let (status, _) = send(&app, Method::GET, &format!("/api/surfaces/id/{missing}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, err) = send(
        &app,
        Method::POST,
        "/api/reservations",
        Some(reservation_body(&missing.to_string(), "1", TEN_AM, TEN_AM + HOUR, false)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["error"], "not_found");

    let (status, _) = send(&app, Method::GET, "/api/customers/phone/000", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, Method::GET, "/api/reservations/phone/all/000", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn duplicate_names_are_conflicts() {
    let app = app("duplicates.wal");
    clay_court(&app).await;

    let (status, err) = send(
        &app,
        Method::POST,
        "/api/surfaces",
        Some(json!({"name": "Clay", "minutePrice": 12})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["error"], "constraint_violation");

    let body = json!({"phoneNumber": "555", "name": "Ana"});
    let (status, _) = send(&app, Method::POST, "/api/customers", Some(body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = send(&app, Method::POST, "/api/customers", Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn surface_crud_round() {
    let app = app("surface_crud.wal");
    let (_, surface) = send(
        &app,
        Method::POST,
        "/api/surfaces",
        Some(json!({"name": "Hard", "minutePrice": 8})),
    )
    .await;
    let uri = format!("/api/surfaces/id/{}", surface["id"].as_str().unwrap());

    let (status, patched) = send(&app, Method::PATCH, &uri, Some(json!({"minutePrice": 9}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["name"], "Hard");
    assert_eq!(patched["minutePrice"], 9);

    let (status, updated) = send(
        &app,
        Method::PUT,
        &uri,
        Some(json!({"name": "Hard court", "minutePrice": 11})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "Hard court");

    let (status, _) = send(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, all) = send(&app, Method::GET, "/api/surfaces/all", None).await;
    assert_eq!(all, json!([]));
}

#[tokio::test]
async fn reservation_patch_reprices_and_delete_hides() {
    let app = app("reservation_patch.wal");
    let court = clay_court(&app).await;
    let (_, created) = send(
        &app,
        Method::POST,
        "/api/reservations",
        Some(reservation_body(&court, "555", TEN_AM, TEN_AM + HOUR, false)),
    )
    .await;
    let uri = format!("/api/reservations/id/{}", created["id"].as_str().unwrap());

    let (status, patched) = send(&app, Method::PATCH, &uri, Some(json!({"isDoubles": true}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["price"], 900.0);
    assert_eq!(patched["startsAt"], TEN_AM);

    let (status, updated) = send(
        &app,
        Method::PUT,
        &uri,
        Some(reservation_body(&court, "555", TEN_AM, TEN_AM + HALF_HOUR, false)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["price"], 300.0);

    let (status, by_phone) = send(&app, Method::GET, "/api/reservations/phone/all/555", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(by_phone.as_array().unwrap().len(), 1);

    let (status, _) = send(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, all) = send(&app, Method::GET, "/api/reservations/all", None).await;
    assert_eq!(all, json!([]));
}

#[tokio::test]
async fn past_reservations_are_not_future() {
    let app = app("future.wal");
    let court = clay_court(&app).await;
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/reservations",
        Some(reservation_body(&court, "555", TEN_AM, TEN_AM + HOUR, false)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, future) = send(&app, Method::GET, "/api/reservations/phone/future/555", None).await;
    assert_eq!(future, json!([]));
    let (_, customer) = send(&app, Method::GET, "/api/customers/phone/555", None).await;
    assert_eq!(customer["name"], "Ana");
}

#[tokio::test]
async fn engine_survives_restart_behind_router() {
    let path = test_wal_path("restart.wal");
    let court = {
        let engine = Arc::new(Engine::new(path.clone(), ReservationPolicy::default()).unwrap());
        let app = api::router(engine);
        clay_court(&app).await
    };

    let engine = Arc::new(Engine::new(path, ReservationPolicy::default()).unwrap());
    assert_err!(engine.get_customer(ulid::Ulid::new()));
    let app = api::router(engine);
    let (status, body) = send(&app, Method::GET, &format!("/api/courts/id/{court}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Court 1");
}
