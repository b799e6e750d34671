// ABOUTME: Integration tests for the exposed REST surface
// ABOUTME: Drives the full router over a real listener and asserts wire shapes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Keystone Coaching

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use std::sync::Arc;

use cal_sync_server::routes::ServerResources;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{
    connected_calendars_body, event_types_body, new_ulid, remote_event_type_json,
    seed_managed_integration, spawn_app, test_client, test_database,
};

async fn app_with_mock() -> (String, cal_sync_server::database::Database, MockServer) {
    let database = test_database().await;
    let server = MockServer::start().await;
    let resources = Arc::new(ServerResources {
        database: database.clone(),
        cal: test_client(&database, &server),
    });
    let base_url = spawn_app(resources).await;
    (base_url, database, server)
}

#[tokio::test]
async fn health_reports_ok() {
    let (base_url, _database, _server) = app_with_mock().await;

    let body: Value = reqwest::get(format!("{base_url}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "cal-sync-server");
}

#[tokio::test]
async fn get_all_calendars_returns_the_flattened_wire_shape() {
    let (base_url, database, server) = app_with_mock().await;

    Mock::given(method("GET"))
        .and(path("/v2/calendars"))
        .respond_with(ResponseTemplate::new(200).set_body_json(connected_calendars_body()))
        .expect(1)
        .mount(&server)
        .await;

    let user = new_ulid();
    seed_managed_integration(&database, &user, 3600).await;

    let response = reqwest::get(format!(
        "{base_url}/api/cal/calendars/get-all-calendars?user_ulid={user}"
    ))
    .await
    .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["hasConnectedCalendars"], true);
    assert_eq!(body["data"]["calendars"][0]["provider"], "google_calendar");
    assert_eq!(
        body["data"]["calendars"][0]["calendars"][0]["externalId"],
        "coach@example.com"
    );
    assert!(body["data"].get("tokenError").is_none());
    assert!(body["data"].get("apiError").is_none());
}

#[tokio::test]
async fn get_all_calendars_without_an_integration_soft_fails_with_http_200() {
    let (base_url, _database, _server) = app_with_mock().await;

    let user = new_ulid();
    let response = reqwest::get(format!(
        "{base_url}/api/cal/calendars/get-all-calendars?user_ulid={user}"
    ))
    .await
    .unwrap();
    assert_eq!(response.status(), 200, "degraded fetches must not hard-fail");

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["hasConnectedCalendars"], false);
    assert!(body["data"]["tokenError"].is_string());
}

#[tokio::test]
async fn invalid_user_ulid_is_rejected() {
    let (base_url, _database, _server) = app_with_mock().await;

    let response = reqwest::get(format!(
        "{base_url}/api/cal/calendars/get-all-calendars?user_ulid=not-a-ulid"
    ))
    .await
    .unwrap();
    assert_eq!(response.status(), 400);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "invalid_input");
}

#[tokio::test]
async fn create_event_type_requires_name_and_duration() {
    let (base_url, database, _server) = app_with_mock().await;

    let user = new_ulid();
    seed_managed_integration(&database, &user, 3600).await;

    let http = reqwest::Client::new();
    let response = http
        .post(format!(
            "{base_url}/api/cal/event-types/create-event-type?user_ulid={user}"
        ))
        .json(&json!({ "description": "missing the required fields" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("name"));

    let response = http
        .post(format!(
            "{base_url}/api/cal/event-types/create-event-type?user_ulid={user}"
        ))
        .json(&json!({ "name": "Strategy Session" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("duration"));
}

#[tokio::test]
async fn create_event_type_creates_remote_and_mirror_row() {
    let (base_url, database, server) = app_with_mock().await;

    Mock::given(method("POST"))
        .and(path("/v2/event-types"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "data": remote_event_type_json(555, "Strategy Session", 15_000)
        })))
        .expect(1)
        .mount(&server)
        .await;

    let user = new_ulid();
    let integration = seed_managed_integration(&database, &user, 3600).await;

    let http = reqwest::Client::new();
    let response = http
        .post(format!(
            "{base_url}/api/cal/event-types/create-event-type?user_ulid={user}"
        ))
        .json(&json!({
            "name": "Strategy Session",
            "duration": 45,
            "priceCents": 15_000
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["eventType"]["id"], 555);
    assert_eq!(body["data"]["calEventType"]["calEventTypeId"], 555);
    assert_eq!(body["data"]["calEventType"]["isDefault"], false);

    let rows = database
        .get_cal_event_types_for_integration(&integration.ulid)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].cal_event_type_id, Some(555));
}

#[tokio::test]
async fn sync_endpoint_reports_reconciliation_counters() {
    let (base_url, database, server) = app_with_mock().await;

    Mock::given(method("GET"))
        .and(path("/v2/event-types"))
        .respond_with(ResponseTemplate::new(200).set_body_json(event_types_body(&[
            remote_event_type_json(101, "Strategy Session", 15_000),
            remote_event_type_json(102, "Quick Check-in", 5_000),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let user = new_ulid();
    seed_managed_integration(&database, &user, 3600).await;

    let http = reqwest::Client::new();
    let response = http
        .post(format!(
            "{base_url}/api/cal/event-types/sync?user_ulid={user}"
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["counters"]["created"], 2);
    assert_eq!(body["data"]["counters"]["skipped"], 0);
}

#[tokio::test]
async fn get_bookings_passes_the_status_filter_through() {
    let (base_url, database, server) = app_with_mock().await;

    Mock::given(method("GET"))
        .and(path("/v2/bookings"))
        .and(wiremock::matchers::query_param("status", "upcoming"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::bookings_body(&[json!({
            "id": 9001,
            "uid": "bk_9001",
            "title": "Strategy Session",
            "status": "accepted",
            "start": "2026-08-10T15:00:00Z",
            "end": "2026-08-10T15:45:00Z",
            "eventTypeId": 101
        })])))
        .expect(1)
        .mount(&server)
        .await;

    let user = new_ulid();
    seed_managed_integration(&database, &user, 3600).await;

    let response = reqwest::get(format!(
        "{base_url}/api/cal/bookings/get-bookings?user_ulid={user}&status=upcoming"
    ))
    .await
    .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["bookings"][0]["id"], 9001);
    assert_eq!(body["data"]["bookings"][0]["eventTypeId"], 101);
}
