// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Provides database, integration seeding, and Cal.com mock helpers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Keystone Coaching

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]
#![allow(dead_code)]

//! Shared test utilities for `cal-sync-server` integration tests.

use std::sync::Arc;

use cal_sync_server::cal::CalClient;
use cal_sync_server::config::CalConfig;
use cal_sync_server::database::Database;
use cal_sync_server::models::{AccountKind, CalendarIntegration};
use cal_sync_server::routes::{router, ServerResources};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use ulid::Ulid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_CLIENT_ID: &str = "test-client-id";
pub const TEST_CLIENT_SECRET: &str = "test-client-secret";
pub const TEST_MANAGED_USER_ID: i64 = 4242;

pub fn test_key() -> Vec<u8> {
    vec![0u8; 32]
}

pub async fn test_database() -> Database {
    Database::new("sqlite::memory:", test_key())
        .await
        .expect("Failed to create test database")
}

pub fn test_cal_config(api_base: &str) -> CalConfig {
    CalConfig {
        client_id: Some(TEST_CLIENT_ID.to_owned()),
        client_secret: Some(TEST_CLIENT_SECRET.to_owned()),
        api_base: api_base.trim_end_matches('/').to_owned(),
        ..CalConfig::default()
    }
}

pub fn new_ulid() -> String {
    Ulid::new().to_string()
}

fn base_integration(user_ulid: &str, expires_in_secs: i64) -> CalendarIntegration {
    let now = Utc::now();
    CalendarIntegration {
        ulid: new_ulid(),
        user_ulid: user_ulid.to_owned(),
        account_kind: AccountKind::Managed,
        cal_managed_user_id: Some(TEST_MANAGED_USER_ID),
        cal_access_token: Some("access-token-initial".to_owned()),
        cal_refresh_token: Some("refresh-token-initial".to_owned()),
        cal_access_token_expires_at: Some(now + Duration::seconds(expires_in_secs)),
        google_calendar_connected: false,
        office365_calendar_connected: false,
        created_at: now,
        updated_at: now,
    }
}

/// Seed a managed-account integration whose token expires in `expires_in_secs`
pub async fn seed_managed_integration(
    database: &Database,
    user_ulid: &str,
    expires_in_secs: i64,
) -> CalendarIntegration {
    let integration = base_integration(user_ulid, expires_in_secs);
    database
        .create_calendar_integration(&integration)
        .await
        .expect("Failed to seed managed integration");
    integration
}

/// Seed a standard-OAuth integration whose token expires in `expires_in_secs`
pub async fn seed_oauth_integration(
    database: &Database,
    user_ulid: &str,
    expires_in_secs: i64,
) -> CalendarIntegration {
    let mut integration = base_integration(user_ulid, expires_in_secs);
    integration.account_kind = AccountKind::Oauth;
    integration.cal_managed_user_id = None;
    database
        .create_calendar_integration(&integration)
        .await
        .expect("Failed to seed OAuth integration");
    integration
}

pub fn managed_refresh_path() -> String {
    format!("/v2/oauth-clients/{TEST_CLIENT_ID}/users/{TEST_MANAGED_USER_ID}/force-refresh")
}

/// Managed force-refresh response body; `rotate_refresh_token` controls
/// whether `data.refreshToken` is present
pub fn managed_refresh_body(rotate_refresh_token: bool) -> Value {
    let expires_at_ms = (Utc::now() + Duration::hours(1)).timestamp_millis();
    let mut data = json!({
        "accessToken": "access-token-new",
        "accessTokenExpiresAt": expires_at_ms,
    });
    if rotate_refresh_token {
        data["refreshToken"] = json!("refresh-token-rotated");
    }
    json!({ "status": "success", "data": data })
}

pub fn oauth_refresh_body(rotate_refresh_token: bool) -> Value {
    let mut body = json!({
        "access_token": "access-token-new",
        "expires_in": 3600,
    });
    if rotate_refresh_token {
        body["refresh_token"] = json!("refresh-token-rotated");
    }
    body
}

/// Mount the managed force-refresh endpoint expecting exactly `expected`
/// requests
pub async fn mount_managed_refresh(server: &MockServer, expected: u64, body: Value) {
    Mock::given(method("POST"))
        .and(path(managed_refresh_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(expected)
        .mount(server)
        .await;
}

pub fn connected_calendars_body() -> Value {
    json!({
        "status": "success",
        "data": {
            "connectedCalendars": [
                {
                    "integration": {
                        "type": "google_calendar",
                        "slug": "google-calendar",
                        "email": "coach@example.com",
                        "credentialId": 123
                    },
                    "calendars": [
                        {
                            "id": "primary",
                            "name": "Coach Calendar",
                            "primary": true,
                            "externalId": "coach@example.com",
                            "isSelected": true
                        }
                    ]
                }
            ]
        }
    })
}

pub fn remote_event_type_json(id: i64, title: &str, price_cents: i64) -> Value {
    json!({
        "id": id,
        "title": title,
        "slug": format!("event-type-{id}"),
        "description": "Coaching session",
        "lengthInMinutes": 45,
        "hidden": false,
        "price": price_cents,
        "position": 0,
        "schedulingType": "MANAGED",
        "minimumBookingNotice": 120,
        "beforeEventBuffer": 10,
        "afterEventBuffer": 5,
        "disableGuests": false,
        "locations": [{ "type": "integrations:zoom" }],
        "metadata": { "discountPercentage": 10 }
    })
}

pub fn event_types_body(event_types: &[Value]) -> Value {
    json!({ "status": "success", "data": event_types })
}

pub fn bookings_body(bookings: &[Value]) -> Value {
    json!({ "status": "success", "data": bookings })
}

/// Build a client pointed at the mock Cal.com server
pub fn test_client(database: &Database, server: &MockServer) -> CalClient {
    CalClient::new(database.clone(), test_cal_config(&server.uri()))
}

/// Serve the full router on an ephemeral port, returning its base URL
pub async fn spawn_app(resources: Arc<ServerResources>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Listener has no local addr");
    tokio::spawn(async move {
        axum::serve(listener, router(resources))
            .await
            .expect("Test server crashed");
    });
    format!("http://{addr}")
}
