// ABOUTME: Integration tests for the fetch-and-retry client contract
// ABOUTME: Covers 401 recovery, retry exhaustion, degraded fallbacks, and caching
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Keystone Coaching

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use cal_sync_server::cal::{DegradedReason, FetchOutcome};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{
    connected_calendars_body, managed_refresh_body, mount_managed_refresh, new_ulid,
    seed_managed_integration, test_client, test_database,
};

const EXPIRED_BODY: &str =
    r#"{"error":{"code":"TokenExpiredException","message":"ACCESS_TOKEN_IS_EXPIRED"}}"#;

#[tokio::test]
async fn expired_token_mid_request_recovers_with_one_forced_refresh_and_one_retry() {
    let database = test_database().await;
    let server = MockServer::start().await;

    // First calendars call answers 498, the retry succeeds.
    Mock::given(method("GET"))
        .and(path("/v2/calendars"))
        .respond_with(
            ResponseTemplate::new(498).set_body_raw(EXPIRED_BODY, "application/json"),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/calendars"))
        .respond_with(ResponseTemplate::new(200).set_body_json(connected_calendars_body()))
        .expect(1)
        .mount(&server)
        .await;
    mount_managed_refresh(&server, 1, managed_refresh_body(true)).await;

    let user = new_ulid();
    seed_managed_integration(&database, &user, 3600).await;

    let client = test_client(&database, &server);
    let outcome = client.get_connected_calendars(&user).await.unwrap();

    let FetchOutcome::Fresh(snapshot) = outcome else {
        panic!("expected a fresh snapshot after recovery");
    };
    assert!(snapshot.token_refreshed);
    assert!(snapshot.has_connected_calendars);
    assert_eq!(snapshot.calendars.len(), 1);
    assert_eq!(
        snapshot.calendars[0].provider.as_deref(),
        Some("google_calendar")
    );
    assert_eq!(snapshot.calendars[0].calendars.len(), 1);

    // The successful fetch derives and persists the connection flags.
    let stored = database
        .get_calendar_integration_by_user(&user)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.google_calendar_connected);
    assert!(!stored.office365_calendar_connected);
}

#[tokio::test]
async fn two_consecutive_auth_failures_degrade_with_retry_failed() {
    let database = test_database().await;
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/calendars"))
        .respond_with(ResponseTemplate::new(401).set_body_raw(EXPIRED_BODY, "application/json"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    mount_managed_refresh(&server, 1, managed_refresh_body(true)).await;

    let user = new_ulid();
    seed_managed_integration(&database, &user, 3600).await;
    database
        .set_calendar_connection_flags(&user, true, false)
        .await
        .unwrap();

    let client = test_client(&database, &server);
    let outcome = client.get_connected_calendars(&user).await.unwrap();

    let FetchOutcome::Degraded { reason, fallback } = outcome else {
        panic!("expected a degraded outcome");
    };
    assert_eq!(reason, DegradedReason::RetryFailed);
    // DB-derived flags still tell the dashboard something useful.
    assert!(fallback.has_connected_calendars);
    assert!(fallback.calendars.is_empty());
}

#[tokio::test]
async fn failed_forced_refresh_degrades_without_a_retry() {
    let database = test_database().await;
    let server = MockServer::start().await;

    // One calendars call only: the failed refresh must prevent the retry.
    Mock::given(method("GET"))
        .and(path("/v2/calendars"))
        .respond_with(ResponseTemplate::new(401).set_body_raw(EXPIRED_BODY, "application/json"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(common::managed_refresh_path()))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .expect(1)
        .mount(&server)
        .await;

    let user = new_ulid();
    seed_managed_integration(&database, &user, 3600).await;

    let client = test_client(&database, &server);
    let outcome = client.get_connected_calendars(&user).await.unwrap();

    let FetchOutcome::Degraded { reason, .. } = outcome else {
        panic!("expected a degraded outcome");
    };
    assert!(matches!(reason, DegradedReason::TokenRefreshFailed { .. }));
}

#[tokio::test]
async fn non_auth_error_degrades_without_any_refresh() {
    let database = test_database().await;
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/calendars"))
        .respond_with(
            ResponseTemplate::new(503).set_body_json(serde_json::json!({
                "message": "calendar provider unavailable"
            })),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_managed_refresh(&server, 0, managed_refresh_body(true)).await;

    let user = new_ulid();
    seed_managed_integration(&database, &user, 3600).await;

    let client = test_client(&database, &server);
    let outcome = client.get_connected_calendars(&user).await.unwrap();

    let FetchOutcome::Degraded { reason, .. } = outcome else {
        panic!("expected a degraded outcome");
    };
    match reason {
        DegradedReason::ApiError { status, message } => {
            assert_eq!(status, Some(503));
            assert!(message.contains("calendar provider unavailable"));
        }
        other => panic!("expected ApiError, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_integration_degrades_to_an_empty_snapshot() {
    let database = test_database().await;
    let server = MockServer::start().await;

    let client = test_client(&database, &server);
    let outcome = client.get_connected_calendars(&new_ulid()).await.unwrap();

    let FetchOutcome::Degraded { reason, fallback } = outcome else {
        panic!("expected a degraded outcome");
    };
    assert!(matches!(reason, DegradedReason::TokenUnavailable { .. }));
    assert!(!fallback.has_connected_calendars);
    assert!(fallback.calendars.is_empty());
}

#[tokio::test]
async fn second_read_within_ttl_is_served_from_the_snapshot_cache() {
    let database = test_database().await;
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/calendars"))
        .respond_with(ResponseTemplate::new(200).set_body_json(connected_calendars_body()))
        .expect(1)
        .mount(&server)
        .await;

    let user = new_ulid();
    seed_managed_integration(&database, &user, 3600).await;

    let client = test_client(&database, &server);
    let first = client.get_connected_calendars(&user).await.unwrap();
    let second = client.get_connected_calendars(&user).await.unwrap();

    assert!(matches!(first, FetchOutcome::Fresh(_)));
    let FetchOutcome::Fresh(snapshot) = second else {
        panic!("expected the cached snapshot");
    };
    assert!(snapshot.has_connected_calendars);
}
