// ABOUTME: Integration tests for database operations and token encryption at rest
// ABOUTME: Covers round-trips, disconnect semantics, and key binding
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Keystone Coaching

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use cal_sync_server::database::Database;
use cal_sync_server::models::TokenSet;
use chrono::{Duration, Utc};
use serde_json::json;

use common::{new_ulid, seed_managed_integration, test_database, test_key};

#[tokio::test]
async fn integration_round_trips_with_decrypted_tokens() {
    let database = test_database().await;
    let user = new_ulid();
    let seeded = seed_managed_integration(&database, &user, 3600).await;

    let stored = database
        .get_calendar_integration_by_user(&user)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.ulid, seeded.ulid);
    assert_eq!(
        stored.cal_access_token.as_deref(),
        Some("access-token-initial")
    );
    assert_eq!(
        stored.cal_refresh_token.as_deref(),
        Some("refresh-token-initial")
    );
    assert_eq!(stored.cal_managed_user_id, Some(common::TEST_MANAGED_USER_ID));
}

#[tokio::test]
async fn one_integration_per_user_is_enforced() {
    let database = test_database().await;
    let user = new_ulid();
    seed_managed_integration(&database, &user, 3600).await;

    let mut duplicate = common::seed_managed_integration(&database, &new_ulid(), 3600).await;
    duplicate.ulid = new_ulid();
    duplicate.user_ulid = user;
    let err = database
        .create_calendar_integration(&duplicate)
        .await
        .unwrap_err();
    assert!(err.message.contains("Failed to create calendar integration"));
}

#[tokio::test]
async fn updating_tokens_for_an_unknown_user_is_not_found() {
    let database = test_database().await;
    let tokens = TokenSet {
        access_token: "a".to_owned(),
        refresh_token: "r".to_owned(),
        expires_at: Utc::now() + Duration::hours(1),
    };
    let err = database
        .update_integration_tokens(&new_ulid(), &tokens)
        .await
        .unwrap_err();
    assert_eq!(
        err.code,
        cal_sync_server::errors::ErrorCode::ResourceNotFound
    );
}

#[tokio::test]
async fn disconnect_clears_tokens_but_keeps_the_row() {
    let database = test_database().await;
    let user = new_ulid();
    seed_managed_integration(&database, &user, 3600).await;
    database
        .set_calendar_connection_flags(&user, true, true)
        .await
        .unwrap();

    database.disconnect_calendar_integration(&user).await.unwrap();

    let stored = database
        .get_calendar_integration_by_user(&user)
        .await
        .unwrap()
        .expect("row must survive disconnect");
    assert!(stored.cal_access_token.is_none());
    assert!(stored.cal_refresh_token.is_none());
    assert!(stored.cal_access_token_expires_at.is_none());
    assert!(!stored.google_calendar_connected);
    assert!(!stored.office365_calendar_connected);
}

#[tokio::test]
async fn tokens_are_ciphertext_at_rest_and_survive_a_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}/cal_sync.db", dir.path().display());

    let user = new_ulid();
    {
        let database = Database::new(&url, test_key()).await.unwrap();
        seed_managed_integration(&database, &user, 3600).await;
    }

    // The raw column must not contain the plaintext token.
    let raw_pool = sqlx::SqlitePool::connect(&url).await.unwrap();
    let raw: String =
        sqlx::query_scalar("SELECT cal_access_token FROM calendar_integrations LIMIT 1")
            .fetch_one(&raw_pool)
            .await
            .unwrap();
    assert_ne!(raw, "access-token-initial");
    raw_pool.close().await;

    // Reopening with the same key decrypts.
    let database = Database::new(&url, test_key()).await.unwrap();
    let stored = database
        .get_calendar_integration_by_user(&user)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        stored.cal_access_token.as_deref(),
        Some("access-token-initial")
    );

    // A different key must fail to decrypt rather than return garbage.
    let database = Database::new(&url, vec![1u8; 32]).await.unwrap();
    assert!(database.get_calendar_integration_by_user(&user).await.is_err());
}

#[tokio::test]
async fn event_type_json_columns_round_trip() {
    let database = test_database().await;
    let integration_ulid = seed_managed_integration(&database, &new_ulid(), 3600)
        .await
        .ulid;

    let now = Utc::now();
    let event_type = cal_sync_server::models::CalEventType {
        ulid: new_ulid(),
        calendar_integration_ulid: integration_ulid.clone(),
        cal_event_type_id: Some(7),
        name: "Strategy Session".to_owned(),
        description: None,
        length_in_minutes: 45,
        is_active: true,
        is_default: false,
        price_cents: 15_000,
        scheduling_kind: cal_sync_server::models::SchedulingKind::RoundRobin,
        position: 2,
        slug: Some("strategy-session".to_owned()),
        minimum_booking_notice: 120,
        max_participants: Some(5),
        discount_percentage: Some(10),
        before_event_buffer: 10,
        after_event_buffer: 5,
        slot_interval: Some(15),
        disable_guests: true,
        organization_ulid: None,
        locations: Some(json!([{ "type": "integrations:zoom" }])),
        metadata: Some(json!({ "discountPercentage": 10 })),
        created_at: now,
        updated_at: now,
    };
    database.insert_cal_event_type(&event_type).await.unwrap();

    let rows = database
        .get_cal_event_types_for_integration(&integration_ulid)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.locations, event_type.locations);
    assert_eq!(row.metadata, event_type.metadata);
    assert_eq!(
        row.scheduling_kind,
        cal_sync_server::models::SchedulingKind::RoundRobin
    );
    assert_eq!(row.max_participants, Some(5));

    database.deactivate_cal_event_type(&row.ulid).await.unwrap();
    let rows = database
        .get_cal_event_types_for_integration(&integration_ulid)
        .await
        .unwrap();
    assert!(!rows[0].is_active);
}
