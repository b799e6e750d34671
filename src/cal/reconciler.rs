// ABOUTME: Event type reconciliation between Cal.com payloads and local mirror rows
// ABOUTME: Creates, updates, and soft-deactivates rows with per-record error tolerance
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Keystone Coaching

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};
use ulid::Ulid;

use super::types::RemoteEventType;
use crate::database::Database;
use crate::errors::AppResult;
use crate::models::{CalEventType, SchedulingKind, SyncCounters};

/// Duration assumed when Cal.com omits one
const DEFAULT_EVENT_LENGTH_MINUTES: i64 = 30;

/// Converge local mirror rows onto the authoritative remote list
///
/// Remote entries missing locally are inserted, matched entries are updated
/// only when a synchronized field drifted, and active local rows Cal.com no
/// longer reports are soft-deactivated. Rows are never deleted so historical
/// bookings keep their reference. Each record is attempted independently; a
/// per-record failure is logged and counted without aborting the run.
///
/// # Errors
///
/// Fails only if the initial local-row fetch fails; everything after that is
/// partial-success tolerant.
pub async fn reconcile_event_types(
    database: &Database,
    calendar_integration_ulid: &str,
    remote: &[RemoteEventType],
) -> AppResult<SyncCounters> {
    let local = database
        .get_cal_event_types_for_integration(calendar_integration_ulid)
        .await?;

    let mut counters = SyncCounters {
        fetched_remote: remote.len() as u32,
        fetched_local: local.len() as u32,
        ..SyncCounters::default()
    };

    let local_by_remote_id: HashMap<i64, &CalEventType> = local
        .iter()
        .filter_map(|et| et.cal_event_type_id.map(|id| (id, et)))
        .collect();
    let remote_ids: HashSet<i64> = remote.iter().map(|et| et.id).collect();

    for remote_et in remote {
        if let Some(existing) = local_by_remote_id.get(&remote_et.id) {
            if differs(existing, remote_et) {
                let updated = apply_remote(existing, remote_et);
                match database.update_cal_event_type(&updated).await {
                    Ok(()) => counters.updated += 1,
                    Err(err) => {
                        warn!(
                            calendar_integration_ulid,
                            cal_event_type_id = remote_et.id,
                            error = %err,
                            "Failed to update event type"
                        );
                        counters.failed += 1;
                    }
                }
            } else {
                counters.skipped += 1;
            }
        } else {
            let row = row_from_remote(calendar_integration_ulid, remote_et);
            match database.insert_cal_event_type(&row).await {
                Ok(()) => counters.created += 1,
                Err(err) => {
                    warn!(
                        calendar_integration_ulid,
                        cal_event_type_id = remote_et.id,
                        error = %err,
                        "Failed to insert event type"
                    );
                    counters.failed += 1;
                }
            }
        }
    }

    // Cal.com no longer reports these: deleted or hidden upstream.
    for local_et in &local {
        let Some(remote_id) = local_et.cal_event_type_id else {
            continue;
        };
        if !remote_ids.contains(&remote_id) && local_et.is_active {
            match database.deactivate_cal_event_type(&local_et.ulid).await {
                Ok(()) => counters.deactivated += 1,
                Err(err) => {
                    warn!(
                        calendar_integration_ulid,
                        cal_event_type_id = remote_id,
                        error = %err,
                        "Failed to deactivate event type"
                    );
                    counters.failed += 1;
                }
            }
        }
    }

    info!(
        calendar_integration_ulid,
        fetched_remote = counters.fetched_remote,
        fetched_local = counters.fetched_local,
        created = counters.created,
        updated = counters.updated,
        deactivated = counters.deactivated,
        skipped = counters.skipped,
        failed = counters.failed,
        "Event type reconciliation finished"
    );
    Ok(counters)
}

/// Build a new mirror row from a remote event type
///
/// Fields Cal.com does not carry start at platform defaults: new rows are
/// never the coach's default template and have no organization.
pub(crate) fn row_from_remote(
    calendar_integration_ulid: &str,
    remote: &RemoteEventType,
) -> CalEventType {
    let now = Utc::now();
    CalEventType {
        ulid: Ulid::new().to_string(),
        calendar_integration_ulid: calendar_integration_ulid.to_owned(),
        cal_event_type_id: Some(remote.id),
        name: remote.title.clone(),
        description: remote.description.clone(),
        length_in_minutes: remote
            .length_in_minutes
            .unwrap_or(DEFAULT_EVENT_LENGTH_MINUTES),
        is_active: !remote.hidden.unwrap_or(false),
        is_default: false,
        price_cents: remote.price.unwrap_or(0),
        scheduling_kind: scheduling_kind_from_remote(remote.scheduling_type.as_deref()),
        position: remote.position.unwrap_or(0),
        slug: remote.slug.clone(),
        minimum_booking_notice: remote.minimum_booking_notice.unwrap_or(0),
        max_participants: remote.seats_per_time_slot,
        discount_percentage: remote.discount_percentage(),
        before_event_buffer: remote.before_event_buffer.unwrap_or(0),
        after_event_buffer: remote.after_event_buffer.unwrap_or(0),
        slot_interval: remote.slot_interval,
        disable_guests: remote.disable_guests.unwrap_or(false),
        organization_ulid: None,
        locations: normalized(remote.locations.as_ref()).cloned(),
        metadata: normalized(remote.metadata.as_ref()).cloned(),
        created_at: now,
        updated_at: now,
    }
}

/// Merge remote fields onto an existing row, preserving the platform-owned
/// identity fields (`ulid`, `is_default`, `organization_ulid`, `created_at`)
fn apply_remote(existing: &CalEventType, remote: &RemoteEventType) -> CalEventType {
    let fresh = row_from_remote(&existing.calendar_integration_ulid, remote);
    CalEventType {
        ulid: existing.ulid.clone(),
        is_default: existing.is_default,
        organization_ulid: existing.organization_ulid.clone(),
        created_at: existing.created_at,
        ..fresh
    }
}

/// Whether any synchronized field drifted between the local row and the
/// remote payload; `locations` and `metadata` compare structurally
fn differs(local: &CalEventType, remote: &RemoteEventType) -> bool {
    local.name != remote.title
        || local.description != remote.description
        || local.length_in_minutes
            != remote
                .length_in_minutes
                .unwrap_or(DEFAULT_EVENT_LENGTH_MINUTES)
        || local.is_active != !remote.hidden.unwrap_or(false)
        || local.scheduling_kind != scheduling_kind_from_remote(remote.scheduling_type.as_deref())
        || local.position != remote.position.unwrap_or(0)
        || local.price_cents != remote.price.unwrap_or(0)
        || local.minimum_booking_notice != remote.minimum_booking_notice.unwrap_or(0)
        || local.max_participants != remote.seats_per_time_slot
        || local.discount_percentage != remote.discount_percentage()
        || local.slug != remote.slug
        || normalized(local.locations.as_ref()) != normalized(remote.locations.as_ref())
        || normalized(local.metadata.as_ref()) != normalized(remote.metadata.as_ref())
}

fn scheduling_kind_from_remote(value: Option<&str>) -> SchedulingKind {
    match value.map(str::to_uppercase).as_deref() {
        Some("COLLECTIVE") => SchedulingKind::Collective,
        Some("ROUND_ROBIN" | "ROUNDROBIN") => SchedulingKind::RoundRobin,
        _ => SchedulingKind::Managed,
    }
}

/// JSON `null` and an absent column mean the same thing here
fn normalized(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}
