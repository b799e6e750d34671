// ABOUTME: Database operations for cal_event_types mirror rows
// ABOUTME: Insert, field update, soft deactivation, and per-integration listing
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Keystone Coaching

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{CalEventType, SchedulingKind};

impl Database {
    /// Insert a local event type mirror row
    ///
    /// The `UNIQUE (calendar_integration_ulid, cal_event_type_id)` constraint
    /// enforces at most one local row per distinct non-null remote id.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn insert_cal_event_type(&self, event_type: &CalEventType) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO cal_event_types (
                ulid, calendar_integration_ulid, cal_event_type_id, name,
                description, length_in_minutes, is_active, is_default,
                price_cents, scheduling_kind, position, slug,
                minimum_booking_notice, max_participants, discount_percentage,
                before_event_buffer, after_event_buffer, slot_interval,
                disable_guests, organization_ulid, locations, metadata,
                created_at, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24
            )
            ",
        )
        .bind(&event_type.ulid)
        .bind(&event_type.calendar_integration_ulid)
        .bind(event_type.cal_event_type_id)
        .bind(&event_type.name)
        .bind(event_type.description.as_deref())
        .bind(event_type.length_in_minutes)
        .bind(event_type.is_active)
        .bind(event_type.is_default)
        .bind(event_type.price_cents)
        .bind(event_type.scheduling_kind.as_str())
        .bind(event_type.position)
        .bind(event_type.slug.as_deref())
        .bind(event_type.minimum_booking_notice)
        .bind(event_type.max_participants)
        .bind(event_type.discount_percentage)
        .bind(event_type.before_event_buffer)
        .bind(event_type.after_event_buffer)
        .bind(event_type.slot_interval)
        .bind(event_type.disable_guests)
        .bind(event_type.organization_ulid.as_deref())
        .bind(event_type.locations.as_ref().map(ToString::to_string))
        .bind(event_type.metadata.as_ref().map(ToString::to_string))
        .bind(event_type.created_at)
        .bind(event_type.updated_at)
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to insert event type: {e}")))?;

        Ok(())
    }

    /// Update the synchronized fields of an existing mirror row
    ///
    /// `is_default` and `organization_ulid` are deliberately not touched here;
    /// they are platform-owned and preserved across reconciliations.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn update_cal_event_type(&self, event_type: &CalEventType) -> AppResult<()> {
        sqlx::query(
            r"
            UPDATE cal_event_types
            SET name = $2,
                description = $3,
                length_in_minutes = $4,
                is_active = $5,
                price_cents = $6,
                scheduling_kind = $7,
                position = $8,
                slug = $9,
                minimum_booking_notice = $10,
                max_participants = $11,
                discount_percentage = $12,
                before_event_buffer = $13,
                after_event_buffer = $14,
                slot_interval = $15,
                disable_guests = $16,
                locations = $17,
                metadata = $18,
                updated_at = $19
            WHERE ulid = $1
            ",
        )
        .bind(&event_type.ulid)
        .bind(&event_type.name)
        .bind(event_type.description.as_deref())
        .bind(event_type.length_in_minutes)
        .bind(event_type.is_active)
        .bind(event_type.price_cents)
        .bind(event_type.scheduling_kind.as_str())
        .bind(event_type.position)
        .bind(event_type.slug.as_deref())
        .bind(event_type.minimum_booking_notice)
        .bind(event_type.max_participants)
        .bind(event_type.discount_percentage)
        .bind(event_type.before_event_buffer)
        .bind(event_type.after_event_buffer)
        .bind(event_type.slot_interval)
        .bind(event_type.disable_guests)
        .bind(event_type.locations.as_ref().map(ToString::to_string))
        .bind(event_type.metadata.as_ref().map(ToString::to_string))
        .bind(Utc::now())
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to update event type: {e}")))?;

        Ok(())
    }

    /// Soft-deactivate a mirror row; the row itself is never deleted
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn deactivate_cal_event_type(&self, ulid: &str) -> AppResult<()> {
        sqlx::query(
            r"
            UPDATE cal_event_types
            SET is_active = 0, updated_at = $2
            WHERE ulid = $1
            ",
        )
        .bind(ulid)
        .bind(Utc::now())
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to deactivate event type: {e}")))?;

        Ok(())
    }

    /// List all mirror rows for an integration, active and inactive
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_cal_event_types_for_integration(
        &self,
        calendar_integration_ulid: &str,
    ) -> AppResult<Vec<CalEventType>> {
        let rows = sqlx::query(
            r"
            SELECT ulid, calendar_integration_ulid, cal_event_type_id, name,
                   description, length_in_minutes, is_active, is_default,
                   price_cents, scheduling_kind, position, slug,
                   minimum_booking_notice, max_participants, discount_percentage,
                   before_event_buffer, after_event_buffer, slot_interval,
                   disable_guests, organization_ulid, locations, metadata,
                   created_at, updated_at
            FROM cal_event_types
            WHERE calendar_integration_ulid = $1
            ORDER BY position ASC, created_at ASC
            ",
        )
        .bind(calendar_integration_ulid)
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to list event types: {e}")))?;

        let mut event_types = Vec::with_capacity(rows.len());
        for row in rows {
            event_types.push(Self::row_to_cal_event_type(&row));
        }
        Ok(event_types)
    }

    fn row_to_cal_event_type(row: &SqliteRow) -> CalEventType {
        let kind_str: String = row.get("scheduling_kind");
        let locations: Option<String> = row.get("locations");
        let metadata: Option<String> = row.get("metadata");

        CalEventType {
            ulid: row.get("ulid"),
            calendar_integration_ulid: row.get("calendar_integration_ulid"),
            cal_event_type_id: row.get("cal_event_type_id"),
            name: row.get("name"),
            description: row.get("description"),
            length_in_minutes: row.get("length_in_minutes"),
            is_active: row.get("is_active"),
            is_default: row.get("is_default"),
            price_cents: row.get("price_cents"),
            scheduling_kind: SchedulingKind::from_str_value(&kind_str)
                .unwrap_or(SchedulingKind::Managed),
            position: row.get("position"),
            slug: row.get("slug"),
            minimum_booking_notice: row.get("minimum_booking_notice"),
            max_participants: row.get("max_participants"),
            discount_percentage: row.get("discount_percentage"),
            before_event_buffer: row.get("before_event_buffer"),
            after_event_buffer: row.get("after_event_buffer"),
            slot_interval: row.get("slot_interval"),
            disable_guests: row.get("disable_guests"),
            organization_ulid: row.get("organization_ulid"),
            locations: locations.and_then(|s| serde_json::from_str(&s).ok()),
            metadata: metadata.and_then(|s| serde_json::from_str(&s).ok()),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}
