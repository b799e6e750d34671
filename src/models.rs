// ABOUTME: Domain models for calendar integrations, event type mirrors, and token sets
// ABOUTME: Shared across the database layer, Cal.com client, and route handlers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Keystone Coaching

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a user's Cal.com account is linked to the platform
///
/// The two variants refresh through different protocols but produce the same
/// normalized token shape; the refresher implementation is selected by this
/// discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    /// Account provisioned and controlled by the platform, refreshed with
    /// platform client credentials against the managed-user endpoint
    Managed,
    /// Standard OAuth grant from the user's own Cal.com account
    Oauth,
}

impl AccountKind {
    /// Stable string form used in the database column
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Managed => "managed",
            Self::Oauth => "oauth",
        }
    }

    /// Parse the database column value
    #[must_use]
    pub fn from_str_value(value: &str) -> Option<Self> {
        match value {
            "managed" => Some(Self::Managed),
            "oauth" => Some(Self::Oauth),
            _ => None,
        }
    }
}

/// Cal.com scheduling kind for an event type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchedulingKind {
    /// Single-host managed scheduling
    Managed,
    /// All hosts must attend
    Collective,
    /// Rotating host assignment
    RoundRobin,
}

impl SchedulingKind {
    /// Stable string form used in the database column
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Managed => "managed",
            Self::Collective => "collective",
            Self::RoundRobin => "round_robin",
        }
    }

    /// Parse the database column value
    #[must_use]
    pub fn from_str_value(value: &str) -> Option<Self> {
        match value {
            "managed" => Some(Self::Managed),
            "collective" => Some(Self::Collective),
            "round_robin" => Some(Self::RoundRobin),
            _ => None,
        }
    }
}

/// One row per user: the Cal.com account linkage and current token triple
///
/// Created on first connect, token fields updated on every refresh, never
/// hard-deleted (disconnect only clears the tokens and connection flags).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarIntegration {
    /// Primary key
    pub ulid: String,
    /// Owning marketplace user
    pub user_ulid: String,
    /// Managed vs. standard OAuth linkage
    pub account_kind: AccountKind,
    /// Cal.com managed user id (managed accounts only)
    pub cal_managed_user_id: Option<i64>,
    /// Current access token (decrypted in memory, encrypted at rest)
    #[serde(skip_serializing)]
    pub cal_access_token: Option<String>,
    /// Current refresh token (decrypted in memory, encrypted at rest)
    #[serde(skip_serializing)]
    pub cal_refresh_token: Option<String>,
    /// Absolute expiry of the access token
    pub cal_access_token_expires_at: Option<DateTime<Utc>>,
    /// Whether a Google calendar is connected for this integration
    pub google_calendar_connected: bool,
    /// Whether an Office 365 calendar is connected for this integration
    pub office365_calendar_connected: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl CalendarIntegration {
    /// Whether the stored access token is still usable, given the proactive
    /// refresh buffer: the expiry minus the buffer must not have passed
    #[must_use]
    pub fn token_is_fresh(&self, buffer: chrono::Duration, now: DateTime<Utc>) -> bool {
        match (&self.cal_access_token, self.cal_access_token_expires_at) {
            (Some(token), Some(expires_at)) if !token.is_empty() => expires_at - buffer > now,
            _ => false,
        }
    }
}

/// Local mirror of a Cal.com event type
///
/// Mutated exclusively by the reconciler and the create-event-type flow.
/// Deactivation is a soft flag so historical bookings keep their reference.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalEventType {
    /// Primary key
    pub ulid: String,
    /// Owning integration
    pub calendar_integration_ulid: String,
    /// Remote Cal.com event type id; at most one local row per distinct
    /// non-null value within an integration
    pub cal_event_type_id: Option<i64>,
    /// Display name
    pub name: String,
    /// Optional description
    pub description: Option<String>,
    /// Session duration
    pub length_in_minutes: i64,
    /// Soft active flag; cleared when Cal.com stops reporting the event type
    pub is_active: bool,
    /// Whether this is the coach's default session template
    pub is_default: bool,
    /// Session price in cents
    pub price_cents: i64,
    /// Scheduling kind
    pub scheduling_kind: SchedulingKind,
    /// Display ordering position
    pub position: i64,
    /// URL slug
    pub slug: Option<String>,
    /// Minimum booking notice in minutes
    pub minimum_booking_notice: i64,
    /// Seat limit for group sessions
    pub max_participants: Option<i64>,
    /// Discount percentage applied at checkout
    pub discount_percentage: Option<i64>,
    /// Buffer before the event in minutes
    pub before_event_buffer: i64,
    /// Buffer after the event in minutes
    pub after_event_buffer: i64,
    /// Slot granularity in minutes
    pub slot_interval: Option<i64>,
    /// Whether additional guests are disabled
    pub disable_guests: bool,
    /// Owning organization, when the coach belongs to one
    pub organization_ulid: Option<String>,
    /// Location descriptors as returned by Cal.com
    pub locations: Option<Value>,
    /// Opaque Cal.com metadata
    pub metadata: Option<Value>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// Normalized token triple produced by either refresh protocol
#[derive(Debug, Clone)]
pub struct TokenSet {
    /// Bearer access token
    pub access_token: String,
    /// Refresh token; when the remote response omits one, the previously
    /// stored token is carried forward here
    pub refresh_token: String,
    /// Computed absolute expiry
    pub expires_at: DateTime<Utc>,
}

/// Aggregate counters from one reconciliation run, for operational logging
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncCounters {
    /// Event types in the fresh remote payload
    pub fetched_remote: u32,
    /// Local rows loaded for the integration
    pub fetched_local: u32,
    /// Rows inserted
    pub created: u32,
    /// Rows updated
    pub updated: u32,
    /// Active rows soft-deactivated
    pub deactivated: u32,
    /// Matched rows with no field drift
    pub skipped: u32,
    /// Per-record failures swallowed into the partial-success result
    pub failed: u32,
}
