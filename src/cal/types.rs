// ABOUTME: Cal.com wire types for calendars, event types, bookings, and token refresh
// ABOUTME: Serde mappings between Cal.com camelCase payloads and internal structs
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Keystone Coaching

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Generic Cal.com v2 response envelope (`{ "status": ..., "data": ... }`)
#[derive(Debug, Deserialize)]
pub struct CalEnvelope<T> {
    /// `"success"` or `"error"`
    #[serde(default)]
    pub status: Option<String>,
    /// Endpoint-specific payload
    pub data: T,
}

// ------------------------------------------------------------------------
// GET /v2/calendars
// ------------------------------------------------------------------------

/// `data` payload of `GET /v2/calendars`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedCalendarsData {
    /// One entry per connected calendar credential
    #[serde(default)]
    pub connected_calendars: Vec<ConnectedCalendarEntry>,
}

/// One connected calendar account with its sub-calendars
#[derive(Debug, Deserialize)]
pub struct ConnectedCalendarEntry {
    /// Provider block (`type`, `slug`, `email`, `credentialId`)
    pub integration: CalendarProviderInfo,
    /// Individual calendars under this credential
    #[serde(default)]
    pub calendars: Vec<RemoteCalendar>,
}

/// The `integration` block of a connected calendar entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarProviderInfo {
    /// Provider type, e.g. `google_calendar` or `office365_calendar`
    #[serde(rename = "type")]
    pub provider_type: Option<String>,
    /// Provider slug
    pub slug: Option<String>,
    /// Account email
    pub email: Option<String>,
    /// Cal.com credential id
    pub credential_id: Option<i64>,
}

/// A single calendar under a connected account
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCalendar {
    /// Calendar id as reported by the provider (string or number upstream)
    #[serde(default)]
    pub id: Option<Value>,
    /// Display name
    pub name: Option<String>,
    /// Whether this is the account's primary calendar
    #[serde(default)]
    pub primary: Option<bool>,
    /// Provider-side identifier
    pub external_id: Option<String>,
    /// Whether the user selected this calendar for conflict checking
    #[serde(default)]
    pub is_selected: Option<bool>,
}

/// Flattened connected-calendar account exposed on our own API surface
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarAccount {
    /// Provider type
    pub provider: Option<String>,
    /// Provider slug
    pub slug: Option<String>,
    /// Account email
    pub email: Option<String>,
    /// Cal.com credential id
    pub credential_id: Option<i64>,
    /// Calendars under this account
    pub calendars: Vec<RemoteCalendar>,
}

impl From<ConnectedCalendarEntry> for CalendarAccount {
    fn from(entry: ConnectedCalendarEntry) -> Self {
        Self {
            provider: entry.integration.provider_type,
            slug: entry.integration.slug,
            email: entry.integration.email,
            credential_id: entry.integration.credential_id,
            calendars: entry.calendars,
        }
    }
}

// ------------------------------------------------------------------------
// Event types
// ------------------------------------------------------------------------

/// An event type as returned by the Cal.com API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEventType {
    /// Remote numeric id
    pub id: i64,
    /// Display title
    pub title: String,
    /// URL slug
    pub slug: Option<String>,
    /// Description
    #[serde(default)]
    pub description: Option<String>,
    /// Duration in minutes
    #[serde(default)]
    pub length_in_minutes: Option<i64>,
    /// Whether the event type is hidden from the booking page
    #[serde(default)]
    pub hidden: Option<bool>,
    /// Price in cents
    #[serde(default)]
    pub price: Option<i64>,
    /// Display ordering position
    #[serde(default)]
    pub position: Option<i64>,
    /// Scheduling type (`MANAGED`, `COLLECTIVE`, `ROUND_ROBIN`)
    #[serde(default)]
    pub scheduling_type: Option<String>,
    /// Minimum booking notice in minutes
    #[serde(default)]
    pub minimum_booking_notice: Option<i64>,
    /// Seat limit for group sessions
    #[serde(default)]
    pub seats_per_time_slot: Option<i64>,
    /// Buffer before the event in minutes
    #[serde(default)]
    pub before_event_buffer: Option<i64>,
    /// Buffer after the event in minutes
    #[serde(default)]
    pub after_event_buffer: Option<i64>,
    /// Slot granularity in minutes
    #[serde(default)]
    pub slot_interval: Option<i64>,
    /// Whether additional guests are disabled
    #[serde(default)]
    pub disable_guests: Option<bool>,
    /// Location descriptors
    #[serde(default)]
    pub locations: Option<Value>,
    /// Opaque metadata; the platform stores its discount percentage under
    /// `discountPercentage` in here
    #[serde(default)]
    pub metadata: Option<Value>,
}

impl RemoteEventType {
    /// Platform discount percentage carried inside the metadata blob
    #[must_use]
    pub fn discount_percentage(&self) -> Option<i64> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("discountPercentage"))
            .and_then(Value::as_i64)
    }
}

/// Body of `POST /v2/event-types`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventTypeRequest {
    /// Display title
    pub title: String,
    /// URL slug
    pub slug: String,
    /// Description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Duration in minutes
    pub length_in_minutes: i64,
    /// Whether the event type starts hidden
    pub hidden: bool,
    /// Price in cents
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<i64>,
    /// Opaque metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    /// Booker layout configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booker_layouts: Option<Value>,
    /// Location descriptors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locations: Option<Value>,
    /// Buffer before the event in minutes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before_event_buffer: Option<i64>,
    /// Buffer after the event in minutes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after_event_buffer: Option<i64>,
    /// Scheduling type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduling_type: Option<String>,
    /// Seat configuration for group sessions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seats: Option<Value>,
}

// ------------------------------------------------------------------------
// Bookings
// ------------------------------------------------------------------------

/// A booking as returned by `GET /v2/bookings`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteBooking {
    /// Remote numeric id
    pub id: i64,
    /// Stable booking uid
    #[serde(default)]
    pub uid: Option<String>,
    /// Booking title
    #[serde(default)]
    pub title: Option<String>,
    /// Status, e.g. `accepted`, `cancelled`
    #[serde(default)]
    pub status: Option<String>,
    /// Start time, RFC 3339
    #[serde(default)]
    pub start: Option<String>,
    /// End time, RFC 3339
    #[serde(default)]
    pub end: Option<String>,
    /// Remote event type id this booking was made against
    #[serde(default)]
    pub event_type_id: Option<i64>,
}

// ------------------------------------------------------------------------
// Token refresh responses
// ------------------------------------------------------------------------

/// Response of `POST /v2/oauth/token` (standard OAuth refresh)
#[derive(Debug, Deserialize)]
pub struct OAuthTokenResponse {
    /// New access token
    #[serde(default)]
    pub access_token: Option<String>,
    /// Rotated refresh token, omitted when not rotated
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime of the access token in seconds
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// `data` payload of the managed-user force-refresh endpoint
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedTokenData {
    /// New access token
    #[serde(default)]
    pub access_token: Option<String>,
    /// Rotated refresh token, omitted when not rotated
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Absolute expiry in epoch milliseconds
    #[serde(default)]
    pub access_token_expires_at: Option<i64>,
}
