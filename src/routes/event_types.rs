// ABOUTME: Route handlers for event type creation and synchronization
// ABOUTME: Creates remote event types with local mirror rows and exposes the sync trigger
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Keystone Coaching

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{split_degraded_reason, validate_user_ulid, ApiResponse, ServerResources, UserQuery};
use crate::cal::reconciler;
use crate::cal::types::{CreateEventTypeRequest, RemoteEventType};
use crate::cal::FetchOutcome;
use crate::errors::{AppError, AppResult};
use crate::models::{CalEventType, SyncCounters};

/// Body of the create-event-type endpoint
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventTypeBody {
    /// Display name (required)
    pub name: Option<String>,
    /// Duration in minutes (required)
    pub duration: Option<i64>,
    /// Description
    #[serde(default)]
    pub description: Option<String>,
    /// URL slug; derived from the name when omitted
    #[serde(default)]
    pub slug: Option<String>,
    /// Price in cents
    #[serde(default)]
    pub price_cents: Option<i64>,
    /// Whether the event type starts hidden
    #[serde(default)]
    pub hidden: Option<bool>,
    /// Scheduling type
    #[serde(default)]
    pub scheduling_type: Option<String>,
    /// Location descriptors
    #[serde(default)]
    pub locations: Option<Value>,
    /// Opaque metadata
    #[serde(default)]
    pub metadata: Option<Value>,
    /// Booker layout configuration
    #[serde(default)]
    pub booker_layouts: Option<Value>,
    /// Buffer before the event in minutes
    #[serde(default)]
    pub before_event_buffer: Option<i64>,
    /// Buffer after the event in minutes
    #[serde(default)]
    pub after_event_buffer: Option<i64>,
    /// Seat configuration for group sessions
    #[serde(default)]
    pub seats: Option<Value>,
}

/// `data` payload of a successful creation
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedEventTypeData {
    /// The event type as Cal.com created it
    pub event_type: RemoteEventType,
    /// The local mirror row
    pub cal_event_type: CalEventType,
}

/// Failure wire shape of the create endpoint
#[derive(Debug, Serialize)]
struct CreateErrorResponse {
    error: String,
}

/// `data` payload of the sync endpoint
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncData {
    /// Aggregate reconciliation counters
    pub counters: SyncCounters,
    /// Set when the token lifecycle failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_error: Option<String>,
    /// Set when Cal.com answered with a non-auth error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_error: Option<String>,
}

/// Event type routes handler
pub struct EventTypeRoutes;

impl EventTypeRoutes {
    /// Create the event type routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/api/cal/event-types/create-event-type",
                post(Self::handle_create),
            )
            .route("/api/cal/event-types/sync", post(Self::handle_sync))
            .with_state(resources)
    }

    /// Handle POST /api/cal/event-types/create-event-type
    ///
    /// Failures answer with `{ "error": ... }` rather than the success
    /// envelope, matching what the form component expects.
    async fn handle_create(
        State(resources): State<Arc<ServerResources>>,
        Query(query): Query<UserQuery>,
        Json(body): Json<CreateEventTypeBody>,
    ) -> Response {
        let user_ulid = match validate_user_ulid(&query.user_ulid) {
            Ok(ulid) => ulid,
            Err(err) => return Self::create_error(&err),
        };

        match Self::create(&resources, &user_ulid, body).await {
            Ok(data) => (StatusCode::OK, Json(ApiResponse::new(data))).into_response(),
            Err(err) => Self::create_error(&err),
        }
    }

    fn create_error(err: &AppError) -> Response {
        (
            err.code.http_status(),
            Json(CreateErrorResponse {
                error: err.message.clone(),
            }),
        )
            .into_response()
    }

    async fn create(
        resources: &Arc<ServerResources>,
        user_ulid: &str,
        body: CreateEventTypeBody,
    ) -> AppResult<CreatedEventTypeData> {
        let name = body
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| AppError::invalid_input("Event type name is required"))?;
        let duration = body
            .duration
            .filter(|d| *d > 0)
            .ok_or_else(|| AppError::invalid_input("Event type duration is required"))?;

        let integration = resources
            .database
            .get_calendar_integration_by_user(user_ulid)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!("No calendar integration for user {user_ulid}"))
            })?;

        let request = CreateEventTypeRequest {
            title: name.to_owned(),
            slug: body.slug.clone().unwrap_or_else(|| slugify(name)),
            description: body.description.clone(),
            length_in_minutes: duration,
            hidden: body.hidden.unwrap_or(false),
            price: body.price_cents,
            metadata: body.metadata.clone(),
            booker_layouts: body.booker_layouts.clone(),
            locations: body.locations.clone(),
            before_event_buffer: body.before_event_buffer,
            after_event_buffer: body.after_event_buffer,
            scheduling_type: body.scheduling_type.clone(),
            seats: body.seats.clone(),
        };

        let remote = resources.cal.create_event_type(user_ulid, &request).await?;

        let local_row = reconciler::row_from_remote(&integration.ulid, &remote);
        resources.database.insert_cal_event_type(&local_row).await?;

        Ok(CreatedEventTypeData {
            event_type: remote,
            cal_event_type: local_row,
        })
    }

    /// Handle POST /api/cal/event-types/sync
    ///
    /// Runs the fetch-then-reconcile chain. A degraded remote fetch reports
    /// zero counters with the diagnostic flags; local failures error out.
    async fn handle_sync(
        State(resources): State<Arc<ServerResources>>,
        Query(query): Query<UserQuery>,
    ) -> Result<Response, AppError> {
        let user_ulid = validate_user_ulid(&query.user_ulid)?;

        let data = match resources.cal.sync_event_types(&user_ulid).await? {
            FetchOutcome::Fresh(counters) => SyncData {
                counters,
                token_error: None,
                api_error: None,
            },
            FetchOutcome::Degraded { reason, fallback } => {
                let (token_error, api_error) = split_degraded_reason(&reason);
                SyncData {
                    counters: fallback,
                    token_error,
                    api_error,
                }
            }
        };

        Ok((StatusCode::OK, Json(ApiResponse::new(data))).into_response())
    }
}

fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    slug.trim_end_matches('-').to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("Strategy Session"), "strategy-session");
        assert_eq!(slugify("  1:1 Coaching!  "), "1-1-coaching");
        assert_eq!(slugify("Already-Slugged"), "already-slugged");
    }
}
