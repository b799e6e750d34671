// ABOUTME: Route handlers for connected-calendar reads
// ABOUTME: Translates FetchOutcome degradation into the HTTP-200 soft-failure wire shape
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Keystone Coaching

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use super::{split_degraded_reason, validate_user_ulid, ApiResponse, ServerResources, UserQuery};
use crate::cal::types::CalendarAccount;
use crate::cal::FetchOutcome;
use crate::errors::AppError;

/// `data` payload of the get-all-calendars endpoint
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarsData {
    /// Whether at least one calendar account is connected (DB-derived on
    /// degraded fetches)
    pub has_connected_calendars: bool,
    /// Flattened account list; empty on degraded fetches
    pub calendars: Vec<CalendarAccount>,
    /// Set when the token lifecycle failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_error: Option<String>,
    /// Set when Cal.com answered with a non-auth error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_error: Option<String>,
    /// Set when a forced refresh happened while serving this request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_refreshed: Option<bool>,
}

/// Connected-calendars routes handler
pub struct CalendarRoutes;

impl CalendarRoutes {
    /// Create the calendar routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/api/cal/calendars/get-all-calendars",
                get(Self::handle_get_all),
            )
            .with_state(resources)
    }

    /// Handle GET /api/cal/calendars/get-all-calendars
    ///
    /// Degraded fetches still answer HTTP 200 with diagnostic flags so an
    /// opportunistic dashboard poll renders an empty state instead of an
    /// error page.
    async fn handle_get_all(
        State(resources): State<Arc<ServerResources>>,
        Query(query): Query<UserQuery>,
    ) -> Result<Response, AppError> {
        let user_ulid = validate_user_ulid(&query.user_ulid)?;

        let data = match resources.cal.get_connected_calendars(&user_ulid).await? {
            FetchOutcome::Fresh(snapshot) => CalendarsData {
                has_connected_calendars: snapshot.has_connected_calendars,
                calendars: snapshot.calendars,
                token_error: None,
                api_error: None,
                token_refreshed: snapshot.token_refreshed.then_some(true),
            },
            FetchOutcome::Degraded { reason, fallback } => {
                let (token_error, api_error) = split_degraded_reason(&reason);
                CalendarsData {
                    has_connected_calendars: fallback.has_connected_calendars,
                    calendars: fallback.calendars,
                    token_error,
                    api_error,
                    token_refreshed: None,
                }
            }
        };

        Ok((StatusCode::OK, Json(ApiResponse::new(data))).into_response())
    }
}
