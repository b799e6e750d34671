// ABOUTME: Route handlers for booking reads through the fetch-and-retry contract
// ABOUTME: Same soft-failure wire shape as the calendar endpoints
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Keystone Coaching

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use super::{split_degraded_reason, validate_user_ulid, ApiResponse, ServerResources};
use crate::cal::types::RemoteBooking;
use crate::cal::FetchOutcome;
use crate::errors::AppError;

/// Query parameters for the bookings endpoint
#[derive(Debug, Deserialize)]
pub struct BookingsQuery {
    /// ULID of the acting user
    pub user_ulid: String,
    /// Optional status filter passed through to Cal.com
    #[serde(default)]
    pub status: Option<String>,
}

/// `data` payload of the get-bookings endpoint
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingsData {
    /// Bookings as Cal.com reports them; empty on degraded fetches
    pub bookings: Vec<RemoteBooking>,
    /// Set when the token lifecycle failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_error: Option<String>,
    /// Set when Cal.com answered with a non-auth error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_error: Option<String>,
}

/// Bookings routes handler
pub struct BookingRoutes;

impl BookingRoutes {
    /// Create the bookings routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/cal/bookings/get-bookings", get(Self::handle_get))
            .with_state(resources)
    }

    /// Handle GET /api/cal/bookings/get-bookings
    async fn handle_get(
        State(resources): State<Arc<ServerResources>>,
        Query(query): Query<BookingsQuery>,
    ) -> Result<Response, AppError> {
        let user_ulid = validate_user_ulid(&query.user_ulid)?;

        let data = match resources
            .cal
            .list_bookings(&user_ulid, query.status.as_deref())
            .await?
        {
            FetchOutcome::Fresh(bookings) => BookingsData {
                bookings,
                token_error: None,
                api_error: None,
            },
            FetchOutcome::Degraded { reason, fallback } => {
                let (token_error, api_error) = split_degraded_reason(&reason);
                BookingsData {
                    bookings: fallback,
                    token_error,
                    api_error,
                }
            }
        };

        Ok((StatusCode::OK, Json(ApiResponse::new(data))).into_response())
    }
}
