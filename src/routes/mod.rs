// ABOUTME: HTTP route wiring, shared state, and response envelope helpers
// ABOUTME: Builds the axum router with trace/CORS layers and the health probe
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Keystone Coaching

/// Bookings listing routes
pub mod bookings;
/// Connected-calendars routes
pub mod calendars;
/// Event type creation and sync routes
pub mod event_types;

use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use ulid::Ulid;

use crate::cal::{CalClient, DegradedReason};
use crate::database::Database;
use crate::errors::{AppError, AppResult};

pub use bookings::BookingRoutes;
pub use calendars::CalendarRoutes;
pub use event_types::EventTypeRoutes;

/// Shared state handed to every route handler
pub struct ServerResources {
    /// Database pool
    pub database: Database,
    /// Cal.com client with its token guard
    pub cal: CalClient,
}

/// Build the full application router
pub fn router(resources: Arc<ServerResources>) -> Router {
    Router::new()
        .merge(CalendarRoutes::routes(Arc::clone(&resources)))
        .merge(EventTypeRoutes::routes(Arc::clone(&resources)))
        .merge(BookingRoutes::routes(resources))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Standard success envelope
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    /// Always `true`; degraded fetches still succeed with diagnostic flags
    pub success: bool,
    /// Endpoint-specific payload
    pub data: T,
}

impl<T> ApiResponse<T> {
    /// Wrap a payload in the success envelope
    pub const fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Query parameter identifying the acting user
///
/// Marketplace authentication lives in front of this service; handlers only
/// validate that the identifier is a well-formed ULID.
#[derive(Debug, Deserialize)]
pub struct UserQuery {
    /// ULID of the acting user
    pub user_ulid: String,
}

pub(crate) fn validate_user_ulid(raw: &str) -> AppResult<String> {
    Ulid::from_string(raw)
        .map_err(|e| AppError::invalid_input(format!("Invalid user_ulid '{raw}': {e}")))?;
    Ok(raw.to_owned())
}

/// Split a degradation into the wire's `tokenError` / `apiError` flags
pub(crate) fn split_degraded_reason(
    reason: &DegradedReason,
) -> (Option<String>, Option<String>) {
    if reason.is_token_related() {
        (Some(reason.message()), None)
    } else {
        (None, Some(reason.message()))
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "cal-sync-server",
        version: env!("CARGO_PKG_VERSION"),
    })
}
