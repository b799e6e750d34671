// ABOUTME: Cal.com fetch-and-retry client with single forced-refresh recovery
// ABOUTME: Degrades to soft-failure outcomes so dashboard polls never hard-fail
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Keystone Coaching

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use http::header::CACHE_CONTROL;
use reqwest::StatusCode;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::reconciler;
use super::token_guard::TokenGuard;
use super::types::{
    CalEnvelope, CalendarAccount, ConnectedCalendarsData, CreateEventTypeRequest, RemoteBooking,
    RemoteEventType,
};
use super::extract_error_message;
use crate::config::CalConfig;
use crate::database::Database;
use crate::errors::{AppError, AppResult, ErrorCode};
use crate::models::SyncCounters;

/// Cal.com's non-standard "access token expired" status code
const TOKEN_EXPIRED_STATUS: u16 = 498;

/// How long a flattened calendar snapshot stays served from memory before the
/// next request re-fetches it; refreshing tokens invalidates it early
const SNAPSHOT_TTL: Duration = Duration::from_secs(60);

/// Why a fetch degraded instead of returning fresh remote data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DegradedReason {
    /// No usable token could be obtained up front
    TokenUnavailable {
        /// Guard failure message
        message: String,
    },
    /// The forced refresh after a 401/498 failed
    TokenRefreshFailed {
        /// Guard failure message
        message: String,
    },
    /// The single retry after a successful forced refresh also failed
    RetryFailed,
    /// Cal.com answered with a non-auth error status, or the payload did not
    /// parse
    ApiError {
        /// HTTP status, when one was received
        status: Option<u16>,
        /// Best-effort extracted message
        message: String,
    },
}

impl DegradedReason {
    /// Human-readable message for logs and wire diagnostics
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::TokenUnavailable { message } | Self::TokenRefreshFailed { message } => {
                message.clone()
            }
            Self::RetryFailed => "Retry after forced token refresh failed".to_owned(),
            Self::ApiError { status, message } => status.map_or_else(
                || message.clone(),
                |code| format!("HTTP {code}: {message}"),
            ),
        }
    }

    /// Whether this degradation stems from the token lifecycle rather than
    /// the remote API itself
    #[must_use]
    pub const fn is_token_related(&self) -> bool {
        matches!(
            self,
            Self::TokenUnavailable { .. } | Self::TokenRefreshFailed { .. } | Self::RetryFailed
        )
    }
}

/// Result of one fetch: fresh remote data, or a best-effort fallback with the
/// reason the fetch degraded
///
/// Degradation is deliberately not an `Err`: a third-party hiccup must not
/// fail an entire dashboard render. Only local failures (database, internal)
/// propagate as errors.
#[derive(Debug, Clone)]
pub enum FetchOutcome<T> {
    /// The remote call succeeded
    Fresh(T),
    /// The remote call failed; `fallback` carries whatever locally-known data
    /// is available
    Degraded {
        /// Why the fetch degraded
        reason: DegradedReason,
        /// Best-effort local fallback
        fallback: T,
    },
}

/// Flattened connected-calendars payload served to the front end
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarsSnapshot {
    /// Whether at least one calendar account is connected
    pub has_connected_calendars: bool,
    /// Flattened account list
    pub calendars: Vec<CalendarAccount>,
    /// Whether a forced token refresh happened while serving this snapshot
    pub token_refreshed: bool,
}

struct CacheSlot {
    snapshot: CalendarsSnapshot,
    expires_at: Instant,
}

/// TTL'd per-user cache of flattened calendar snapshots
///
/// Models the cached calendar views the token guard must invalidate after a
/// refresh, so stale data fetched under an old token is not served on.
pub struct SnapshotCache {
    entries: RwLock<HashMap<String, CacheSlot>>,
    ttl: Duration,
}

impl SnapshotCache {
    /// Create a cache with the given entry TTL
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Get a non-expired snapshot for a user
    pub async fn get(&self, user_ulid: &str) -> Option<CalendarsSnapshot> {
        let entries = self.entries.read().await;
        entries
            .get(user_ulid)
            .filter(|slot| Instant::now() < slot.expires_at)
            .map(|slot| slot.snapshot.clone())
    }

    /// Store a snapshot for a user
    pub async fn put(&self, user_ulid: &str, snapshot: CalendarsSnapshot) {
        let mut entries = self.entries.write().await;
        entries.insert(
            user_ulid.to_owned(),
            CacheSlot {
                snapshot,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    /// Drop a user's snapshot, forcing the next request to re-fetch
    pub async fn invalidate(&self, user_ulid: &str) {
        let mut entries = self.entries.write().await;
        entries.remove(user_ulid);
    }
}

enum AuthedCall {
    Success {
        response: reqwest::Response,
        token_refreshed: bool,
    },
    Degraded(DegradedReason),
}

/// Authenticated Cal.com REST client with the single-retry recovery contract
pub struct CalClient {
    database: Database,
    http: reqwest::Client,
    config: CalConfig,
    guard: TokenGuard,
    snapshots: Arc<SnapshotCache>,
}

impl CalClient {
    /// Create a client; the token guard shares this client's HTTP pool and
    /// snapshot cache
    #[must_use]
    pub fn new(database: Database, config: CalConfig) -> Self {
        let http = reqwest::Client::new();
        let snapshots = Arc::new(SnapshotCache::new(SNAPSHOT_TTL));
        let guard = TokenGuard::new(
            database.clone(),
            http.clone(),
            config.clone(),
            Arc::clone(&snapshots),
        );
        Self {
            database,
            http,
            config,
            guard,
            snapshots,
        }
    }

    /// The token guard backing this client
    #[must_use]
    pub const fn guard(&self) -> &TokenGuard {
        &self.guard
    }

    /// List the user's connected calendars, flattened for the front end
    ///
    /// Serves a cached snapshot when one is fresh. On degradation the
    /// fallback carries the DB-derived connection flags so the dashboard can
    /// still render a meaningful empty state.
    ///
    /// # Errors
    ///
    /// Returns an error only on local database failures.
    pub async fn get_connected_calendars(
        &self,
        user_ulid: &str,
    ) -> AppResult<FetchOutcome<CalendarsSnapshot>> {
        if let Some(snapshot) = self.snapshots.get(user_ulid).await {
            return Ok(FetchOutcome::Fresh(snapshot));
        }

        let integration = self
            .database
            .get_calendar_integration_by_user(user_ulid)
            .await?;

        let fallback = CalendarsSnapshot {
            has_connected_calendars: integration.as_ref().is_some_and(|it| {
                it.google_calendar_connected || it.office365_calendar_connected
            }),
            calendars: Vec::new(),
            token_refreshed: false,
        };

        if integration.is_none() {
            return Ok(FetchOutcome::Degraded {
                reason: DegradedReason::TokenUnavailable {
                    message: format!("No calendar integration for user {user_ulid}"),
                },
                fallback,
            });
        }

        let url = format!("{}/v2/calendars", self.config.api_base);
        let call = self
            .send_with_retry(user_ulid, |http, token| {
                http.get(&url)
                    .bearer_auth(token)
                    .header(CACHE_CONTROL, "no-store")
            })
            .await?;

        match call {
            AuthedCall::Success {
                response,
                token_refreshed,
            } => {
                let envelope: CalEnvelope<ConnectedCalendarsData> = match response.json().await {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        return Ok(FetchOutcome::Degraded {
                            reason: DegradedReason::ApiError {
                                status: None,
                                message: format!("JSON parse error: {e}"),
                            },
                            fallback,
                        })
                    }
                };

                let calendars: Vec<CalendarAccount> = envelope
                    .data
                    .connected_calendars
                    .into_iter()
                    .map(CalendarAccount::from)
                    .collect();

                let (google, office365) = derive_connection_flags(&calendars);
                if let Err(err) = self
                    .database
                    .set_calendar_connection_flags(user_ulid, google, office365)
                    .await
                {
                    warn!(user_ulid, error = %err, "Failed to persist connection flags");
                }

                let snapshot = CalendarsSnapshot {
                    has_connected_calendars: !calendars.is_empty(),
                    calendars,
                    token_refreshed,
                };
                self.snapshots.put(user_ulid, snapshot.clone()).await;
                Ok(FetchOutcome::Fresh(snapshot))
            }
            AuthedCall::Degraded(reason) => Ok(FetchOutcome::Degraded { reason, fallback }),
        }
    }

    /// List the user's event types as Cal.com currently reports them
    ///
    /// # Errors
    ///
    /// Returns an error only on local database failures.
    pub async fn list_event_types(
        &self,
        user_ulid: &str,
    ) -> AppResult<FetchOutcome<Vec<RemoteEventType>>> {
        let url = format!("{}/v2/event-types", self.config.api_base);
        let call = self
            .send_with_retry(user_ulid, |http, token| {
                http.get(&url)
                    .bearer_auth(token)
                    .header(CACHE_CONTROL, "no-store")
            })
            .await?;

        match call {
            AuthedCall::Success { response, .. } => {
                match response.json::<CalEnvelope<Vec<RemoteEventType>>>().await {
                    Ok(envelope) => Ok(FetchOutcome::Fresh(envelope.data)),
                    Err(e) => Ok(FetchOutcome::Degraded {
                        reason: DegradedReason::ApiError {
                            status: None,
                            message: format!("JSON parse error: {e}"),
                        },
                        fallback: Vec::new(),
                    }),
                }
            }
            AuthedCall::Degraded(reason) => Ok(FetchOutcome::Degraded {
                reason,
                fallback: Vec::new(),
            }),
        }
    }

    /// Create an event type on Cal.com and return the remote record
    ///
    /// Creation is not a dashboard poll, so unlike the list calls a degraded
    /// outcome here surfaces as an error the route reports back.
    ///
    /// # Errors
    ///
    /// Returns an error if the token lifecycle fails or Cal.com rejects the
    /// creation.
    pub async fn create_event_type(
        &self,
        user_ulid: &str,
        request: &CreateEventTypeRequest,
    ) -> AppResult<RemoteEventType> {
        let url = format!("{}/v2/event-types", self.config.api_base);
        let call = self
            .send_with_retry(user_ulid, |http, token| {
                http.post(&url).bearer_auth(token).json(request)
            })
            .await?;

        match call {
            AuthedCall::Success { response, .. } => {
                let envelope: CalEnvelope<RemoteEventType> =
                    response.json().await.map_err(|e| {
                        AppError::external_service("Cal.com", format!("JSON parse error: {e}"))
                    })?;
                Ok(envelope.data)
            }
            AuthedCall::Degraded(reason) => Err(AppError::external_service(
                "Cal.com",
                format!("Event type creation failed: {}", reason.message()),
            )),
        }
    }

    /// List the user's bookings, optionally filtered by status
    ///
    /// # Errors
    ///
    /// Returns an error only on local database failures.
    pub async fn list_bookings(
        &self,
        user_ulid: &str,
        status: Option<&str>,
    ) -> AppResult<FetchOutcome<Vec<RemoteBooking>>> {
        let url = format!("{}/v2/bookings", self.config.api_base);
        let status = status.map(ToOwned::to_owned);
        let call = self
            .send_with_retry(user_ulid, |http, token| {
                let mut builder = http
                    .get(&url)
                    .bearer_auth(token)
                    .header(CACHE_CONTROL, "no-store");
                if let Some(status) = &status {
                    builder = builder.query(&[("status", status)]);
                }
                builder
            })
            .await?;

        match call {
            AuthedCall::Success { response, .. } => {
                match response.json::<CalEnvelope<Vec<RemoteBooking>>>().await {
                    Ok(envelope) => Ok(FetchOutcome::Fresh(envelope.data)),
                    Err(e) => Ok(FetchOutcome::Degraded {
                        reason: DegradedReason::ApiError {
                            status: None,
                            message: format!("JSON parse error: {e}"),
                        },
                        fallback: Vec::new(),
                    }),
                }
            }
            AuthedCall::Degraded(reason) => Ok(FetchOutcome::Degraded {
                reason,
                fallback: Vec::new(),
            }),
        }
    }

    /// Fetch the authoritative event type list and converge local mirror rows
    ///
    /// # Errors
    ///
    /// Returns an error if the integration is missing or the local row fetch
    /// fails; remote degradation yields a degraded outcome with zero counters.
    pub async fn sync_event_types(&self, user_ulid: &str) -> AppResult<FetchOutcome<SyncCounters>> {
        let integration = self
            .database
            .get_calendar_integration_by_user(user_ulid)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!("No calendar integration for user {user_ulid}"))
            })?;

        match self.list_event_types(user_ulid).await? {
            FetchOutcome::Fresh(remote) => {
                let counters =
                    reconciler::reconcile_event_types(&self.database, &integration.ulid, &remote)
                        .await?;
                Ok(FetchOutcome::Fresh(counters))
            }
            FetchOutcome::Degraded { reason, .. } => Ok(FetchOutcome::Degraded {
                reason,
                fallback: SyncCounters::default(),
            }),
        }
    }

    /// Issue an authenticated request, recovering from an expired bearer
    /// token with one forced refresh and one retry
    async fn send_with_retry<F>(&self, user_ulid: &str, build: F) -> AppResult<AuthedCall>
    where
        F: Fn(&reqwest::Client, &str) -> reqwest::RequestBuilder,
    {
        let token = match self.guard.ensure_valid_token(user_ulid).await {
            Ok(token) => token,
            Err(err) if is_local_failure(&err) => return Err(err),
            Err(err) => {
                warn!(user_ulid, error = %err, "Could not obtain a Cal.com token");
                return Ok(AuthedCall::Degraded(DegradedReason::TokenUnavailable {
                    message: err.message,
                }));
            }
        };

        let response = match build(&self.http, &token).send().await {
            Ok(response) => response,
            Err(err) => {
                return Ok(AuthedCall::Degraded(DegradedReason::ApiError {
                    status: None,
                    message: err.to_string(),
                }))
            }
        };

        let status = response.status();
        if !is_auth_failure(status) {
            if status.is_success() {
                return Ok(AuthedCall::Success {
                    response,
                    token_refreshed: false,
                });
            }
            let body = response.text().await.unwrap_or_default();
            return Ok(AuthedCall::Degraded(DegradedReason::ApiError {
                status: Some(status.as_u16()),
                message: extract_error_message(&body),
            }));
        }

        // Telemetry only: the recovery path does not branch on the body.
        let body = response.text().await.unwrap_or_default();
        let message = extract_error_message(&body);
        debug!(
            user_ulid,
            status = status.as_u16(),
            message = %message,
            known_expiry_signal = message.contains("ACCESS_TOKEN_IS_EXPIRED"),
            "Bearer token rejected, forcing refresh"
        );

        match self.guard.refresh_tokens(user_ulid, true).await {
            Ok(_) => {}
            Err(err) if is_local_failure(&err) => return Err(err),
            Err(err) => {
                warn!(user_ulid, error = %err, "Forced token refresh failed");
                return Ok(AuthedCall::Degraded(DegradedReason::TokenRefreshFailed {
                    message: err.message,
                }));
            }
        }

        let token = match self.guard.ensure_valid_token(user_ulid).await {
            Ok(token) => token,
            Err(err) if is_local_failure(&err) => return Err(err),
            Err(err) => {
                return Ok(AuthedCall::Degraded(DegradedReason::TokenRefreshFailed {
                    message: err.message,
                }))
            }
        };

        // Exactly one retry; any failure here degrades without another pass.
        match build(&self.http, &token).send().await {
            Ok(retry) if retry.status().is_success() => Ok(AuthedCall::Success {
                response: retry,
                token_refreshed: true,
            }),
            Ok(retry) => {
                debug!(
                    user_ulid,
                    status = retry.status().as_u16(),
                    "Retry after forced refresh failed"
                );
                Ok(AuthedCall::Degraded(DegradedReason::RetryFailed))
            }
            Err(_) => Ok(AuthedCall::Degraded(DegradedReason::RetryFailed)),
        }
    }
}

fn is_auth_failure(status: StatusCode) -> bool {
    matches!(status.as_u16(), 401 | TOKEN_EXPIRED_STATUS)
}

fn is_local_failure(err: &AppError) -> bool {
    matches!(err.code, ErrorCode::DatabaseError | ErrorCode::InternalError)
}

fn derive_connection_flags(accounts: &[CalendarAccount]) -> (bool, bool) {
    let mut google = false;
    let mut office365 = false;
    for account in accounts {
        if let Some(provider) = &account.provider {
            let provider = provider.to_lowercase();
            if provider.contains("google") {
                google = true;
            }
            if provider.contains("office365") || provider.contains("outlook") {
                office365 = true;
            }
        }
    }
    (google, office365)
}
