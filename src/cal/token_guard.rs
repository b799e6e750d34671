// ABOUTME: Token refresh guard with per-user loop protection and cooldown tracking
// ABOUTME: Ensures a valid Cal.com access token, refreshing proactively or on demand
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Keystone Coaching

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use dashmap::DashMap;
use tracing::{debug, info, warn};

use super::client::SnapshotCache;
use super::refresher::refresher_for;
use crate::config::CalConfig;
use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::models::TokenSet;

/// Per-user refresh bookkeeping
///
/// Entries are created lazily and never evicted; the map stays bounded by the
/// active user population of one process.
#[derive(Debug, Default)]
struct RefreshState {
    last_attempt: Option<Instant>,
    attempts: u32,
    in_progress: bool,
    reset_scheduled: bool,
}

/// Process-local refresh storm protection
///
/// All checks and flag mutations happen under the map's per-entry lock, so
/// check-and-set is atomic across concurrent requests within this process.
/// There is no cross-instance coordination; in a multi-instance deployment
/// this guard is best-effort per process.
#[derive(Debug)]
pub struct RefreshTracker {
    entries: DashMap<String, RefreshState>,
    cooldown: Duration,
    max_attempts: u32,
}

impl RefreshTracker {
    /// Create a tracker with the given cooldown window and attempt ceiling
    #[must_use]
    pub fn new(cooldown: Duration, max_attempts: u32) -> Self {
        Self {
            entries: DashMap::new(),
            cooldown,
            max_attempts,
        }
    }

    /// Try to begin a refresh for a user
    ///
    /// Fails fast without queuing when a refresh is already running, and
    /// rejects as a suspected loop once the attempt ceiling is reached inside
    /// the cooldown window. On loop detection a one-shot task is scheduled to
    /// zero the counter after the cooldown elapses.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::refresh_in_progress`] or [`AppError::refresh_loop`].
    pub fn begin(self: &Arc<Self>, user_ulid: &str) -> AppResult<RefreshPermit> {
        let mut schedule_reset = false;
        {
            let mut entry = self.entries.entry(user_ulid.to_owned()).or_default();
            let state = entry.value_mut();

            if state.in_progress {
                return Err(AppError::refresh_in_progress(user_ulid));
            }

            let now = Instant::now();
            let within_cooldown = state
                .last_attempt
                .is_some_and(|t| now.duration_since(t) < self.cooldown);

            if within_cooldown {
                state.attempts += 1;
                if state.attempts > self.max_attempts {
                    if !state.reset_scheduled {
                        state.reset_scheduled = true;
                        schedule_reset = true;
                    }
                } else {
                    state.last_attempt = Some(now);
                    state.in_progress = true;
                    return Ok(self.permit(user_ulid));
                }
            } else {
                state.attempts = 1;
                state.last_attempt = Some(now);
                state.in_progress = true;
                return Ok(self.permit(user_ulid));
            }
        }

        if schedule_reset {
            self.schedule_attempt_reset(user_ulid);
        }
        warn!(user_ulid, "Rejected token refresh as a suspected loop");
        Err(AppError::refresh_loop(user_ulid))
    }

    fn permit(self: &Arc<Self>, user_ulid: &str) -> RefreshPermit {
        RefreshPermit {
            tracker: Arc::clone(self),
            user_ulid: user_ulid.to_owned(),
        }
    }

    fn release(&self, user_ulid: &str) {
        if let Some(mut entry) = self.entries.get_mut(user_ulid) {
            entry.in_progress = false;
        }
    }

    fn schedule_attempt_reset(self: &Arc<Self>, user_ulid: &str) {
        let tracker = Arc::clone(self);
        let user = user_ulid.to_owned();
        let cooldown = self.cooldown;
        tokio::spawn(async move {
            tokio::time::sleep(cooldown).await;
            if let Some(mut entry) = tracker.entries.get_mut(&user) {
                entry.attempts = 0;
                entry.reset_scheduled = false;
            }
            debug!(user_ulid = %user, "Refresh attempt counter reset");
        });
    }
}

/// RAII permit for one refresh; releases the in-progress flag on every exit
/// path, including unwinds
#[derive(Debug)]
pub struct RefreshPermit {
    tracker: Arc<RefreshTracker>,
    user_ulid: String,
}

impl Drop for RefreshPermit {
    fn drop(&mut self) {
        self.tracker.release(&self.user_ulid);
    }
}

/// Obtains a valid Cal.com access token for a user, refreshing when the
/// stored token has expired or is inside the proactive refresh buffer
pub struct TokenGuard {
    database: Database,
    http: reqwest::Client,
    config: CalConfig,
    tracker: Arc<RefreshTracker>,
    snapshots: Arc<SnapshotCache>,
}

impl TokenGuard {
    /// Create a guard sharing the client's HTTP connection pool and snapshot
    /// cache
    #[must_use]
    pub fn new(
        database: Database,
        http: reqwest::Client,
        config: CalConfig,
        snapshots: Arc<SnapshotCache>,
    ) -> Self {
        let tracker = Arc::new(RefreshTracker::new(
            config.cooldown(),
            config.refresh_max_attempts,
        ));
        Self {
            database,
            http,
            config,
            tracker,
            snapshots,
        }
    }

    /// Return a usable access token, refreshing only when the stored token's
    /// expiry minus the safety buffer has passed
    ///
    /// # Errors
    ///
    /// Returns an error if no integration exists for the user, or if a
    /// required refresh fails (including the transient in-progress and
    /// loop-detected rejections).
    pub async fn ensure_valid_token(&self, user_ulid: &str) -> AppResult<String> {
        let integration = self
            .database
            .get_calendar_integration_by_user(user_ulid)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!("No calendar integration for user {user_ulid}"))
            })?;

        if integration.token_is_fresh(self.config.refresh_buffer(), Utc::now()) {
            return Ok(integration.cal_access_token.unwrap_or_default());
        }

        let tokens = self.refresh_tokens(user_ulid, false).await?;
        Ok(tokens.access_token)
    }

    /// Refresh the user's tokens against Cal.com
    ///
    /// When not forced, a token another request refreshed in the meantime is
    /// returned as-is. The in-progress flag is released on every exit path;
    /// a failed database write after a successful remote refresh is logged
    /// and the fresh tokens are still returned to the caller.
    ///
    /// # Errors
    ///
    /// Returns an error if the integration is missing, the refresh is
    /// rejected by the loop guard, the platform credentials are not
    /// configured, or the remote call fails.
    pub async fn refresh_tokens(&self, user_ulid: &str, force: bool) -> AppResult<TokenSet> {
        let integration = self
            .database
            .get_calendar_integration_by_user(user_ulid)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!("No calendar integration for user {user_ulid}"))
            })?;

        if !force && integration.token_is_fresh(self.config.refresh_buffer(), Utc::now()) {
            return Ok(TokenSet {
                access_token: integration.cal_access_token.clone().unwrap_or_default(),
                refresh_token: integration.cal_refresh_token.clone().unwrap_or_default(),
                expires_at: integration
                    .cal_access_token_expires_at
                    .unwrap_or_else(Utc::now),
            });
        }

        let _permit = self.tracker.begin(user_ulid)?;
        debug!(
            user_ulid,
            force,
            account_kind = integration.account_kind.as_str(),
            "Refreshing Cal.com tokens"
        );

        let refreshed = refresher_for(integration.account_kind)
            .refresh(&self.http, &self.config, &integration)
            .await?;

        // Refresh tokens are not always rotated; keep the previous one when
        // the response omits it.
        let refresh_token = refreshed
            .refresh_token
            .or(integration.cal_refresh_token)
            .unwrap_or_default();

        let tokens = TokenSet {
            access_token: refreshed.access_token,
            refresh_token,
            expires_at: refreshed.expires_at,
        };

        if let Err(err) = self
            .database
            .update_integration_tokens(user_ulid, &tokens)
            .await
        {
            warn!(
                user_ulid,
                error = %err,
                "Refreshed tokens could not be persisted; returning them to the caller"
            );
        }

        self.snapshots.invalidate(user_ulid).await;
        info!(user_ulid, expires_at = %tokens.expires_at, "Cal.com tokens refreshed");
        Ok(tokens)
    }
}
