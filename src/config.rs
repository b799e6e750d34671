// ABOUTME: Environment-driven configuration for the server and the Cal.com client
// ABOUTME: Loads client credentials with documented fallbacks and tunable refresh thresholds
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Keystone Coaching

use std::env;
use std::time::Duration;

use crate::errors::{AppError, AppResult};

/// Default safety buffer subtracted from the token expiry before a proactive
/// refresh is triggered
pub const DEFAULT_REFRESH_BUFFER_SECS: u64 = 600;

/// Default cooldown window for refresh loop detection
pub const DEFAULT_REFRESH_COOLDOWN_SECS: u64 = 30;

/// Default refresh attempt ceiling inside the cooldown window
pub const DEFAULT_REFRESH_MAX_ATTEMPTS: u32 = 3;

/// Cal.com client configuration
///
/// Client credentials are optional at load time: a missing id/secret only
/// fails the operation that actually needs them (a token refresh), matching
/// the error taxonomy for configuration errors.
#[derive(Debug, Clone)]
pub struct CalConfig {
    /// Platform OAuth client id (`CAL_CLIENT_ID`, falling back to
    /// `NEXT_PUBLIC_CAL_CLIENT_ID`)
    pub client_id: Option<String>,
    /// Platform OAuth client secret (`CAL_CLIENT_SECRET`, falling back to
    /// `X_CAL_SECRET_KEY`)
    pub client_secret: Option<String>,
    /// Base URL for the Cal.com API
    pub api_base: String,
    /// Safety buffer before expiry that still counts as "expired"
    pub refresh_buffer_secs: u64,
    /// Cooldown window for loop detection
    pub refresh_cooldown_secs: u64,
    /// Attempt ceiling inside the cooldown window
    pub refresh_max_attempts: u32,
}

impl Default for CalConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            api_base: "https://api.cal.com".to_owned(),
            refresh_buffer_secs: DEFAULT_REFRESH_BUFFER_SECS,
            refresh_cooldown_secs: DEFAULT_REFRESH_COOLDOWN_SECS,
            refresh_max_attempts: DEFAULT_REFRESH_MAX_ATTEMPTS,
        }
    }
}

impl CalConfig {
    /// Load the Cal.com client configuration from the environment
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            client_id: env_fallback("CAL_CLIENT_ID", "NEXT_PUBLIC_CAL_CLIENT_ID"),
            client_secret: env_fallback("CAL_CLIENT_SECRET", "X_CAL_SECRET_KEY"),
            api_base: env::var("CAL_API_BASE")
                .unwrap_or_else(|_| "https://api.cal.com".to_owned()),
            refresh_buffer_secs: env_u64("CAL_REFRESH_BUFFER_SECS", DEFAULT_REFRESH_BUFFER_SECS),
            refresh_cooldown_secs: env_u64(
                "CAL_REFRESH_COOLDOWN_SECS",
                DEFAULT_REFRESH_COOLDOWN_SECS,
            ),
            refresh_max_attempts: env_u32(
                "CAL_REFRESH_MAX_ATTEMPTS",
                DEFAULT_REFRESH_MAX_ATTEMPTS,
            ),
        }
    }

    /// Resolve the platform client credentials, failing with a configuration
    /// error when either half is missing
    ///
    /// # Errors
    ///
    /// Returns [`AppError::config`] when the client id or secret is not set.
    pub fn credentials(&self) -> AppResult<(&str, &str)> {
        let id = self
            .client_id
            .as_deref()
            .ok_or_else(|| AppError::config("CAL_CLIENT_ID is not configured"))?;
        let secret = self
            .client_secret
            .as_deref()
            .ok_or_else(|| AppError::config("CAL_CLIENT_SECRET is not configured"))?;
        Ok((id, secret))
    }

    /// Cooldown window as a [`Duration`]
    #[must_use]
    pub const fn cooldown(&self) -> Duration {
        Duration::from_secs(self.refresh_cooldown_secs)
    }

    /// Expiry safety buffer as a [`chrono::Duration`]
    #[must_use]
    pub fn refresh_buffer(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.refresh_buffer_secs as i64)
    }
}

/// Top-level server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP listen port (`HTTP_PORT`)
    pub http_port: u16,
    /// SQLite database URL (`DATABASE_URL`)
    pub database_url: String,
    /// Base64-encoded 32-byte token encryption key (`CAL_SYNC_ENCRYPTION_KEY`)
    pub encryption_key: Option<String>,
    /// Cal.com client configuration
    pub cal: CalConfig,
}

impl ServerConfig {
    /// Load the full server configuration from the environment
    ///
    /// # Errors
    ///
    /// Returns an error if `HTTP_PORT` is set but not a valid port number.
    pub fn from_env() -> AppResult<Self> {
        let http_port = match env::var("HTTP_PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|e| AppError::config(format!("Invalid HTTP_PORT '{raw}': {e}")))?,
            Err(_) => 8081,
        };

        Ok(Self {
            http_port,
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:data/cal_sync.db".to_owned()),
            encryption_key: env::var("CAL_SYNC_ENCRYPTION_KEY").ok(),
            cal: CalConfig::from_env(),
        })
    }
}

fn env_fallback(primary: &str, fallback: &str) -> Option<String> {
    env::var(primary)
        .or_else(|_| env::var(fallback))
        .ok()
        .filter(|v| !v.is_empty())
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
