// ABOUTME: Main library entry point for the Cal.com integration sync service
// ABOUTME: Wires token refresh, fetch-and-retry client, and event type reconciliation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Keystone Coaching

#![deny(unsafe_code)]

//! # Cal Sync Server
//!
//! The Cal.com integration service for the coaching marketplace: coaches
//! connect their calendars through Cal.com, and this service keeps their
//! tokens fresh, proxies calendar/booking reads, and mirrors Cal.com event
//! types into local rows that the booking flow references.
//!
//! ## Architecture
//!
//! - **Token guard**: proactive/reactive OAuth token refresh with per-user
//!   loop protection
//! - **Fetch client**: authenticated Cal.com REST calls that recover from an
//!   expired bearer token with exactly one forced-refresh retry
//! - **Reconciler**: converges local `cal_event_types` rows onto the
//!   authoritative remote list without deleting history
//!
//! ## Example
//!
//! ```rust,no_run
//! use cal_sync_server::config::ServerConfig;
//! use cal_sync_server::errors::AppResult;
//!
//! fn main() -> AppResult<()> {
//!     let config = ServerConfig::from_env()?;
//!     println!("cal-sync-server configured on port {}", config.http_port);
//!     Ok(())
//! }
//! ```

/// Cal.com API client, token lifecycle, and event type reconciliation
pub mod cal;

/// Environment-driven configuration
pub mod config;

/// Database pool, migrations, and table operations
pub mod database;

/// Unified error handling with standard error codes and HTTP responses
pub mod errors;

/// Production logging and structured output
pub mod logging;

/// Domain models shared across modules
pub mod models;

/// HTTP routes exposed to the marketplace front end
pub mod routes;
