// ABOUTME: Cal.com integration: token lifecycle, fetch-and-retry client, reconciliation
// ABOUTME: Module wiring and the shared error-body extraction helper
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Keystone Coaching

//! # Cal.com Integration
//!
//! The chain for every calendar-facing request is strictly ordered: the
//! [`token_guard::TokenGuard`] ensures a valid bearer token, the
//! [`client::CalClient`] issues the request and retries exactly once after a
//! forced refresh on 401/498, and successful event-type payloads are handed
//! to the [`reconciler`] to converge local mirror rows.

/// Fetch-and-retry REST client
pub mod client;
/// Event type reconciliation
pub mod reconciler;
/// Account-kind specific refresh protocols
pub mod refresher;
/// Token refresh guard and loop-protection tracker
pub mod token_guard;
/// Cal.com wire types
pub mod types;

pub use client::{CalClient, CalendarsSnapshot, DegradedReason, FetchOutcome};
pub use token_guard::{RefreshTracker, TokenGuard};

/// Best-effort extraction of a human-readable message from a Cal.com error
/// body, which may be JSON (`error.message`, `message`, or `error` as a
/// string) or plain text
#[must_use]
pub fn extract_error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(message) = value
            .pointer("/error/message")
            .or_else(|| value.get("message"))
            .or_else(|| value.get("error"))
            .and_then(serde_json::Value::as_str)
        {
            return message.to_owned();
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "no error body".to_owned()
    } else {
        trimmed.chars().take(200).collect()
    }
}
