// ABOUTME: Production logging setup with env-filter controlled verbosity
// ABOUTME: Plain fmt output for development, JSON lines for deployments
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Keystone Coaching

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber
///
/// Verbosity comes from `RUST_LOG`, defaulting to `info`. Calling this more
/// than once (e.g. across tests) is harmless; later calls are ignored.
pub fn init(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if json {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }
}
