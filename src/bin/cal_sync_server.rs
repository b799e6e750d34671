// ABOUTME: Server binary: config, database, router, graceful shutdown
// ABOUTME: Flags override environment values loaded by ServerConfig
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Keystone Coaching

use std::sync::Arc;

use anyhow::Context;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use clap::Parser;
use tracing::{info, warn};

use cal_sync_server::cal::CalClient;
use cal_sync_server::config::ServerConfig;
use cal_sync_server::database::{generate_encryption_key, Database};
use cal_sync_server::logging;
use cal_sync_server::routes::{router, ServerResources};

#[derive(Debug, Parser)]
#[command(name = "cal-sync-server", about = "Cal.com integration sync service")]
struct Args {
    /// HTTP listen port (overrides HTTP_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Database URL (overrides DATABASE_URL)
    #[arg(long)]
    database_url: Option<String>,

    /// Emit JSON log lines instead of human-readable output
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init(args.json_logs);

    let mut config = ServerConfig::from_env().context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.http_port = port;
    }
    if let Some(database_url) = args.database_url {
        config.database_url = database_url;
    }

    let encryption_key = match &config.encryption_key {
        Some(encoded) => {
            let key = STANDARD
                .decode(encoded)
                .context("CAL_SYNC_ENCRYPTION_KEY is not valid base64")?;
            anyhow::ensure!(
                key.len() == 32,
                "CAL_SYNC_ENCRYPTION_KEY must decode to 32 bytes, got {}",
                key.len()
            );
            key
        }
        None => {
            warn!("CAL_SYNC_ENCRYPTION_KEY not set; using an ephemeral key, stored tokens will not survive a restart");
            generate_encryption_key()?
        }
    };

    if config.cal.client_id.is_none() || config.cal.client_secret.is_none() {
        warn!("Cal.com client credentials not configured; token refreshes will fail until they are set");
    }

    let database = Database::new(&config.database_url, encryption_key)
        .await
        .context("Failed to open database")?;

    let cal = CalClient::new(database.clone(), config.cal.clone());
    let resources = Arc::new(ServerResources { database, cal });

    let addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(addr = %addr, "cal-sync-server listening");

    axum::serve(listener, router(resources))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("cal-sync-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        warn!("Failed to install ctrl-c handler; running until killed");
        std::future::pending::<()>().await;
    }
}
