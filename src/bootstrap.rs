// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use dotenvy::dotenv;
use tracing::{debug, info};

use crate::{FeedConfig, RealtimeManager, UpdateEvent};

/// How often the binary logs a connection status line
const STATUS_INTERVAL: Duration = Duration::from_secs(60);

/// Main entry point for the application.
///
/// Runs the feed from `BLOCKFEED_*` environment variables, logging every
/// update until Ctrl-C.
pub async fn run() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    let config = FeedConfig::from_env()?;
    info!(
        rpc_url = %config.rpc_url,
        ws_url = config.ws_url.as_ref().map_or("-", |u| u.as_str()),
        cache_dir = ?config.persistence.cache_dir,
        "Loaded configuration"
    );

    let manager = RealtimeManager::from_config(config)?;
    let subscription = manager.subscribe("log", |update| match &update.event {
        UpdateEvent::NewBlock(block) => info!(
            block_number = block.number(),
            transactions = block.transaction_hashes().len(),
            "New block"
        ),
        UpdateEvent::ValidatorPeersUpdate(peers) => info!(
            peers = peers.len(),
            located = peers.iter().filter(|p| p.is_real).count(),
            "Validator peers"
        ),
        other => debug!(kind = %other.kind(), "Update"),
    });

    manager.start();
    info!("Feed running, press Ctrl-C to stop");

    let mut status = tokio::time::interval(STATUS_INTERVAL);
    status.tick().await;
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
            _ = status.tick() => info!(status = %manager.connection_status(), "Status"),
        }
    }

    info!("Shutting down");
    subscription.unsubscribe();
    manager.disconnect().await;

    Ok(())
}
