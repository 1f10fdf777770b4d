// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

use std::process::ExitCode;

use blockfeed::bootstrap::run;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("blockfeed=info")),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!("Feed error: {e:#}");
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}
