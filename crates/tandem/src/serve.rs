// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tandem serve`: wire storage, the sync hub and the gateway, then run
//! until a shutdown signal arrives.

use std::sync::Arc;

use tandem_config::TandemConfig;
use tandem_core::{AccountStore, IdentityStore, TandemError};
use tandem_gateway::{GatewayState, start_server};
use tandem_sync::SyncHub;
use tracing::info;

use crate::admin::open_store;
use crate::shutdown::install_signal_handler;

/// Run the server.
pub async fn run_serve(config: TandemConfig) -> Result<(), TandemError> {
    init_tracing(&config.server.log_level);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        database = %config.storage.database_path,
        "starting tandem"
    );

    let store = Arc::new(open_store(&config.storage).await?);
    let identity: Arc<dyn IdentityStore> = store.clone();
    let accounts: Arc<dyn AccountStore> = store.clone();

    let hub = SyncHub::new(identity, &config.realtime);
    let state = GatewayState::new(hub, accounts, &config);
    let shutdown = install_signal_handler();

    let served = start_server(&config.server, state, shutdown).await;

    if let Err(e) = store.close().await {
        tracing::warn!(error = %e, "failed to close database cleanly");
    }
    info!("tandem stopped");
    served
}

/// Initialize the tracing subscriber. `RUST_LOG` wins over the configured level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(log_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

fn default_directives(log_level: &str) -> String {
    format!("tandem={log_level},warn")
}
