// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `omnidesk serve` command implementation.
//!
//! Opens the SQLite ledger, builds the provider clients, starts the
//! real-time broker and outbound notifier, and serves every route on one
//! listener until SIGINT/SIGTERM. On the way out the ledger checkpoints
//! its WAL.

use std::sync::Arc;

use omnidesk_channels::{HttpChannelGateway, HttpCrm};
use omnidesk_config::model::OmnideskConfig;
use omnidesk_core::{LedgerStore, OmniError, PluginAdapter};
use omnidesk_engine::Engine;
use omnidesk_gateway::{AuthConfig, GatewayState, HealthState, ServerConfig, start_server};
use omnidesk_prometheus::PrometheusAdapter;
use omnidesk_realtime::{Broker, NotifierSettings, SessionSettings, WsNotifier};
use omnidesk_storage::SqliteLedger;
use tracing::{info, warn};

use crate::shutdown;

/// Runs the `omnidesk serve` command.
pub async fn run_serve(config: OmnideskConfig) -> Result<(), OmniError> {
    init_tracing(&config.server.log_level);

    info!("starting omnidesk serve");

    let ledger = SqliteLedger::new(config.storage.clone());
    ledger.initialize().await?;
    let ledger: Arc<dyn LedgerStore> = Arc::new(ledger);
    info!(path = %config.storage.database_path, "ledger ready");

    let gateway = Arc::new(HttpChannelGateway::from_config(&config.meta, &config.gmail)?);
    let crm = Arc::new(HttpCrm::new(&config.crm)?);

    let prometheus = match PrometheusAdapter::new() {
        Ok(adapter) => {
            info!("prometheus metrics enabled");
            Some(Arc::new(adapter))
        }
        Err(e) => {
            warn!(error = %e, "prometheus initialization failed, continuing without metrics");
            None
        }
    };

    let cancel = shutdown::install_signal_handler();

    let broker = Broker::spawn(cancel.child_token());
    let notifier = WsNotifier::spawn(
        NotifierSettings::from_config(&config.realtime),
        cancel.child_token(),
    );
    info!(public_url = %config.realtime.public_url, "real-time layer started");

    let engine = Engine::new(ledger.clone(), gateway, crm, Arc::new(notifier));

    if config.gmail.enabled {
        let history_id = engine.start_mailbox_watch().await;
        info!(history_id, "email channel enabled");
    }

    let health = HealthState {
        start_time: std::time::Instant::now(),
        prometheus_render: prometheus.map(|adapter| {
            Arc::new(move || adapter.render()) as Arc<dyn Fn() -> String + Send + Sync>
        }),
    };

    if config.server.api_token.is_none() {
        warn!("server.api_token is not set; the dashboard API will reject every request");
    }
    if config.webhook.verify_token.is_none() {
        warn!("webhook.verify_token is not set; Meta subscription handshakes will be refused");
    }

    let state = GatewayState {
        engine,
        broker,
        sessions: SessionSettings::from_config(&config.realtime),
        verify_token: config.webhook.verify_token.clone(),
        health,
    };
    let server_config = ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
        auth: AuthConfig {
            bearer_token: config.server.api_token.clone(),
        },
    };

    let served = start_server(&server_config, state, cancel.clone()).await;
    cancel.cancel();

    if let Err(e) = ledger.shutdown().await {
        warn!(error = %e, "ledger shutdown failed");
    }
    info!("omnidesk stopped");
    served
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("omnidesk={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
