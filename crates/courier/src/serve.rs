// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `courier serve` command implementation.
//!
//! Wires configuration, the shared store, the instance database, and the
//! HTTP collaborators into the session core, then serves the gateway until
//! a shutdown signal arrives.

use std::sync::Arc;
use std::time::Duration;

use courier_coalescer::{CoalescingDispatcher, MessageCoalescer};
use courier_config::model::CourierConfig;
use courier_core::{
    AgentInvoker, CourierError, InstanceRepository, KvStore, SessionDeleter, SessionStarter,
};
use courier_gateway::{GatewayState, ServerConfig, start_server};
use courier_lifecycle::{QrScanGuard, SessionEventHandler, SessionStartQueue};
use courier_prometheus::PrometheusAdapter;
use courier_store::{Database, SqliteInstanceRepository, StoreKeys, connect_store};
use courier_whatsapp::{GatewayClient, HttpAgent, JobRunnerClient};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::shutdown;

/// The collaborators the session core is built from.
pub struct Collaborators {
    pub store: Arc<dyn KvStore>,
    pub repository: Arc<dyn InstanceRepository>,
    pub starter: Arc<dyn SessionStarter>,
    pub deleter: Arc<dyn SessionDeleter>,
    pub agent: Arc<dyn AgentInvoker>,
}

/// Assembles the session core and the gateway state around it.
pub fn assemble(
    config: &CourierConfig,
    collaborators: Collaborators,
    metrics: Option<PrometheusAdapter>,
) -> GatewayState {
    let Collaborators {
        store,
        repository,
        starter,
        deleter,
        agent,
    } = collaborators;
    let keys = StoreKeys::new(config.store.key_prefix.clone());

    let qr_guard = QrScanGuard::new(store.clone(), keys.clone(), deleter, &config.qr_guard);
    let start_queue =
        SessionStartQueue::new(store.clone(), keys.clone(), starter, &config.start_queue);
    let events = SessionEventHandler::new(repository, qr_guard);
    let coalescer = MessageCoalescer::new(store.clone(), keys, &config.coalescer);
    let dispatcher = CoalescingDispatcher::new(coalescer, agent);

    GatewayState {
        store,
        events,
        start_queue,
        dispatcher,
        metrics,
    }
}

/// Runs the `serve` command until SIGINT/SIGTERM.
pub async fn run_serve(config: CourierConfig) -> Result<(), CourierError> {
    init_tracing(&config.service.log_level);

    info!("starting courier serve");

    let metrics = if config.metrics.enabled {
        Some(PrometheusAdapter::new()?)
    } else {
        info!("metrics disabled");
        None
    };

    let store = connect_store(&config.store).await?;
    if let Err(e) = store.ping().await {
        warn!(error = %e, "shared store not reachable at startup, continuing");
    }

    let database = Database::open(&config.database.path).await?;
    let collaborators = Collaborators {
        store,
        repository: Arc::new(SqliteInstanceRepository::new(database.clone())),
        starter: Arc::new(GatewayClient::new(&config.gateway)?),
        deleter: Arc::new(JobRunnerClient::new(&config.jobs)?),
        agent: Arc::new(HttpAgent::new(&config.agent)?),
    };

    let state = assemble(&config, collaborators, metrics.clone());

    let cancel = shutdown::install_signal_handler();

    {
        let mem_cancel = cancel.clone();
        let export = metrics.is_some();
        tokio::spawn(async move {
            memory_monitor(export, mem_cancel).await;
        });
    }

    let server_config = ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
    };
    start_server(&server_config, state, cancel.clone()).await?;
    cancel.cancel();

    database.close().await?;
    info!("courier serve shutdown complete");
    Ok(())
}

/// Exports jemalloc heap and resident gauges every 15 seconds.
#[cfg(not(target_env = "msvc"))]
async fn memory_monitor(export: bool, cancel: CancellationToken) {
    if !export {
        cancel.cancelled().await;
        return;
    }

    let mut interval = tokio::time::interval(Duration::from_secs(15));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                // Stats are cached until the epoch advances.
                let _ = tikv_jemalloc_ctl::epoch::advance();
                let allocated = tikv_jemalloc_ctl::stats::allocated::read().unwrap_or(0);
                let resident = tikv_jemalloc_ctl::stats::resident::read().unwrap_or(0);
                courier_prometheus::set_memory_heap(allocated as f64);
                courier_prometheus::set_memory_resident(resident as f64);
            }
            _ = cancel.cancelled() => {
                info!("memory monitor shutting down");
                break;
            }
        }
    }
}

#[cfg(target_env = "msvc")]
async fn memory_monitor(_export: bool, cancel: CancellationToken) {
    cancel.cancelled().await;
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("courier={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
