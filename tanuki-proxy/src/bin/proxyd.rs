//! Proxy daemon.
//!
//! Wires the pieces together: one poll task per enabled upstream, the
//! serialized proxy core, the miner link, the two HTTP listeners, and
//! (optionally) the profitability refresher. Everything runs under a
//! task tracker and winds down on SIGINT/SIGTERM through a shared
//! cancellation token.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal::unix::{self, SignalKind};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use tanuki_proxy::api;
use tanuki_proxy::config::Config;
use tanuki_proxy::miner;
use tanuki_proxy::profitability::ProfitabilityService;
use tanuki_proxy::proxy::{self, UpstreamRegistration};
use tanuki_proxy::server::{self, MinerEndpoint};
use tanuki_proxy::tracing::{self, prelude::*};
use tanuki_proxy::upstream::generic::poll_task;
use tanuki_proxy::upstream::{GenericClient, PoolClient};

#[tokio::main]
async fn main() -> Result<()> {
    tracing::init_journald_or_stdout();

    let config_path = config_path_from_args();
    let config =
        Config::load(&config_path).with_context(|| format!("loading {config_path}"))?;
    info!(
        config = %config_path,
        upstreams = config.enabled_upstreams().count(),
        "Starting"
    );

    let running = CancellationToken::new();
    let tracker = TaskTracker::new();

    let (directive_tx, directive_rx) = mpsc::unbounded_channel();
    let (mining_info_tx, mining_info_rx) = watch::channel(None);
    // Held open for the daemon's lifetime; round completion currently
    // comes only from the assume-scanned timer, but the channel is the
    // seam a supervised miner would report through.
    let (_miner_tx, miner_rx) = mpsc::channel(64);
    let (proxy_cmd_tx, proxy_cmd_rx) = mpsc::channel(64);

    let profitability = if config.use_profitability {
        let service = Arc::new(ProfitabilityService::new(config.use_eco_block_rewards));
        tracker.spawn(service.clone().task(running.clone()));
        Some(service)
    } else {
        None
    };

    let mut registrations = Vec::new();
    for upstream in config.enabled_upstreams() {
        let client: Arc<dyn PoolClient> = Arc::new(
            GenericClient::new(upstream)
                .with_context(|| format!("building client for {}", upstream.name))?,
        );
        let (event_tx, event_rx) = mpsc::channel(16);
        tracker.spawn(poll_task(
            upstream.name.clone(),
            client.clone(),
            Duration::from_millis(upstream.update_mining_info_interval_ms),
            event_tx,
            running.clone(),
        ));
        registrations.push(UpstreamRegistration {
            config: upstream.clone(),
            client,
            events: event_rx,
        });
    }

    tracker.spawn(miner::link_task(
        directive_rx,
        mining_info_tx,
        running.clone(),
    ));
    tracker.spawn(proxy::task(
        config.clone(),
        registrations,
        miner_rx,
        proxy_cmd_rx,
        directive_tx,
        profitability,
        running.clone(),
    ));

    let miner_endpoint = MinerEndpoint {
        mining_info_rx,
        proxy_cmd_tx: proxy_cmd_tx.clone(),
    };
    let listen_addr = config.listen_addr.clone();
    tracker.spawn({
        let running = running.clone();
        async move {
            if let Err(err) = server::serve(&listen_addr, miner_endpoint, running.clone()).await
            {
                error!(error = %err, "Miner endpoint failed");
                running.cancel();
            }
        }
    });

    let api_state = api::SharedState { proxy_cmd_tx };
    let api_addr = config.api_listen_addr.clone();
    tracker.spawn({
        let running = running.clone();
        async move {
            if let Err(err) = api::serve(&api_addr, api_state, running.clone()).await {
                error!(error = %err, "Management API failed");
                running.cancel();
            }
        }
    });

    tracker.close();
    info!("Started.");

    let mut sigint = unix::signal(SignalKind::interrupt())?;
    let mut sigterm = unix::signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigint.recv() => {},
        _ = sigterm.recv() => {},
        _ = running.cancelled() => {},
    }

    trace!("Shutting down.");
    running.cancel();

    tracker.wait().await;
    info!("Exiting.");
    Ok(())
}

/// Extract `--config <path>` from the command line, defaulting to a file
/// in the working directory.
fn config_path_from_args() -> String {
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            if let Some(path) = args.next() {
                return path;
            }
        }
    }
    "tanuki-proxy.toml".to_string()
}
