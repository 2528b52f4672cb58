//! Crossway coordination hub
//!
//! ```bash
//! crossway-hub --listen 0.0.0.0:6000 --log logs/events.jsonl --export logs/ledger.json
//! ```
//!
//! On unix, SIGHUP re-reads the policy file and pushes it to every crossing.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use crossway_core::CrosswayResult;
use crossway_hub::{Hub, HubConfig, DEFAULT_HUB_PORT};
use crossway_node::{init_logging, stop_requested};

#[derive(Parser, Debug)]
#[command(name = "crossway-hub")]
#[command(version, about = "Coordination hub for a grid of signalled crossings", long_about = None)]
struct Args {
    /// Listen address
    #[arg(short, long, default_value_t = format!("0.0.0.0:{DEFAULT_HUB_PORT}"))]
    listen: String,

    /// JSON-lines event log
    #[arg(long, default_value = "logs/events.jsonl")]
    log: PathBuf,

    /// Keep events in memory only
    #[arg(long)]
    no_log: bool,

    /// Ordered ledger written on shutdown
    #[arg(long)]
    export: Option<PathBuf>,

    /// Policy file (JSON); the hybrid policy is used when absent
    #[arg(short, long)]
    policy: Option<PathBuf>,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> CrosswayResult<()> {
    let args = Args::parse();
    init_logging(&args.log_level, args.log_json);

    let config = HubConfig {
        listen_addr: args.listen,
        log_path: (!args.no_log).then_some(args.log),
        export_path: args.export,
        policy_path: args.policy,
    };
    info!(?config, "starting hub");

    let hub = Hub::new(config)?;
    let listener = hub.bind().await?;

    let server = {
        let hub = Arc::clone(&hub);
        tokio::spawn(async move { hub.serve(listener).await })
    };

    #[cfg(unix)]
    {
        let hub = Arc::clone(&hub);
        tokio::spawn(async move { reload_on_hangup(hub).await });
    }

    stop_requested().await;
    info!("stop requested");
    hub.shutdown()?;

    match server.await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(error = %e, "accept loop panicked");
            Ok(())
        }
    }
}

#[cfg(unix)]
async fn reload_on_hangup(hub: Arc<Hub>) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "SIGHUP handler unavailable");
            return;
        }
    };
    while hangup.recv().await.is_some() {
        match hub.reload_policy() {
            Ok(pushed) => info!(crossings = pushed, "policy reloaded"),
            Err(e) => tracing::warn!(error = %e, "policy reload failed, keeping previous"),
        }
    }
}
