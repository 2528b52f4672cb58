//! Crossway intersection process
//!
//! ```bash
//! crossway-crossing --id Cr1 --hub 127.0.0.1:6000 --listen 0.0.0.0:6101
//! ```

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use crossway_core::{CrosswayResult, DEFAULT_TIME_SCALE};
use crossway_crossing::{
    Crossing, CrossingConfig, PedestrianConfig, DEFAULT_ROAD_TIME, DEFAULT_SERVICE_TIME,
};
use crossway_node::{init_logging, stop_requested};

#[derive(Parser, Debug)]
#[command(name = "crossway-crossing")]
#[command(version, about = "One signalled crossing: four directions sharing the hub's arbiter", long_about = None)]
struct Args {
    /// Crossing id (Cr1..Cr5 on the standard grid)
    #[arg(short, long)]
    id: String,

    /// Hub address
    #[arg(long, default_value = "127.0.0.1:6000")]
    hub: String,

    /// Listener for direct vehicle arrivals
    #[arg(short, long, default_value = "0.0.0.0:0")]
    listen: String,

    /// Base service time per vehicle, simulated seconds
    #[arg(long, default_value_t = DEFAULT_SERVICE_TIME)]
    service_time: f64,

    /// Base road travel time to the next node, simulated seconds
    #[arg(long, default_value_t = DEFAULT_ROAD_TIME)]
    road_time: f64,

    /// Real seconds per simulated second
    #[arg(long, default_value_t = DEFAULT_TIME_SCALE)]
    time_scale: f64,

    /// Telemetry interval
    #[arg(long, value_parser = humantime::parse_duration, default_value = "2s")]
    telemetry: Duration,

    /// Run a pedestrian cycle regardless of the crossing id
    #[arg(long, conflicts_with = "no_pedestrian")]
    pedestrian: bool,

    /// Never run a pedestrian cycle
    #[arg(long)]
    no_pedestrian: bool,

    /// Time between pedestrian walk phases
    #[arg(long, value_parser = humantime::parse_duration, default_value = "12s")]
    pedestrian_period: Duration,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

impl Args {
    fn into_config(self) -> CrossingConfig {
        let mut config = CrossingConfig {
            hub_addr: self.hub,
            listen_addr: self.listen,
            service_time: self.service_time,
            road_time: self.road_time,
            time_scale: self.time_scale,
            telemetry_interval: self.telemetry,
            ..CrossingConfig::new(self.id)
        };

        if self.no_pedestrian {
            config.pedestrian = None;
        } else if self.pedestrian || config.pedestrian.is_some() {
            config.pedestrian = Some(PedestrianConfig {
                period: self.pedestrian_period,
                ..PedestrianConfig::default()
            });
        }
        config
    }
}

#[tokio::main]
async fn main() -> CrosswayResult<()> {
    let args = Args::parse();
    init_logging(&args.log_level, args.log_json);

    let config = args.into_config();
    info!(crossing = %config.id, hub = %config.hub_addr, pedestrian = config.pedestrian.is_some(), "starting crossing");

    let crossing = Crossing::new(config);
    let running = tokio::spawn(Arc::clone(&crossing).run());

    tokio::select! {
        _ = stop_requested() => {
            info!("stop requested");
            crossing.shutdown_signal().trigger();
        }
        _ = crossing.shutdown_signal().wait() => {}
    }

    match running.await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(error = %e, "crossing task panicked");
            Ok(())
        }
    }
}
