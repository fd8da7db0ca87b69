// demos/src/bin/gateway_config.rs
//
// Loads gateway settings from JSON, shows the defaults that fill in missing
// keys and the validation error for a zero interval.
//
// Run this example with:
//   cargo run --bin gateway_config
//   (from the demos directory)

use marketfeed_rs::prelude::*;
use std::time::Duration;
use tracing::{info, warn};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let partial = r#"{ "keep_alive_interval_ms": 15000, "max_reconnect_attempts": 3 }"#;
    let config = GatewayConfig::from_json(partial)?;
    info!(?config, "loaded partial configuration");

    let controller = SocketConnectController::from_config(&config);
    let mut backoff = config.initial_backoff;
    for attempt in 1..=controller.max_attempts() {
        info!(attempt, ?backoff, "backoff after a failed attempt");
        backoff = SocketConnectController::next_backoff(backoff);
    }

    let round_trip = serde_json::to_string_pretty(&config)?;
    info!("serialized form:\n{round_trip}");

    let broken = config.with_connect_timeout(Duration::ZERO);
    match broken.validate() {
        Ok(()) => info!("unexpectedly valid"),
        Err(err) => warn!(error = %err, "rejected configuration"),
    }

    match GatewayConfig::from_json(r#"{ "sanity_check_interval_ms": 0 }"#) {
        Ok(_) => info!("unexpectedly valid"),
        Err(err) => warn!(error = %err, "rejected configuration"),
    }
    Ok(())
}
