use std::sync::{Arc, Mutex};

use anyhow::Context;
use pimetrics::collector::{Collector, Scheduler, SystemCommandRunner};
use pimetrics::config::{BridgeConfig, CommandSpec};
use pimetrics::energy::EnergyClient;
use pimetrics::exposition::MetricsServer;
use pimetrics::health::HealthTracker;
use pimetrics::logging;
use pimetrics::registry::Registry;
use tracing::{info, warn};

fn main() -> anyhow::Result<()> {
    let config = BridgeConfig::from_env();
    logging::init(config.log_json);

    for cmd in [&config.station_cmd, &config.adc_cmd] {
        check_program(cmd);
    }
    if config.device.host.is_empty() {
        warn!("P110_HOST is not set, energy readings will fail every cycle");
    }

    let registry = Arc::new(Registry::new());
    let health = Arc::new(Mutex::new(HealthTracker::new()));

    // Bind before starting collection so a busy port fails fast.
    let server = MetricsServer::bind(config.http_addr(), registry.clone(), health.clone())
        .context("starting metrics endpoint")?;

    let collector = Collector::new(
        &config,
        Box::new(SystemCommandRunner),
        energy_client()?,
        registry,
        health,
    );
    let scheduler =
        Scheduler::spawn(collector, config.interval).context("spawning collector thread")?;

    server.run();

    info!("metrics endpoint stopped, shutting down");
    scheduler.shutdown();
    Ok(())
}

fn check_program(cmd: &CommandSpec) {
    if which::which(&cmd.program).is_err() {
        warn!(program = %cmd.program, "program not found in PATH, its step will fail");
    }
}

#[cfg(feature = "tapo")]
fn energy_client() -> anyhow::Result<Box<dyn EnergyClient>> {
    let client = pimetrics::energy::TapoClient::new().context("creating energy client runtime")?;
    Ok(Box::new(client))
}

#[cfg(not(feature = "tapo"))]
fn energy_client() -> anyhow::Result<Box<dyn EnergyClient>> {
    warn!("built without the tapo feature, energy readings are disabled");
    Ok(Box::new(pimetrics::energy::UnavailableEnergyClient))
}
