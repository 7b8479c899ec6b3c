use std::sync::{Arc, Mutex};

use anyhow::Context;
use pimetrics::collector::{Collector, SystemCommandRunner};
use pimetrics::config::BridgeConfig;
use pimetrics::energy::EnergyClient;
use pimetrics::health::HealthTracker;
use pimetrics::logging;
use pimetrics::registry::Registry;

/// Runs a single collection cycle and prints what it gathered as JSON.
fn main() -> anyhow::Result<()> {
    let config = BridgeConfig::from_env();
    logging::init(config.log_json);

    let registry = Arc::new(Registry::new());
    let collector = Collector::new(
        &config,
        Box::new(SystemCommandRunner),
        energy_client()?,
        registry.clone(),
        Arc::new(Mutex::new(HealthTracker::new())),
    );
    let report = collector.run_cycle();

    #[derive(serde::Serialize)]
    struct Snapshot {
        report: pimetrics::collector::CycleReport,
        series: Vec<pimetrics::registry::Sample>,
    }

    let out = serde_json::to_string_pretty(&Snapshot {
        report,
        series: registry.snapshot(),
    })
    .context("serializing snapshot")?;
    println!("{out}");
    Ok(())
}

#[cfg(feature = "tapo")]
fn energy_client() -> anyhow::Result<Box<dyn EnergyClient>> {
    Ok(Box::new(pimetrics::energy::TapoClient::new()?))
}

#[cfg(not(feature = "tapo"))]
fn energy_client() -> anyhow::Result<Box<dyn EnergyClient>> {
    Ok(Box::new(pimetrics::energy::UnavailableEnergyClient))
}
