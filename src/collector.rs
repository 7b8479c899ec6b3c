use crate::config::{BridgeConfig, CommandSpec, DeviceConfig};
use crate::energy::{EnergyClient, EnergyReading};
use crate::health::HealthTracker;
use crate::parser::{parse_adc_readings, parse_station_dump, AdcReading, StationRecord};
use crate::registry::{Labels, Registry};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::process::Command;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

pub const STATION_METRIC: &str = "rpi_wifi_station_connected_time_seconds";
pub const ADC_METRIC: &str = "rpi_adc_value";
pub const ENERGY_METRIC: &str = "power_energy_kWhs";
pub const POWER_METRIC: &str = "power_current_mWs";

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("failed to start {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("{command} produced non UTF-8 output")]
    InvalidOutput { command: String },
}

/// Runs an external program to completion and returns its stdout.
pub trait CommandRunner: Send + Sync {
    fn run(&self, command: &CommandSpec) -> Result<String, CommandError>;
}

pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, command: &CommandSpec) -> Result<String, CommandError> {
        let output = Command::new(&command.program)
            .args(&command.args)
            .output()
            .map_err(|source| CommandError::Spawn {
                command: command.display(),
                source,
            })?;
        if !output.status.success() {
            return Err(CommandError::Failed {
                command: command.display(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        String::from_utf8(output.stdout).map_err(|_| CommandError::InvalidOutput {
            command: command.display(),
        })
    }
}

/// Collection steps, executed in this order every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Stations,
    Adc,
    Energy,
}

impl Step {
    pub const ALL: [Step; 3] = [Step::Stations, Step::Adc, Step::Energy];

    pub fn name(self) -> &'static str {
        match self {
            Step::Stations => "stations",
            Step::Adc => "adc",
            Step::Energy => "energy",
        }
    }
}

/// What one cycle produced. A step that failed leaves its field empty.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CycleReport {
    pub stations: Vec<StationRecord>,
    pub adc: Vec<AdcReading>,
    pub energy: Option<EnergyReading>,
    pub failures: Vec<String>,
}

pub struct Collector {
    runner: Box<dyn CommandRunner>,
    energy: Box<dyn EnergyClient>,
    registry: Arc<Registry>,
    health: Arc<Mutex<HealthTracker>>,
    station_cmd: CommandSpec,
    adc_cmd: CommandSpec,
    device: DeviceConfig,
}

impl Collector {
    pub fn new(
        config: &BridgeConfig,
        runner: Box<dyn CommandRunner>,
        energy: Box<dyn EnergyClient>,
        registry: Arc<Registry>,
        health: Arc<Mutex<HealthTracker>>,
    ) -> Self {
        describe_metrics(&registry);
        Collector {
            runner,
            energy,
            registry,
            health,
            station_cmd: config.station_cmd.clone(),
            adc_cmd: config.adc_cmd.clone(),
            device: config.device.clone(),
        }
    }

    /// Runs every step once. A step that errors or panics is logged and
    /// skipped; the remaining steps still run.
    pub fn run_cycle(&self) -> CycleReport {
        let started = Instant::now();
        let mut report = CycleReport::default();

        for step in Step::ALL {
            let outcome = catch_unwind(AssertUnwindSafe(|| self.run_step(step, &mut report)));
            let failure = match outcome {
                Ok(Ok(records)) => {
                    debug!(step = step.name(), records, "step completed");
                    None
                }
                Ok(Err(err)) => {
                    warn!(step = step.name(), error = %err, "step failed");
                    Some(format!("{err:#}"))
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    error!(step = step.name(), error = %message, "step panicked");
                    Some(format!("panic: {message}"))
                }
            };
            if let Some(message) = failure {
                self.health_mut()
                    .record_step_failure(step.name(), message.clone());
                report.failures.push(format!("{}: {message}", step.name()));
            }
        }

        let elapsed = started.elapsed();
        self.health_mut().record_cycle(elapsed);
        debug!(elapsed_ms = elapsed.as_millis() as u64, "cycle finished");
        report
    }

    fn run_step(&self, step: Step, report: &mut CycleReport) -> anyhow::Result<usize> {
        match step {
            Step::Stations => {
                let text = self.runner.run(&self.station_cmd)?;
                report.stations = parse_station_dump(&text);
                for station in &report.stations {
                    self.registry.set(
                        STATION_METRIC,
                        Labels::new([("mac", station.mac.as_str())]),
                        station.connected_time_seconds as f64,
                    );
                }
                Ok(report.stations.len())
            }
            Step::Adc => {
                let text = self.runner.run(&self.adc_cmd)?;
                report.adc = parse_adc_readings(&text);
                for reading in &report.adc {
                    self.registry.set(
                        ADC_METRIC,
                        Labels::new([
                            ("name", reading.name.as_str()),
                            ("type", reading.kind.as_label()),
                        ]),
                        reading.value,
                    );
                }
                Ok(report.adc.len())
            }
            Step::Energy => {
                let reading = self.energy.energy_usage(&self.device)?;
                let labels = Labels::new([("ip", reading.device_identifier.as_str())]);
                self.registry
                    .set(ENERGY_METRIC, labels.clone(), reading.month_energy_kwh);
                self.registry
                    .set(POWER_METRIC, labels, reading.current_power_mw);
                report.energy = Some(reading);
                Ok(1)
            }
        }
    }

    fn health_mut(&self) -> std::sync::MutexGuard<'_, HealthTracker> {
        self.health.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn describe_metrics(registry: &Registry) {
    registry.describe(STATION_METRIC, "Connection time of connected WiFi stations");
    registry.describe(ADC_METRIC, "Pi5 ADC voltage/current reading");
    registry.describe(ENERGY_METRIC, "kWh of energy consumed per month");
    registry.describe(POWER_METRIC, "mW of current currently drawn");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Background thread running `Collector::run_cycle` every `interval`.
pub struct Scheduler;

pub struct SchedulerHandle {
    stop_tx: Option<Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl Scheduler {
    pub fn spawn(collector: Collector, interval: Duration) -> std::io::Result<SchedulerHandle> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let join = thread::Builder::new()
            .name("collector".into())
            .spawn(move || {
                info!(interval_secs = interval.as_secs(), "collector started");
                loop {
                    collector.run_cycle();
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                info!("collector stopped");
            })?;
        Ok(SchedulerHandle {
            stop_tx: Some(stop_tx),
            join: Some(join),
        })
    }
}

impl SchedulerHandle {
    /// Stops after the cycle in progress, if any, and waits for the thread.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                error!("collector thread panicked");
            }
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
