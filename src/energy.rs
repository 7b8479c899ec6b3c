use crate::config::DeviceConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyReading {
    pub device_identifier: String,
    pub month_energy_kwh: f64,
    pub current_power_mw: f64,
}

#[derive(Error, Debug)]
pub enum EnergyError {
    #[error("runtime error: {0}")]
    Runtime(#[from] std::io::Error),

    /// Authentication, transport or decoding failure reported by the device client.
    #[error("device {host}: {message}")]
    Device { host: String, message: String },

    #[error("no energy client compiled in")]
    Unavailable,
}

/// Returns the current energy counters of one smart plug.
pub trait EnergyClient: Send + Sync {
    fn energy_usage(&self, device: &DeviceConfig) -> Result<EnergyReading, EnergyError>;
}

/// Used when the crate is built without a device protocol.
pub struct UnavailableEnergyClient;

impl EnergyClient for UnavailableEnergyClient {
    fn energy_usage(&self, _device: &DeviceConfig) -> Result<EnergyReading, EnergyError> {
        Err(EnergyError::Unavailable)
    }
}

#[cfg(feature = "tapo")]
pub use self::tapo_client::TapoClient;

#[cfg(feature = "tapo")]
mod tapo_client {
    use super::{EnergyClient, EnergyError, EnergyReading};
    use crate::config::DeviceConfig;
    use tapo::ApiClient;
    use tokio::runtime::{Builder, Runtime};
    use tracing::debug;

    /// Tapo P110 client. The protocol is async; each call blocks on a private
    /// single-threaded runtime so the collection cycle stays synchronous.
    pub struct TapoClient {
        runtime: Runtime,
    }

    impl TapoClient {
        pub fn new() -> Result<Self, EnergyError> {
            let runtime = Builder::new_current_thread().enable_all().build()?;
            Ok(TapoClient { runtime })
        }
    }

    impl EnergyClient for TapoClient {
        fn energy_usage(&self, device: &DeviceConfig) -> Result<EnergyReading, EnergyError> {
            let device_err = |message: String| EnergyError::Device {
                host: device.host.clone(),
                message,
            };

            let usage = self.runtime.block_on(async {
                // A fresh handshake per call; the plug invalidates idle sessions.
                let plug = ApiClient::new(device.username.clone(), device.password.clone())
                    .p110(device.host.clone())
                    .await?;
                plug.get_energy_usage().await
            });
            let usage = usage.map_err(|err| device_err(err.to_string()))?;
            debug!(host = %device.host, month_wh = usage.month_energy, power_mw = usage.current_power, "energy usage");

            Ok(EnergyReading {
                device_identifier: device.host.clone(),
                // Device reports watt-hours.
                month_energy_kwh: usage.month_energy as f64 / 1000.0,
                current_power_mw: usage.current_power as f64,
            })
        }
    }
}
