use std::env;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

pub const DEFAULT_HTTP_PORT: u16 = 8000;
pub const DEFAULT_INTERVAL_SECS: u64 = 15;
pub const DEFAULT_STATION_CMD: &str = "iw dev wlan0 station dump";
pub const DEFAULT_ADC_CMD: &str = "vcgencmd pmic_read_adc";

/// Smart plug address and credentials, passed to the energy client as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceConfig {
    pub host: String,
    pub username: String,
    pub password: String,
}

/// A program plus its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.split_whitespace();
        let program = parts.next()?.to_string();
        Some(CommandSpec {
            program,
            args: parts.map(str::to_string).collect(),
        })
    }

    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub device: DeviceConfig,
    pub http_port: u16,
    pub interval: Duration,
    pub station_cmd: CommandSpec,
    pub adc_cmd: CommandSpec,
    pub log_json: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            device: DeviceConfig::default(),
            http_port: DEFAULT_HTTP_PORT,
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            station_cmd: default_command(DEFAULT_STATION_CMD),
            adc_cmd: default_command(DEFAULT_ADC_CMD),
            log_json: false,
        }
    }
}

impl BridgeConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = BridgeConfig::default();
        let device = DeviceConfig {
            host: lookup("P110_HOST").unwrap_or_default(),
            username: lookup("P110_USERNAME").unwrap_or_default(),
            password: lookup("P110_PASSWORD").unwrap_or_default(),
        };
        let http_port = lookup("PIMETRICS_HTTP_PORT")
            .and_then(|s| s.trim().parse::<u16>().ok())
            .unwrap_or(defaults.http_port);
        let interval = lookup("PIMETRICS_INTERVAL_SECS")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.interval);
        let station_cmd = lookup("PIMETRICS_STATION_CMD")
            .and_then(|s| CommandSpec::parse(&s))
            .unwrap_or(defaults.station_cmd);
        let adc_cmd = lookup("PIMETRICS_ADC_CMD")
            .and_then(|s| CommandSpec::parse(&s))
            .unwrap_or(defaults.adc_cmd);
        let log_json = matches!(
            lookup("PIMETRICS_LOG_JSON")
                .unwrap_or_default()
                .to_ascii_lowercase()
                .as_str(),
            "1" | "true" | "yes"
        );

        BridgeConfig {
            device,
            http_port,
            interval,
            station_cmd,
            adc_cmd,
            log_json,
        }
    }

    /// The endpoint always binds loopback; only the port is configurable.
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, self.http_port))
    }
}

fn default_command(raw: &str) -> CommandSpec {
    CommandSpec {
        program: raw.split_whitespace().next().unwrap_or_default().to_string(),
        args: raw.split_whitespace().skip(1).map(str::to_string).collect(),
    }
}
