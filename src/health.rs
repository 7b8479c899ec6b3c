use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Bridge health and self-telemetry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeHealth {
    /// Process uptime in seconds
    pub uptime_secs: u64,
    /// Collection cycles completed
    pub cycles: u64,
    /// Failures per collection step name
    pub step_failures: BTreeMap<String, u64>,
    /// Last error message (if any)
    pub last_error: Option<String>,
    /// Metrics scrapes served
    pub scrapes: u64,
    /// Duration of the most recent cycle in seconds
    pub last_cycle_secs: Option<f64>,
    /// Unix timestamp of the end of the most recent cycle
    pub last_cycle_unix: Option<i64>,
}

/// Health tracker shared by the scheduler and the endpoint
pub struct HealthTracker {
    start_time: Instant,
    cycles: u64,
    step_failures: BTreeMap<String, u64>,
    last_error: Option<String>,
    scrapes: u64,
    last_cycle: Option<Duration>,
    last_cycle_unix: Option<i64>,
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthTracker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            cycles: 0,
            step_failures: BTreeMap::new(),
            last_error: None,
            scrapes: 0,
            last_cycle: None,
            last_cycle_unix: None,
        }
    }

    pub fn record_scrape(&mut self) {
        self.scrapes += 1;
    }

    pub fn record_step_failure(&mut self, step: &str, error: String) {
        *self.step_failures.entry(step.to_string()).or_insert(0) += 1;
        self.last_error = Some(format!("{step}: {error}"));
    }

    pub fn record_cycle(&mut self, elapsed: Duration) {
        self.cycles += 1;
        self.last_cycle = Some(elapsed);
        self.last_cycle_unix = Some(chrono::Utc::now().timestamp());
    }

    pub fn get_health(&self) -> BridgeHealth {
        BridgeHealth {
            uptime_secs: self.start_time.elapsed().as_secs(),
            cycles: self.cycles,
            step_failures: self.step_failures.clone(),
            last_error: self.last_error.clone(),
            scrapes: self.scrapes,
            last_cycle_secs: self.last_cycle.map(|d| d.as_secs_f64()),
            last_cycle_unix: self.last_cycle_unix,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_failures_per_step() {
        let mut h = HealthTracker::new();
        h.record_step_failure("energy", "timed out".into());
        h.record_step_failure("energy", "refused".into());
        h.record_step_failure("adc", "exit 1".into());
        let snap = h.get_health();
        assert_eq!(snap.step_failures.get("energy"), Some(&2));
        assert_eq!(snap.step_failures.get("adc"), Some(&1));
        assert_eq!(snap.last_error.as_deref(), Some("adc: exit 1"));
    }

    #[test]
    fn records_cycle_timing() {
        let mut h = HealthTracker::new();
        assert!(h.get_health().last_cycle_secs.is_none());
        h.record_cycle(Duration::from_millis(250));
        let snap = h.get_health();
        assert_eq!(snap.cycles, 1);
        assert_eq!(snap.last_cycle_secs, Some(0.25));
        assert!(snap.last_cycle_unix.is_some());
    }
}
