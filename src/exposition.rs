use crate::health::{BridgeHealth, HealthTracker};
use crate::registry::{Registry, Sample};
use std::fmt::Write as _;
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tiny_http::{Header, Method, Request, Response, Server};
use tracing::{debug, info, warn};

pub const METRICS_PATH: &str = "/metrics";
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

#[derive(Error, Debug)]
pub enum ServeError {
    #[error("failed to bind {addr}: {message}")]
    Bind { addr: SocketAddr, message: String },
}

pub struct MetricsServer {
    server: Server,
    registry: Arc<Registry>,
    health: Arc<Mutex<HealthTracker>>,
}

impl MetricsServer {
    pub fn bind(
        addr: SocketAddr,
        registry: Arc<Registry>,
        health: Arc<Mutex<HealthTracker>>,
    ) -> Result<Self, ServeError> {
        let server = Server::http(addr).map_err(|err| ServeError::Bind {
            addr,
            message: err.to_string(),
        })?;
        Ok(MetricsServer {
            server,
            registry,
            health,
        })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.server_addr().to_ip()
    }

    /// Answers requests until the listener fails.
    pub fn run(self) {
        if let Some(addr) = self.local_addr() {
            info!(%addr, "serving metrics on http://{addr}{METRICS_PATH}");
        }
        for request in self.server.incoming_requests() {
            let resp = self.handle(&request);
            if let Err(err) = request.respond(resp) {
                warn!(error = %err, "failed to write metrics response");
            }
        }
    }

    fn handle(&self, request: &Request) -> Response<Cursor<Vec<u8>>> {
        let path = request.url().split('?').next().unwrap_or_default();
        debug!(method = %request.method(), path, "request");
        if path != METRICS_PATH {
            return Response::from_string("not found").with_status_code(404);
        }
        if *request.method() != Method::Get {
            return Response::from_string("method not allowed").with_status_code(405);
        }

        let health = {
            let mut tracker = self.health.lock().unwrap_or_else(PoisonError::into_inner);
            tracker.record_scrape();
            tracker.get_health()
        };
        let body = render(&health, &self.registry.snapshot());

        let resp = Response::from_string(body).with_status_code(200);
        match Header::from_bytes(&b"Content-Type"[..], CONTENT_TYPE.as_bytes()) {
            Ok(header) => resp.with_header(header),
            Err(()) => resp,
        }
    }
}

/// Renders bridge health followed by every registry series.
pub fn render(health: &BridgeHealth, samples: &[Sample]) -> String {
    let mut out = render_health(health);

    let mut current: Option<&str> = None;
    for sample in samples {
        if current != Some(sample.name.as_str()) {
            if let Some(help) = &sample.help {
                let _ = writeln!(out, "# HELP {} {}", sample.name, escape_help(help));
            }
            let _ = writeln!(out, "# TYPE {} gauge", sample.name);
            current = Some(sample.name.as_str());
        }
        out.push_str(&sample.name);
        if !sample.labels.is_empty() {
            let labels: Vec<String> = sample
                .labels
                .iter()
                .map(|(k, v)| format!("{k}=\"{}\"", escape_label(v)))
                .collect();
            let _ = write!(out, "{{{}}}", labels.join(","));
        }
        let _ = writeln!(out, " {}", format_value(sample.value));
    }
    out
}

fn render_health(h: &BridgeHealth) -> String {
    let mut out = format!(
        concat!(
            "# HELP pimetrics_uptime_seconds Bridge uptime in seconds\n",
            "# TYPE pimetrics_uptime_seconds gauge\n",
            "pimetrics_uptime_seconds {}\n",
            "# HELP pimetrics_cycles_total Collection cycles completed\n",
            "# TYPE pimetrics_cycles_total counter\n",
            "pimetrics_cycles_total {}\n",
            "# HELP pimetrics_scrapes_total Metrics scrapes served\n",
            "# TYPE pimetrics_scrapes_total counter\n",
            "pimetrics_scrapes_total {}\n"
        ),
        h.uptime_secs, h.cycles, h.scrapes
    );
    if !h.step_failures.is_empty() {
        out.push_str("# HELP pimetrics_step_failures_total Failed collection steps\n");
        out.push_str("# TYPE pimetrics_step_failures_total counter\n");
        for (step, count) in &h.step_failures {
            let _ = writeln!(
                out,
                "pimetrics_step_failures_total{{step=\"{}\"}} {}",
                escape_label(step),
                count
            );
        }
    }
    if let Some(secs) = h.last_cycle_secs {
        out.push_str("# HELP pimetrics_last_cycle_duration_seconds Duration of the last collection cycle\n");
        out.push_str("# TYPE pimetrics_last_cycle_duration_seconds gauge\n");
        let _ = writeln!(out, "pimetrics_last_cycle_duration_seconds {}", format_value(secs));
    }
    if let Some(ts) = h.last_cycle_unix {
        out.push_str("# HELP pimetrics_last_cycle_timestamp_seconds End of the last collection cycle\n");
        out.push_str("# TYPE pimetrics_last_cycle_timestamp_seconds gauge\n");
        let _ = writeln!(out, "pimetrics_last_cycle_timestamp_seconds {ts}");
    }
    out
}

fn format_value(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v == f64::INFINITY {
        "+Inf".to_string()
    } else if v == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        v.to_string()
    }
}

fn escape_label(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn escape_help(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\n', "\\n")
}
