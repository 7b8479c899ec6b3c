use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use pimetrics::exposition::MetricsServer;
use pimetrics::health::HealthTracker;
use pimetrics::registry::{Labels, Registry};

fn start() -> (SocketAddr, Arc<Registry>, Arc<Mutex<HealthTracker>>) {
    let registry = Arc::new(Registry::new());
    let health = Arc::new(Mutex::new(HealthTracker::new()));
    let server = MetricsServer::bind(
        "127.0.0.1:0".parse().unwrap(),
        Arc::clone(&registry),
        Arc::clone(&health),
    )
    .expect("bind metrics server");
    let addr = server.local_addr().expect("ip listener");
    thread::spawn(move || server.run());
    (addr, registry, health)
}

fn request(addr: SocketAddr, method: &str, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).expect("connect");
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    write!(
        stream,
        "{method} {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\nContent-Length: 0\r\n\r\n"
    )
    .unwrap();
    let mut buf = String::new();
    stream.read_to_string(&mut buf).expect("read response");
    buf
}

#[test]
fn serves_registry_contents_on_metrics() {
    let (addr, registry, health) = start();
    registry.set("m", Labels::new([("k", "v")]), 1.5);

    let resp = request(addr, "GET", "/metrics");
    assert!(resp.starts_with("HTTP/1.1 200"), "{resp}");
    assert!(resp.to_ascii_lowercase().contains("content-type: text/plain; version=0.0.4"));
    assert!(resp.contains("\r\n\r\n"));
    assert!(resp.lines().any(|l| l == "m{k=\"v\"} 1.5"), "{resp}");
    assert_eq!(health.lock().unwrap().get_health().scrapes, 1);
}

#[test]
fn reflects_later_writes_on_next_scrape() {
    let (addr, registry, _health) = start();
    registry.set("x", Labels::new([("a", "1")]), 5.0);
    let first = request(addr, "GET", "/metrics");
    assert!(first.lines().any(|l| l == "x{a=\"1\"} 5"), "{first}");
    registry.set("x", Labels::new([("a", "1")]), 7.0);
    let resp = request(addr, "GET", "/metrics?format=text");
    assert!(resp.lines().any(|l| l == "x{a=\"1\"} 7"), "{resp}");
    assert!(!resp.lines().any(|l| l == "x{a=\"1\"} 5"));
}

#[test]
fn unknown_paths_and_methods_are_rejected() {
    let (addr, _registry, health) = start();
    assert!(request(addr, "GET", "/").starts_with("HTTP/1.1 404"));
    assert!(request(addr, "GET", "/debug/snapshot").starts_with("HTTP/1.1 404"));
    assert!(request(addr, "POST", "/metrics").starts_with("HTTP/1.1 405"));
    assert_eq!(health.lock().unwrap().get_health().scrapes, 0);
}
