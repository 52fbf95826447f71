//! Integration tests for promsvc.
//!
//! These tests run the real server on an ephemeral port and talk to it over
//! plain TCP.

use promsvc::config::{Config, load_config};
use promsvc::export::Exporter;
use promsvc::metrics::Registry;
use promsvc::server::ServiceServer;
use promsvc::state::AppState;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

/// Start a server on 127.0.0.1:0.
async fn start_service(
    configure: impl FnOnce(&mut Config),
) -> (SocketAddr, AppState, JoinHandle<()>) {
    let mut config = Config::default();
    config.server.listen = "127.0.0.1:0".parse().unwrap();
    config.server.load_delay = Duration::from_millis(1);
    configure(&mut config);

    let state = AppState::new(config).expect("failed to create state");
    let server = ServiceServer::bind(state.clone()).await.expect("failed to bind");
    let addr = server.local_addr().unwrap();
    let handle = tokio::spawn(server.run(state.shutdown().subscribe()));

    (addr, state, handle)
}

/// Send one request and return the status code and body.
async fn request(addr: SocketAddr, method: &str, path: &str) -> (u16, String) {
    let mut stream = TcpStream::connect(addr).await.expect("failed to connect");
    let request = format!(
        "{} {} HTTP/1.1\r\nHost: localhost\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        method, path
    );
    stream.write_all(request.as_bytes()).await.expect("failed to write");

    let mut response = String::new();
    stream.read_to_string(&mut response).await.expect("failed to read");

    let status = response
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .expect("malformed status line");
    let body = response
        .split_once("\r\n\r\n")
        .map(|(_, body)| body.to_string())
        .unwrap_or_default();

    (status, body)
}

fn line_value(exposition: &str, series: &str) -> Option<f64> {
    exposition
        .lines()
        .find_map(|line| line.strip_prefix(series)?.strip_prefix(' ')?.parse().ok())
}

#[tokio::test]
async fn test_metrics_endpoint_counts_requests() {
    let (addr, state, _handle) = start_service(|_| {}).await;

    for _ in 0..3 {
        let (status, body) = request(addr, "GET", "/health").await;
        assert_eq!(status, 200);
        assert!(body.contains("healthy"));
    }
    let (status, _) = request(addr, "GET", "/does-not-exist").await;
    assert_eq!(status, 404);

    let (status, metrics) = request(addr, "GET", "/metrics").await;
    assert_eq!(status, 200);

    assert!(metrics.contains("# HELP http_requests_total Total HTTP requests"));
    assert!(metrics.contains("# TYPE http_requests_total counter"));
    assert!(metrics.contains("# TYPE http_request_duration_seconds histogram"));
    assert_eq!(
        line_value(
            &metrics,
            "http_requests_total{method=\"GET\",route=\"/health\",status=\"2xx\"}"
        ),
        Some(3.0)
    );
    assert_eq!(
        line_value(
            &metrics,
            "http_requests_total{method=\"GET\",route=\"unmatched\",status=\"4xx\"}"
        ),
        Some(1.0)
    );
    assert_eq!(
        line_value(
            &metrics,
            "http_request_duration_seconds_count{method=\"GET\",route=\"/health\"}"
        ),
        Some(3.0)
    );
    assert!(!metrics.contains("/does-not-exist"));

    state.trigger_shutdown();
}

#[tokio::test]
async fn test_in_flight_returns_to_zero() {
    let (addr, state, _handle) = start_service(|_| {}).await;

    let requests: Vec<_> = (0..20)
        .map(|i| tokio::spawn(async move { request(addr, "GET", &format!("/items/{}", i)).await }))
        .collect();
    for r in requests {
        let (status, _) = r.await.unwrap();
        assert_eq!(status, 200);
    }
    request(addr, "POST", "/simulate-load").await;

    assert_eq!(state.metrics().in_flight().get(), 0.0);

    let (_, metrics) = request(addr, "GET", "/metrics").await;
    assert_eq!(
        line_value(
            &metrics,
            "http_requests_total{method=\"GET\",route=\"/items/{id}\",status=\"2xx\"}"
        ),
        Some(20.0)
    );
    // Only the scrape itself was in flight.
    assert_eq!(line_value(&metrics, "http_requests_in_flight"), Some(1.0));

    state.trigger_shutdown();
}

#[tokio::test]
async fn test_method_not_allowed() {
    let (addr, state, _handle) = start_service(|_| {}).await;

    let (status, _) = request(addr, "GET", "/simulate-render").await;
    assert_eq!(status, 405);
    let (status, _) = request(addr, "POST", "/metrics").await;
    assert_eq!(status, 405);

    state.trigger_shutdown();
}

#[tokio::test]
async fn test_unreachable_collector_keeps_serving() {
    // Reserve a port, then free it so nothing is listening there.
    let dead = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let (addr, state, server) = start_service(|config| {
        config.export.collector_url = Some(format!("http://{}/metrics/job/promsvc", dead));
        config.export.interval = Duration::from_millis(50);
        config.export.timeout = Duration::from_millis(40);
    })
    .await;

    let exporter = Exporter::from_config(&state.config().export, state.metrics().clone())
        .expect("failed to create exporter")
        .expect("export enabled");
    let exporter = tokio::spawn(exporter.run(state.shutdown().subscribe()));

    let failures = |state: &AppState| {
        state
            .metrics()
            .registry()
            .snapshot()
            .family("metrics_exports_total")
            .and_then(|f| f.get(&["failure"]).and_then(|v| v.as_counter()))
            .unwrap_or(0)
    };

    tokio::time::timeout(Duration::from_secs(10), async {
        while failures(&state) < 3 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("exporter did not run three cycles");

    let (status, metrics) = request(addr, "GET", "/metrics").await;
    assert_eq!(status, 200);
    let reported = line_value(&metrics, "metrics_exports_total{result=\"failure\"}").unwrap();
    assert!(reported >= 3.0);

    state.trigger_shutdown();
    tokio::time::timeout(Duration::from_secs(2), async {
        exporter.await.unwrap();
        server.await.unwrap();
    })
    .await
    .expect("tasks did not stop");
}

#[test]
fn test_requests_total_scenario() {
    let registry = Registry::new();
    let requests = registry
        .register_counter("requests_total", "Requests", &["method", "status"])
        .unwrap();

    for _ in 0..3 {
        requests.series(&["GET", "200"]).unwrap().inc();
    }
    requests.series(&["GET", "500"]).unwrap().inc();

    let text = registry.encode();
    assert!(text.contains("requests_total{method=\"GET\",status=\"200\"} 3\n"));
    assert!(text.contains("requests_total{method=\"GET\",status=\"500\"} 1\n"));
}

#[test]
fn test_idle_snapshot_is_byte_stable() {
    let registry = Registry::new();
    let counter = registry
        .register_counter("jobs_total", "Jobs", &["queue"])
        .unwrap();
    let histogram = registry
        .register_histogram("latency_seconds", "Latency", &[], &[0.1, 1.0])
        .unwrap();
    counter.series(&["a"]).unwrap().inc_by(4);
    histogram.unlabelled().unwrap().observe(0.5);

    let first = registry.encode();
    let second = registry.encode();
    assert_eq!(first, second);
}

#[test]
fn test_config_parsing() {
    use std::io::Write;
    use tempfile::NamedTempFile;

    let config_content = r#"
global:
  log_level: info

server:
  listen: "127.0.0.1:0"
  metrics_path: /internal/metrics

export:
  sink: none
"#;

    let mut temp_file = NamedTempFile::new().expect("failed to create temp file");
    temp_file
        .write_all(config_content.as_bytes())
        .expect("failed to write config");

    let config = load_config(temp_file.path()).expect("failed to load config");

    assert_eq!(config.server.metrics_path, "/internal/metrics");
    assert_eq!(config.export.sink, promsvc::config::SinkKind::None);
    assert_eq!(config.export.interval, Duration::from_secs(15));
}
