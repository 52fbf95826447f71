//! Endpoint handlers.

use crate::config::SinkKind;
use crate::metrics::{RenderOutcome, TEXT_CONTENT_TYPE};
use crate::middleware::RouteMatch;
use crate::server::Endpoint;
use crate::state::AppState;
use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{CONTENT_TYPE, HeaderValue};
use hyper::{Request, Response, StatusCode};
use rand::Rng;
use serde_json::{Value, json};
use std::convert::Infallible;
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, error};

/// Pause between synthetic operations in `/generate-traffic`.
const TRAFFIC_PAUSE: Duration = Duration::from_millis(50);

/// Operations `/generate-traffic` picks from.
const SYNTHETIC_ENDPOINTS: [Endpoint; 3] =
    [Endpoint::Health, Endpoint::Status, Endpoint::SimulateLoad];

/// Dispatch a request that has been through the instrumentation middleware.
///
/// Routing has already happened: the [`RouteMatch`] is read from the request
/// extensions. A request without one is treated as unmatched.
pub async fn handle<B>(
    req: Request<B>,
    state: AppState,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let route = req
        .extensions()
        .get::<RouteMatch<Endpoint>>()
        .cloned()
        .unwrap_or(RouteMatch::NotFound);
    let path = req.uri().path().to_string();
    drop(req);

    let response = match &route {
        RouteMatch::Found { target, .. } => match target {
            Endpoint::Root => root(&state),
            Endpoint::Health => health(&state),
            Endpoint::Status => status(&state),
            Endpoint::Metrics => metrics(&state),
            Endpoint::SimulateLoad => simulate_load(&state).await,
            Endpoint::SimulateRender => simulate_render(&state).await,
            Endpoint::GenerateTraffic => generate_traffic(&state).await,
            Endpoint::Item => item(route.param("id").unwrap_or_default()),
        },
        RouteMatch::MethodNotAllowed { template } => {
            debug!(path = %path, template = %template, "method not allowed");
            json_response(
                StatusCode::METHOD_NOT_ALLOWED,
                &json!({ "detail": "Method Not Allowed" }),
            )
        }
        RouteMatch::NotFound => {
            debug!(path = %path, "no route matched");
            json_response(StatusCode::NOT_FOUND, &json!({ "detail": "Not Found" }))
        }
    };

    Ok(response)
}

fn root(state: &AppState) -> Response<Full<Bytes>> {
    let metrics_path = &state.config().server.metrics_path;
    json_response(
        StatusCode::OK,
        &json!({
            "message": "Metrics Prototype Service",
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": timestamp(),
            "uptime_seconds": state.metrics().uptime().as_secs_f64(),
            "endpoints": [
                "GET /",
                "GET /health",
                "GET /status",
                format!("GET {}", metrics_path),
                "POST /simulate-load",
                "POST /simulate-render",
                "GET /generate-traffic",
                "GET /items/{id}",
            ],
        }),
    )
}

fn health(state: &AppState) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::OK,
        &json!({
            "status": "healthy",
            "timestamp": timestamp(),
            "uptime_seconds": state.metrics().uptime().as_secs_f64(),
        }),
    )
}

fn status(state: &AppState) -> Response<Full<Bytes>> {
    let config = state.config();
    let collector_url = match config.export.sink {
        SinkKind::Http => config.export.collector_url.as_deref(),
        SinkKind::None => None,
    };

    json_response(
        StatusCode::OK,
        &json!({
            "status": "running",
            "timestamp": timestamp(),
            "uptime_seconds": state.metrics().uptime().as_secs_f64(),
            "metrics_endpoint": config.server.metrics_path,
            "metric_families": state.metrics().registry().len(),
            "registered_series": state.metrics().registry().snapshot().series_count(),
            "collector_url": collector_url,
            "export_interval": humantime::format_duration(config.export.interval).to_string(),
        }),
    )
}

fn metrics(state: &AppState) -> Response<Full<Bytes>> {
    let body = state.metrics().encode();
    let mut response = Response::new(Full::new(Bytes::from(body)));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(TEXT_CONTENT_TYPE));
    response
}

async fn simulate_load(state: &AppState) -> Response<Full<Bytes>> {
    let delay = state.config().server.load_delay;
    tokio::time::sleep(delay).await;

    json_response(
        StatusCode::OK,
        &json!({
            "message": "Load simulated",
            "processing_time": format!("{:.3}s", delay.as_secs_f64()),
            "timestamp": timestamp(),
        }),
    )
}

async fn simulate_render(state: &AppState) -> Response<Full<Bytes>> {
    let server = &state.config().server;

    // ThreadRng is not Send; settle the job before the first await.
    let (delay, outcome) = {
        let mut rng = rand::thread_rng();
        let delay = Duration::from_secs_f64(rng.gen_range(
            server.render_delay.min.as_secs_f64()..=server.render_delay.max.as_secs_f64(),
        ));
        let outcome = if rng.r#gen::<f64>() >= server.render_failure_rate {
            RenderOutcome::Success
        } else {
            RenderOutcome::Failed
        };
        (delay, outcome)
    };

    tokio::time::sleep(delay).await;

    if let Err(e) = state.metrics().record_render_job(outcome) {
        error!(error = %e, "failed to record render job");
    }

    json_response(
        StatusCode::OK,
        &json!({
            "message": format!("Render job {}", outcome.as_str()),
            "processing_time": format!("{:.2}s", delay.as_secs_f64()),
            "status": outcome.as_str(),
            "timestamp": timestamp(),
        }),
    )
}

async fn generate_traffic(state: &AppState) -> Response<Full<Bytes>> {
    let plan: Vec<Endpoint> = {
        let mut rng = rand::thread_rng();
        let count = rng.gen_range(5..=10);
        (0..count)
            .map(|_| SYNTHETIC_ENDPOINTS[rng.gen_range(0..SYNTHETIC_ENDPOINTS.len())])
            .collect()
    };

    let mut details = Vec::with_capacity(plan.len());
    for endpoint in plan {
        let start = Instant::now();
        if endpoint == Endpoint::SimulateLoad {
            simulate_load(state).await;
        }
        details.push(json!({
            "endpoint": endpoint.name(),
            "duration": format!("{:.3}s", start.elapsed().as_secs_f64()),
        }));

        tokio::time::sleep(TRAFFIC_PAUSE).await;
    }

    json_response(
        StatusCode::OK,
        &json!({
            "message": "Traffic generated",
            "requests_made": details.len(),
            "details": details,
            "timestamp": timestamp(),
        }),
    )
}

fn item(id: &str) -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, &json!({ "id": id }))
}

fn json_response(status: StatusCode, body: &Value) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn timestamp() -> String {
    humantime::format_rfc3339_millis(SystemTime::now()).to_string()
}
