//! Route table for the service endpoints.

use crate::middleware::RouteTable;
use hyper::Method;

/// Fixed paths the metrics endpoint may not be mounted on.
pub const BUILTIN_ROUTES: &[&str] = &[
    "/",
    "/health",
    "/status",
    "/simulate-load",
    "/simulate-render",
    "/generate-traffic",
    "/items/{id}",
];

/// Handler selected by the route table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endpoint {
    Root,
    Health,
    Status,
    Metrics,
    SimulateLoad,
    SimulateRender,
    GenerateTraffic,
    Item,
}

impl Endpoint {
    /// Short name used in responses and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Endpoint::Root => "root",
            Endpoint::Health => "health",
            Endpoint::Status => "status",
            Endpoint::Metrics => "metrics",
            Endpoint::SimulateLoad => "simulate-load",
            Endpoint::SimulateRender => "simulate-render",
            Endpoint::GenerateTraffic => "generate-traffic",
            Endpoint::Item => "item",
        }
    }
}

/// Build the route table, mounting the exposition endpoint at `metrics_path`.
pub fn routes(metrics_path: &str) -> RouteTable<Endpoint> {
    RouteTable::new()
        .route(Method::GET, metrics_path, Endpoint::Metrics)
        .route(Method::GET, "/", Endpoint::Root)
        .route(Method::GET, "/health", Endpoint::Health)
        .route(Method::GET, "/status", Endpoint::Status)
        .route(Method::POST, "/simulate-load", Endpoint::SimulateLoad)
        .route(Method::POST, "/simulate-render", Endpoint::SimulateRender)
        .route(Method::GET, "/generate-traffic", Endpoint::GenerateTraffic)
        .route(Method::GET, "/items/{id}", Endpoint::Item)
}
