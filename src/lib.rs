//! promsvc - an instrumented HTTP service with periodic metrics export
//!
//! This crate provides:
//! - A metrics registry with counters, gauges and histograms over labelled
//!   series, and Prometheus text exposition
//! - Request instrumentation middleware for hyper services
//! - A fixed-interval exporter that pushes snapshots to a pluggable sink
//! - A small HTTP service exposing `/metrics` and simulated workloads

pub mod config;
pub mod export;
pub mod metrics;
pub mod middleware;
pub mod server;
pub mod state;
pub mod util;

pub use config::Config;
