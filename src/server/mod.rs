//! HTTP server.
//!
//! Serves the liveness, status and exposition endpoints plus a few simulated
//! workloads, all behind the request instrumentation middleware.

mod handlers;
mod listener;
mod routes;

pub use handlers::handle;
pub use listener::ServiceServer;
pub use routes::{BUILTIN_ROUTES, Endpoint, routes};
