//! Request instrumentation middleware and route templates.

mod instrument;
mod route;

pub use instrument::{Instrumented, OTHER_METHOD, REQUEST_ID_HEADER, RequestGuard, method_label};
pub use route::{RouteMatch, RouteTable, UNMATCHED_ROUTE};
