//! Request instrumentation.
//!
//! [`Instrumented`] wraps a hyper service and records, for every request,
//! one increment of `http_requests_total`, one observation of
//! `http_request_duration_seconds` and a balanced inc/dec of the in-flight
//! gauge. Recording happens in [`RequestGuard`]'s `Drop`, so it also runs
//! when the handler fails, panics, or the connection goes away mid-request.
//!
//! Each request carries a [`RequestId`], taken from the `x-request-id`
//! header when the client sent one, and echoed on the response.

use crate::metrics::ServiceMetrics;
use crate::middleware::RouteTable;
use crate::util::RequestId;
use bytes::Bytes;
use futures::FutureExt;
use http_body_util::Full;
use hyper::header::HeaderValue;
use hyper::service::Service;
use hyper::{Method, Request, Response, StatusCode};
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Status recorded when a request ends without a response.
const NO_RESPONSE_STATUS: u16 = 500;

/// Header carrying the request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Methods recorded under their own name in the `method` label.
static STANDARD_METHODS: [Method; 9] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::HEAD,
    Method::OPTIONS,
    Method::PATCH,
    Method::CONNECT,
    Method::TRACE,
];

/// Label shared by every extension method.
pub const OTHER_METHOD: &str = "other";

/// `method` label value for a request; extension methods collapse to
/// [`OTHER_METHOD`] so clients cannot mint new series.
pub fn method_label(method: &Method) -> &'static str {
    STANDARD_METHODS
        .iter()
        .find(|m| *m == method)
        .map_or(OTHER_METHOD, Method::as_str)
}

/// Scoped record of one in-flight request.
pub struct RequestGuard {
    metrics: ServiceMetrics,
    method: String,
    route: String,
    request_id: RequestId,
    start: Instant,
    status: Option<u16>,
}

impl RequestGuard {
    /// Mark a request as started.
    pub fn start(
        metrics: &ServiceMetrics,
        method: &str,
        route: &str,
        request_id: RequestId,
    ) -> Self {
        metrics.in_flight().inc();
        Self {
            metrics: metrics.clone(),
            method: method.to_string(),
            route: route.to_string(),
            request_id,
            start: Instant::now(),
            status: None,
        }
    }

    /// Status code to record when the guard is dropped.
    pub fn set_status(&mut self, status: u16) {
        self.status = Some(status);
    }

    /// Time since the request started.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        self.metrics.in_flight().dec();

        let duration = self.start.elapsed();
        let status = self.status.unwrap_or(NO_RESPONSE_STATUS);

        if let Err(e) = self
            .metrics
            .record_request(&self.method, &self.route, status, duration)
        {
            error!(error = %e, route = %self.route, "failed to record request metrics");
        }
        self.metrics.refresh_uptime();

        info!(
            request_id = %self.request_id,
            method = %self.method,
            route = %self.route,
            status,
            completed = self.status.is_some(),
            duration_ms = duration.as_millis(),
            "request completed"
        );
    }
}

/// Service wrapper that instruments every request.
///
/// The resolved [`RouteMatch`](crate::middleware::RouteMatch) and the
/// [`RequestId`] are inserted into the request extensions so the inner
/// service does not resolve them again.
pub struct Instrumented<S, T> {
    inner: S,
    metrics: ServiceMetrics,
    routes: Arc<RouteTable<T>>,
}

impl<S: Clone, T> Clone for Instrumented<S, T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            metrics: self.metrics.clone(),
            routes: Arc::clone(&self.routes),
        }
    }
}

impl<S, T> Instrumented<S, T> {
    /// Wrap `inner`.
    pub fn new(inner: S, metrics: ServiceMetrics, routes: Arc<RouteTable<T>>) -> Self {
        Self {
            inner,
            metrics,
            routes,
        }
    }
}

type BoxFuture<R, E> = Pin<Box<dyn Future<Output = Result<R, E>> + Send>>;

impl<S, T, B> Service<Request<B>> for Instrumented<S, T>
where
    S: Service<Request<B>, Response = Response<Full<Bytes>>>,
    S::Future: Send + 'static,
    S::Error: fmt::Display + Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    type Response = Response<Full<Bytes>>;
    type Error = S::Error;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn call(&self, mut req: Request<B>) -> Self::Future {
        let route = self.routes.resolve(req.method(), req.uri().path());
        let request_id = req
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(RequestId::from_string)
            .unwrap_or_default();

        let mut guard = RequestGuard::start(
            &self.metrics,
            method_label(req.method()),
            route.template(),
            request_id.clone(),
        );
        req.extensions_mut().insert(route);
        req.extensions_mut().insert(request_id.clone());

        let future = match std::panic::catch_unwind(AssertUnwindSafe(|| self.inner.call(req))) {
            Ok(future) => future,
            Err(panic) => {
                error!(panic = %panic_message(&*panic), "handler panicked");
                guard.set_status(NO_RESPONSE_STATUS);
                return Box::pin(async move {
                    drop(guard);
                    Ok(with_request_id(internal_error_response(), &request_id))
                });
            }
        };

        Box::pin(async move {
            match AssertUnwindSafe(future).catch_unwind().await {
                Ok(Ok(response)) => {
                    guard.set_status(response.status().as_u16());
                    Ok(with_request_id(response, &request_id))
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "handler returned an error");
                    guard.set_status(NO_RESPONSE_STATUS);
                    Err(e)
                }
                Err(panic) => {
                    error!(panic = %panic_message(&*panic), "handler panicked");
                    guard.set_status(NO_RESPONSE_STATUS);
                    Ok(with_request_id(internal_error_response(), &request_id))
                }
            }
        })
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn with_request_id(mut response: Response<Full<Bytes>>, id: &RequestId) -> Response<Full<Bytes>> {
    if let Ok(value) = HeaderValue::from_str(id.as_str()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

fn internal_error_response() -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(b"Internal server error\n")));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}
