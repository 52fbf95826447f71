//! Connection acceptor.
//!
//! Accepts TCP connections and serves each one on its own task with
//! HTTP/1.1 keep-alive.

use crate::middleware::{Instrumented, RouteTable};
use crate::server::{Endpoint, handle, routes};
use crate::state::AppState;
use crate::util::RequestId;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

/// HTTP server for the instrumented service.
pub struct ServiceServer {
    /// Shared state handed to every request.
    state: AppState,
    /// Route table, shared by all connections.
    routes: Arc<RouteTable<Endpoint>>,
    /// TCP listener.
    listener: TcpListener,
}

impl ServiceServer {
    /// Bind the configured listen address.
    pub async fn bind(state: AppState) -> std::io::Result<Self> {
        let addr = state.config().server.listen;
        let listener = TcpListener::bind(addr).await?;
        let routes = Arc::new(routes(&state.config().server.metrics_path));

        info!(
            listen = %listener.local_addr()?,
            metrics_path = %state.config().server.metrics_path,
            "server bound"
        );

        Ok(Self {
            state,
            routes,
            listener,
        })
    }

    /// Address actually bound (useful with port 0).
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Run the server, accepting connections until shutdown.
    ///
    /// Connections already accepted finish their in-progress requests.
    #[instrument(skip_all, fields(listen = ?self.listener.local_addr().ok()))]
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!("server starting");

        loop {
            tokio::select! {
                accept_result = self.listener.accept() => {
                    match accept_result {
                        Ok((stream, addr)) => {
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!(error = %e, "failed to accept connection");
                        }
                    }
                }

                _ = shutdown.recv() => {
                    info!("server shutting down");
                    break;
                }
            }
        }
    }

    /// Serve one connection on a new task.
    fn handle_connection(&self, stream: TcpStream, client_addr: SocketAddr) {
        if let Err(e) = stream.set_nodelay(true) {
            warn!(error = %e, "failed to set TCP_NODELAY on client connection");
        }

        let state = self.state.clone();
        let metrics = state.metrics().clone();
        let routes = Arc::clone(&self.routes);
        let connection_id = RequestId::short();

        tokio::spawn(async move {
            let start = Instant::now();

            let handler = service_fn(move |req: Request<Incoming>| handle(req, state.clone()));
            let service = Instrumented::new(handler, metrics, routes);

            let result = http1::Builder::new()
                .keep_alive(true)
                .serve_connection(TokioIo::new(stream), service)
                .await;

            let duration = start.elapsed();
            match result {
                Ok(()) => debug!(
                    client = %client_addr,
                    connection_id = %connection_id,
                    duration_ms = duration.as_millis(),
                    "connection closed"
                ),
                Err(e) => debug!(
                    client = %client_addr,
                    connection_id = %connection_id,
                    duration_ms = duration.as_millis(),
                    error = %e,
                    "connection ended with error"
                ),
            }
        });
    }
}
