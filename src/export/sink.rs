//! Export destinations.

use crate::metrics::TEXT_CONTENT_TYPE;
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::CONTENT_TYPE;
use hyper::{Request, StatusCode, Uri};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Errors from a single delivery attempt.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("invalid export request: {0}")]
    Request(String),

    #[error("failed to reach collector: {0}")]
    Connect(String),

    #[error("collector responded with {0}")]
    Status(StatusCode),

    #[error("export timed out after {}", humantime::format_duration(*.0))]
    Timeout(Duration),
}

/// Destination for exported snapshots.
#[async_trait]
pub trait MetricsSink: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Deliver one encoded snapshot.
    async fn deliver(&self, payload: String) -> Result<(), ExportError>;
}

/// Sink that POSTs the exposition text to a collector, pushgateway style.
pub struct HttpPushSink {
    client: Client<HttpConnector, Full<Bytes>>,
    uri: Uri,
}

impl HttpPushSink {
    /// Create a sink for an `http://` collector URL.
    pub fn new(url: &str) -> Result<Self, ExportError> {
        let uri: Uri = url
            .parse()
            .map_err(|e| ExportError::Request(format!("invalid collector URL '{}': {}", url, e)))?;

        if uri.scheme_str() != Some("http") || uri.host().is_none() {
            return Err(ExportError::Request(format!(
                "collector URL '{}' must be an absolute http:// URL",
                url
            )));
        }

        let client = Client::builder(TokioExecutor::new()).build_http();

        Ok(Self { client, uri })
    }

    /// Target URL.
    pub fn uri(&self) -> &Uri {
        &self.uri
    }
}

#[async_trait]
impl MetricsSink for HttpPushSink {
    fn name(&self) -> &str {
        "http"
    }

    async fn deliver(&self, payload: String) -> Result<(), ExportError> {
        let request = Request::post(self.uri.clone())
            .header(CONTENT_TYPE, TEXT_CONTENT_TYPE)
            .body(Full::new(Bytes::from(payload)))
            .map_err(|e| ExportError::Request(e.to_string()))?;

        let response = self.client.request(request).await.map_err(|e| {
            if e.is_connect() {
                ExportError::Connect(e.to_string())
            } else {
                ExportError::Request(e.to_string())
            }
        })?;

        let status = response.status();

        // Drain the body so the connection can go back to the pool.
        if let Err(e) = response.into_body().collect().await {
            debug!(error = %e, "failed to read collector response body");
        }

        if status.is_success() {
            Ok(())
        } else {
            Err(ExportError::Status(status))
        }
    }
}
