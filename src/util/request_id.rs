//! Request and connection identifiers for log correlation.

use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Counter for connection ids.
static CONNECTION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Identifier attached to a request or connection in logs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    /// A random UUID, unique across processes.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// A process-local id of the form `conn-{counter:016x}`.
    pub fn short() -> Self {
        let count = CONNECTION_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self(format!("conn-{:016x}", count))
    }

    /// Use an id supplied by the client.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
