//! Purpose: Per-invocation client configuration and the result types of non-range calls.
//! Exports: `ClientConfig`, `StatusResponse`, `DeleteResponse`, `ApiResult`.
//! Role: Replaces process-wide flag state; the CLI builds one `ClientConfig` per command.
//! Invariants: Defaults match the CLI flag defaults (localhost:8443, 10s op, 2s dial).
use crate::core::error::Error;
use crate::core::page::KeyValue;
use std::path::PathBuf;
use std::time::Duration;

pub type ApiResult<T> = Result<T, Error>;

pub const DEFAULT_ENDPOINT: &str = "localhost:8443";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// `host:port` or a full `http(s)://host:port` URL; bare hosts imply https.
    pub endpoint: String,
    /// Skip server certificate verification.
    pub insecure: bool,
    /// PEM file with the CA (or self-signed certificate) to trust.
    pub cert: Option<PathBuf>,
    /// Deadline for the whole operation, across every request it makes.
    pub timeout: Duration,
    pub dial_timeout: Duration,
}

impl ClientConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            insecure: false,
            cert: None,
            timeout: DEFAULT_TIMEOUT,
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatusResponse {
    pub version: String,
    /// Table names, sorted.
    pub tables: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeleteResponse {
    pub deleted: i64,
    pub prev_kvs: Vec<KeyValue>,
}
