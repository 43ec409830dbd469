//! Purpose: Define the public Rust API boundary for the Regatta client.
//! Exports: Range engine types plus the remote client and its configuration.
//! Role: Single import path for the CLI and integration tests.
//! Invariants: The range engine stays transport-agnostic; only `remote` does I/O.

mod client;
mod remote;

pub use crate::core::error::{Error, ErrorKind, to_exit_code};
pub use crate::core::fetch::{BoundaryDedup, DedupPage, FetchSummary, fetch};
pub use crate::core::keys::{RangeQuery, SMALLEST_KEY, WILDCARD, prefix_end, resolve};
pub use crate::core::page::{GetOptions, KeyValue, Limited, Page, RangeProvider, apply_limit};
pub use crate::core::render::{OutputFormat, Render, RenderOptions, encode_text, renderer};
pub use client::{
    ApiResult, ClientConfig, DEFAULT_DIAL_TIMEOUT, DEFAULT_ENDPOINT, DEFAULT_TIMEOUT,
    DeleteResponse, StatusResponse,
};
pub use remote::RemoteClient;
