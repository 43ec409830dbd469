//! Purpose: Library crate behind the `regatta-client` CLI and its tests.
//! Exports: `api` (public surface), `core` (range engine internals).
//! Role: Keeps range resolution, paging and rendering testable without a server.
//! Invariants: Core modules take explicit inputs; no process-wide flag state.
pub mod api;
pub mod core;
