//! Shared utilities for the claudix crates
//!
//! Small, dependency-light helpers used by more than one crate: atomic JSON
//! persistence for host-side state and a single place to install the
//! `tracing` subscriber.

pub mod json_store;
pub mod logging;

pub use json_store::{
    load_json, load_json_or_default, save_json_atomic, JsonStoreError, JsonStoreResult,
};
pub use logging::{format_error, init_logging, LogLevel};
