//! Observability for AeroStore
//!
//! Storage operations emit `tracing` events; this module installs the
//! subscriber that renders them.

mod logger;

pub use logger::{init_logging, LogFormat, Severity};
