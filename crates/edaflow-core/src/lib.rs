//! `edaflow` core library
//!
//! Shared functionality for driving batch EDA tools:
//! - Report extraction for synthesis and place-and-route reports
//! - Indentation-based hierarchy reconstruction
//! - Tool option and flow configuration loading
//! - Stage manifests
//! - Common error types

pub mod config;
pub mod error;
pub mod manifest;
pub mod report;
pub mod tracing_init;

pub use config::{FlowConfig, ToolOptions, Toolchain};
pub use error::{Error, Result};
pub use manifest::Manifest;
