//! Funcrun – sandboxed execution of tenant-supplied functions
//!
//! This crate runs small pieces of tenant logic attached to HTTP requests,
//! system events or pub/sub topics:
//! - A fresh, isolated QuickJS interpreter per invocation
//! - A fixed capability surface scoped to the caller: logging, document
//!   CRUD and query, real-time messaging
//! - Uniform entry point arguments for every trigger shape
//! - An audit record per run, persisted in the background

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Execution core: environment, capabilities, trigger adaptation, recording
pub mod runtime;

// Re-export key types for convenience
pub use runtime::{ExecutionEnvironment, ExecutionError, Runtime, RuntimeConfig};

/// Current version of the funcrun crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
