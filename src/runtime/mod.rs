//! Runtime facade and public API
//!
//! A [`Runtime`] owns the collaborators shared by all invocations and builds
//! one [`ExecutionEnvironment`] per call. Dispatch code (HTTP handlers, event
//! routers) creates an environment with the caller's [`Auth`] and the tenant
//! database, then calls [`ExecutionEnvironment::execute`].

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Handle;

// Submodules
pub mod auth;
pub mod bindings;
pub mod document;
pub mod environment;
pub mod error;
pub mod function;
pub mod ids;
pub mod memory;
pub mod ports;
pub mod query;
pub mod recorder;
pub mod sanitize;
pub mod trigger;
pub mod value;

/// Configuration for the function runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Heap limit per interpreter instance, in bytes (0 disables)
    pub memory_limit: usize,

    /// Interpreter stack limit, in bytes (0 disables)
    pub max_stack_size: usize,

    /// Allocation volume that triggers a GC cycle, in bytes
    pub gc_threshold: Option<usize>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            memory_limit: 32 * 1024 * 1024,
            max_stack_size: 1024 * 1024,
            gc_threshold: None,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file; missing fields take defaults
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        Ok(config)
    }

    /// Write configuration as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;
        Ok(())
    }

    /// Apply engine limits to a freshly created interpreter runtime
    pub fn apply_limits(&self, engine: &rquickjs::Runtime) {
        if self.memory_limit > 0 {
            engine.set_memory_limit(self.memory_limit);
        }
        if self.max_stack_size > 0 {
            engine.set_max_stack_size(self.max_stack_size);
        }
        if let Some(threshold) = self.gc_threshold {
            engine.set_gc_threshold(threshold);
        }
    }
}

use auth::Auth;
use function::ExecData;
use ports::{Services, StoreHandle};
use recorder::CompletionRecorder;

/// Shared state for building execution environments
#[derive(Clone)]
pub struct Runtime {
    config: RuntimeConfig,
    services: Services,
    recorder: CompletionRecorder,
}

impl Runtime {
    /// Create a runtime whose run records are persisted on `runner`
    pub fn new(config: RuntimeConfig, services: Services, runner: Handle) -> Self {
        let recorder = CompletionRecorder::new(Arc::clone(&services.history), runner);
        Self {
            config,
            services,
            recorder,
        }
    }

    /// Create a runtime bound to the ambient tokio runtime
    pub fn from_current(config: RuntimeConfig, services: Services) -> anyhow::Result<Self> {
        let runner = Handle::try_current().context("No tokio runtime available")?;
        Ok(Self::new(config, services, runner))
    }

    /// Get the current configuration
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Get the shared collaborators
    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Build the environment for one invocation
    pub fn environment(&self, auth: Auth, store: StoreHandle, data: ExecData) -> ExecutionEnvironment {
        ExecutionEnvironment::new(
            auth,
            store,
            data,
            self.services.clone(),
            self.recorder.clone(),
            self.config.clone(),
        )
    }
}

// Re-export commonly used types
pub use environment::ExecutionEnvironment;
pub use error::ExecutionError;
pub use trigger::{HttpRequest, TriggerPayload};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limits() {
        let config = RuntimeConfig::default();
        assert_eq!(config.memory_limit, 32 * 1024 * 1024);
        assert_eq!(config.gc_threshold, None);
    }

    #[test]
    fn partial_config_json() {
        let config: RuntimeConfig = serde_json::from_str(r#"{"memory_limit": 1024}"#).unwrap();
        assert_eq!(config.memory_limit, 1024);
        assert_eq!(config.max_stack_size, RuntimeConfig::default().max_stack_size);
    }
}
