//! Shared harness for integration tests.

#![allow(dead_code)]

use funcrun::runtime::auth::Auth;
use funcrun::runtime::function::{ExecData, ExecHistory};
use funcrun::runtime::memory::{MemoryHistory, MemoryPublisher, MemoryStore};
use funcrun::runtime::ports::{DocumentStore, Publisher, QueryParser, Services, StoreHandle};
use funcrun::runtime::query::ClauseParser;
use funcrun::runtime::{ExecutionError, TriggerPayload};
use funcrun::{Runtime, RuntimeConfig};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

pub struct Harness {
    pub runtime: Runtime,
    pub documents: Arc<MemoryStore>,
    pub publisher: Arc<MemoryPublisher>,
    pub history: Arc<MemoryHistory>,
    pub auth: Auth,
    pub store: StoreHandle,
}

impl Harness {
    /// Harness backed entirely by in-memory collaborators.
    ///
    /// Must be called from inside a tokio runtime.
    pub fn new() -> Self {
        Self::build(None, None, None)
    }

    /// Replace individual collaborators.
    pub fn build(
        documents: Option<Arc<dyn DocumentStore>>,
        parser: Option<Arc<dyn QueryParser>>,
        publisher: Option<Arc<dyn Publisher>>,
    ) -> Self {
        let memory_docs = Arc::new(MemoryStore::new());
        let memory_pub = Arc::new(MemoryPublisher::new());
        let history = Arc::new(MemoryHistory::new());

        let services = Services::new(
            documents.unwrap_or_else(|| memory_docs.clone() as Arc<dyn DocumentStore>),
            parser.unwrap_or_else(|| Arc::new(ClauseParser) as Arc<dyn QueryParser>),
            publisher.unwrap_or_else(|| memory_pub.clone() as Arc<dyn Publisher>),
            history.clone(),
        );
        let runtime = Runtime::from_current(RuntimeConfig::default(), services)
            .expect("tests run inside tokio");

        Self {
            runtime,
            documents: memory_docs,
            publisher: memory_pub,
            history,
            auth: Auth::new("tenant-account", "user-42", "session-token"),
            store: StoreHandle::new("tenant_db"),
        }
    }

    pub fn function(&self, code: &str) -> ExecData {
        ExecData::new("test-fn", "web", code).with_base(self.store.as_str())
    }

    pub fn run(
        &self,
        code: &str,
        payload: impl Into<TriggerPayload>,
    ) -> (ExecData, Result<(), ExecutionError>) {
        let data = self.function(code);
        let env = self
            .runtime
            .environment(self.auth.clone(), self.store.clone(), data.clone());
        let outcome = env.execute(payload);
        (data, outcome)
    }

    /// Wait for the detached recorder to deliver `count` runs.
    pub async fn runs(&self, data: &ExecData, count: usize) -> Vec<ExecHistory> {
        self.history
            .wait_for_runs(&data.id, count, Duration::from_secs(5))
            .await
    }

    /// Run a script and return its single recorded run.
    pub async fn run_recorded(
        &self,
        code: &str,
        payload: impl Into<TriggerPayload>,
    ) -> (Result<(), ExecutionError>, ExecHistory) {
        let (data, outcome) = self.run(code, payload);
        let mut runs = self.runs(&data, 1).await;
        assert_eq!(runs.len(), 1, "expected exactly one recorded run");
        (outcome, runs.remove(0))
    }
}

/// Log lines between the start and completion markers, parsed as JSON.
pub fn json_lines(run: &ExecHistory) -> Vec<Value> {
    run.output
        .iter()
        .skip(1)
        .take_while(|line| line.as_str() != "Function completed")
        .map(|line| serde_json::from_str(line).expect("log line should be JSON"))
        .collect()
}

pub fn event() -> Value {
    Value::Null
}
