//! Collaborator interfaces consumed by the execution core
//!
//! Concrete backends live outside this crate; [`super::memory`] provides
//! in-process implementations. All calls are synchronous from the script's
//! point of view, and implementations must be safe to share between
//! concurrently running invocations.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use super::auth::Auth;
use super::document::{Document, ListParams, PagedResult, RawDocument};
use super::error::{PersistenceError, PublishError, QueryError, StoreResult};
use super::function::{Command, ExecHistory};
use super::ids::ObjectId;
use super::query::Filter;

/// Name of a tenant's database
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoreHandle(pub String);

impl StoreHandle {
    /// Create a handle
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Database name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tenant-scoped document CRUD.
pub trait DocumentStore: Send + Sync {
    /// Insert a document and return it as stored
    fn add(
        &self,
        auth: &Auth,
        store: &StoreHandle,
        collection: &str,
        doc: Document,
    ) -> StoreResult<RawDocument>;

    /// List a collection page
    fn list(
        &self,
        auth: &Auth,
        store: &StoreHandle,
        collection: &str,
        params: &ListParams,
    ) -> StoreResult<PagedResult<RawDocument>>;

    /// Fetch one document
    fn get_by_id(
        &self,
        auth: &Auth,
        store: &StoreHandle,
        collection: &str,
        id: &str,
    ) -> StoreResult<RawDocument>;

    /// Run a parsed filter against a collection
    fn query(
        &self,
        auth: &Auth,
        store: &StoreHandle,
        collection: &str,
        filter: &Filter,
        params: &ListParams,
    ) -> StoreResult<PagedResult<RawDocument>>;

    /// Merge fields into a document and return the result
    fn update(
        &self,
        auth: &Auth,
        store: &StoreHandle,
        collection: &str,
        id: &str,
        doc: Document,
    ) -> StoreResult<RawDocument>;

    /// Delete a document, returning the number removed
    fn delete(
        &self,
        auth: &Auth,
        store: &StoreHandle,
        collection: &str,
        id: &str,
    ) -> StoreResult<u64>;
}

/// Translates `[field, operator, value]` clauses into a backend filter.
pub trait QueryParser: Send + Sync {
    /// Parse clauses in order
    fn parse(&self, clauses: &[Vec<Value>]) -> Result<Filter, QueryError>;
}

/// Real-time message bus.
pub trait Publisher: Send + Sync {
    /// Publish one envelope
    fn publish(&self, msg: Command) -> Result<(), PublishError>;
}

/// Persistence of run records.
pub trait HistoryStore: Send + Sync {
    /// Append a finished run to a function's history
    fn record_run(
        &self,
        store: &StoreHandle,
        function_id: &ObjectId,
        run: ExecHistory,
    ) -> Result<(), PersistenceError>;
}

/// Collaborators shared by every invocation.
#[derive(Clone)]
pub struct Services {
    /// Document store facade
    pub documents: Arc<dyn DocumentStore>,
    /// Query clause parser
    pub parser: Arc<dyn QueryParser>,
    /// Message bus publisher
    pub publisher: Arc<dyn Publisher>,
    /// Run-history persistence
    pub history: Arc<dyn HistoryStore>,
}

impl Services {
    /// Bundle collaborators
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        parser: Arc<dyn QueryParser>,
        publisher: Arc<dyn Publisher>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        Self {
            documents,
            parser,
            publisher,
            history,
        }
    }
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}
