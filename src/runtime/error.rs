//! Error types for the function runtime
//!
//! Domain errors use thiserror. Structural script failures surface from
//! [`ExecutionEnvironment::execute`](super::environment::ExecutionEnvironment::execute)
//! as [`ExecutionError`]; expected failures inside capability calls never reach
//! this layer, they are handed back to the script as soft results.

use thiserror::Error;

/// Failure of a single invocation, reported synchronously to the dispatcher.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// Script source failed to parse or threw during top-level evaluation
    #[error("error loading function: {0}")]
    Load(String),

    /// No callable bound to `handle` after evaluation
    #[error("unable to find function \"handle\"")]
    MissingEntryPoint,

    /// Trigger payload could not be turned into entry point arguments
    #[error("error preparing argument: {0}")]
    ArgumentPreparation(#[from] ArgumentError),

    /// The entry point threw
    #[error("error executing your function: {0}")]
    Invocation(String),

    /// The interpreter instance could not be created or populated
    #[error("sandbox error: {0}")]
    Sandbox(String),
}

impl ExecutionError {
    /// Whether a run record was scheduled for this failure.
    pub fn is_recorded(&self) -> bool {
        matches!(self, ExecutionError::Invocation(_))
    }
}

/// Malformed HTTP body for the detected content type.
#[derive(Debug, Error)]
pub enum ArgumentError {
    /// Body declared as JSON did not decode
    #[error("invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),

    /// Body declared as a url-encoded form did not decode
    #[error("invalid form body: {0}")]
    Form(String),
}

/// A document identifier field could not be converted to its canonical form.
///
/// This is an internal inconsistency between the store and this runtime, so it
/// aborts the capability call by throwing into the script.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unable to cast document {field}")]
pub struct InvalidIdentifierError {
    /// Name of the offending field (`id` or `accountId`)
    pub field: String,
}

/// Identifier text that is not 24 hexadecimal characters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid object id: {0:?}")]
pub struct ObjectIdError(pub String);

/// Errors reported by a document store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Document not found
    #[error("document {id} not found in collection {collection}")]
    NotFound {
        /// Collection searched
        collection: String,
        /// Identifier requested
        id: String,
    },

    /// Identifier supplied by the caller is malformed
    #[error(transparent)]
    InvalidId(#[from] ObjectIdError),

    /// The acting account may not perform the operation
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Any other backend failure
    #[error("{0}")]
    Backend(String),
}

/// Query clause rejected by a [`QueryParser`](super::ports::QueryParser).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// Clause was not a `[field, operator, value]` triple
    #[error("the {index} query clause did not contain the required 3 parameters (field, operator, value)")]
    ClauseShape {
        /// Zero-based clause position
        index: usize,
    },

    /// Field name was not a string
    #[error("the {index} query clause field should be a string")]
    Field {
        /// Zero-based clause position
        index: usize,
    },

    /// Operator not recognised
    #[error("the {index} query clause has an unrecognized operator: {op}")]
    Operator {
        /// Zero-based clause position
        index: usize,
        /// Offending operator text
        op: String,
    },

    /// `in` / `!in` used without an array value
    #[error("the {index} query clause requires an array value for {op}")]
    MembershipValue {
        /// Zero-based clause position
        index: usize,
        /// Operator used
        op: String,
    },
}

/// Errors reported by the messaging publisher.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Envelope could not be encoded for the transport
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Transport refused or lost the message
    #[error("{0}")]
    Transport(String),
}

/// Run record could not be saved. Logged only, never surfaced to callers.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Function the run belongs to is unknown to the history store
    #[error("function {0} not found")]
    FunctionNotFound(String),

    /// Any other backend failure
    #[error("{0}")]
    Backend(String),
}

/// An interpreter value that has no JSON representation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    /// Value type cannot be represented (functions, symbols, ...)
    #[error("unable to convert value of type {0}")]
    Unsupported(String),

    /// Nesting exceeded the conversion depth limit (usually a cycle)
    #[error("value nesting exceeds {0} levels")]
    TooDeep(usize),

    /// Engine failure while reading the value
    #[error("{0}")]
    Engine(String),
}

impl From<rquickjs::Error> for ConversionError {
    fn from(err: rquickjs::Error) -> Self {
        ConversionError::Engine(err.to_string())
    }
}

/// Convenience result alias for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type using ExecutionError
pub type Result<T> = std::result::Result<T, ExecutionError>;
