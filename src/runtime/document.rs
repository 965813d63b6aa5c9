//! Document shapes exchanged with the document store
//!
//! Writes go to the store as plain JSON objects ([`Document`]). Reads come back
//! in store-native form ([`RawDocument`]) where identifier fields may hold an
//! opaque [`ObjectId`]; the sanitizer turns those into [`Document`]s before a
//! script sees them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::ids::ObjectId;

/// Field carrying a document's identifier
pub const FIELD_ID: &str = "id";

/// Field carrying the owning account's identifier
pub const FIELD_ACCOUNT_ID: &str = "accountId";

/// Plain document as seen by scripts
pub type Document = Map<String, Value>;

/// Document as returned by the store
pub type RawDocument = BTreeMap<String, StoreValue>;

/// A single field value in store-native form
#[derive(Debug, Clone, PartialEq)]
pub enum StoreValue {
    /// Opaque identifier
    Id(ObjectId),
    /// Any JSON value
    Plain(Value),
}

impl StoreValue {
    /// JSON view of the value, rendering identifiers as hex
    pub fn to_json(&self) -> Value {
        match self {
            StoreValue::Id(id) => Value::String(id.to_hex()),
            StoreValue::Plain(value) => value.clone(),
        }
    }
}

impl From<ObjectId> for StoreValue {
    fn from(id: ObjectId) -> Self {
        StoreValue::Id(id)
    }
}

impl From<Value> for StoreValue {
    fn from(value: Value) -> Self {
        StoreValue::Plain(value)
    }
}

/// Lift a plain document into store-native form.
pub fn to_raw(doc: Document) -> RawDocument {
    doc.into_iter()
        .map(|(key, value)| (key, StoreValue::Plain(value)))
        .collect()
}

/// Pagination and sorting options for list and query operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListParams {
    /// 1-based page number
    pub page: i64,
    /// Page size
    pub size: i64,
    /// Field to sort by, empty for insertion order
    pub sort_by: String,
    /// Sort in descending order
    pub sort_descending: bool,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            size: 25,
            sort_by: String::new(),
            sort_descending: false,
        }
    }
}

impl ListParams {
    /// Clamp page and size to usable values
    pub fn normalized(&self) -> Self {
        Self {
            page: self.page.max(1),
            size: if self.size <= 0 { 25 } else { self.size },
            sort_by: self.sort_by.clone(),
            sort_descending: self.sort_descending,
        }
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagedResult<T> {
    /// Page number returned
    pub page: i64,
    /// Page size requested
    pub size: i64,
    /// Total matching documents
    pub total: i64,
    /// Documents on this page
    pub results: Vec<T>,
}

impl<T> PagedResult<T> {
    /// Transform every result, stopping at the first error
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<PagedResult<U>, E> {
        let results = self.results.into_iter().map(f).collect::<Result<Vec<_>, E>>()?;
        Ok(PagedResult {
            page: self.page,
            size: self.size,
            total: self.total,
            results,
        })
    }
}
