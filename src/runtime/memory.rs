//! In-process collaborators
//!
//! Reference implementations of the collaborator traits, suitable for
//! embedding, local runs through the CLI, and tests. Documents live per
//! tenant database and collection; regular users only see documents stamped
//! with their own account.

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Notify;

use super::auth::Auth;
use super::document::{
    Document, FIELD_ACCOUNT_ID, FIELD_ID, ListParams, PagedResult, RawDocument, StoreValue, to_raw,
};
use super::error::{PersistenceError, PublishError, StoreError, StoreResult};
use super::function::{Command, ExecHistory};
use super::ids::ObjectId;
use super::ports::{DocumentStore, HistoryStore, Publisher, StoreHandle};
use super::query::{Filter, compare_json};

type CollectionKey = (String, String);

/// Document store held in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<CollectionKey, Vec<RawDocument>>>,
}

impl MemoryStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// All documents of a collection, identifiers rendered as hex
    pub fn documents(&self, store: &StoreHandle, collection: &str) -> Vec<Document> {
        self.collections
            .read()
            .get(&key(store, collection))
            .map(|docs| docs.iter().map(view).collect())
            .unwrap_or_default()
    }

    /// Names of the collections of a tenant database
    pub fn collections(&self, store: &StoreHandle) -> Vec<String> {
        let mut names: Vec<String> = self
            .collections
            .read()
            .keys()
            .filter(|(db, _)| db == store.as_str())
            .map(|(_, col)| col.clone())
            .collect();
        names.sort();
        names
    }

    fn page(
        &self,
        auth: &Auth,
        store: &StoreHandle,
        collection: &str,
        filter: Option<&Filter>,
        params: &ListParams,
    ) -> PagedResult<RawDocument> {
        let params = params.normalized();
        let collections = self.collections.read();
        let mut matches: Vec<&RawDocument> = collections
            .get(&key(store, collection))
            .map(|docs| {
                docs.iter()
                    .filter(|doc| visible_to(auth, doc))
                    .filter(|doc| filter.is_none_or(|f| f.matches(&view(doc))))
                    .collect()
            })
            .unwrap_or_default();

        if !params.sort_by.is_empty() {
            matches.sort_by(|a, b| {
                let left = a.get(&params.sort_by).map(StoreValue::to_json);
                let right = b.get(&params.sort_by).map(StoreValue::to_json);
                let ord = compare_json(
                    left.as_ref().unwrap_or(&Value::Null),
                    right.as_ref().unwrap_or(&Value::Null),
                )
                .unwrap_or(Ordering::Equal);
                if params.sort_descending { ord.reverse() } else { ord }
            });
        }

        let total = matches.len() as i64;
        let size = usize::try_from(params.size).unwrap_or(usize::MAX);
        let skip = usize::try_from(params.page - 1)
            .ok()
            .and_then(|page| page.checked_mul(size))
            .unwrap_or(usize::MAX);
        let results = matches.into_iter().skip(skip).take(size).cloned().collect();

        PagedResult {
            page: params.page,
            size: params.size,
            total,
            results,
        }
    }
}

impl DocumentStore for MemoryStore {
    fn add(
        &self,
        auth: &Auth,
        store: &StoreHandle,
        collection: &str,
        doc: Document,
    ) -> StoreResult<RawDocument> {
        let mut raw = to_raw(doc);
        raw.insert(FIELD_ID.to_string(), StoreValue::Id(ObjectId::new()));
        raw.insert(FIELD_ACCOUNT_ID.to_string(), account_value(auth));

        self.collections
            .write()
            .entry(key(store, collection))
            .or_default()
            .push(raw.clone());
        Ok(raw)
    }

    fn list(
        &self,
        auth: &Auth,
        store: &StoreHandle,
        collection: &str,
        params: &ListParams,
    ) -> StoreResult<PagedResult<RawDocument>> {
        Ok(self.page(auth, store, collection, None, params))
    }

    fn get_by_id(
        &self,
        auth: &Auth,
        store: &StoreHandle,
        collection: &str,
        id: &str,
    ) -> StoreResult<RawDocument> {
        let oid = ObjectId::parse_str(id)?;
        self.collections
            .read()
            .get(&key(store, collection))
            .and_then(|docs| docs.iter().find(|doc| has_id(doc, &oid)))
            .filter(|doc| visible_to(auth, doc))
            .cloned()
            .ok_or_else(|| not_found(collection, id))
    }

    fn query(
        &self,
        auth: &Auth,
        store: &StoreHandle,
        collection: &str,
        filter: &Filter,
        params: &ListParams,
    ) -> StoreResult<PagedResult<RawDocument>> {
        Ok(self.page(auth, store, collection, Some(filter), params))
    }

    fn update(
        &self,
        auth: &Auth,
        store: &StoreHandle,
        collection: &str,
        id: &str,
        doc: Document,
    ) -> StoreResult<RawDocument> {
        let oid = ObjectId::parse_str(id)?;
        let mut collections = self.collections.write();
        let existing = collections
            .get_mut(&key(store, collection))
            .and_then(|docs| docs.iter_mut().find(|doc| has_id(doc, &oid)))
            .filter(|doc| visible_to(auth, doc))
            .ok_or_else(|| not_found(collection, id))?;

        for (field, value) in doc {
            if field == FIELD_ID || field == FIELD_ACCOUNT_ID {
                continue;
            }
            existing.insert(field, StoreValue::Plain(value));
        }
        Ok(existing.clone())
    }

    fn delete(
        &self,
        auth: &Auth,
        store: &StoreHandle,
        collection: &str,
        id: &str,
    ) -> StoreResult<u64> {
        let oid = ObjectId::parse_str(id)?;
        let mut collections = self.collections.write();
        let Some(docs) = collections.get_mut(&key(store, collection)) else {
            return Ok(0);
        };
        let before = docs.len();
        docs.retain(|doc| !(has_id(doc, &oid) && visible_to(auth, doc)));
        Ok((before - docs.len()) as u64)
    }
}

fn key(store: &StoreHandle, collection: &str) -> CollectionKey {
    (store.as_str().to_string(), collection.to_string())
}

fn view(doc: &RawDocument) -> Document {
    doc.iter()
        .map(|(field, value)| (field.clone(), value.to_json()))
        .collect()
}

fn has_id(doc: &RawDocument, oid: &ObjectId) -> bool {
    matches!(doc.get(FIELD_ID), Some(StoreValue::Id(id)) if id == oid)
}

fn account_value(auth: &Auth) -> StoreValue {
    match ObjectId::parse_str(&auth.account_id) {
        Ok(oid) => StoreValue::Id(oid),
        Err(_) => StoreValue::Plain(Value::String(auth.account_id.clone())),
    }
}

fn visible_to(auth: &Auth, doc: &RawDocument) -> bool {
    auth.is_admin()
        || doc
            .get(FIELD_ACCOUNT_ID)
            .is_none_or(|owner| owner.to_json() == account_value(auth).to_json())
}

fn not_found(collection: &str, id: &str) -> StoreError {
    StoreError::NotFound {
        collection: collection.to_string(),
        id: id.to_string(),
    }
}

/// Publisher that keeps every message in memory
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    messages: Mutex<Vec<Command>>,
}

impl MemoryPublisher {
    /// Empty publisher
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages published so far, oldest first
    pub fn published(&self) -> Vec<Command> {
        self.messages.lock().clone()
    }

    /// Messages published to one channel
    pub fn on_channel(&self, channel: &str) -> Vec<Command> {
        self.messages
            .lock()
            .iter()
            .filter(|msg| msg.channel == channel)
            .cloned()
            .collect()
    }
}

impl Publisher for MemoryPublisher {
    fn publish(&self, msg: Command) -> Result<(), PublishError> {
        tracing::debug!(channel = %msg.channel, msg_type = %msg.msg_type, "message published");
        self.messages.lock().push(msg);
        Ok(())
    }
}

/// Run history held in memory, with a way to await arrivals
#[derive(Debug, Default)]
pub struct MemoryHistory {
    runs: Mutex<HashMap<ObjectId, Vec<ExecHistory>>>,
    arrived: Notify,
}

impl MemoryHistory {
    /// Empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs recorded for a function, oldest first
    pub fn runs(&self, function_id: &ObjectId) -> Vec<ExecHistory> {
        self.runs
            .lock()
            .get(function_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Total runs recorded across functions
    pub fn len(&self) -> usize {
        self.runs.lock().values().map(Vec::len).sum()
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait until at least `count` runs exist for a function.
    ///
    /// Returns what has been recorded when the timeout elapses first.
    pub async fn wait_for_runs(
        &self,
        function_id: &ObjectId,
        count: usize,
        timeout: Duration,
    ) -> Vec<ExecHistory> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let arrived = self.arrived.notified();
            let runs = self.runs(function_id);
            if runs.len() >= count {
                return runs;
            }
            if tokio::time::timeout_at(deadline, arrived).await.is_err() {
                return self.runs(function_id);
            }
        }
    }
}

impl HistoryStore for MemoryHistory {
    fn record_run(
        &self,
        _store: &StoreHandle,
        function_id: &ObjectId,
        run: ExecHistory,
    ) -> Result<(), PersistenceError> {
        self.runs.lock().entry(*function_id).or_default().push(run);
        self.arrived.notify_waiters();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::auth::ROLE_ADMIN;
    use crate::runtime::query::{Condition, Operator};
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    fn db() -> StoreHandle {
        StoreHandle::new("tenant")
    }

    fn id_of(raw: &RawDocument) -> String {
        raw[FIELD_ID].to_json().as_str().unwrap().to_string()
    }

    #[test]
    fn add_stamps_identifiers() {
        let store = MemoryStore::new();
        let account = ObjectId::new();
        let auth = Auth::new(account.to_hex(), "u", "t");

        let raw = store.add(&auth, &db(), "todos", doc(json!({"title": "a"}))).unwrap();
        assert!(matches!(raw[FIELD_ID], StoreValue::Id(_)));
        assert_eq!(raw[FIELD_ACCOUNT_ID], StoreValue::Id(account));
        assert_eq!(store.collections(&db()), vec!["todos"]);
    }

    #[test]
    fn list_paginates_and_sorts() {
        let store = MemoryStore::new();
        let auth = Auth::new("acct", "u", "t");
        for n in [3, 1, 2] {
            store.add(&auth, &db(), "nums", doc(json!({"n": n}))).unwrap();
        }

        let params = ListParams {
            size: 2,
            sort_by: "n".into(),
            ..ListParams::default()
        };
        let page = store.list(&auth, &db(), "nums", &params).unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.results.len(), 2);
        assert_eq!(page.results[0]["n"], StoreValue::Plain(json!(1)));

        let params = ListParams { page: 2, ..params };
        let page = store.list(&auth, &db(), "nums", &params).unwrap();
        assert_eq!(page.results.len(), 1);
        assert_eq!(page.results[0]["n"], StoreValue::Plain(json!(3)));
    }

    #[test]
    fn huge_page_numbers_return_an_empty_page() {
        let store = MemoryStore::new();
        let auth = Auth::new("acct", "u", "t");
        store.add(&auth, &db(), "nums", doc(json!({"n": 1}))).unwrap();

        let params = ListParams {
            page: i64::MAX,
            size: i64::MAX,
            ..ListParams::default()
        };
        let page = store.list(&auth, &db(), "nums", &params).unwrap();
        assert_eq!(page.total, 1);
        assert!(page.results.is_empty());

        let params = ListParams {
            page: 1,
            size: i64::MAX,
            ..ListParams::default()
        };
        let page = store.list(&auth, &db(), "nums", &params).unwrap();
        assert_eq!(page.results.len(), 1);
    }

    #[test]
    fn query_filters() {
        let store = MemoryStore::new();
        let auth = Auth::new("acct", "u", "t");
        store.add(&auth, &db(), "todos", doc(json!({"done": false}))).unwrap();
        store.add(&auth, &db(), "todos", doc(json!({"done": true}))).unwrap();

        let filter = Filter {
            conditions: vec![Condition {
                field: "done".into(),
                op: Operator::Eq,
                value: json!(false),
            }],
        };
        let page = store
            .query(&auth, &db(), "todos", &filter, &ListParams::default())
            .unwrap();
        assert_eq!(page.total, 1);
    }

    #[test]
    fn get_update_delete() {
        let store = MemoryStore::new();
        let auth = Auth::new("acct", "u", "t");
        let raw = store.add(&auth, &db(), "todos", doc(json!({"title": "a"}))).unwrap();
        let id = id_of(&raw);

        let updated = store
            .update(&auth, &db(), "todos", &id, doc(json!({"title": "b", "id": "x"})))
            .unwrap();
        assert_eq!(updated["title"], StoreValue::Plain(json!("b")));
        assert_eq!(id_of(&updated), id);

        let fetched = store.get_by_id(&auth, &db(), "todos", &id).unwrap();
        assert_eq!(fetched, updated);

        assert_eq!(store.delete(&auth, &db(), "todos", &id).unwrap(), 1);
        assert!(matches!(
            store.get_by_id(&auth, &db(), "todos", &id),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn malformed_id_is_a_store_error() {
        let store = MemoryStore::new();
        let auth = Auth::new("acct", "u", "t");
        assert!(matches!(
            store.get_by_id(&auth, &db(), "todos", "nope"),
            Err(StoreError::InvalidId(_))
        ));
    }

    #[test]
    fn accounts_are_isolated() {
        let store = MemoryStore::new();
        let alice = Auth::new("alice", "a", "t");
        let bob = Auth::new("bob", "b", "t");
        let raw = store.add(&alice, &db(), "notes", doc(json!({"x": 1}))).unwrap();

        assert_eq!(store.list(&bob, &db(), "notes", &ListParams::default()).unwrap().total, 0);
        assert!(store.get_by_id(&bob, &db(), "notes", &id_of(&raw)).is_err());
        assert_eq!(store.delete(&bob, &db(), "notes", &id_of(&raw)).unwrap(), 0);

        let admin = Auth::new("root", "r", "t").with_role(ROLE_ADMIN);
        assert_eq!(store.list(&admin, &db(), "notes", &ListParams::default()).unwrap().total, 1);
    }

    #[test]
    fn publisher_filters_by_channel() {
        let publisher = MemoryPublisher::new();
        for channel in ["a", "b", "a"] {
            publisher
                .publish(Command {
                    sid: "f".into(),
                    msg_type: "t".into(),
                    data: "null".into(),
                    channel: channel.into(),
                    token: "u|t".into(),
                })
                .unwrap();
        }
        assert_eq!(publisher.published().len(), 3);
        assert_eq!(publisher.on_channel("a").len(), 2);
    }

    #[tokio::test]
    async fn history_wait_times_out_with_partial_results() {
        let history = MemoryHistory::new();
        let fid = ObjectId::new();
        history
            .record_run(&db(), &fid, ExecHistory::start(1))
            .unwrap();

        let runs = history
            .wait_for_runs(&fid, 2, Duration::from_millis(20))
            .await;
        assert_eq!(runs.len(), 1);
        assert_eq!(history.len(), 1);
    }
}
