//! Host capabilities exposed to function scripts
//!
//! Every invocation gets the same enumerated set of globals:
//!
//! - logging: `log(...values)`
//! - data access: `create`, `list`, `getById`, `query`, `update`, `del`
//! - messaging: `send(type, data, channel)`
//!
//! Data and messaging calls return `{ok, content}`. Bad arguments, store
//! errors and publish errors come back as `ok: false` with a message so the
//! script can branch on them. Only an identifier that cannot be sanitized is
//! thrown, since it means the store and the runtime disagree.

use rquickjs::function::Rest;
use rquickjs::{Ctx, Exception, Function, Object, Value};
use serde_json::Value as Json;
use std::cell::RefCell;
use std::rc::Rc;

use super::auth::Auth;
use super::document::{Document, ListParams};
use super::error::InvalidIdentifierError;
use super::function::{CapabilityResult, Command, ExecHistory};
use super::ids::ObjectId;
use super::ports::{Services, StoreHandle};
use super::sanitize::sanitize;
use super::value::{concat_printable, js_to_json, json_to_js};

/// Names registered into every sandbox, in registration order
pub const CAPABILITIES: [&str; 8] = [
    "log", "create", "list", "getById", "query", "update", "del", "send",
];

const FIRST_STRING: &str = "the first argument should be a string";
const SECOND_STRING: &str = "the second argument should be a string";
const THIRD_STRING: &str = "the third argument should be a string";
const QUERY_SHAPE: &str =
    "the second argument should be a query filter: [['field', '==', 'value'], ...]";

type Outcome = Result<CapabilityResult, InvalidIdentifierError>;

/// Run record being written by the current invocation.
///
/// Lines logged before the record is opened are dropped.
#[derive(Debug, Clone, Default)]
pub struct RunLog(Rc<RefCell<Option<ExecHistory>>>);

impl RunLog {
    /// Start collecting into `run`
    pub fn begin(&self, run: ExecHistory) {
        *self.0.borrow_mut() = Some(run);
    }

    /// Append a line if a record is open
    pub fn append(&self, line: String) {
        if let Some(run) = self.0.borrow_mut().as_mut() {
            run.output.push(line);
        }
    }

    /// Close collection and hand back the record
    pub fn take(&self) -> Option<ExecHistory> {
        self.0.borrow_mut().take()
    }
}

/// Everything a capability may act on during one invocation.
pub struct Scope {
    /// Caller identity
    pub auth: Auth,
    /// Tenant database
    pub store: StoreHandle,
    /// Function being run, stamped on published messages
    pub function_id: ObjectId,
    /// Collaborators
    pub services: Services,
    /// Current run record
    pub log: RunLog,
}

/// Register all capability groups into the context's globals.
pub fn register(ctx: &Ctx<'_>, scope: Rc<Scope>) -> rquickjs::Result<()> {
    register_logging(ctx, &scope)?;
    register_data(ctx, &scope)?;
    register_messaging(ctx, &scope)
}

fn register_logging<'js>(ctx: &Ctx<'js>, scope: &Rc<Scope>) -> rquickjs::Result<()> {
    let scope = Rc::clone(scope);
    let log = Function::new(ctx.clone(), move |args: Rest<Value<'js>>| {
        if !args.0.is_empty() {
            scope.log.append(concat_printable(&args.0));
        }
    })?;
    ctx.globals().set("log", log)
}

fn register_data<'js>(ctx: &Ctx<'js>, scope: &Rc<Scope>) -> rquickjs::Result<()> {
    bind(ctx, scope, "create", create)?;
    bind(ctx, scope, "list", list)?;
    bind(ctx, scope, "getById", get_by_id)?;
    bind(ctx, scope, "query", query)?;
    bind(ctx, scope, "update", update)?;
    bind(ctx, scope, "del", del)
}

fn register_messaging<'js>(ctx: &Ctx<'js>, scope: &Rc<Scope>) -> rquickjs::Result<()> {
    bind(ctx, scope, "send", send)
}

fn bind<'js>(
    ctx: &Ctx<'js>,
    scope: &Rc<Scope>,
    name: &'static str,
    op: fn(&Scope, &[Value<'js>]) -> Outcome,
) -> rquickjs::Result<()> {
    let scope = Rc::clone(scope);
    let func = Function::new(
        ctx.clone(),
        move |ctx: Ctx<'js>, args: Rest<Value<'js>>| -> rquickjs::Result<Value<'js>> {
            tracing::debug!(capability = name, args = args.0.len(), "capability call");
            match op(&scope, &args.0) {
                Ok(result) => result_to_js(&ctx, &result),
                Err(fault) => {
                    tracing::warn!(capability = name, error = %fault, "invalid identifier from store");
                    Err(Exception::throw_message(&ctx, &fault.to_string()))
                }
            }
        },
    )?;
    ctx.globals().set(name, func)
}

fn result_to_js<'js>(ctx: &Ctx<'js>, result: &CapabilityResult) -> rquickjs::Result<Value<'js>> {
    let object = Object::new(ctx.clone())?;
    object.set("ok", result.ok)?;
    object.set("content", json_to_js(ctx, &result.content)?)?;
    Ok(object.into_value())
}

fn failure(message: impl Into<String>) -> Outcome {
    Ok(CapabilityResult::failure(message))
}

fn mismatch(count: usize, usage: &str) -> Outcome {
    failure(format!(
        "argument mismatch: you need {count} arguments for {usage}"
    ))
}

fn string_arg(args: &[Value<'_>], index: usize) -> Option<String> {
    args.get(index)?.as_string()?.to_string().ok()
}

fn object_arg(args: &[Value<'_>], index: usize) -> Option<Document> {
    match js_to_json(args.get(index)?).ok()? {
        Json::Object(doc) => Some(doc),
        _ => None,
    }
}

/// Optional params: absent, `null` and `undefined` mean defaults.
fn params_arg(args: &[Value<'_>], index: usize) -> Option<ListParams> {
    match args.get(index) {
        None => Some(ListParams::default()),
        Some(v) if v.is_null() || v.is_undefined() => Some(ListParams::default()),
        Some(v) => match js_to_json(v).ok()? {
            json @ Json::Object(_) => serde_json::from_value(json).ok(),
            _ => None,
        },
    }
}

fn clauses_arg(args: &[Value<'_>], index: usize) -> Option<Vec<Vec<Json>>> {
    let Json::Array(items) = js_to_json(args.get(index)?).ok()? else {
        return None;
    };
    items
        .into_iter()
        .map(|item| match item {
            Json::Array(clause) => Some(clause),
            _ => None,
        })
        .collect()
}

fn page_content<T: serde::Serialize>(page: &T) -> Outcome {
    match serde_json::to_value(page) {
        Ok(content) => Ok(CapabilityResult::success(content)),
        Err(err) => failure(format!("error encoding results: {err}")),
    }
}

fn create(scope: &Scope, args: &[Value<'_>]) -> Outcome {
    if args.len() != 2 {
        return mismatch(2, "create(col, doc)");
    }
    let Some(col) = string_arg(args, 0) else {
        return failure(FIRST_STRING);
    };
    let Some(doc) = object_arg(args, 1) else {
        return failure("the second argument should be an object");
    };

    match scope
        .services
        .documents
        .add(&scope.auth, &scope.store, &col, doc)
    {
        Ok(raw) => Ok(CapabilityResult::success(Json::Object(sanitize(raw)?))),
        Err(err) => failure(format!("error calling create(): {err}")),
    }
}

fn list(scope: &Scope, args: &[Value<'_>]) -> Outcome {
    if args.is_empty() || args.len() > 2 {
        return failure("argument mismatch: you need 1 or 2 arguments for list(col, [params])");
    }
    let Some(col) = string_arg(args, 0) else {
        return failure(FIRST_STRING);
    };
    let Some(params) = params_arg(args, 1) else {
        return failure("the second argument should be an object");
    };

    let page = match scope
        .services
        .documents
        .list(&scope.auth, &scope.store, &col, &params)
    {
        Ok(page) => page,
        Err(err) => return failure(format!("error executing list: {err}")),
    };
    page_content(&page.try_map(sanitize)?)
}

fn get_by_id(scope: &Scope, args: &[Value<'_>]) -> Outcome {
    if args.len() != 2 {
        return mismatch(2, "getById(col, id)");
    }
    let Some(col) = string_arg(args, 0) else {
        return failure(FIRST_STRING);
    };
    let Some(id) = string_arg(args, 1) else {
        return failure(SECOND_STRING);
    };

    match scope
        .services
        .documents
        .get_by_id(&scope.auth, &scope.store, &col, &id)
    {
        Ok(raw) => Ok(CapabilityResult::success(Json::Object(sanitize(raw)?))),
        Err(err) => failure(format!("error calling getById(): {err}")),
    }
}

fn query(scope: &Scope, args: &[Value<'_>]) -> Outcome {
    if args.len() < 2 || args.len() > 3 {
        return failure(
            "argument mismatch: you need 2 or 3 arguments for query(col, filter, [params])",
        );
    }
    let Some(col) = string_arg(args, 0) else {
        return failure(FIRST_STRING);
    };
    let Some(clauses) = clauses_arg(args, 1) else {
        return failure(QUERY_SHAPE);
    };
    let filter = match scope.services.parser.parse(&clauses) {
        Ok(filter) => filter,
        Err(err) => return failure(format!("error parsing query filter: {err}")),
    };
    let Some(params) = params_arg(args, 2) else {
        return failure("the third argument should be an object");
    };

    let page = match scope
        .services
        .documents
        .query(&scope.auth, &scope.store, &col, &filter, &params)
    {
        Ok(page) => page,
        Err(err) => return failure(format!("error executing query: {err}")),
    };
    page_content(&page.try_map(sanitize)?)
}

fn update(scope: &Scope, args: &[Value<'_>]) -> Outcome {
    if args.len() != 3 {
        return mismatch(3, "update(col, id, doc)");
    }
    let Some(col) = string_arg(args, 0) else {
        return failure(FIRST_STRING);
    };
    let Some(id) = string_arg(args, 1) else {
        return failure(SECOND_STRING);
    };
    let Some(doc) = object_arg(args, 2) else {
        return failure("the third argument should be an object");
    };

    match scope
        .services
        .documents
        .update(&scope.auth, &scope.store, &col, &id, doc)
    {
        Ok(raw) => Ok(CapabilityResult::success(Json::Object(sanitize(raw)?))),
        Err(err) => failure(format!("error executing update: {err}")),
    }
}

fn del(scope: &Scope, args: &[Value<'_>]) -> Outcome {
    if args.len() != 2 {
        return mismatch(2, "del(col, id)");
    }
    let Some(col) = string_arg(args, 0) else {
        return failure(FIRST_STRING);
    };
    let Some(id) = string_arg(args, 1) else {
        return failure(SECOND_STRING);
    };

    match scope
        .services
        .documents
        .delete(&scope.auth, &scope.store, &col, &id)
    {
        Ok(count) => Ok(CapabilityResult::success(Json::from(count))),
        Err(err) => failure(format!("error executing del: {err}")),
    }
}

fn send(scope: &Scope, args: &[Value<'_>]) -> Outcome {
    if args.len() != 3 {
        return mismatch(3, "send(type, data, channel)");
    }
    let Some(msg_type) = string_arg(args, 0) else {
        return failure(FIRST_STRING);
    };
    let Some(channel) = string_arg(args, 2) else {
        return failure(THIRD_STRING);
    };
    let data = match js_to_json(&args[1]) {
        Ok(json) => json.to_string(),
        Err(err) => return failure(format!("error converting your data: {err}")),
    };

    let msg = Command {
        sid: scope.function_id.to_hex(),
        msg_type,
        data,
        channel,
        token: scope.auth.reconstruct_token(),
    };
    match scope.services.publisher.publish(msg) {
        Ok(()) => Ok(CapabilityResult::success(Json::Null)),
        Err(err) => failure(format!("error publishing your message: {err}")),
    }
}
