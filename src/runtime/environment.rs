//! One invocation of a tenant function, end to end
//!
//! Each call to [`ExecutionEnvironment::execute`] builds a fresh QuickJS
//! runtime and context, registers the capability set, evaluates the source,
//! looks up `handle`, prepares arguments from the trigger, calls the entry
//! point and hands the run record to the completion recorder. The engine is
//! dropped when the call returns; nothing is shared between invocations.

use rquickjs::function::Rest;
use rquickjs::{Context, Ctx, Function, Value};
use std::rc::Rc;

use super::RuntimeConfig;
use super::auth::Auth;
use super::bindings::{self, RunLog, Scope};
use super::error::{ExecutionError, Result};
use super::function::{ExecData, ExecHistory};
use super::ports::{Services, StoreHandle};
use super::recorder::CompletionRecorder;
use super::trigger::{TriggerPayload, prepare_arguments};
use super::value::{js_to_json, json_to_js};

/// Global name of the required entry point
pub const ENTRY_POINT: &str = "handle";

/// Everything needed to run one function for one caller.
pub struct ExecutionEnvironment {
    auth: Auth,
    store: StoreHandle,
    data: ExecData,
    services: Services,
    recorder: CompletionRecorder,
    config: RuntimeConfig,
}

impl ExecutionEnvironment {
    /// Assemble an environment
    pub fn new(
        auth: Auth,
        store: StoreHandle,
        data: ExecData,
        services: Services,
        recorder: CompletionRecorder,
        config: RuntimeConfig,
    ) -> Self {
        Self {
            auth,
            store,
            data,
            services,
            recorder,
            config,
        }
    }

    /// Function being run
    pub fn data(&self) -> &ExecData {
        &self.data
    }

    /// Caller identity
    pub fn auth(&self) -> &Auth {
        &self.auth
    }

    /// Run the function against `payload`.
    ///
    /// Returns once the entry point returns or throws. The run record is
    /// persisted afterwards on a detached task. Load and entry point failures
    /// happen before a run record exists and are not recorded.
    pub fn execute(&self, payload: impl Into<TriggerPayload>) -> Result<()> {
        let payload = payload.into();
        let span = tracing::info_span!(
            "execute",
            function = %self.data.function_name,
            id = %self.data.id,
            version = self.data.version,
        );
        let _enter = span.enter();

        let engine = rquickjs::Runtime::new().map_err(sandbox_error)?;
        self.config.apply_limits(&engine);
        let context = Context::full(&engine).map_err(sandbox_error)?;

        let log = RunLog::default();
        let scope = Rc::new(Scope {
            auth: self.auth.clone(),
            store: self.store.clone(),
            function_id: self.data.id,
            services: self.services.clone(),
            log: log.clone(),
        });

        context.with(|ctx| self.run(&ctx, scope, &log, &payload))
    }

    fn run<'js>(
        &self,
        ctx: &Ctx<'js>,
        scope: Rc<Scope>,
        log: &RunLog,
        payload: &TriggerPayload,
    ) -> Result<()> {
        bindings::register(ctx, scope).map_err(sandbox_error)?;

        if let Err(err) = ctx.eval::<Value<'js>, _>(self.data.code.as_str()) {
            let message = describe_error(ctx, err);
            tracing::warn!(error = %message, "function failed to load");
            return Err(ExecutionError::Load(message));
        }

        let handler = ctx
            .globals()
            .get::<_, Value<'js>>(ENTRY_POINT)
            .ok()
            .and_then(|value| value.into_function())
            .ok_or(ExecutionError::MissingEntryPoint)?;

        log.begin(ExecHistory::start(self.data.version));

        let args = prepare_arguments(payload)?;
        let args = args
            .iter()
            .map(|arg| json_to_js(ctx, arg))
            .collect::<rquickjs::Result<Vec<_>>>()
            .map_err(sandbox_error)?;

        tracing::info!(args = args.len(), "function started");
        let outcome = invoke(ctx, &handler, args);

        if let Some(run) = log.take() {
            self.recorder.complete(
                self.store.clone(),
                self.data.id,
                run,
                outcome.as_ref().err().cloned(),
            );
        }

        match outcome {
            Ok(()) => {
                tracing::info!("function completed");
                Ok(())
            }
            Err(message) => {
                tracing::warn!(error = %message, "function failed");
                Err(ExecutionError::Invocation(message))
            }
        }
    }
}

fn invoke<'js>(
    ctx: &Ctx<'js>,
    handler: &Function<'js>,
    args: Vec<Value<'js>>,
) -> std::result::Result<(), String> {
    handler
        .call::<_, Value<'js>>((Rest(args),))
        .map(|_| ())
        .map_err(|err| describe_error(ctx, err))
}

/// Human-readable form of an engine error, pulling the pending exception
/// out of the context when there is one.
fn describe_error(ctx: &Ctx<'_>, err: rquickjs::Error) -> String {
    if !matches!(err, rquickjs::Error::Exception) {
        return err.to_string();
    }

    let thrown = ctx.catch();
    if let Some(exception) = thrown.as_exception() {
        return exception
            .message()
            .unwrap_or_else(|| "uncaught exception".to_string());
    }
    if let Some(text) = thrown.as_string() {
        return text.to_string().unwrap_or_default();
    }
    match js_to_json(&thrown) {
        Ok(json) => json.to_string(),
        Err(_) => "uncaught exception".to_string(),
    }
}

fn sandbox_error(err: rquickjs::Error) -> ExecutionError {
    ExecutionError::Sandbox(err.to_string())
}
