//! Funcrun CLI - run a function script locally
//!
//! Executes a script against in-memory collaborators and prints the outcome,
//! the recorded run, published messages and the resulting documents.

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use funcrun::runtime::auth::Auth;
use funcrun::runtime::function::ExecData;
use funcrun::runtime::memory::{MemoryHistory, MemoryPublisher, MemoryStore};
use funcrun::runtime::ports::{Services, StoreHandle};
use funcrun::runtime::query::ClauseParser;
use funcrun::runtime::{HttpRequest, TriggerPayload};
use funcrun::{Runtime, RuntimeConfig};
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "funcrun")]
#[command(about = "Run tenant functions in an isolated sandbox", long_about = None)]
struct Cli {
    /// Runtime configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Destination path
        #[arg(default_value = "funcrun.json")]
        path: PathBuf,
    },

    /// Execute a script once
    Run {
        /// Script source file
        script: PathBuf,

        /// Trigger: `web` or an event/topic name
        #[arg(long, default_value = "web")]
        trigger: String,

        /// Event payload (JSON); selects a non-HTTP trigger
        #[arg(long, conflicts_with_all = ["body", "content_type", "query", "header"])]
        event: Option<String>,

        /// HTTP body
        #[arg(long)]
        body: Option<String>,

        /// HTTP Content-Type
        #[arg(long)]
        content_type: Option<String>,

        /// HTTP query string
        #[arg(long)]
        query: Option<String>,

        /// HTTP header as `name:value` (repeatable)
        #[arg(long)]
        header: Vec<String>,

        /// Tenant database name
        #[arg(long, default_value = "local")]
        store: String,

        /// Acting account id
        #[arg(long, default_value = "local-account")]
        account: String,

        /// Acting user id
        #[arg(long, default_value = "local-user")]
        user: String,

        /// Session token of the acting user
        #[arg(long, default_value = "local-token")]
        token: String,

        /// Seconds to wait for the run record
        #[arg(long, default_value = "5")]
        wait: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => RuntimeConfig::load(path)?,
        None => RuntimeConfig::default(),
    };

    match cli.command {
        Commands::Init { path } => {
            config.save(&path)?;
            println!("Wrote configuration to {:?}", path);
        }

        Commands::Run {
            script,
            trigger,
            event,
            body,
            content_type,
            query,
            header,
            store,
            account,
            user,
            token,
            wait,
        } => {
            let code = std::fs::read_to_string(&script)
                .with_context(|| format!("Failed to read script: {:?}", script))?;
            let name = script
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "function".to_string());

            let payload = match event {
                Some(text) => {
                    let value: Value =
                        serde_json::from_str(&text).context("--event must be valid JSON")?;
                    TriggerPayload::Event(value)
                }
                None => {
                    let mut request = HttpRequest::new()
                        .query(query.unwrap_or_default())
                        .body(body.unwrap_or_default());
                    if let Some(content_type) = content_type {
                        request = request.header("Content-Type", content_type);
                    }
                    for raw in header {
                        let Some((name, value)) = raw.split_once(':') else {
                            bail!("header must be name:value, got {raw:?}");
                        };
                        request = request.header(name.trim(), value.trim());
                    }
                    TriggerPayload::Http(request)
                }
            };

            let documents = Arc::new(MemoryStore::new());
            let publisher = Arc::new(MemoryPublisher::new());
            let history = Arc::new(MemoryHistory::new());
            let services = Services::new(
                documents.clone(),
                Arc::new(ClauseParser),
                publisher.clone(),
                history.clone(),
            );

            let runtime = Runtime::from_current(config, services)?;
            let data = ExecData::new(name, trigger, code).with_base(store.clone());
            let function_id = data.id;
            let store = StoreHandle::new(store);
            let env = runtime.environment(Auth::new(account, user, token), store.clone(), data);

            let outcome = tokio::task::block_in_place(|| env.execute(payload));
            let recorded = outcome.as_ref().map_or_else(|err| err.is_recorded(), |_| true);
            let runs = if recorded {
                history
                    .wait_for_runs(&function_id, 1, Duration::from_secs(wait))
                    .await
            } else {
                Vec::new()
            };

            let collections: serde_json::Map<String, Value> = documents
                .collections(&store)
                .into_iter()
                .map(|col| {
                    let docs = documents.documents(&store, &col);
                    (col, json!(docs))
                })
                .collect();

            let report = json!({
                "ok": outcome.is_ok(),
                "error": outcome.as_ref().err().map(|err| err.to_string()),
                "run": runs.last(),
                "messages": publisher.published(),
                "collections": collections,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);

            if outcome.is_err() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
