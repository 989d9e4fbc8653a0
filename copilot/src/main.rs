//! copilot-host - stdio bridge for the Prompt Copilot webview
//!
//! Reads one JSON message per line from stdin, routes it through the core
//! handlers and writes every push message to stdout as a JSON line. Logs go
//! to the log file only so stdout stays a clean message stream.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use copilot_core::db::SqliteStore;
use copilot_core::host::memory::StaticWorkspace;
use copilot_core::host::probe::default_probe;
use copilot_core::host::{ConfigurationStore, HostCapabilities, KvStore, SecretStore};
use copilot_core::protocol::{ChannelWebview, PushSender};
use copilot_core::{forward, Config, HostContext, Router};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::task::JoinSet;

#[derive(Parser)]
#[command(name = "copilot-host")]
#[command(about = "Route Prompt Copilot webview messages over stdin/stdout")]
#[command(version)]
struct Args {
    /// Workspace folder (repeatable)
    #[arg(short, long = "workspace", value_name = "DIR")]
    workspaces: Vec<PathBuf>,

    /// Editor application name, used to detect the platform
    #[arg(long, default_value = "Cursor")]
    editor: String,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load().context("failed to load config")?;
    match args.verbose {
        0 => {}
        1 => config.logging.level = "debug".to_string(),
        _ => config.logging.level = "trace".to_string(),
    }
    let _guard = copilot_core::logging::init(&config.logging).context("failed to initialize logging")?;

    let db_path = Config::database_path();
    let store = Arc::new(
        SqliteStore::open(&db_path).with_context(|| format!("failed to open store at {}", db_path.display()))?,
    );
    store.migrate().context("failed to migrate store")?;

    let workspaces = if args.workspaces.is_empty() {
        vec![std::env::current_dir().context("failed to resolve current directory")?]
    } else {
        args.workspaces
    };

    let mut host = HostCapabilities::in_memory();
    host.kv = store.clone() as Arc<dyn KvStore>;
    host.secrets = store.clone() as Arc<dyn SecretStore>;
    host.configuration = store as Arc<dyn ConfigurationStore>;
    host.workspace = Arc::new(StaticWorkspace::new(workspaces, args.editor));
    host.probe = default_probe();

    let ctx = Arc::new(
        HostContext::builder(host, config)
            .build()
            .await
            .context("failed to start host services")?,
    );
    tracing::info!(platform = ?ctx.platform(), db = %db_path.display(), "copilot-host started");

    let (webview, mut pushes) = ChannelWebview::new();
    let push = PushSender::new(Arc::new(webview));

    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(message) = pushes.recv().await {
            let mut line = message.to_json().to_string();
            line.push('\n');
            if let Err(e) = stdout.write_all(line.as_bytes()).await {
                tracing::error!(error = %e, "Failed to write to stdout");
                break;
            }
            let _ = stdout.flush().await;
        }
    });

    let router = Arc::new(Router::with_default_handlers(ctx.clone(), push.clone()));
    let forwarder = forward::spawn(ctx.clone(), push);
    let precache = ctx.sync.as_ref().map(|engine| engine.spawn_precache());

    let mut in_flight = JoinSet::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        let router = router.clone();
        in_flight.spawn(async move {
            router.dispatch_line(&line).await;
        });
    }

    tracing::debug!(pending = in_flight.len(), "stdin closed, waiting for in-flight messages");
    while in_flight.join_next().await.is_some() {}

    forwarder.abort();
    let _ = forwarder.await;
    if let Some(precache) = precache {
        precache.abort();
    }
    drop(router);
    let _ = writer.await;

    tracing::info!("copilot-host stopped");
    Ok(())
}
