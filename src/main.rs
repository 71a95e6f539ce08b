use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use tickd::config::DaemonConfig;
use tickd::realtime::RealtimeChannel;
use tickd::remote::HttpRemoteClient;
use tickd::rest;
use tickd::sync::driver::SyncDriver;
use tickd::sync::SyncOrchestrator;
use tickd::tasks::store::{SqliteTaskStore, TaskStore};
use tickd::AppContext;

#[derive(Parser)]
#[command(
    name = "tickd",
    about = "tickd — TickTick task synchronization daemon",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// REST API port
    #[arg(long, env = "TICKD_PORT")]
    port: Option<u16>,

    /// Data directory for config and the SQLite task store
    #[arg(long, env = "TICKD_DATA_DIR")]
    data_dir: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "TICKD_LOG")]
    log: Option<String>,

    /// Bind address for the REST server (default: 127.0.0.1)
    #[arg(long, env = "TICKD_BIND")]
    bind_address: Option<String>,

    /// Write logs to this file path (rotated daily). Optional.
    #[arg(long, env = "TICKD_LOG_FILE")]
    log_file: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the daemon (default when no subcommand given).
    ///
    /// Runs the REST server, the realtime push channel, and the scheduled
    /// full-sync loop in the foreground.
    Serve,
    /// Run one full consistency pass and exit.
    ///
    /// Pulls every task from TickTick, reconciles the local store, and
    /// prints the sync report as JSON. Does not open the realtime channel.
    Sync,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        None | Some(Command::Serve) => {
            run_server(args).await?;
        }
        Some(Command::Sync) => {
            run_sync_once(args).await?;
        }
    }

    Ok(())
}

/// Initialize the tracing subscriber.
/// If `log_file` is set, logs go to both stdout and a daily-rolling file.
/// Returns a `WorkerGuard` that must stay alive for the process lifetime.
///
/// `log_format` may be `"pretty"` (default, human-readable compact format) or
/// `"json"` (structured JSON for log aggregators).
///
/// If the log directory cannot be created, falls back to stdout-only logging
/// with a warning — never panics.
fn setup_logging(
    log_level: &str,
    log_file: Option<&std::path::Path>,
    log_format: &str,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let use_json = log_format == "json";

    if let Some(path) = log_file {
        let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
        let filename = path
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("tickd.log"));

        // Ensure the directory exists before tracing-appender tries to open it.
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!(
                "warn: could not create log directory '{}': {e} — falling back to stdout",
                dir.display()
            );
            if use_json {
                tracing_subscriber::fmt().json().with_env_filter(log_level).init();
            } else {
                tracing_subscriber::fmt().with_env_filter(log_level).compact().init();
            }
            return None;
        }

        let appender = tracing_appender::rolling::daily(dir, filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);

        if use_json {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().json())
                .with(fmt::layer().json().with_writer(non_blocking))
                .init();
        } else {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().compact())
                .with(fmt::layer().with_writer(non_blocking))
                .init();
        }

        Some(guard)
    } else if use_json {
        tracing_subscriber::fmt().json().with_env_filter(log_level).init();
        None
    } else {
        tracing_subscriber::fmt().with_env_filter(log_level).compact().init();
        None
    }
}

/// Wire the sync engine when an access token is configured.
fn build_driver(config: &DaemonConfig, store: Arc<dyn TaskStore>) -> Result<Option<Arc<SyncDriver>>> {
    let Some(token) = &config.access_token else {
        return Ok(None);
    };
    let client = Arc::new(HttpRemoteClient::new(&config.api_base_url, token)?);
    let orchestrator = Arc::new(SyncOrchestrator::new(store, client));
    let channel = Arc::new(RealtimeChannel::new(
        &config.ws_url,
        token,
        orchestrator.clone(),
    ));
    Ok(Some(Arc::new(SyncDriver::new(orchestrator, channel))))
}

async fn run_server(args: Args) -> Result<()> {
    let config = Arc::new(DaemonConfig::new(
        args.port,
        args.data_dir,
        args.log,
        args.bind_address,
    ));
    let _guard = setup_logging(&config.log, args.log_file.as_deref(), &config.log_format);

    info!(version = env!("CARGO_PKG_VERSION"), "tickd starting");
    info!(
        data_dir = %config.data_dir.display(),
        port = config.port,
        sync_interval_secs = config.sync_interval_secs,
        "config loaded"
    );

    let store: Arc<dyn TaskStore> = Arc::new(SqliteTaskStore::new(&config.data_dir).await?);

    let driver = build_driver(&config, store.clone())?;
    if driver.is_none() {
        warn!("TICKD_ACCESS_TOKEN not configured — remote sync disabled until set");
    }

    // ── Scheduled full-sync loop ─────────────────────────────────────────────
    // The first tick fires immediately, giving one consistency pass at boot.
    if let Some(driver) = driver.clone() {
        let interval_secs = config.sync_interval_secs;
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(std::time::Duration::from_secs(interval_secs));
            loop {
                interval.tick().await;
                match driver.run_sync().await {
                    Ok(report) => info!(
                        pulled = report.pulled,
                        created = report.created,
                        updated = report.updated,
                        failed = report.failed,
                        "scheduled sync complete"
                    ),
                    Err(e) => error!(err = %e, "scheduled sync failed"),
                }
            }
        });
    }

    let ctx = Arc::new(AppContext {
        config: config.clone(),
        store,
        driver: driver.clone(),
        started_at: std::time::Instant::now(),
    });

    // Serve until ctrl-c, then close the realtime channel cleanly.
    let serve = rest::start_rest_server(ctx);
    tokio::select! {
        result = serve => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
            if let Some(driver) = &driver {
                driver.shutdown();
            }
        }
    }

    Ok(())
}

async fn run_sync_once(args: Args) -> Result<()> {
    let config = DaemonConfig::new(args.port, args.data_dir, args.log, args.bind_address);
    let _guard = setup_logging(&config.log, args.log_file.as_deref(), &config.log_format);

    let Some(token) = &config.access_token else {
        bail!("TickTick access token not configured — set TICKD_ACCESS_TOKEN");
    };

    let store: Arc<dyn TaskStore> = Arc::new(SqliteTaskStore::new(&config.data_dir).await?);
    let client = Arc::new(HttpRemoteClient::new(&config.api_base_url, token)?);
    let orchestrator = SyncOrchestrator::new(store, client);

    let report = orchestrator.pull_all().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
