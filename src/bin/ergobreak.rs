//! Binary entry point for the ergobreak activity engine.
#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::Local;
use clap::{Parser, ValueEnum};
use ergobreak::error::EngineError;
use ergobreak::transport::{EventSource, FileTailSource};
use ergobreak::{Cache, CacheController, Config, Database, SyncMode};
use tokio_stream::StreamExt;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "ergobreak",
    version,
    about = "Activity-interval engine for an ergonomic-break tracker"
)]
struct Cli {
    /// Path to the SQLite database file.
    #[arg(long, env = "ERGOBREAK_DB", default_value = "ergobreak.sqlite")]
    db_path: PathBuf,

    /// Path to the local append-only event log to tail.
    #[arg(long, env = "ERGOBREAK_LOG")]
    event_log: PathBuf,

    /// Host identifier this log belongs to, for the position register.
    #[arg(long, env = "ERGOBREAK_HOST", default_value = "localhost")]
    host: String,

    #[arg(long, value_enum, default_value_t = SynchronousArg::Full)]
    synchronous: SynchronousArg,

    /// How often to poll the event log for new bytes, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    poll_interval_ms: u64,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SynchronousArg {
    Full,
    Normal,
}

impl From<SynchronousArg> for SyncMode {
    fn from(value: SynchronousArg) -> Self {
        match value {
            SynchronousArg::Full => SyncMode::Full,
            SynchronousArg::Normal => SyncMode::Normal,
        }
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ergobreak=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        tracing::error!(%err, "ergobreak exited with an error");
        std::process::exit(1);
    }
}

async fn run() -> ergobreak::Result<()> {
    let cli = Cli::parse();

    let config = Config {
        db_path: cli.db_path.clone(),
        sync_mode: cli.synchronous.into(),
        ..Config::default()
    };

    let db = Database::open(&config)?;
    let mut controller = CacheController::new(db, &config, Local::now())?;
    info!(db_path = ?config.db_path, "opened database");

    let source = FileTailSource::new(cli.host.clone(), cli.event_log.clone())
        .with_poll_interval(std::time::Duration::from_millis(cli.poll_interval_ms));
    let retry_delay = std::time::Duration::from_secs(5);
    let mut positions: HashMap<String, u64> = HashMap::new();

    // Wraps the whole subscribe-and-apply loop, mirroring
    // `ergometer.util.retry_on(PositionError)` around `database_updater`:
    // a `Position` mismatch surfaces out of `controller.apply` (the only
    // place it's raised), not out of the transport stream itself, so the
    // resubscribe has to live here rather than inside the transport layer.
    'resubscribe: loop {
        let mut batches = source.subscribe(positions.clone());
        loop {
            tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown signal received");
                    return Ok(());
                }
                next = batches.next() => {
                    match next {
                        Some(Ok(batch)) => {
                            match controller.apply(Local::now(), &batch.host, batch.position, &batch.bytes) {
                                Ok(()) => {
                                    positions.insert(
                                        batch.host.clone(),
                                        batch.position + batch.bytes.len() as u64,
                                    );
                                    log_metrics(&controller);
                                }
                                Err(EngineError::Position { host, expected, .. }) => {
                                    warn!(host = %host, expected, "position mismatch, resubscribing");
                                    positions.insert(host, expected);
                                    tokio::time::sleep(retry_delay).await;
                                    continue 'resubscribe;
                                }
                                Err(err) => return Err(err),
                            }
                        }
                        Some(Err(err)) => {
                            warn!(%err, "transport error, continuing");
                        }
                        None => {
                            info!("event source closed");
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}

fn log_metrics(controller: &CacheController) {
    let now = chrono::Utc::now().timestamp() as u64;
    let metrics = controller.metrics_at(now);
    let Cache { daily_target, .. } = controller.snapshot();
    info!(
        daily_value = metrics.daily_value,
        daily_target,
        rest_value = metrics.rest_value,
        session_value = metrics.session_value,
        "metrics updated"
    );
}
