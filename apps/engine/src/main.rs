mod config;
mod database;
mod monitoring;
mod pool;
mod validation;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use config::Config;
use database::{Database, DatabaseImpl, initialize_database};
use monitoring::notifier::PushSender;
use monitoring::{CheckExecutor, HttpPushSender, ResultRecorder, Scheduler, TransitionNotifier};
use pool::{LibsqlManager, LibsqlPool};

#[derive(Parser, Debug)]
#[command(name = "pulse-engine", about = "Uptime monitoring engine", version)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Database path, overrides the configured one
    #[arg(long)]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = Config::from_config(args.config.as_deref())
        .map_err(|err| anyhow!("failed to load configuration: {err:?}"))?;
    info!("{config}");

    let database_path = args
        .database
        .unwrap_or_else(|| PathBuf::from(&config.database.path));
    let pool = open_pool(&database_path).await?;

    let conn = pool.get().await?;
    initialize_database(&conn).await?;
    drop(conn);

    let database: Arc<dyn Database> = Arc::new(DatabaseImpl::new_from_pool(pool));
    let executor = Arc::new(CheckExecutor::new()?);
    let recorder = Arc::new(ResultRecorder::new(Arc::clone(&database)));

    let sender: Option<Arc<dyn PushSender>> = config
        .push
        .gateway_url
        .clone()
        .map(|url| {
            Arc::new(HttpPushSender::new(url, config.push.api_key.clone()))
                as Arc<dyn PushSender>
        });
    if sender.is_none() {
        info!("push gateway not configured, transition alerts disabled");
    }
    let notifier = Arc::new(TransitionNotifier::new(Arc::clone(&database), sender));

    let scheduler = Scheduler::new(
        database,
        executor,
        recorder,
        notifier,
        Duration::from_secs(config.engine.tick_interval_seconds),
        config.engine.max_concurrent_checks,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(());
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown signal received"),
            Err(e) => error!("failed to listen for shutdown signal: {e}"),
        }
        let _ = shutdown_tx.send(());
    });

    scheduler.run(shutdown_rx).await;
    info!("engine stopped");

    Ok(())
}

async fn open_pool(path: &std::path::Path) -> Result<LibsqlPool> {
    let database = libsql::Builder::new_local(path).build().await?;
    let pool = LibsqlPool::builder(LibsqlManager::new(database)).build()?;
    Ok(pool)
}
