//! `taskcrew` coordinator -- task assignment and load rebalancing.
//!
//! Serves a JSON-lines command socket and runs the periodic rebalancer
//! until interrupted.
//!
//! # Usage
//!
//! ```bash
//! # Run on default address 127.0.0.1:7411 with the demo tasks
//! cargo run --bin taskcrew -- --seed-demo
//!
//! # Custom capacities via environment
//! ENGINEER_MAX_CAPACITY=8 cargo run --bin taskcrew
//!
//! # Keep state across restarts
//! cargo run --bin taskcrew -- --snapshot /tmp/taskcrew.bin
//! ```

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use taskcrew_coord::config::{CoordCliArgs, CoordConfig};
use taskcrew_coord::coordinator::Coordinator;
use taskcrew_coord::rebalancer;
use taskcrew_coord::server;
use taskcrew_proto::codec;
use tracing_appender::non_blocking::WorkerGuard;

#[tokio::main]
async fn main() {
    let cli = CoordCliArgs::parse();

    // Load config from CLI args + config file + env vars + defaults.
    let config = match CoordConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    let _log_guard = init_logging(&config.log_level, config.log_file.as_deref());

    tracing::info!(addr = %config.bind_addr, "starting taskcrew coordinator");

    let coordinator = Arc::new(Coordinator::new(config.crew.clone()));

    if let Err(e) = prepare_state(&coordinator, &config) {
        tracing::error!(error = %e, "failed to load snapshot");
        std::process::exit(1);
    }

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let rebalance_task = rebalancer::spawn_rebalancer(
        Arc::clone(&coordinator),
        config.rebalance_interval,
        shutdown_rx,
    );

    let server_task = match server::start_server(&config.bind_addr, Arc::clone(&coordinator)).await
    {
        Ok((bound_addr, handle)) => {
            tracing::info!(addr = %bound_addr, "command socket listening");
            handle
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start command socket");
            std::process::exit(1);
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            tracing::info!("shutdown requested");
        }
        result = server_task => {
            if let Err(e) = result {
                tracing::error!(error = %e, "command socket task failed");
            }
        }
    }

    let _ = shutdown_tx.send(true);
    if let Err(e) = rebalance_task.await {
        tracing::warn!(error = %e, "rebalancer task failed");
    }

    if let Some(path) = &config.snapshot_path {
        match save_snapshot(&coordinator, path) {
            Ok(bytes) => tracing::info!(path = %path.display(), bytes, "snapshot written"),
            Err(e) => tracing::error!(path = %path.display(), error = %e, "failed to write snapshot"),
        }
    }

    tracing::info!("taskcrew exiting");
}

/// Initialize logging to stderr, or to a file when one is given.
///
/// Returns a [`WorkerGuard`] for file output that must be held until
/// shutdown so buffered entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let Some((log_dir, file_name)) = file_path.and_then(|p| Some((p.parent()?, p.file_name()?)))
    else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
        return None;
    };

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

#[derive(Debug, thiserror::Error)]
enum SnapshotFileError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Codec(#[from] codec::CodecError),

    #[error(transparent)]
    Restore(#[from] taskcrew_coord::coordinator::RestoreError),
}

/// Restores the configured snapshot, then seeds the demo tasks if asked
/// and nothing was restored.
fn prepare_state(coordinator: &Coordinator, config: &CoordConfig) -> Result<(), SnapshotFileError> {
    let restored = match &config.snapshot_path {
        Some(path) => load_snapshot(coordinator, path)?,
        None => false,
    };
    if config.seed_demo {
        if restored {
            tracing::info!("snapshot restored, skipping demo tasks");
        } else if let Err(e) = coordinator.seed_demo() {
            tracing::error!(error = %e, "failed to seed demo tasks");
        }
    }
    Ok(())
}

/// Restores state from `path`, returning whether a snapshot was found.
/// A missing file means a fresh start.
fn load_snapshot(coordinator: &Coordinator, path: &Path) -> Result<bool, SnapshotFileError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "no snapshot found, starting empty");
            return Ok(false);
        }
        Err(e) => return Err(e.into()),
    };
    coordinator.restore(codec::decode(&bytes)?)?;
    Ok(true)
}

/// Writes the current state to `path`, returning the number of bytes.
fn save_snapshot(coordinator: &Coordinator, path: &Path) -> Result<usize, SnapshotFileError> {
    let bytes = codec::encode(&coordinator.snapshot())?;
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, &bytes)?;
    Ok(bytes.len())
}
