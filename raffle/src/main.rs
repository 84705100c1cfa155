// Copyright (c) James Kassemi, SC, US. All rights reserved.
mod status;

use std::{env, net::SocketAddr, process, sync::Arc, time::Duration};

use config::ConfigError;
use core_types::{
    config::{AppConfig, StoreKind},
    SystemClock,
};
use engine_api::{Engine, EngineError};
use log::{error, info};
use metrics::{MetricsError, SlotMetrics};
use raffle_api::{ApiError, RaffleApi};
use slot_ledger::{LedgerConfig, MemoryStore, SlotController, SlotError, StorageReport};
use status::LedgerStatusLogger;
use sweep_engine::{SweepEngine, SweepEngineConfig};
use thiserror::Error;
use tokio::{net::TcpListener, sync::watch};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(err) = run() {
        error!("raffle failed: {err}");
        process::exit(1);
    }
}

fn run() -> Result<(), AppError> {
    let config = match env::args().nth(1) {
        Some(path) => AppConfig::load_from(&path)?,
        None => AppConfig::load()?,
    };

    let controller = Arc::new(open_ledger(&config)?);
    let metrics = Arc::new(SlotMetrics::new()?);
    info!(
        "[{}] ledger ready: store={:?}, reservations up to {} minutes (default {}), query batch {}",
        config.label,
        config.store,
        config.slots.max_reservation_minutes,
        config.slots.default_reservation_minutes,
        config.slots.max_query_batch
    );

    let sweep_engine = SweepEngine::new(
        SweepEngineConfig {
            label: config.label.clone(),
            interval: Duration::from_secs(config.sweep.interval_secs),
        },
        Arc::clone(&controller),
        Some(Arc::clone(&metrics)),
    );
    if config.sweep.enabled {
        sweep_engine.start()?;
        log_engine_health(&sweep_engine);
    } else {
        info!("[{}] expiry sweep disabled; reserve still sweeps per drawing", config.label);
    }

    let status_logger = LedgerStatusLogger::spawn(
        Arc::clone(&controller),
        Arc::clone(&metrics),
        Duration::from_secs(config.status_log_interval_secs),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(true);
    })?;

    let api = Arc::new(RaffleApi::new(Arc::clone(&controller), metrics));
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name(format!("{}-http", config.label))
        .build()
        .map_err(AppError::Runtime)?;
    runtime.block_on(serve(api, config.http_addr, shutdown_rx))?;

    info!("[{}] shutdown signal received; stopping workers", config.label);
    status_logger.shutdown();
    if config.sweep.enabled {
        sweep_engine.stop()?;
    }
    Ok(())
}

fn open_ledger(config: &AppConfig) -> Result<SlotController, AppError> {
    match config.store {
        StoreKind::Memory => {
            info!("[{}] using in-memory store; state is lost on exit", config.label);
            Ok(SlotController::new(
                Arc::new(MemoryStore::new()),
                Arc::new(SystemClock),
                config.slots.clone(),
            ))
        }
        StoreKind::File => {
            let ledger_config =
                LedgerConfig::new(config.state_dir.clone()).with_limits(config.slots.clone());
            let (controller, report) = SlotController::bootstrap(ledger_config)?;
            log_storage_report(&config.label, &report);
            Ok(controller)
        }
    }
}

async fn serve(
    api: Arc<RaffleApi>,
    addr: SocketAddr,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), AppError> {
    let listener = TcpListener::bind(addr).await.map_err(AppError::Bind)?;
    api.serve(listener, async move {
        while !*shutdown.borrow() {
            if shutdown.changed().await.is_err() {
                break;
            }
        }
    })
    .await?;
    Ok(())
}

fn log_storage_report(label: &str, report: &StorageReport) {
    info!(
        "[{label}] drawing books at {} (drawings={}, participants={}, load_time={:?})",
        report.path.display(),
        report.drawings,
        report.participants,
        report.load_duration
    );
}

fn log_engine_health(engine: &dyn Engine) {
    info!("{} status: {}", engine.name(), engine.health());
}

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Ledger(#[from] SlotError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("failed to set up metrics: {0}")]
    Metrics(#[from] MetricsError),
    #[error("failed to install signal handler: {0}")]
    Signal(#[from] ctrlc::Error),
    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
    #[error("failed to bind http listener: {0}")]
    Bind(#[source] std::io::Error),
}
