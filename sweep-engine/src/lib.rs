// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Background worker that returns lapsed reservations to the pool on a fixed interval.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use engine_api::{Engine, EngineError, EngineHealth, EngineResult, HealthStatus};
use log::{debug, error, info};
use metrics::SlotMetrics;
use parking_lot::Mutex;
use slot_ledger::{SlotController, SweepReport};

const DEFAULT_INTERVAL_SECS: u64 = 60;
const STOP_POLL: Duration = Duration::from_millis(100);

#[derive(Clone, Debug)]
pub struct SweepEngineConfig {
    pub label: String,
    pub interval: Duration,
}

impl Default for SweepEngineConfig {
    fn default() -> Self {
        Self {
            label: "dev".to_string(),
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
        }
    }
}

pub struct SweepEngine {
    inner: Arc<SweepInner>,
}

impl SweepEngine {
    pub fn new(
        config: SweepEngineConfig,
        controller: Arc<SlotController>,
        metrics: Option<Arc<SlotMetrics>>,
    ) -> Self {
        Self {
            inner: SweepInner::new(config, controller, metrics),
        }
    }

    /// Runs one sweep on the caller's thread.
    pub fn sweep_once(&self) -> SweepReport {
        self.inner.sweep()
    }
}

impl Engine for SweepEngine {
    fn name(&self) -> &str {
        "sweep-engine"
    }

    fn start(&self) -> EngineResult<()> {
        SweepInner::start(&self.inner)
    }

    fn stop(&self) -> EngineResult<()> {
        self.inner.stop()
    }

    fn health(&self) -> EngineHealth {
        self.inner.health.lock().clone()
    }
}

struct SweepInner {
    config: SweepEngineConfig,
    controller: Arc<SlotController>,
    metrics: Option<Arc<SlotMetrics>>,
    state: Mutex<EngineRuntimeState>,
    health: Mutex<EngineHealth>,
}

impl SweepInner {
    fn new(
        config: SweepEngineConfig,
        controller: Arc<SlotController>,
        metrics: Option<Arc<SlotMetrics>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            controller,
            metrics,
            state: Mutex::new(EngineRuntimeState::Stopped),
            health: Mutex::new(EngineHealth::new(HealthStatus::Stopped, None)),
        })
    }

    fn start(this: &Arc<Self>) -> EngineResult<()> {
        let mut guard = this.state.lock();
        if matches!(*guard, EngineRuntimeState::Running(_)) {
            return Err(EngineError::AlreadyRunning);
        }
        this.set_health(HealthStatus::Starting, None);
        let cancel = Arc::new(AtomicBool::new(false));
        let runner = Arc::clone(this);
        let cancel_clone = Arc::clone(&cancel);
        let handle = thread::Builder::new()
            .name(format!("{}-sweep", this.config.label))
            .spawn(move || runner.run(cancel_clone))
            .map_err(|err| EngineError::Failure {
                source: Box::new(err),
            })?;
        info!(
            "[{}] sweep engine starting (interval {:?})",
            this.config.label, this.config.interval
        );
        *guard = EngineRuntimeState::Running(ThreadBundle { cancel, handle });
        Ok(())
    }

    fn stop(&self) -> EngineResult<()> {
        let mut guard = self.state.lock();
        let Some(bundle) = guard.take_running() else {
            return Err(EngineError::NotRunning);
        };
        bundle.cancel.store(true, Ordering::Relaxed);
        if let Err(err) = bundle.handle.join() {
            error!("[{}] sweep join error: {:?}", self.config.label, err);
        }
        *guard = EngineRuntimeState::Stopped;
        self.set_health(HealthStatus::Stopped, None);
        Ok(())
    }

    fn run(self: Arc<Self>, cancel: Arc<AtomicBool>) {
        self.set_health(HealthStatus::Ready, None);
        while !cancel.load(Ordering::Relaxed) {
            let report = self.sweep();
            if report.failed.is_empty() {
                self.set_health(HealthStatus::Ready, None);
            } else {
                let detail = format!("{} drawings could not be swept", report.failed.len());
                error!("[{}] {}: {:?}", self.config.label, detail, report.failed);
                self.set_health(HealthStatus::Degraded, Some(detail));
            }
            sleep_with_cancel(&cancel, self.config.interval);
        }
        info!("[{}] sweep engine stopped", self.config.label);
    }

    fn sweep(&self) -> SweepReport {
        let report = self.controller.sweep_all();
        self.health.lock().passes += 1;
        if let Some(metrics) = &self.metrics {
            metrics.record_sweep(report.released);
        }
        debug!(
            "[{}] sweep pass released {} reservations",
            self.config.label, report.released
        );
        report
    }

    fn set_health(&self, status: HealthStatus, detail: Option<String>) {
        let mut guard = self.health.lock();
        guard.status = status;
        guard.detail = detail;
    }
}

fn sleep_with_cancel(cancel: &AtomicBool, interval: Duration) {
    let mut remaining = interval;
    while remaining > Duration::ZERO {
        if cancel.load(Ordering::Relaxed) {
            break;
        }
        let step = remaining.min(STOP_POLL);
        thread::sleep(step);
        remaining = remaining.saturating_sub(step);
    }
}

enum EngineRuntimeState {
    Stopped,
    Running(ThreadBundle),
}

impl EngineRuntimeState {
    fn take_running(&mut self) -> Option<ThreadBundle> {
        match std::mem::replace(self, EngineRuntimeState::Stopped) {
            EngineRuntimeState::Running(bundle) => Some(bundle),
            other => {
                *self = other;
                None
            }
        }
    }
}

struct ThreadBundle {
    cancel: Arc<AtomicBool>,
    handle: thread::JoinHandle<()>,
}
