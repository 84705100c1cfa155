// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use log::{info, warn};
use metrics::SlotMetrics;
use slot_ledger::SlotController;

const STEP: Duration = Duration::from_millis(500);

/// Periodically logs ledger totals and mirrors them into the gauges.
pub struct LedgerStatusLogger {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl LedgerStatusLogger {
    pub fn spawn(
        controller: Arc<SlotController>,
        metrics: Arc<SlotMetrics>,
        interval: Duration,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_clone = Arc::clone(&stop);
        let handle = thread::spawn(move || {
            while !stop_clone.load(Ordering::Relaxed) {
                match controller.snapshot() {
                    Ok(snapshot) => {
                        metrics.observe_snapshot(&snapshot);
                        info!("{snapshot}");
                    }
                    Err(err) => warn!("failed to snapshot slot ledger: {err}"),
                }
                sleep_with_stop(&stop_clone, interval);
            }
        });
        Self {
            stop,
            handle: Some(handle),
        }
    }

    pub fn shutdown(mut self) {
        self.halt();
    }

    fn halt(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for LedgerStatusLogger {
    fn drop(&mut self) {
        self.halt();
    }
}

fn sleep_with_stop(stop: &AtomicBool, interval: Duration) {
    let mut remaining = interval;
    while remaining > Duration::ZERO {
        if stop.load(Ordering::Relaxed) {
            break;
        }
        let sleep_for = remaining.min(STEP);
        thread::sleep(sleep_for);
        remaining = remaining.saturating_sub(sleep_for);
    }
}
