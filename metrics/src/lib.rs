// Copyright (c) James Kassemi, SC, US. All rights reserved.
//! Prometheus metrics for slot operations. Each instance owns its registry, so tests and
//! embedded ledgers never collide on the process-wide default registry.
use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder,
};
use slot_ledger::LedgerSnapshot;

pub use prometheus::Error as MetricsError;

/// Outcome label for counters that distinguish success from refusal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    Conflict,
    Rejected,
}

impl Outcome {
    fn label(self) -> &'static str {
        match self {
            Outcome::Ok => "ok",
            Outcome::Conflict => "conflict",
            Outcome::Rejected => "rejected",
        }
    }
}

pub struct SlotMetrics {
    registry: Registry,
    reservations: IntCounterVec,
    registrations: IntCounterVec,
    confirmations: IntCounter,
    swept: IntCounter,
    sweep_passes: IntCounter,
    winner_runs: IntCounter,
    slots: IntGaugeVec,
    drawings: IntGauge,
    participants: IntGauge,
}

impl SlotMetrics {
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new_custom(Some("raffle".to_string()), None)?;
        let reservations = IntCounterVec::new(
            Opts::new("reservations_total", "Reserve attempts by outcome"),
            &["outcome"],
        )?;
        let registrations = IntCounterVec::new(
            Opts::new("registrations_total", "Participant registrations by outcome"),
            &["outcome"],
        )?;
        let confirmations = IntCounter::new(
            "confirmations_total",
            "Numbers turned from reserved to taken",
        )?;
        let swept = IntCounter::new(
            "swept_reservations_total",
            "Lapsed reservations returned to the pool",
        )?;
        let sweep_passes = IntCounter::new("sweep_passes_total", "Completed expiry sweep passes")?;
        let winner_runs = IntCounter::new("winner_runs_total", "Winner selections stored")?;
        let slots = IntGaugeVec::new(
            Opts::new("slots", "Slots across all drawings by stored status"),
            &["status"],
        )?;
        let drawings = IntGauge::new("drawings", "Drawings loaded in the ledger")?;
        let participants = IntGauge::new("participants", "Participants across all drawings")?;

        registry.register(Box::new(reservations.clone()))?;
        registry.register(Box::new(registrations.clone()))?;
        registry.register(Box::new(confirmations.clone()))?;
        registry.register(Box::new(swept.clone()))?;
        registry.register(Box::new(sweep_passes.clone()))?;
        registry.register(Box::new(winner_runs.clone()))?;
        registry.register(Box::new(slots.clone()))?;
        registry.register(Box::new(drawings.clone()))?;
        registry.register(Box::new(participants.clone()))?;

        Ok(Self {
            registry,
            reservations,
            registrations,
            confirmations,
            swept,
            sweep_passes,
            winner_runs,
            slots,
            drawings,
            participants,
        })
    }

    pub fn record_reservation(&self, outcome: Outcome) {
        self.reservations
            .with_label_values(&[outcome.label()])
            .inc();
    }

    pub fn record_registration(&self, outcome: Outcome, numbers: usize) {
        self.registrations
            .with_label_values(&[outcome.label()])
            .inc();
        if outcome == Outcome::Ok {
            self.confirmations.inc_by(numbers as u64);
        }
    }

    pub fn record_confirmation(&self) {
        self.confirmations.inc();
    }

    pub fn record_sweep(&self, released: usize) {
        self.sweep_passes.inc();
        self.swept.inc_by(released as u64);
    }

    pub fn record_winner_run(&self) {
        self.winner_runs.inc();
    }

    pub fn observe_snapshot(&self, snapshot: &LedgerSnapshot) {
        self.drawings.set(snapshot.drawings as i64);
        self.participants.set(snapshot.participants as i64);
        let counts = &snapshot.slots;
        for (status, value) in [
            ("available", counts.available),
            ("reserved", counts.reserved),
            ("taken", counts.taken),
        ] {
            self.slots
                .with_label_values(&[status])
                .set(i64::from(value));
        }
    }

    /// Text exposition of every metric in this instance's registry.
    pub fn encode(&self) -> Result<Vec<u8>, MetricsError> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }

    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slot_ledger::SlotStatusCounts;

    #[test]
    fn counters_show_up_in_exposition() {
        let metrics = SlotMetrics::new().unwrap();
        metrics.record_reservation(Outcome::Ok);
        metrics.record_reservation(Outcome::Conflict);
        metrics.record_registration(Outcome::Ok, 3);
        metrics.record_sweep(4);
        let text = String::from_utf8(metrics.encode().unwrap()).unwrap();
        assert!(text.contains("raffle_reservations_total{outcome=\"conflict\"} 1"));
        assert!(text.contains("raffle_confirmations_total 3"));
        assert!(text.contains("raffle_swept_reservations_total 4"));
        assert!(text.contains("raffle_sweep_passes_total 1"));
    }

    #[test]
    fn snapshot_sets_gauges() {
        let metrics = SlotMetrics::new().unwrap();
        let snapshot = LedgerSnapshot {
            drawings: 2,
            numbered_drawings: 1,
            participants: 5,
            slots: SlotStatusCounts {
                available: 90,
                reserved: 4,
                taken: 6,
            },
            lapsed_reservations: 0,
        };
        metrics.observe_snapshot(&snapshot);
        let text = String::from_utf8(metrics.encode().unwrap()).unwrap();
        assert!(text.contains("raffle_slots{status=\"taken\"} 6"));
        assert!(text.contains("raffle_drawings 2"));
    }

    #[test]
    fn instances_do_not_share_registries() {
        let a = SlotMetrics::new().unwrap();
        let b = SlotMetrics::new().unwrap();
        a.record_winner_run();
        let text = String::from_utf8(b.encode().unwrap()).unwrap();
        assert!(!text.contains("raffle_winner_runs_total 1"));
    }
}
