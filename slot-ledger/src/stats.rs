// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::slot::SlotStatus;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotStatusCounts {
    pub available: u32,
    pub reserved: u32,
    pub taken: u32,
}

impl SlotStatusCounts {
    pub fn increment(&mut self, status: SlotStatus) {
        match status {
            SlotStatus::Available => self.available += 1,
            SlotStatus::Reserved => self.reserved += 1,
            SlotStatus::Taken => self.taken += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.available + self.reserved + self.taken
    }

    pub fn is_zero(&self) -> bool {
        self.total() == 0
    }

    fn absorb(&mut self, other: &SlotStatusCounts) {
        self.available += other.available;
        self.reserved += other.reserved;
        self.taken += other.taken;
    }
}

impl fmt::Display for SlotStatusCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "available={}, reserved={}, taken={}",
            self.available, self.reserved, self.taken
        )
    }
}

/// Aggregate view of one drawing's pool, computed on demand and never stored.
///
/// Reservations that lapsed but have not been swept still count as reserved; run the sweep
/// first when exact availability matters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawingStats {
    pub total: u32,
    pub available: u32,
    pub reserved: u32,
    pub taken: u32,
    pub percentage_taken: u32,
}

impl DrawingStats {
    pub fn from_counts(counts: SlotStatusCounts) -> Self {
        let total = counts.total();
        Self {
            total,
            available: counts.available,
            reserved: counts.reserved,
            taken: counts.taken,
            percentage_taken: percentage(counts.taken, total),
        }
    }
}

/// Integer percent rounded half away from zero; 0 for an empty pool.
pub fn percentage(part: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    let scaled = u64::from(part) * 100;
    let total = u64::from(total);
    ((scaled * 2 + total) / (total * 2)) as u32
}

/// Totals across every drawing the store knows about; logged periodically by the binary.
#[derive(Clone, Debug, Default)]
pub struct LedgerSnapshot {
    pub drawings: usize,
    pub numbered_drawings: usize,
    pub participants: usize,
    pub slots: SlotStatusCounts,
    pub lapsed_reservations: usize,
}

impl LedgerSnapshot {
    pub(crate) fn record(&mut self, counts: &SlotStatusCounts, participants: usize, lapsed: usize) {
        self.drawings += 1;
        if !counts.is_zero() {
            self.numbered_drawings += 1;
        }
        self.participants += participants;
        self.lapsed_reservations += lapsed;
        self.slots.absorb(counts);
    }
}

impl fmt::Display for LedgerSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.drawings == 0 {
            return write!(f, "slot ledger: no drawings loaded");
        }
        writeln!(
            f,
            "slot ledger: {} drawings ({} numbered), {} participants",
            self.drawings, self.numbered_drawings, self.participants
        )?;
        write!(
            f,
            "  slots: {} (lapsed awaiting sweep: {})",
            self.slots, self.lapsed_reservations
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_rounds_to_nearest() {
        assert_eq!(percentage(1, 100), 1);
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(1, 200), 1);
        assert_eq!(percentage(1, 201), 0);
        assert_eq!(percentage(0, 0), 0);
        assert_eq!(percentage(5, 5), 100);
    }

    #[test]
    fn stats_add_up_to_total() {
        let stats = DrawingStats::from_counts(SlotStatusCounts {
            available: 99,
            reserved: 0,
            taken: 1,
        });
        assert_eq!(stats.total, 100);
        assert_eq!(stats.percentage_taken, 1);
        assert_eq!(stats.available + stats.reserved + stats.taken, stats.total);
    }

    #[test]
    fn snapshot_display_summarizes_totals() {
        let mut snapshot = LedgerSnapshot::default();
        assert_eq!(snapshot.to_string(), "slot ledger: no drawings loaded");
        snapshot.record(
            &SlotStatusCounts {
                available: 2,
                reserved: 1,
                taken: 0,
            },
            4,
            1,
        );
        let text = snapshot.to_string();
        assert!(text.contains("1 drawings (1 numbered), 4 participants"));
        assert!(text.contains("available=2, reserved=1, taken=0"));
    }
}
