// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Slot ledger for raffle drawings.
//!
//! The crate exposes:
//! - [`SlotController`]: reservations, confirmations, expiry sweeps, statistics, participants
//!   and winner selection for every drawing.
//! - [`SlotStore`]: the per-drawing transactional seam, with [`MemoryStore`] and the JSON-backed
//!   [`FileStore`].
//! - [`DrawingBook`]: the per-drawing record a store hands out one transaction at a time.

pub mod book;
pub mod config;
pub mod controller;
pub mod drawing;
pub mod error;
pub mod slot;
pub mod stats;
mod storage;
pub mod store;
pub mod winners;

pub use book::DrawingBook;
pub use config::LedgerConfig;
pub use controller::{
    ParticipantEntry, Reservation, SlotController, SlotQuery, SlotView, StatusChange, SweepReport,
};
pub use drawing::{
    Claim, Drawing, NewDrawing, Participant, ParticipantStatus, Registration, Winner,
    WinnerSelection,
};
pub use error::{ConflictReason, Result, SlotError, StoreError};
pub use slot::{Slot, SlotState, SlotStatus};
pub use stats::{DrawingStats, LedgerSnapshot, SlotStatusCounts};
pub use storage::{FileStore, StorageReport};
pub use store::{MemoryStore, Mutation, SlotStore};
