// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Shared identifiers, clocks, tokens, retry policy and configuration for the raffle services.

pub mod clock;
pub mod config;
pub mod ids;
pub mod retry;
pub mod token;

pub use clock::{Clock, ManualClock, SystemClock};
pub use ids::{DrawingId, OwnerId, ParticipantId, SlotNumber};
pub use token::ReservationToken;
