// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::fmt;

use chrono::{DateTime, Utc};
use core_types::{ParticipantId, ReservationToken, SlotNumber};
use serde::{Deserialize, Serialize};

use crate::error::ConflictReason;

/// Logical status of a numbered slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Available,
    Reserved,
    Taken,
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SlotStatus::Available => "available",
            SlotStatus::Reserved => "reserved",
            SlotStatus::Taken => "taken",
        };
        f.write_str(label)
    }
}

/// Stored state of a slot. Reservation and holder fields live inside the variant that owns them,
/// so a transition always replaces them together.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum SlotState {
    Available,
    Reserved {
        token: ReservationToken,
        expires_at: DateTime<Utc>,
    },
    Taken {
        participant_id: ParticipantId,
        taken_at: DateTime<Utc>,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Slot {
    pub number: SlotNumber,
    pub state: SlotState,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Slot {
    pub fn new(number: SlotNumber, now: DateTime<Utc>) -> Self {
        Self {
            number,
            state: SlotState::Available,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Status as stored. A lapsed reservation still reads as reserved until the sweep runs.
    pub fn status(&self) -> SlotStatus {
        match self.state {
            SlotState::Available => SlotStatus::Available,
            SlotState::Reserved { .. } => SlotStatus::Reserved,
            SlotState::Taken { .. } => SlotStatus::Taken,
        }
    }

    pub fn holder(&self) -> Option<ParticipantId> {
        match self.state {
            SlotState::Taken { participant_id, .. } => Some(participant_id),
            _ => None,
        }
    }

    pub fn reservation_expiry(&self) -> Option<DateTime<Utc>> {
        match self.state {
            SlotState::Reserved { expires_at, .. } => Some(expires_at),
            _ => None,
        }
    }

    pub fn is_reserved_by(&self, token: &ReservationToken) -> bool {
        matches!(&self.state, SlotState::Reserved { token: held, .. } if held == token)
    }

    /// Available, or holding a reservation that has already lapsed.
    pub fn is_reservable(&self, now: DateTime<Utc>) -> bool {
        match &self.state {
            SlotState::Available => true,
            SlotState::Reserved { expires_at, .. } => *expires_at <= now,
            SlotState::Taken { .. } => false,
        }
    }

    pub fn is_confirmable(&self, token: &ReservationToken, now: DateTime<Utc>) -> bool {
        match &self.state {
            SlotState::Reserved {
                token: held,
                expires_at,
            } => held == token && *expires_at > now,
            _ => false,
        }
    }

    pub fn reserve(
        &mut self,
        token: ReservationToken,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), ConflictReason> {
        if !self.is_reservable(now) {
            return Err(ConflictReason::Unavailable);
        }
        self.transition(SlotState::Reserved { token, expires_at }, now);
        Ok(())
    }

    pub fn confirm(
        &mut self,
        token: &ReservationToken,
        participant_id: ParticipantId,
        now: DateTime<Utc>,
    ) -> Result<(), ConflictReason> {
        if !self.is_confirmable(token, now) {
            return Err(ConflictReason::ReservationLapsed);
        }
        self.transition(
            SlotState::Taken {
                participant_id,
                taken_at: now,
            },
            now,
        );
        Ok(())
    }

    /// Returns the slot to the pool if its reservation lapsed at or before `now`.
    pub fn expire(&mut self, now: DateTime<Utc>) -> bool {
        match self.state {
            SlotState::Reserved { expires_at, .. } if expires_at <= now => {
                self.transition(SlotState::Available, now);
                true
            }
            _ => false,
        }
    }

    /// Administrative unwind of a confirmed slot.
    pub fn release_holder(&mut self, participant_id: ParticipantId, now: DateTime<Utc>) -> bool {
        if self.holder() != Some(participant_id) {
            return false;
        }
        self.transition(SlotState::Available, now);
        true
    }

    fn transition(&mut self, state: SlotState, now: DateTime<Utc>) {
        self.state = state;
        self.version = self.version.wrapping_add(1);
        self.updated_at = now;
    }
}
