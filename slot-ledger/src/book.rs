// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Per-drawing record: the drawing, its slot pool, participants and winners.
//!
//! A book is the unit of atomicity. Stores hand out exclusive access to one book at a time, and
//! every conditional slot transition is evaluated and applied while that access is held.

use chrono::{DateTime, Utc};
use core_types::{ParticipantId, SlotNumber};
use serde::{Deserialize, Serialize};

use crate::{
    drawing::{Drawing, Participant, Winner},
    error::{Result, SlotError},
    slot::Slot,
    stats::SlotStatusCounts,
};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DrawingBook {
    pub drawing: Drawing,
    /// Index `n - 1` holds number `n`. Empty until the pool is initialized.
    #[serde(default)]
    slots: Vec<Slot>,
    /// Sorted by id; ids are allocated monotonically.
    #[serde(default)]
    participants: Vec<Participant>,
    #[serde(default)]
    winners: Vec<Winner>,
}

impl DrawingBook {
    pub fn new(drawing: Drawing) -> Self {
        Self {
            drawing,
            slots: Vec::new(),
            participants: Vec::new(),
            winners: Vec::new(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        !self.slots.is_empty()
    }

    pub fn initialize_pool(&mut self, quantity: u32, now: DateTime<Utc>) -> Result<()> {
        if self.is_initialized() {
            return Err(SlotError::AlreadyInitialized {
                drawing_id: self.drawing.id.clone(),
            });
        }
        if quantity == 0 {
            return Err(SlotError::validation("quantity must be positive"));
        }
        self.slots = (1..=quantity).map(|number| Slot::new(number, now)).collect();
        self.drawing.quantity_of_numbers = quantity;
        Ok(())
    }

    pub fn total(&self) -> u32 {
        self.slots.len() as u32
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn slot(&self, number: SlotNumber) -> Option<&Slot> {
        let idx = (number as usize).checked_sub(1)?;
        self.slots.get(idx)
    }

    pub fn slot_mut(&mut self, number: SlotNumber) -> Option<&mut Slot> {
        let idx = (number as usize).checked_sub(1)?;
        self.slots.get_mut(idx)
    }

    pub fn counts(&self) -> SlotStatusCounts {
        let mut counts = SlotStatusCounts::default();
        for slot in &self.slots {
            counts.increment(slot.status());
        }
        counts
    }

    /// Sweeps lapsed reservations back to available; returns how many were released.
    pub fn expire_lapsed(&mut self, now: DateTime<Utc>) -> usize {
        self.slots
            .iter_mut()
            .map(|slot| slot.expire(now))
            .filter(|released| *released)
            .count()
    }

    pub fn has_lapsed_reservations(&self, now: DateTime<Utc>) -> bool {
        self.slots.iter().any(|slot| is_lapsed(slot, now))
    }

    pub fn lapsed_reservations(&self, now: DateTime<Utc>) -> usize {
        self.slots.iter().filter(|slot| is_lapsed(slot, now)).count()
    }

    pub fn numbers_held_by(&self, participant_id: ParticipantId) -> Vec<SlotNumber> {
        self.slots
            .iter()
            .filter(|slot| slot.holder() == Some(participant_id))
            .map(|slot| slot.number)
            .collect()
    }

    pub fn release_numbers_of(&mut self, participant_id: ParticipantId, now: DateTime<Utc>) -> usize {
        self.slots
            .iter_mut()
            .map(|slot| slot.release_holder(participant_id, now))
            .filter(|released| *released)
            .count()
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn participant(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants
            .binary_search_by_key(&id, |p| p.id)
            .ok()
            .map(|idx| &self.participants[idx])
    }

    pub fn participant_mut(&mut self, id: ParticipantId) -> Option<&mut Participant> {
        self.participants
            .binary_search_by_key(&id, |p| p.id)
            .ok()
            .map(move |idx| &mut self.participants[idx])
    }

    pub fn insert_participant(&mut self, participant: Participant) {
        match self
            .participants
            .binary_search_by_key(&participant.id, |p| p.id)
        {
            Ok(idx) => self.participants[idx] = participant,
            Err(idx) => self.participants.insert(idx, participant),
        }
    }

    pub fn max_participant_id(&self) -> Option<ParticipantId> {
        self.participants.last().map(|p| p.id)
    }

    pub fn winners(&self) -> &[Winner] {
        &self.winners
    }

    pub fn replace_winners(&mut self, winners: Vec<Winner>) {
        self.winners = winners;
    }
}

fn is_lapsed(slot: &Slot, now: DateTime<Utc>) -> bool {
    matches!(slot.reservation_expiry(), Some(exp) if exp <= now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drawing::{ParticipantStatus, WinnerSelection};
    use chrono::Duration;
    use core_types::{DrawingId, OwnerId, ReservationToken};

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn book() -> DrawingBook {
        DrawingBook::new(Drawing {
            id: DrawingId::from("d1"),
            owner_id: OwnerId("host".into()),
            title: "t".into(),
            guidelines: vec![],
            is_paid: false,
            price: 0,
            winner_selection: WinnerSelection::System,
            play_with_numbers: true,
            quantity_of_numbers: 0,
            winners_amount: 1,
            end_at: now() + Duration::days(1),
            created_at: now(),
        })
    }

    fn participant(id: u64) -> Participant {
        Participant {
            id: ParticipantId(id),
            drawing_id: DrawingId::from("d1"),
            name: format!("p{id}"),
            email: None,
            phone: "1".into(),
            status: ParticipantStatus::Approved,
            created_at: now(),
        }
    }

    #[test]
    fn initialize_pool_once() {
        let mut book = book();
        book.initialize_pool(5, now()).unwrap();
        assert_eq!(book.total(), 5);
        assert_eq!(book.drawing.quantity_of_numbers, 5);
        assert!(book.slot(0).is_none());
        assert_eq!(book.slot(5).unwrap().number, 5);
        assert!(book.slot(6).is_none());
        assert!(matches!(
            book.initialize_pool(5, now()),
            Err(SlotError::AlreadyInitialized { .. })
        ));
    }

    #[test]
    fn participants_stay_sorted_for_lookup() {
        let mut book = book();
        book.insert_participant(participant(9));
        book.insert_participant(participant(2));
        book.insert_participant(participant(5));
        let ids: Vec<u64> = book.participants().iter().map(|p| p.id.0).collect();
        assert_eq!(ids, vec![2, 5, 9]);
        assert_eq!(book.participant(ParticipantId(5)).unwrap().name, "p5");
        assert!(book.participant(ParticipantId(4)).is_none());
        assert_eq!(book.max_participant_id(), Some(ParticipantId(9)));
    }

    #[test]
    fn expire_lapsed_counts_released_slots() {
        let mut book = book();
        book.initialize_pool(3, now()).unwrap();
        let token = ReservationToken::from_client("t");
        book.slot_mut(1)
            .unwrap()
            .reserve(token.clone(), now() + Duration::minutes(1), now())
            .unwrap();
        book.slot_mut(2)
            .unwrap()
            .reserve(token, now() + Duration::minutes(10), now())
            .unwrap();
        let later = now() + Duration::minutes(2);
        assert!(book.has_lapsed_reservations(later));
        assert_eq!(book.lapsed_reservations(later), 1);
        assert_eq!(book.expire_lapsed(later), 1);
        assert_eq!(book.expire_lapsed(later), 0);
        let counts = book.counts();
        assert_eq!((counts.available, counts.reserved, counts.taken), (2, 1, 0));
    }
}
