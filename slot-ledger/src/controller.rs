// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::{collections::HashSet, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use core_types::{
    config::SlotLimits, token::reservation_token, Clock, DrawingId, OwnerId, ParticipantId,
    ReservationToken, SlotNumber, SystemClock,
};
use log::{debug, info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    book::DrawingBook,
    config::LedgerConfig,
    drawing::{Drawing, NewDrawing, Participant, ParticipantStatus, Registration, Winner},
    error::{ConflictReason, Result, SlotError},
    slot::{Slot, SlotStatus},
    stats::{DrawingStats, LedgerSnapshot},
    storage::{FileStore, StorageReport},
    store::{MemoryStore, Mutation, SlotStore},
    winners,
};

const ID_ATTEMPTS: usize = 4;

/// A live hold on one number, handed back to the caller that placed it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub drawing_id: DrawingId,
    pub number: SlotNumber,
    pub token: ReservationToken,
    pub expires_at: DateTime<Utc>,
}

/// Public view of one slot. `reserved_until` is only filled in for the reservation's owner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotView {
    pub number: SlotNumber,
    pub status: SlotStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub holder: Option<ParticipantId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reserved_until: Option<DateTime<Utc>>,
}

impl SlotView {
    fn of(slot: &Slot, viewer: Option<&ReservationToken>) -> Self {
        let reserved_until = viewer
            .filter(|token| slot.is_reserved_by(token))
            .and_then(|_| slot.reservation_expiry());
        Self {
            number: slot.number,
            status: slot.status(),
            holder: slot.holder(),
            reserved_until,
        }
    }
}

/// Result of a batch lookup. Numbers outside the pool land in `missing` instead of failing the call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotQuery {
    pub total: u32,
    pub slots: Vec<SlotView>,
    pub missing: Vec<SlotNumber>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParticipantEntry {
    pub participant: Participant,
    pub numbers: Vec<SlotNumber>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusChange {
    pub participant: Participant,
    pub released: usize,
}

/// Outcome of one pass over every drawing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub released: usize,
    pub failed: Vec<DrawingId>,
}

/// Number Slot Manager plus the drawing, participant and winner operations built on it.
pub struct SlotController {
    limits: SlotLimits,
    store: Arc<dyn SlotStore>,
    clock: Arc<dyn Clock>,
}

impl SlotController {
    pub fn new(store: Arc<dyn SlotStore>, clock: Arc<dyn Clock>, limits: SlotLimits) -> Self {
        Self {
            limits,
            store,
            clock,
        }
    }

    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        Self::new(Arc::new(MemoryStore::new()), clock, SlotLimits::default())
    }

    /// Opens the file store under `config.state_dir` and loads every persisted drawing.
    pub fn bootstrap(config: LedgerConfig) -> Result<(Self, StorageReport)> {
        let limits = config.limits.clone();
        let (store, report) = FileStore::bootstrap(config)?;
        Ok((
            Self::new(Arc::new(store), Arc::new(SystemClock), limits),
            report,
        ))
    }

    pub fn limits(&self) -> &SlotLimits {
        &self.limits
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn read<T>(&self, drawing_id: &DrawingId, f: impl FnOnce(&DrawingBook) -> T) -> Result<T> {
        let mut f = Some(f);
        let mut out = None;
        self.store.view(drawing_id, &mut |book: &DrawingBook| {
            if let Some(f) = f.take() {
                out = Some(f(book));
            }
        })?;
        out.ok_or_else(|| SlotError::drawing_not_found(drawing_id))
    }

    fn write<T>(
        &self,
        drawing_id: &DrawingId,
        mut f: impl FnMut(&mut DrawingBook) -> Result<(T, Mutation)>,
    ) -> Result<T> {
        let mut out = None;
        self.store
            .transact(drawing_id, &mut |book: &mut DrawingBook| {
                let (value, mutation) = f(book)?;
                out = Some(value);
                Ok(mutation)
            })?;
        out.ok_or_else(|| SlotError::drawing_not_found(drawing_id))
    }

    // Drawings

    pub fn create_drawing(&self, draft: NewDrawing) -> Result<Drawing> {
        draft.validate(self.limits.max_slots_per_drawing)?;
        let now = self.now();
        for _ in 0..ID_ATTEMPTS {
            let drawing = draft.clone().into_drawing(DrawingId::generate(), now);
            let mut book = DrawingBook::new(drawing);
            if book.drawing.play_with_numbers {
                book.initialize_pool(book.drawing.quantity_of_numbers, now)?;
            }
            let drawing = book.drawing.clone();
            match self.store.create(book) {
                Ok(()) => {
                    info!(
                        "created drawing {} for {} ({} numbers)",
                        drawing.id, drawing.owner_id, drawing.quantity_of_numbers
                    );
                    return Ok(drawing);
                }
                Err(SlotError::DuplicateDrawing { drawing_id }) => {
                    debug!("drawing id {drawing_id} collided, generating another");
                }
                Err(err) => return Err(err),
            }
        }
        Err(SlotError::validation("could not allocate a drawing id"))
    }

    /// Registers a drawing under a caller-chosen id with an empty pool; see [`Self::initialize`].
    pub fn register_drawing(&self, mut drawing: Drawing) -> Result<()> {
        drawing.quantity_of_numbers = 0;
        let drawing_id = drawing.id.clone();
        self.store.create(DrawingBook::new(drawing))?;
        info!("registered drawing {drawing_id}");
        Ok(())
    }

    pub fn drawing(&self, drawing_id: &DrawingId) -> Result<Drawing> {
        self.read(drawing_id, |book| book.drawing.clone())
    }

    pub fn drawings_for_owner(&self, owner_id: &OwnerId) -> Result<Vec<Drawing>> {
        let mut drawings = Vec::new();
        for drawing_id in self.store.drawing_ids() {
            let drawing = self.drawing(&drawing_id)?;
            if &drawing.owner_id == owner_id {
                drawings.push(drawing);
            }
        }
        drawings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(drawings)
    }

    // Slot pool

    pub fn initialize(&self, drawing_id: &DrawingId, quantity: u32) -> Result<()> {
        if quantity > self.limits.max_slots_per_drawing {
            return Err(SlotError::validation(format!(
                "quantity {quantity} exceeds the limit of {}",
                self.limits.max_slots_per_drawing
            )));
        }
        let now = self.now();
        self.write(drawing_id, |book| {
            book.initialize_pool(quantity, now)?;
            Ok(((), Mutation::Changed))
        })?;
        info!("initialized {quantity} numbers for drawing {drawing_id}");
        Ok(())
    }

    pub fn query_slots(
        &self,
        drawing_id: &DrawingId,
        numbers: &[SlotNumber],
        viewer: Option<&ReservationToken>,
    ) -> Result<SlotQuery> {
        if numbers.is_empty() {
            return Err(SlotError::validation("at least one number is required"));
        }
        if numbers.len() > self.limits.max_query_batch {
            return Err(SlotError::validation(format!(
                "at most {} numbers may be queried at once",
                self.limits.max_query_batch
            )));
        }
        let mut seen = HashSet::with_capacity(numbers.len());
        let wanted: Vec<SlotNumber> = numbers.iter().copied().filter(|n| seen.insert(*n)).collect();
        self.read(drawing_id, |book| {
            let mut query = SlotQuery {
                total: book.total(),
                ..SlotQuery::default()
            };
            for number in wanted {
                match book.slot(number) {
                    Some(slot) => query.slots.push(SlotView::of(slot, viewer)),
                    None => query.missing.push(number),
                }
            }
            query
        })
    }

    pub fn get_slot(&self, drawing_id: &DrawingId, number: SlotNumber) -> Result<SlotView> {
        self.read(drawing_id, |book| book.slot(number).map(|slot| SlotView::of(slot, None)))?
            .ok_or_else(|| SlotError::not_found(format!("number {number} in drawing {drawing_id}")))
    }

    pub fn stats(&self, drawing_id: &DrawingId) -> Result<DrawingStats> {
        self.read(drawing_id, |book| {
            book.is_initialized()
                .then(|| DrawingStats::from_counts(book.counts()))
        })?
        .ok_or_else(|| SlotError::not_found(format!("slot pool for drawing {drawing_id}")))
    }

    /// Places a time-boxed hold on one number.
    ///
    /// Lapsed reservations in the drawing are swept first. Every refusal, including a number
    /// outside the pool, comes back as the same `Unavailable` conflict.
    pub fn reserve(
        &self,
        drawing_id: &DrawingId,
        number: SlotNumber,
        minutes: Option<u32>,
    ) -> Result<Reservation> {
        let minutes = minutes.unwrap_or(self.limits.default_reservation_minutes);
        if minutes == 0 || minutes > self.limits.max_reservation_minutes {
            return Err(SlotError::validation(format!(
                "reservation must last between 1 and {} minutes",
                self.limits.max_reservation_minutes
            )));
        }
        let now = self.now();
        let expires_at = now + Duration::minutes(i64::from(minutes));
        let token = reservation_token(drawing_id, number);
        let swept = self.write(drawing_id, |book| {
            if book.drawing.has_ended(now) {
                return Err(SlotError::validation("drawing has ended"));
            }
            let reservable = book.slot(number).is_some_and(|slot| slot.is_reservable(now));
            if !reservable {
                return Err(SlotError::conflict(
                    drawing_id,
                    number,
                    ConflictReason::Unavailable,
                ));
            }
            let swept = book.expire_lapsed(now);
            book.slot_mut(number)
                .ok_or_else(|| SlotError::conflict(drawing_id, number, ConflictReason::Unavailable))?
                .reserve(token.clone(), expires_at, now)
                .map_err(|reason| SlotError::conflict(drawing_id, number, reason))?;
            Ok((swept, Mutation::Changed))
        })?;
        debug!("reserved {drawing_id}#{number} until {expires_at} (swept {swept} lapsed)");
        Ok(Reservation {
            drawing_id: drawing_id.clone(),
            number,
            token,
            expires_at,
        })
    }

    /// Turns a live reservation into a permanent claim for an existing participant.
    pub fn confirm(
        &self,
        drawing_id: &DrawingId,
        number: SlotNumber,
        participant_id: ParticipantId,
        token: &ReservationToken,
    ) -> Result<()> {
        let now = self.now();
        self.write(drawing_id, |book| {
            let participant = book
                .participant(participant_id)
                .ok_or_else(|| SlotError::not_found(format!("participant {participant_id}")))?;
            if participant.status == ParticipantStatus::Rejected {
                return Err(SlotError::validation(format!(
                    "participant {participant_id} was rejected"
                )));
            }
            book.slot_mut(number)
                .ok_or_else(|| {
                    SlotError::conflict(drawing_id, number, ConflictReason::ReservationLapsed)
                })?
                .confirm(token, participant_id, now)
                .map_err(|reason| SlotError::conflict(drawing_id, number, reason))?;
            Ok(((), Mutation::Changed))
        })?;
        debug!("confirmed {drawing_id}#{number} for participant {participant_id}");
        Ok(())
    }

    /// Creates a participant and confirms every claimed reservation in one transaction.
    ///
    /// Either the participant exists with all of its numbers taken, or nothing changed.
    pub fn register_participant(
        &self,
        drawing_id: &DrawingId,
        registration: &Registration,
    ) -> Result<ParticipantEntry> {
        registration.validate()?;
        let now = self.now();
        let participant_id = self.store.allocate_participant_id();
        let entry = self.write(drawing_id, |book| {
            let drawing = &book.drawing;
            if drawing.has_ended(now) {
                return Err(SlotError::validation("drawing has ended"));
            }
            if drawing.play_with_numbers && registration.claims.is_empty() {
                return Err(SlotError::validation("choose at least one number"));
            }
            if !drawing.play_with_numbers && !registration.claims.is_empty() {
                return Err(SlotError::validation("this drawing does not use numbers"));
            }
            for claim in &registration.claims {
                let confirmable = book
                    .slot(claim.number)
                    .is_some_and(|slot| slot.is_confirmable(&claim.token, now));
                if !confirmable {
                    return Err(SlotError::conflict(
                        drawing_id,
                        claim.number,
                        ConflictReason::ReservationLapsed,
                    ));
                }
            }

            let participant = Participant {
                id: participant_id,
                drawing_id: drawing_id.clone(),
                name: registration.name.trim().to_string(),
                email: registration
                    .email
                    .as_deref()
                    .map(str::trim)
                    .filter(|email| !email.is_empty())
                    .map(str::to_string),
                phone: registration.phone.trim().to_string(),
                status: drawing.initial_participant_status(),
                created_at: now,
            };
            book.insert_participant(participant.clone());
            let mut numbers = Vec::with_capacity(registration.claims.len());
            for claim in &registration.claims {
                if let Some(slot) = book.slot_mut(claim.number) {
                    slot.confirm(&claim.token, participant_id, now)
                        .map_err(|reason| SlotError::conflict(drawing_id, claim.number, reason))?;
                    numbers.push(claim.number);
                }
            }
            numbers.sort_unstable();
            Ok((
                ParticipantEntry {
                    participant,
                    numbers,
                },
                Mutation::Changed,
            ))
        })?;
        info!(
            "registered participant {participant_id} in drawing {drawing_id} with numbers {:?}",
            entry.numbers
        );
        Ok(entry)
    }

    /// Returns lapsed reservations to the pool, for one drawing or for all of them.
    ///
    /// Sweeping every drawing never stops at a failing one; see [`Self::sweep_all`].
    pub fn release_expired(&self, drawing_id: Option<&DrawingId>) -> Result<usize> {
        match drawing_id {
            Some(id) => self.release_expired_in(id, self.now()),
            None => Ok(self.sweep_all().released),
        }
    }

    /// Sweeps every drawing. Drawings whose store fails are logged, skipped and listed in the
    /// report; the rest are still swept.
    pub fn sweep_all(&self) -> SweepReport {
        let now = self.now();
        let drawing_ids = self.store.drawing_ids();
        let mut report = SweepReport::default();
        for id in &drawing_ids {
            match self.release_expired_in(id, now) {
                Ok(released) => report.released += released,
                Err(err) => {
                    warn!("sweep skipped drawing {id}: {err}");
                    report.failed.push(id.clone());
                }
            }
        }
        if report.released > 0 {
            info!(
                "released {} lapsed reservations across {} drawings",
                report.released,
                drawing_ids.len()
            );
        }
        report
    }

    fn release_expired_in(&self, drawing_id: &DrawingId, now: DateTime<Utc>) -> Result<usize> {
        if !self.read(drawing_id, |book| book.has_lapsed_reservations(now))? {
            return Ok(0);
        }
        self.write(drawing_id, |book| {
            let count = book.expire_lapsed(now);
            Ok((count, Mutation::changed_if(count > 0)))
        })
    }

    // Participants

    pub fn participant_numbers(
        &self,
        drawing_id: &DrawingId,
        participant_id: ParticipantId,
    ) -> Result<Vec<SlotNumber>> {
        Ok(self.participant(drawing_id, participant_id)?.numbers)
    }

    pub fn participant(
        &self,
        drawing_id: &DrawingId,
        participant_id: ParticipantId,
    ) -> Result<ParticipantEntry> {
        self.read(drawing_id, |book| {
            book.participant(participant_id)
                .map(|participant| ParticipantEntry {
                    participant: participant.clone(),
                    numbers: book.numbers_held_by(participant_id),
                })
        })?
        .ok_or_else(|| SlotError::not_found(format!("participant {participant_id}")))
    }

    pub fn participants(&self, drawing_id: &DrawingId) -> Result<Vec<ParticipantEntry>> {
        self.read(drawing_id, |book| {
            let mut entries: Vec<ParticipantEntry> = book
                .participants()
                .iter()
                .map(|participant| ParticipantEntry {
                    participant: participant.clone(),
                    numbers: Vec::new(),
                })
                .collect();
            for slot in book.slots() {
                let Some(holder) = slot.holder() else { continue };
                if let Ok(idx) = entries.binary_search_by_key(&holder, |e| e.participant.id) {
                    entries[idx].numbers.push(slot.number);
                }
            }
            entries
        })
    }

    /// Host review. Rejection releases every number the participant holds.
    pub fn set_participant_status(
        &self,
        drawing_id: &DrawingId,
        participant_id: ParticipantId,
        status: ParticipantStatus,
    ) -> Result<StatusChange> {
        let now = self.now();
        let change = self.write(drawing_id, |book| {
            let participant = book
                .participant_mut(participant_id)
                .ok_or_else(|| SlotError::not_found(format!("participant {participant_id}")))?;
            if participant.status == status {
                let participant = participant.clone();
                return Ok((
                    StatusChange {
                        participant,
                        released: 0,
                    },
                    Mutation::Unchanged,
                ));
            }
            participant.status = status;
            let participant = participant.clone();
            let released = if status == ParticipantStatus::Rejected {
                book.release_numbers_of(participant_id, now)
            } else {
                0
            };
            Ok((
                StatusChange {
                    participant,
                    released,
                },
                Mutation::Changed,
            ))
        })?;
        info!(
            "participant {participant_id} in drawing {drawing_id} is now {status:?} ({} numbers released)",
            change.released
        );
        Ok(change)
    }

    // Winners

    pub fn select_winners(
        &self,
        drawing_id: &DrawingId,
        manual_numbers: Option<&[SlotNumber]>,
    ) -> Result<Vec<Winner>> {
        self.select_winners_with_rng(drawing_id, manual_numbers, &mut rand::thread_rng())
    }

    /// Draws and stores winners, replacing any previous result.
    pub fn select_winners_with_rng<R: Rng + ?Sized>(
        &self,
        drawing_id: &DrawingId,
        manual_numbers: Option<&[SlotNumber]>,
        rng: &mut R,
    ) -> Result<Vec<Winner>> {
        let now = self.now();
        let selected = self.write(drawing_id, |book| {
            let selected = winners::draw(book, manual_numbers, now, &mut *rng)?;
            book.replace_winners(selected.clone());
            Ok((selected, Mutation::Changed))
        })?;
        info!("selected {} winners for drawing {drawing_id}", selected.len());
        Ok(selected)
    }

    pub fn winners(&self, drawing_id: &DrawingId) -> Result<Vec<Winner>> {
        self.read(drawing_id, |book| book.winners().to_vec())
    }

    /// Totals across every drawing, for the periodic status log.
    pub fn snapshot(&self) -> Result<LedgerSnapshot> {
        let now = self.now();
        let mut snapshot = LedgerSnapshot::default();
        for drawing_id in self.store.drawing_ids() {
            self.read(&drawing_id, |book| {
                snapshot.record(
                    &book.counts(),
                    book.participants().len(),
                    book.lapsed_reservations(now),
                )
            })?;
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drawing::{Claim, WinnerSelection};
    use core_types::ManualClock;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn controller() -> (SlotController, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(t0()));
        (SlotController::in_memory(clock.clone()), clock)
    }

    fn draft(quantity: u32) -> NewDrawing {
        NewDrawing {
            owner_id: OwnerId("host".into()),
            title: "Bike raffle".into(),
            guidelines: vec![],
            is_paid: false,
            price: 0,
            winner_selection: WinnerSelection::System,
            play_with_numbers: quantity > 0,
            quantity_of_numbers: quantity,
            winners_amount: 1,
            end_at: t0() + Duration::days(3),
        }
    }

    fn registration(claims: Vec<Claim>) -> Registration {
        Registration {
            name: "Ana".into(),
            email: Some(" ".into()),
            phone: "555-0100".into(),
            claims,
        }
    }

    #[test]
    fn create_drawing_initializes_numbered_pool() {
        let (ledger, _) = controller();
        let drawing = ledger.create_drawing(draft(20)).unwrap();
        assert_eq!(drawing.id.as_str().len(), 10);
        let stats = ledger.stats(&drawing.id).unwrap();
        assert_eq!((stats.total, stats.available), (20, 20));
        assert!(matches!(
            ledger.initialize(&drawing.id, 20),
            Err(SlotError::AlreadyInitialized { .. })
        ));
        assert_eq!(
            ledger.drawings_for_owner(&OwnerId("host".into())).unwrap().len(),
            1
        );
    }

    #[test]
    fn query_hides_other_callers_expiry() {
        let (ledger, _) = controller();
        let drawing = ledger.create_drawing(draft(10)).unwrap();
        let reservation = ledger.reserve(&drawing.id, 4, None).unwrap();
        assert_eq!(reservation.expires_at, t0() + Duration::minutes(15));

        let anonymous = ledger.query_slots(&drawing.id, &[4, 4, 11], None).unwrap();
        assert_eq!(anonymous.slots.len(), 1);
        assert_eq!(anonymous.slots[0].status, SlotStatus::Reserved);
        assert_eq!(anonymous.slots[0].reserved_until, None);
        assert_eq!(anonymous.missing, vec![11]);

        let owner = ledger
            .query_slots(&drawing.id, &[4], Some(&reservation.token))
            .unwrap();
        assert_eq!(owner.slots[0].reserved_until, Some(reservation.expires_at));
    }

    #[test]
    fn query_batch_is_bounded() {
        let (ledger, _) = controller();
        let drawing = ledger.create_drawing(draft(10)).unwrap();
        assert!(ledger.query_slots(&drawing.id, &[], None).is_err());
        let too_many: Vec<SlotNumber> = (1..=501).collect();
        assert!(matches!(
            ledger.query_slots(&drawing.id, &too_many, None),
            Err(SlotError::Validation { .. })
        ));
    }

    #[test]
    fn reserve_validates_duration() {
        let (ledger, _) = controller();
        let drawing = ledger.create_drawing(draft(10)).unwrap();
        assert!(ledger.reserve(&drawing.id, 1, Some(0)).is_err());
        assert!(ledger.reserve(&drawing.id, 1, Some(61)).is_err());
        assert!(ledger.reserve(&drawing.id, 1, Some(60)).is_ok());
        let err = ledger.reserve(&drawing.id, 1, Some(5)).unwrap_err();
        assert!(err.is_conflict());
        let err = ledger.reserve(&drawing.id, 99, None).unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn confirm_requires_matching_token_and_participant() {
        let (ledger, _) = controller();
        let drawing = ledger.create_drawing(draft(10)).unwrap();
        let first = ledger.reserve(&drawing.id, 2, None).unwrap();
        let entry = ledger
            .register_participant(
                &drawing.id,
                &registration(vec![Claim {
                    number: 2,
                    token: first.token.clone(),
                }]),
            )
            .unwrap();
        assert_eq!(entry.participant.email, None);
        assert_eq!(entry.participant.status, ParticipantStatus::Approved);

        let second = ledger.reserve(&drawing.id, 3, None).unwrap();
        let pid = entry.participant.id;
        assert!(matches!(
            ledger.confirm(&drawing.id, 3, ParticipantId(999), &second.token),
            Err(SlotError::NotFound { .. })
        ));
        assert!(ledger
            .confirm(&drawing.id, 3, pid, &ReservationToken::from_client("nope"))
            .unwrap_err()
            .is_conflict());
        ledger.confirm(&drawing.id, 3, pid, &second.token).unwrap();
        assert!(ledger
            .confirm(&drawing.id, 3, pid, &second.token)
            .unwrap_err()
            .is_conflict());
        assert_eq!(ledger.participant_numbers(&drawing.id, pid).unwrap(), vec![2, 3]);
    }

    #[test]
    fn registration_on_free_drawing_without_numbers() {
        let (ledger, _) = controller();
        let drawing = ledger.create_drawing(draft(0)).unwrap();
        assert!(ledger.stats(&drawing.id).is_err());
        let entry = ledger
            .register_participant(&drawing.id, &registration(vec![]))
            .unwrap();
        assert!(entry.numbers.is_empty());
        let all = ledger.participants(&drawing.id).unwrap();
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn registration_closes_when_drawing_ends() {
        let (ledger, clock) = controller();
        let drawing = ledger.create_drawing(draft(5)).unwrap();
        let reservation = ledger.reserve(&drawing.id, 1, Some(60)).unwrap();
        clock.advance(Duration::days(4));
        let err = ledger
            .register_participant(
                &drawing.id,
                &registration(vec![Claim {
                    number: 1,
                    token: reservation.token,
                }]),
            )
            .unwrap_err();
        assert!(matches!(err, SlotError::Validation { .. }));
        assert!(ledger.participants(&drawing.id).unwrap().is_empty());
    }

    #[test]
    fn status_change_to_same_status_is_a_no_op() {
        let (ledger, _) = controller();
        let drawing = ledger.create_drawing(draft(0)).unwrap();
        let entry = ledger
            .register_participant(&drawing.id, &registration(vec![]))
            .unwrap();
        let change = ledger
            .set_participant_status(&drawing.id, entry.participant.id, ParticipantStatus::Approved)
            .unwrap();
        assert_eq!(change.released, 0);
        assert!(ledger
            .set_participant_status(&drawing.id, ParticipantId(404), ParticipantStatus::Approved)
            .is_err());
    }

    #[test]
    fn snapshot_counts_lapsed_reservations() {
        let (ledger, clock) = controller();
        let drawing = ledger.create_drawing(draft(5)).unwrap();
        ledger.reserve(&drawing.id, 1, Some(1)).unwrap();
        clock.advance(Duration::minutes(2));
        let snapshot = ledger.snapshot().unwrap();
        assert_eq!(snapshot.drawings, 1);
        assert_eq!(snapshot.lapsed_reservations, 1);
        assert_eq!(snapshot.slots.reserved, 1);
    }
}
