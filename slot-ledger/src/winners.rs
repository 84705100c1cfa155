// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Winner draws for ended drawings.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use core_types::{ParticipantId, SlotNumber};
use rand::{seq::index::sample, Rng};

use crate::{
    book::DrawingBook,
    drawing::{Winner, WinnerSelection},
    error::{Result, SlotError},
};

/// An entry that can win: a participant, plus the number they hold in numbered drawings.
type Entry = (ParticipantId, Option<SlotNumber>);

/// Computes the winners for `book` without touching it.
///
/// Manual numbered drawings take exactly the host's numbers in the order given. Everything else
/// samples eligible entries uniformly without replacement, up to `winners_amount`.
pub fn draw<R: Rng + ?Sized>(
    book: &DrawingBook,
    manual_numbers: Option<&[SlotNumber]>,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Result<Vec<Winner>> {
    let drawing = &book.drawing;
    if !drawing.has_ended(now) {
        return Err(SlotError::validation("drawing has not ended"));
    }
    if drawing.play_with_numbers {
        match (drawing.winner_selection, manual_numbers) {
            (WinnerSelection::Manual, Some(numbers)) => return manual_draw(book, numbers),
            (WinnerSelection::Manual, None) => {
                return Err(SlotError::validation(
                    "manual drawings need the winning numbers",
                ))
            }
            (WinnerSelection::System, Some(numbers)) if !numbers.is_empty() => {
                return Err(SlotError::validation(
                    "this drawing selects its winners automatically",
                ))
            }
            (WinnerSelection::System, _) => {}
        }
    }
    let entries = eligible_entries(book);
    if entries.is_empty() {
        return Err(SlotError::validation("no eligible participants"));
    }
    let amount = (drawing.winners_amount as usize).min(entries.len());
    Ok(sample(rng, entries.len(), amount)
        .into_iter()
        .enumerate()
        .map(|(idx, pick)| winner_at(idx, entries[pick]))
        .collect())
}

fn winner_at(idx: usize, (participant_id, number): Entry) -> Winner {
    Winner {
        position: idx as u32 + 1,
        participant_id,
        number,
    }
}

fn is_approved(book: &DrawingBook, participant_id: ParticipantId) -> bool {
    book.participant(participant_id)
        .is_some_and(|p| p.status.is_eligible())
}

/// Taken numbers held by approved participants for numbered drawings, approved participants
/// otherwise. Ordered by number or participant id so seeded draws are reproducible.
fn eligible_entries(book: &DrawingBook) -> Vec<Entry> {
    if book.drawing.play_with_numbers {
        book.slots()
            .iter()
            .filter_map(|slot| {
                let holder = slot.holder()?;
                is_approved(book, holder).then_some((holder, Some(slot.number)))
            })
            .collect()
    } else {
        book.participants()
            .iter()
            .filter(|p| p.status.is_eligible())
            .map(|p| (p.id, None))
            .collect()
    }
}

fn manual_draw(book: &DrawingBook, numbers: &[SlotNumber]) -> Result<Vec<Winner>> {
    if numbers.is_empty() {
        return Err(SlotError::validation("choose at least one winning number"));
    }
    if numbers.len() > book.drawing.winners_amount as usize {
        return Err(SlotError::validation(format!(
            "at most {} winning numbers may be chosen",
            book.drawing.winners_amount
        )));
    }
    let mut seen = HashSet::with_capacity(numbers.len());
    let mut winners = Vec::with_capacity(numbers.len());
    for (idx, &number) in numbers.iter().enumerate() {
        if !seen.insert(number) {
            return Err(SlotError::validation(format!(
                "number {number} was chosen more than once"
            )));
        }
        let slot = book.slot(number).ok_or_else(|| {
            SlotError::validation(format!("number {number} is outside the drawing"))
        })?;
        let holder = slot
            .holder()
            .filter(|holder| is_approved(book, *holder))
            .ok_or_else(|| {
                SlotError::validation(format!(
                    "number {number} is not held by an approved participant"
                ))
            })?;
        winners.push(winner_at(idx, (holder, Some(number))));
    }
    Ok(winners)
}
