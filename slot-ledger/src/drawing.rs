// Copyright (c) James Kassemi, SC, US. All rights reserved.
use chrono::{DateTime, Utc};
use core_types::{DrawingId, OwnerId, ParticipantId, ReservationToken, SlotNumber};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SlotError};

/// How winners are chosen once a drawing ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum WinnerSelection {
    #[default]
    #[serde(rename = "system")]
    System,
    #[serde(rename = "manually")]
    Manual,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Drawing {
    pub id: DrawingId,
    pub owner_id: OwnerId,
    pub title: String,
    #[serde(default)]
    pub guidelines: Vec<String>,
    pub is_paid: bool,
    /// Entry price in minor currency units. Collected upstream.
    pub price: u64,
    pub winner_selection: WinnerSelection,
    pub play_with_numbers: bool,
    pub quantity_of_numbers: u32,
    pub winners_amount: u32,
    pub end_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Drawing {
    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        self.end_at <= now
    }

    /// Paid entries wait for host review; free entries are eligible immediately.
    pub fn initial_participant_status(&self) -> ParticipantStatus {
        if self.is_paid {
            ParticipantStatus::Pending
        } else {
            ParticipantStatus::Approved
        }
    }
}

/// Host-supplied fields for a new drawing.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewDrawing {
    pub owner_id: OwnerId,
    pub title: String,
    #[serde(default)]
    pub guidelines: Vec<String>,
    #[serde(default)]
    pub is_paid: bool,
    #[serde(default)]
    pub price: u64,
    #[serde(default)]
    pub winner_selection: WinnerSelection,
    #[serde(default)]
    pub play_with_numbers: bool,
    #[serde(default)]
    pub quantity_of_numbers: u32,
    #[serde(default = "default_winners_amount")]
    pub winners_amount: u32,
    pub end_at: DateTime<Utc>,
}

fn default_winners_amount() -> u32 {
    1
}

impl NewDrawing {
    pub fn validate(&self, max_slots: u32) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(SlotError::validation("title is required"));
        }
        if self.winners_amount == 0 {
            return Err(SlotError::validation("winners_amount must be at least 1"));
        }
        if self.play_with_numbers {
            if self.quantity_of_numbers == 0 {
                return Err(SlotError::validation(
                    "quantity_of_numbers must be positive for numbered drawings",
                ));
            }
            if self.quantity_of_numbers > max_slots {
                return Err(SlotError::validation(format!(
                    "quantity_of_numbers {} exceeds the limit of {max_slots}",
                    self.quantity_of_numbers
                )));
            }
        }
        Ok(())
    }

    pub fn into_drawing(self, id: DrawingId, now: DateTime<Utc>) -> Drawing {
        Drawing {
            id,
            owner_id: self.owner_id,
            title: self.title.trim().to_string(),
            guidelines: self.guidelines,
            is_paid: self.is_paid,
            price: self.price,
            winner_selection: self.winner_selection,
            play_with_numbers: self.play_with_numbers,
            quantity_of_numbers: if self.play_with_numbers {
                self.quantity_of_numbers
            } else {
                0
            },
            winners_amount: self.winners_amount,
            end_at: self.end_at,
            created_at: now,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantStatus {
    Pending,
    Approved,
    Rejected,
}

impl ParticipantStatus {
    pub fn is_eligible(&self) -> bool {
        matches!(self, ParticipantStatus::Approved)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub drawing_id: DrawingId,
    pub name: String,
    pub email: Option<String>,
    pub phone: String,
    pub status: ParticipantStatus,
    pub created_at: DateTime<Utc>,
}

/// A reservation the registrant is turning into a permanent claim.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claim {
    pub number: SlotNumber,
    pub token: ReservationToken,
}

/// Registration form submitted after the registrant reserved their numbers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Registration {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub phone: String,
    #[serde(default)]
    pub claims: Vec<Claim>,
}

impl Registration {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() || self.phone.trim().is_empty() {
            return Err(SlotError::validation("name and phone are required"));
        }
        let mut numbers: Vec<SlotNumber> = self.claims.iter().map(|c| c.number).collect();
        numbers.sort_unstable();
        if numbers.windows(2).any(|pair| pair[0] == pair[1]) {
            return Err(SlotError::validation("each number may be claimed once"));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Winner {
    /// 1-based draw order.
    pub position: u32,
    pub participant_id: ParticipantId,
    pub number: Option<SlotNumber>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_drawing() -> NewDrawing {
        NewDrawing {
            owner_id: OwnerId("host".into()),
            title: " Spring raffle ".into(),
            guidelines: vec![],
            is_paid: true,
            price: 500,
            winner_selection: WinnerSelection::System,
            play_with_numbers: true,
            quantity_of_numbers: 100,
            winners_amount: 1,
            end_at: DateTime::from_timestamp(1_800_000_000, 0).unwrap(),
        }
    }

    #[test]
    fn numbered_drawing_requires_quantity_within_limit() {
        let mut draft = new_drawing();
        draft.validate(1_000).unwrap();
        draft.quantity_of_numbers = 0;
        assert!(draft.validate(1_000).is_err());
        draft.quantity_of_numbers = 1_001;
        assert!(draft.validate(1_000).is_err());
    }

    #[test]
    fn paid_drawings_start_participants_pending() {
        let drawing = new_drawing().into_drawing(DrawingId::from("d1"), Utc::now());
        assert_eq!(drawing.title, "Spring raffle");
        assert_eq!(
            drawing.initial_participant_status(),
            ParticipantStatus::Pending
        );
    }

    #[test]
    fn winner_selection_uses_wire_names() {
        let json = serde_json::to_string(&WinnerSelection::Manual).unwrap();
        assert_eq!(json, "\"manually\"");
    }

    #[test]
    fn registration_rejects_duplicate_claims() {
        let claim = Claim {
            number: 4,
            token: ReservationToken::from_client("t"),
        };
        let registration = Registration {
            name: "Ana".into(),
            email: None,
            phone: "555".into(),
            claims: vec![claim.clone(), claim],
        };
        assert!(registration.validate().is_err());
    }
}
