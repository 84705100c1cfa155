// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::{fmt, io, path::PathBuf};

use core_types::{DrawingId, SlotNumber};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SlotError>;

/// Why a conditional slot transition was refused.
///
/// Reserve collapses every refusal into [`ConflictReason::Unavailable`] so callers cannot probe
/// the exact state of a number they do not hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConflictReason {
    Unavailable,
    ReservationLapsed,
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictReason::Unavailable => {
                f.write_str("number no longer available, please choose another")
            }
            ConflictReason::ReservationLapsed => f.write_str("reservation expired or slot taken"),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("drawing book {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode drawing book: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SlotError {
    #[error("invalid request: {message}")]
    Validation { message: String },
    #[error("{reason} (drawing {drawing_id}, number {number})")]
    Conflict {
        drawing_id: DrawingId,
        number: SlotNumber,
        reason: ConflictReason,
    },
    #[error("{what} not found")]
    NotFound { what: String },
    #[error("slot pool for drawing {drawing_id} is already initialized")]
    AlreadyInitialized { drawing_id: DrawingId },
    #[error("drawing {drawing_id} already exists")]
    DuplicateDrawing { drawing_id: DrawingId },
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl SlotError {
    pub fn validation(message: impl Into<String>) -> Self {
        SlotError::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        SlotError::NotFound { what: what.into() }
    }

    pub fn drawing_not_found(drawing_id: &DrawingId) -> Self {
        Self::not_found(format!("drawing {drawing_id}"))
    }

    pub fn conflict(drawing_id: &DrawingId, number: SlotNumber, reason: ConflictReason) -> Self {
        SlotError::Conflict {
            drawing_id: drawing_id.clone(),
            number,
            reason,
        }
    }

    /// Only infrastructure failures are worth retrying; every other error is deterministic.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SlotError::Store(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, SlotError::Conflict { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_message_hides_slot_state() {
        let err = SlotError::conflict(&DrawingId::from("d1"), 42, ConflictReason::Unavailable);
        assert_eq!(
            err.to_string(),
            "number no longer available, please choose another (drawing d1, number 42)"
        );
        assert!(err.is_conflict());
        assert!(!err.is_retryable());
    }

    #[test]
    fn store_errors_are_retryable() {
        let err = SlotError::from(StoreError::Io {
            path: PathBuf::from("x"),
            source: io::Error::new(io::ErrorKind::Other, "disk"),
        });
        assert!(err.is_retryable());
    }
}
