// Copyright (c) James Kassemi, SC, US. All rights reserved.
use hyper::StatusCode;
use slot_ledger::SlotError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Slot(#[from] SlotError),
    #[error("{0}")]
    BadRequest(String),
    #[error("no route for {method} {path}")]
    NoRoute { method: String, path: String },
    #[error("metrics error: {0}")]
    Metrics(#[from] metrics::MetricsError),
    #[error("response encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Slot(err) => match err {
                SlotError::Validation { .. } => StatusCode::BAD_REQUEST,
                SlotError::NotFound { .. } => StatusCode::NOT_FOUND,
                SlotError::Conflict { .. }
                | SlotError::AlreadyInitialized { .. }
                | SlotError::DuplicateDrawing { .. } => StatusCode::CONFLICT,
                SlotError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NoRoute { .. } => StatusCode::NOT_FOUND,
            ApiError::Metrics(_) | ApiError::Encode(_) | ApiError::Join(_) | ApiError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message shown to the caller. Conflicts only carry the reason, never the slot's state.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::Slot(SlotError::Conflict { reason, .. }) => reason.to_string(),
            ApiError::Slot(SlotError::Store(_)) => "storage temporarily unavailable".to_string(),
            ApiError::Metrics(_) | ApiError::Encode(_) | ApiError::Join(_) | ApiError::Io(_) => {
                "internal error".to_string()
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::DrawingId;
    use slot_ledger::ConflictReason;

    #[test]
    fn slot_errors_map_to_http_statuses() {
        let cases = [
            (SlotError::validation("bad"), StatusCode::BAD_REQUEST),
            (SlotError::not_found("drawing x"), StatusCode::NOT_FOUND),
            (
                SlotError::conflict(&DrawingId::from("d1"), 1, ConflictReason::Unavailable),
                StatusCode::CONFLICT,
            ),
            (
                SlotError::AlreadyInitialized {
                    drawing_id: DrawingId::from("d1"),
                },
                StatusCode::CONFLICT,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn conflict_message_is_participant_facing() {
        let err = ApiError::from(SlotError::conflict(
            &DrawingId::from("d1"),
            42,
            ConflictReason::Unavailable,
        ));
        assert_eq!(
            err.public_message(),
            "number no longer available, please choose another"
        );
    }
}
