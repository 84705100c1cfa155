// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::{borrow::Cow, sync::Arc};

use core_types::{
    retry::RetryPolicy, DrawingId, OwnerId, ParticipantId, ReservationToken, SlotNumber,
};
use hyper::{Method, StatusCode};
use log::warn;
use metrics::{Outcome, SlotMetrics};
use serde::{Deserialize, Serialize};
use slot_ledger::{NewDrawing, ParticipantStatus, Registration, SlotController, SlotError};

use crate::error::ApiError;

/// A parsed request: method, path segments, query pairs and the raw body.
pub(crate) struct Call<'a> {
    pub method: &'a Method,
    pub segments: Vec<&'a str>,
    pub query: Vec<(Cow<'a, str>, Cow<'a, str>)>,
    pub body: &'a [u8],
}

impl<'a> Call<'a> {
    fn query(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_ref())
    }

    fn json<T: for<'de> Deserialize<'de>>(&self) -> Result<T, ApiError> {
        serde_json::from_slice(self.body)
            .map_err(|err| ApiError::BadRequest(format!("invalid request body: {err}")))
    }
}

pub(crate) struct Reply {
    pub status: StatusCode,
    pub content_type: String,
    pub body: Vec<u8>,
}

impl Reply {
    fn json<T: Serialize>(status: StatusCode, value: &T) -> Result<Self, ApiError> {
        Ok(Self {
            status,
            content_type: "application/json".to_string(),
            body: serde_json::to_vec(value)?,
        })
    }

    fn ok<T: Serialize>(value: &T) -> Result<Self, ApiError> {
        Self::json(StatusCode::OK, value)
    }
}

#[derive(Debug, Deserialize)]
struct ReserveRequest {
    number: SlotNumber,
    #[serde(default)]
    expiration_minutes: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ConfirmRequest {
    number: SlotNumber,
    participant_id: ParticipantId,
    token: ReservationToken,
}

#[derive(Debug, Deserialize)]
struct StatusRequest {
    status: ParticipantStatus,
}

#[derive(Debug, Default, Deserialize)]
struct SelectWinnersRequest {
    #[serde(default)]
    numbers: Option<Vec<SlotNumber>>,
}

#[derive(Debug, Serialize)]
struct Released {
    released: usize,
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
}

pub(crate) struct Router {
    ledger: Arc<SlotController>,
    metrics: Arc<SlotMetrics>,
    retry: RetryPolicy,
}

impl Router {
    pub fn new(
        ledger: Arc<SlotController>,
        metrics: Arc<SlotMetrics>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            ledger,
            metrics,
            retry,
        }
    }

    /// Runs a ledger operation on the blocking pool, retrying store failures. A failed store
    /// write leaves the ledger unchanged, so every operation is safe to repeat.
    async fn run<T, F>(&self, op: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: Fn(&SlotController) -> Result<T, SlotError> + Send + Sync + 'static,
    {
        let op = Arc::new(op);
        self.retry
            .retry_transient(
                |attempt| {
                    let ledger = Arc::clone(&self.ledger);
                    let op = Arc::clone(&op);
                    async move {
                        if attempt > 0 {
                            warn!("retrying ledger operation (attempt {})", attempt + 1);
                        }
                        let value = tokio::task::spawn_blocking(move || (*op)(&ledger)).await??;
                        Ok::<T, ApiError>(value)
                    }
                },
                |err: &ApiError| matches!(err, ApiError::Slot(slot) if slot.is_retryable()),
            )
            .await
    }

    pub async fn dispatch(&self, call: Call<'_>) -> Result<Reply, ApiError> {
        let method = call.method.clone();
        match (method, call.segments.as_slice()) {
            (Method::GET, ["health"]) => Reply::ok(&Health { status: "ok" }),
            (Method::GET, ["metrics"]) => self.metrics_reply().await,
            (Method::POST, ["drawings"]) => {
                let draft: NewDrawing = call.json()?;
                let drawing = self.run(move |l| l.create_drawing(draft.clone())).await?;
                Reply::json(StatusCode::CREATED, &drawing)
            }
            (Method::GET, ["drawings"]) => {
                let owner = call
                    .query("owner")
                    .ok_or_else(|| ApiError::BadRequest("owner query parameter is required".into()))?;
                let owner = OwnerId(owner.to_string());
                Reply::ok(&self.run(move |l| l.drawings_for_owner(&owner)).await?)
            }
            (Method::GET, ["drawings", id]) => {
                let id = DrawingId::from(*id);
                Reply::ok(&self.run(move |l| l.drawing(&id)).await?)
            }
            (Method::GET, ["drawings", id, "stats"]) => {
                let id = DrawingId::from(*id);
                Reply::ok(&self.run(move |l| l.stats(&id)).await?)
            }
            (Method::GET, ["drawings", id, "slots"]) => {
                let id = DrawingId::from(*id);
                let numbers = parse_numbers(call.query("numbers").unwrap_or_default())?;
                let viewer = call.query("token").map(ReservationToken::from_client);
                Reply::ok(
                    &self
                        .run(move |l| l.query_slots(&id, &numbers, viewer.as_ref()))
                        .await?,
                )
            }
            (Method::GET, ["drawings", id, "slots", number]) => {
                let id = DrawingId::from(*id);
                let number = parse_number(number)?;
                Reply::ok(&self.run(move |l| l.get_slot(&id, number)).await?)
            }
            (Method::POST, ["drawings", id, "reserve"]) => {
                let id = DrawingId::from(*id);
                let request: ReserveRequest = call.json()?;
                let result = self
                    .run(move |l| l.reserve(&id, request.number, request.expiration_minutes))
                    .await;
                self.metrics.record_reservation(outcome_of(&result));
                Reply::json(StatusCode::CREATED, &result?)
            }
            (Method::POST, ["drawings", id, "confirm"]) => {
                let id = DrawingId::from(*id);
                let request: ConfirmRequest = call.json()?;
                self.run(move |l| {
                    l.confirm(&id, request.number, request.participant_id, &request.token)
                })
                .await?;
                self.metrics.record_confirmation();
                Reply::ok(&serde_json::json!({ "confirmed": true }))
            }
            (Method::POST, ["drawings", id, "participate"]) => {
                let id = DrawingId::from(*id);
                let registration: Registration = call.json()?;
                let result = self
                    .run(move |l| l.register_participant(&id, &registration))
                    .await;
                let numbers = result.as_ref().map_or(0, |entry| entry.numbers.len());
                self.metrics
                    .record_registration(outcome_of(&result), numbers);
                Reply::json(StatusCode::CREATED, &result?)
            }
            (Method::GET, ["drawings", id, "participants"]) => {
                let id = DrawingId::from(*id);
                Reply::ok(&self.run(move |l| l.participants(&id)).await?)
            }
            (Method::GET, ["drawings", id, "participants", pid]) => {
                let id = DrawingId::from(*id);
                let pid = parse_participant(pid)?;
                Reply::ok(&self.run(move |l| l.participant(&id, pid)).await?)
            }
            (Method::GET, ["drawings", id, "participants", pid, "numbers"]) => {
                let id = DrawingId::from(*id);
                let pid = parse_participant(pid)?;
                Reply::ok(&self.run(move |l| l.participant_numbers(&id, pid)).await?)
            }
            (Method::POST, ["drawings", id, "participants", pid, "status"]) => {
                let id = DrawingId::from(*id);
                let pid = parse_participant(pid)?;
                let request: StatusRequest = call.json()?;
                Reply::ok(
                    &self
                        .run(move |l| l.set_participant_status(&id, pid, request.status))
                        .await?,
                )
            }
            (Method::POST, ["drawings", id, "sweep"]) => {
                let id = DrawingId::from(*id);
                let released = self.run(move |l| l.release_expired(Some(&id))).await?;
                self.metrics.record_sweep(released);
                Reply::ok(&Released { released })
            }
            (Method::POST, ["drawings", id, "select-winners"]) => {
                let id = DrawingId::from(*id);
                let request: SelectWinnersRequest = if call.body.is_empty() {
                    SelectWinnersRequest::default()
                } else {
                    call.json()?
                };
                let winners = self
                    .run(move |l| l.select_winners(&id, request.numbers.as_deref()))
                    .await?;
                self.metrics.record_winner_run();
                Reply::ok(&winners)
            }
            (Method::GET, ["drawings", id, "winners"]) => {
                let id = DrawingId::from(*id);
                Reply::ok(&self.run(move |l| l.winners(&id)).await?)
            }
            (method, _) => Err(ApiError::NoRoute {
                method: method.to_string(),
                path: format!("/{}", call.segments.join("/")),
            }),
        }
    }

    async fn metrics_reply(&self) -> Result<Reply, ApiError> {
        let snapshot = self.run(|l| l.snapshot()).await?;
        self.metrics.observe_snapshot(&snapshot);
        Ok(Reply {
            status: StatusCode::OK,
            content_type: self.metrics.content_type(),
            body: self.metrics.encode()?,
        })
    }
}

fn outcome_of<T>(result: &Result<T, ApiError>) -> Outcome {
    match result {
        Ok(_) => Outcome::Ok,
        Err(ApiError::Slot(err)) if err.is_conflict() => Outcome::Conflict,
        Err(_) => Outcome::Rejected,
    }
}

fn parse_number(raw: &str) -> Result<SlotNumber, ApiError> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid number {raw:?}")))
}

fn parse_numbers(raw: &str) -> Result<Vec<SlotNumber>, ApiError> {
    raw.split(',')
        .filter(|part| !part.trim().is_empty())
        .map(parse_number)
        .collect()
}

fn parse_participant(raw: &str) -> Result<ParticipantId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid participant id {raw:?}")))
}

/// Decoded `application/x-www-form-urlencoded` pairs from the request's query string.
pub(crate) fn split_query(query: Option<&str>) -> Vec<(Cow<'_, str>, Cow<'_, str>)> {
    url::form_urlencoded::parse(query.unwrap_or_default().as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_parse_from_comma_list() {
        assert_eq!(parse_numbers("4, 8,15").unwrap(), vec![4, 8, 15]);
        assert!(parse_numbers("").unwrap().is_empty());
        assert!(parse_numbers("4,x").is_err());
    }

    #[test]
    fn query_pairs_are_decoded() {
        let pairs = split_query(Some("numbers=1%2C2&token=a+b%2Fc&flag"));
        let pairs: Vec<(&str, &str)> = pairs.iter().map(|(k, v)| (k.as_ref(), v.as_ref())).collect();
        assert_eq!(
            pairs,
            vec![("numbers", "1,2"), ("token", "a b/c"), ("flag", "")]
        );
        assert!(split_query(None).is_empty());
    }
}
