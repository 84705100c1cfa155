// Copyright (c) James Kassemi, SC, US. All rights reserved.
//! JSON-over-HTTP surface for the slot ledger. hyper v1.+
//!
//! Errors come back as `{"error": message}` with 400 for validation failures, 404 for unknown
//! drawings, numbers or participants, 409 for conflicts and 503 when the store is unavailable.

mod error;
mod routes;

use std::{convert::Infallible, future::Future, sync::Arc};

use http_body_util::{BodyExt, Full, Limited};
use hyper::{
    body::{Body, Bytes, Incoming},
    header::CONTENT_TYPE,
    server::conn::http1,
    service::service_fn,
    Request, Response,
};
use core_types::retry::RetryPolicy;
use hyper_util::rt::TokioIo;
use log::{debug, info, warn};
use metrics::SlotMetrics;
use slot_ledger::SlotController;
use tokio::net::TcpListener;

pub use error::ApiError;
use routes::{split_query, Call, Reply, Router};

const MAX_BODY_BYTES: usize = 64 * 1024;

pub struct RaffleApi {
    router: Router,
}

impl RaffleApi {
    pub fn new(ledger: Arc<SlotController>, metrics: Arc<SlotMetrics>) -> Self {
        Self::with_retry_policy(ledger, metrics, RetryPolicy::store_default())
    }

    pub fn with_retry_policy(
        ledger: Arc<SlotController>,
        metrics: Arc<SlotMetrics>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            router: Router::new(ledger, metrics, retry),
        }
    }

    /// Routes one request. Never fails: errors are rendered as JSON responses.
    pub async fn handle<B>(&self, req: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body + Send,
        B::Data: Send,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let (parts, body) = req.into_parts();
        let result = match Limited::new(body, MAX_BODY_BYTES).collect().await {
            Ok(collected) => {
                let bytes = collected.to_bytes();
                let call = Call {
                    method: &parts.method,
                    segments: parts
                        .uri
                        .path()
                        .split('/')
                        .filter(|segment| !segment.is_empty())
                        .collect(),
                    query: split_query(parts.uri.query()),
                    body: &bytes,
                };
                self.router.dispatch(call).await
            }
            Err(err) => Err(ApiError::BadRequest(format!(
                "failed to read request body: {err}"
            ))),
        };
        let reply = result.unwrap_or_else(|err| {
            let status = err.status();
            if status.is_server_error() {
                warn!("{} {} failed: {}", parts.method, parts.uri.path(), err);
            } else {
                debug!("{} {} -> {}: {}", parts.method, parts.uri.path(), status, err);
            }
            let body = serde_json::json!({ "error": err.public_message() });
            Reply {
                status,
                content_type: "application/json".to_string(),
                body: body.to_string().into_bytes(),
            }
        });
        let mut response = Response::new(Full::new(Bytes::from(reply.body)));
        *response.status_mut() = reply.status;
        if let Ok(value) = reply.content_type.parse() {
            response.headers_mut().insert(CONTENT_TYPE, value);
        }
        response
    }

    /// Accepts connections until `shutdown` resolves.
    pub async fn serve(
        self: Arc<Self>,
        listener: TcpListener,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), ApiError> {
        info!("raffle api listening on {}", listener.local_addr()?);
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("raffle api shutting down");
                    return Ok(());
                }
                accepted = listener.accept() => {
                    let (socket, peer) = match accepted {
                        Ok(pair) => pair,
                        Err(err) => {
                            warn!("accept failed: {err}");
                            continue;
                        }
                    };
                    let io = TokioIo::new(socket);
                    let api = Arc::clone(&self);
                    let service = service_fn(move |req: Request<Incoming>| {
                        let api = Arc::clone(&api);
                        async move { Ok::<_, Infallible>(api.handle(req).await) }
                    });
                    tokio::spawn(async move {
                        if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                            debug!("connection from {peer} ended with error: {err:?}");
                        }
                    });
                }
            }
        }
    }
}
