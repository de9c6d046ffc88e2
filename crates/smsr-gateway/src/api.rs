use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use serde_json::{json, Value};
use smsr_core::{
    errors::IngestError, legacy::LegacyIngest, BatchDispatcher, BatchOutcome, BatchReport,
    NotificationChannel,
};
use smsr_crypto::CipherEngine;
use std::{sync::Arc, time::Instant};
use tracing::{error, info, warn};

use crate::{auth::SharedKeyAuth, config::GatewayConfig, metrics::GatewayMetrics};

pub const CHANNEL_DOWN: &str = "Notification channel is down or unavailable";

/// Legacy route wiring. Present only when a passphrase is configured.
#[derive(Clone)]
pub struct LegacyRoute {
    pub ingest: Arc<LegacyIngest>,
    pub recipients: Arc<[String]>,
}

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<BatchDispatcher>,
    pub legacy: Option<LegacyRoute>,
    pub auth: SharedKeyAuth,
    pub metrics: Arc<GatewayMetrics>,
}

impl AppState {
    pub fn new(config: &GatewayConfig, channel: Arc<dyn NotificationChannel>) -> anyhow::Result<Self> {
        let mut dispatcher = BatchDispatcher::new(channel);
        if let Some(timeout) = config.send_timeout() {
            dispatcher = dispatcher.with_send_timeout(timeout);
        }

        let legacy = config.legacy_passphrase.as_ref().map(|passphrase| LegacyRoute {
            ingest: Arc::new(LegacyIngest::new(CipherEngine::new(passphrase))),
            recipients: config.legacy_recipients.clone().into(),
        });

        Ok(Self {
            dispatcher: Arc::new(dispatcher),
            legacy,
            auth: SharedKeyAuth::new(config.auth_key.as_str()),
            metrics: Arc::new(GatewayMetrics::new()?),
        })
    }
}

#[derive(Serialize)]
struct Delivered<'a> {
    index: usize,
    user_id: &'a str,
}

#[derive(Serialize)]
struct Failed<'a> {
    index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<&'a str>,
    error: &'a str,
}

fn failed_entries(report: &BatchReport) -> Vec<Failed<'_>> {
    report
        .failed()
        .map(|r| Failed {
            index: r.index,
            user_id: r.recipient.as_deref(),
            error: r.error().unwrap_or_default(),
        })
        .collect()
}

/// Map a batch report to the response status and body.
pub fn report_response(report: &BatchReport) -> (StatusCode, Value) {
    match report.outcome() {
        BatchOutcome::AllFailed => (
            StatusCode::SERVICE_UNAVAILABLE,
            json!({
                "error": CHANNEL_DOWN,
                "details": failed_entries(report),
            }),
        ),
        BatchOutcome::PartialSuccess => {
            let successful: Vec<_> = report
                .successful()
                .map(|r| Delivered {
                    index: r.index,
                    user_id: r.recipient.as_deref().unwrap_or_default(),
                })
                .collect();
            (
                StatusCode::MULTI_STATUS,
                json!({
                    "status": "partial_success",
                    "successful": successful,
                    "failed": failed_entries(report),
                }),
            )
        }
        BatchOutcome::AllSuccess { delivered } => (
            StatusCode::OK,
            json!({ "status": "success", "delivered": delivered }),
        ),
    }
}

pub fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

fn finish(state: &AppState, report: &BatchReport, start: Instant) -> Response {
    state.metrics.record_report(report);
    state.metrics.request_latency.observe(start.elapsed().as_secs_f64());
    let (status, body) = report_response(report);
    (status, Json(body)).into_response()
}

// POST /receive_data
pub async fn receive_data(State(state): State<AppState>, body: Bytes) -> Response {
    let start = Instant::now();
    state.metrics.batches_received.inc();

    match state.dispatcher.dispatch_body(&body).await {
        Ok(report) => finish(&state, &report, start),
        Err(e) => {
            warn!("rejected batch: {}", e);
            state.metrics.request_latency.observe(start.elapsed().as_secs_f64());
            error_response(StatusCode::BAD_REQUEST, &e.to_string())
        }
    }
}

// POST /
pub async fn legacy_ingest(State(state): State<AppState>, body: Bytes) -> Response {
    let legacy = match &state.legacy {
        Some(legacy) => legacy.clone(),
        None => return error_response(StatusCode::NOT_FOUND, "Legacy ingestion is disabled"),
    };
    let start = Instant::now();

    // Key derivation is CPU-bound.
    let ingest = Arc::clone(&legacy.ingest);
    let message = match tokio::task::spawn_blocking(move || ingest.open(&body)).await {
        Ok(Ok(message)) => message,
        Ok(Err(e)) => {
            if matches!(e, IngestError::Decryption(_)) {
                state.metrics.legacy_decrypt_failures.inc();
            }
            warn!("rejected legacy message: {}", e);
            return error_response(StatusCode::BAD_REQUEST, &e.to_string());
        }
        Err(e) => {
            error!("legacy ingestion task failed: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal error");
        }
    };

    info!("legacy {} message received", message.kind);
    let report = state
        .dispatcher
        .deliver(0, &message.render(), &legacy.recipients)
        .await;
    finish(&state, &report, start)
}

// GET /health
pub async fn get_health() -> Response {
    let response = json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    });

    (StatusCode::OK, Json(response)).into_response()
}

// GET /metrics
pub async fn get_metrics(State(state): State<AppState>) -> Response {
    match state.metrics.export_prometheus() {
        Ok(text) => (
            StatusCode::OK,
            [("Content-Type", "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!("failed to export metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
