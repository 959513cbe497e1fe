use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::Json;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use serde_json::Value;

use mock_apis_common::utils::{
    format_timestamp, parse_json_body, serialize_timestamp, synthesize_id,
};
use mock_apis_common::{Error, ErrorDetails, LatencyRange};

use crate::webhook_log::{RECENT_ENTRIES, WebhookKind, WebhookLogEntry};
use crate::{AppState, AppStateData, SERVICE_NAME};

pub const IDEMPOTENCY_KEY_HEADER: &str = "x-idempotency-key";

pub const CREATED_LATENCY: LatencyRange = LatencyRange::new(200, 1200);
pub const UPDATED_LATENCY: LatencyRange = LatencyRange::new(100, 800);

/// Probability that a cancellation is swallowed without any response.
pub const CANCELLED_HANG_RATE: f64 = 0.05;

/// Probability that a contact lookup reports the contact as missing.
pub const CONTACT_NOT_FOUND_RATE: f64 = 0.1;

const CONTACT_MAX_AGE_DAYS: i64 = 30;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub failure_rate: f64,
    pub webhooks_received: usize,
}

pub async fn health_handler(
    State(AppStateData {
        faults,
        webhook_log,
    }): AppState,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
        failure_rate: faults.failure_rate(),
        webhooks_received: webhook_log.len(),
    })
}

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crm_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<String>,
}

impl WebhookResponse {
    fn processed(crm_id: Option<String>, processed_at: DateTime<Utc>) -> Self {
        Self {
            success: true,
            message: None,
            crm_id,
            processed_at: Some(format_timestamp(processed_at)),
        }
    }

    /// The answer to a delivery whose idempotency key was already handled. Only `created`
    /// replays carry the original `crm_id`.
    fn replay(kind: WebhookKind, existing: WebhookLogEntry) -> Self {
        Self {
            success: true,
            message: Some("Already processed"),
            crm_id: match kind {
                WebhookKind::AppointmentCreated => existing.crm_id,
                WebhookKind::AppointmentUpdated | WebhookKind::AppointmentCancelled => None,
            },
            processed_at: None,
        }
    }
}

fn idempotency_key(headers: &HeaderMap) -> Result<String, Error> {
    headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|key| !key.is_empty())
        .map(ToString::to_string)
        .ok_or_else(|| Error::new(ErrorDetails::MissingIdempotencyKey))
}

/// Shared dedup, failure and logging path for the appointment webhooks.
///
/// A key already in the log is answered from the log and never fails. Otherwise the
/// delivery may fail with a `503` (and is then not logged), or is processed after `latency`
/// and appended to the log.
async fn process_webhook(
    AppStateData {
        faults,
        webhook_log,
    }: AppStateData,
    kind: WebhookKind,
    idempotency_key: String,
    body: &[u8],
    latency: Option<LatencyRange>,
) -> Result<Json<WebhookResponse>, Error> {
    let payload: Value = parse_json_body(body)?;

    if let Some(existing) = webhook_log.find(&idempotency_key) {
        tracing::info!(%kind, %idempotency_key, "Duplicate webhook detected");
        return Ok(Json(WebhookResponse::replay(kind, existing)));
    }

    faults.check_availability().inspect_err(|_| {
        tracing::info!(%kind, %idempotency_key, "Simulating failure for webhook");
    })?;

    if let Some(latency) = latency {
        faults.simulate_latency(latency).await;
    }

    let now = Utc::now();
    let crm_id = match kind {
        WebhookKind::AppointmentCreated => Some(synthesize_id("crm", now)),
        WebhookKind::AppointmentUpdated | WebhookKind::AppointmentCancelled => None,
    };
    let appointment_id = payload.get("appointment_id").cloned();

    let entry = WebhookLogEntry {
        idempotency_key: idempotency_key.clone(),
        crm_id: crm_id.clone(),
        kind,
        payload,
        received_at: now,
    };

    // Another delivery of the same key may have finished while this one was sleeping
    if let Some(existing) = webhook_log.insert_if_absent(entry) {
        tracing::info!(%kind, %idempotency_key, "Duplicate webhook detected after processing");
        return Ok(Json(WebhookResponse::replay(kind, existing)));
    }

    tracing::info!(
        %kind,
        %idempotency_key,
        appointment_id = ?appointment_id,
        crm_id = ?crm_id,
        "Webhook processed"
    );
    Ok(Json(WebhookResponse::processed(crm_id, now)))
}

/// POST /webhooks/appointment-created
pub async fn appointment_created_handler(
    State(state): AppState,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, Error> {
    let key = idempotency_key(&headers)?;
    process_webhook(
        state,
        WebhookKind::AppointmentCreated,
        key,
        &body,
        Some(CREATED_LATENCY),
    )
    .await
}

/// POST /webhooks/appointment-updated
pub async fn appointment_updated_handler(
    State(state): AppState,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, Error> {
    let key = idempotency_key(&headers)?;
    process_webhook(
        state,
        WebhookKind::AppointmentUpdated,
        key,
        &body,
        Some(UPDATED_LATENCY),
    )
    .await
}

/// POST /webhooks/appointment-cancelled
///
/// Occasionally never answers, so clients have to rely on their own timeouts.
pub async fn appointment_cancelled_handler(
    State(state): AppState,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, Error> {
    let key = idempotency_key(&headers)?;

    if state.faults.chance(CANCELLED_HANG_RATE) {
        tracing::info!(idempotency_key = %key, "Simulating timeout for webhook");
        return std::future::pending().await;
    }

    process_webhook(state, WebhookKind::AppointmentCancelled, key, &body, None).await
}

#[derive(Debug, Serialize)]
pub struct WebhookLogResponse {
    pub total_received: usize,
    pub webhooks: Vec<WebhookLogEntry>,
}

/// GET /webhooks/log - The most recent deliveries, for debugging
pub async fn webhook_log_handler(
    State(AppStateData { webhook_log, .. }): AppState,
) -> Json<WebhookLogResponse> {
    Json(WebhookLogResponse {
        total_received: webhook_log.len(),
        webhooks: webhook_log.recent(RECENT_ENTRIES),
    })
}

#[derive(Debug, Serialize)]
pub struct ClearLogResponse {
    pub message: &'static str,
}

/// DELETE /webhooks/log
pub async fn clear_webhook_log_handler(
    State(AppStateData { webhook_log, .. }): AppState,
) -> Json<ClearLogResponse> {
    let cleared = webhook_log.clear();
    tracing::info!(cleared, "Cleared webhook log");
    Json(ClearLogResponse {
        message: "Webhook log cleared",
    })
}

#[derive(Debug, Serialize)]
pub struct Contact {
    pub id: String,
    pub email: String,
    pub name: String,
    pub phone: &'static str,
    pub tags: [&'static str; 2],
    pub score: f64,
    #[serde(serialize_with = "serialize_timestamp")]
    pub created_at: DateTime<Utc>,
}

/// GET /contacts/{contact_id} - A made-up contact record
pub async fn contact_handler(
    State(AppStateData { faults, .. }): AppState,
    Path(contact_id): Path<String>,
) -> Result<Json<Contact>, Error> {
    faults.check_availability()?;

    if faults.chance(CONTACT_NOT_FOUND_RATE) {
        return Err(ErrorDetails::ContactNotFound { contact_id }.into());
    }

    let score = faults.uniform(0.0, 100.0);
    let max_age_ms = TimeDelta::days(CONTACT_MAX_AGE_DAYS).num_milliseconds() as f64;
    let age = TimeDelta::milliseconds(faults.uniform(0.0, max_age_ms) as i64);

    let email = format!("contact{contact_id}@example.com");
    let name = format!("Contact {contact_id}");
    Ok(Json(Contact {
        id: contact_id,
        email,
        name,
        phone: "+1234567890",
        tags: ["lead", "scheduled"],
        score,
        created_at: Utc::now() - age,
    }))
}
