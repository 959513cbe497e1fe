use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::response::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use mock_apis_common::utils::{parse_json_body, serialize_timestamp, synthesize_id};
use mock_apis_common::{Error, ErrorDetails, LatencyRange};

use crate::slots::{self, AvailabilitySlot};
use crate::{AppState, AppStateData, SERVICE_NAME};

pub const COACH_TIMEZONE: &str = "America/New_York";

pub const AVAILABILITY_LATENCY: LatencyRange = LatencyRange::new(100, 600);
pub const BLOCK_SLOT_LATENCY: LatencyRange = LatencyRange::new(50, 350);

/// Probability that a block request collides with an existing booking.
pub const SLOT_CONFLICT_RATE: f64 = 0.05;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
}

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
    })
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub days: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub coach_id: String,
    pub timezone: &'static str,
    pub slots: Vec<AvailabilitySlot>,
    pub total_available: usize,
    #[serde(serialize_with = "serialize_timestamp")]
    pub generated_at: DateTime<Utc>,
}

/// GET /coaches/{coach_id}/availability - Randomized free slots for the coming days
pub async fn availability_handler(
    State(AppStateData { faults }): AppState,
    Path(coach_id): Path<String>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, Error> {
    faults.check_availability()?;
    faults.simulate_latency(AVAILABILITY_LATENCY).await;

    let days = slots::resolve_days(query.days.as_deref());
    let now = Utc::now();
    let slots = slots::generate_slots(now.date_naive(), days, &faults);
    tracing::debug!(%coach_id, days, slots = slots.len(), "Generated availability");

    Ok(Json(AvailabilityResponse {
        coach_id,
        timezone: COACH_TIMEZONE,
        total_available: slots.len(),
        slots,
        generated_at: now,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct BlockSlotRequest {
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BlockSlotResponse {
    pub success: bool,
    pub coach_id: String,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    #[serde(serialize_with = "serialize_timestamp")]
    pub blocked_at: DateTime<Utc>,
    pub block_id: String,
}

/// POST /coaches/{coach_id}/block-slot - Pretend to reserve a slot
///
/// The requested times are echoed back without validation. A small fraction of requests
/// report a conflict, which takes precedence over injected unavailability.
pub async fn block_slot_handler(
    State(AppStateData { faults }): AppState,
    Path(coach_id): Path<String>,
    body: Bytes,
) -> Result<Json<BlockSlotResponse>, Error> {
    let BlockSlotRequest {
        start_time,
        end_time,
    } = parse_json_body(&body)?;

    if faults.chance(SLOT_CONFLICT_RATE) {
        return Err(ErrorDetails::SlotConflict {
            coach_id,
            start_time,
            end_time,
        }
        .into());
    }
    faults.check_availability()?;
    faults.simulate_latency(BLOCK_SLOT_LATENCY).await;

    let now = Utc::now();
    let block_id = synthesize_id("block", now);
    tracing::info!(%coach_id, %block_id, "Blocked slot");

    Ok(Json(BlockSlotResponse {
        success: true,
        coach_id,
        start_time,
        end_time,
        blocked_at: now,
        block_id,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct ReleaseSlotRequest {
    #[serde(default)]
    pub block_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReleaseSlotResponse {
    pub success: bool,
    pub coach_id: String,
    pub block_id: Option<String>,
    #[serde(serialize_with = "serialize_timestamp")]
    pub released_at: DateTime<Utc>,
}

/// POST /coaches/{coach_id}/release-slot - Always succeeds, whether or not the block exists
pub async fn release_slot_handler(
    Path(coach_id): Path<String>,
    body: Bytes,
) -> Result<Json<ReleaseSlotResponse>, Error> {
    let ReleaseSlotRequest { block_id } = parse_json_body(&body)?;
    Ok(Json(ReleaseSlotResponse {
        success: true,
        coach_id,
        block_id,
        released_at: Utc::now(),
    }))
}

#[derive(Debug, Serialize)]
pub struct WorkingHours {
    pub start: &'static str,
    pub end: &'static str,
    pub timezone: &'static str,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityRules {
    pub min_notice_hours: u32,
    pub max_advance_days: u32,
    pub buffer_minutes: u32,
}

#[derive(Debug, Serialize)]
pub struct CalendarSettings {
    pub coach_id: String,
    pub working_hours: WorkingHours,
    pub availability_rules: AvailabilityRules,
    pub blocked_dates: &'static [&'static str],
}

const BLOCKED_DATES: &[&str] = &["2024-12-25", "2024-12-26", "2025-01-01"];

/// GET /coaches/{coach_id}/settings - The same canned configuration for every coach
pub async fn settings_handler(Path(coach_id): Path<String>) -> Json<CalendarSettings> {
    Json(CalendarSettings {
        coach_id,
        working_hours: WorkingHours {
            start: "09:00",
            end: "17:00",
            timezone: COACH_TIMEZONE,
        },
        availability_rules: AvailabilityRules {
            min_notice_hours: 2,
            max_advance_days: 30,
            buffer_minutes: 5,
        },
        blocked_dates: BLOCKED_DATES,
    })
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
}

/// POST /webhooks/calendar-update - Log whatever arrives and acknowledge it
pub async fn calendar_update_handler(body: Bytes) -> Json<WebhookAck> {
    match serde_json::from_slice::<Value>(&body) {
        Ok(payload) => tracing::info!(%payload, "Received calendar update webhook"),
        Err(_) => tracing::info!(
            payload = %String::from_utf8_lossy(&body),
            "Received calendar update webhook with a non-JSON body"
        ),
    }
    Json(WebhookAck {
        received: true,
        timestamp: Utc::now(),
    })
}
