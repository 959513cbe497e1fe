use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mock_apis_common::utils::{format_timestamp, parse_json_body, serialize_timestamp};
use mock_apis_common::{Error, ErrorDetails};

use crate::keys::{KEY_CREATED_AT, KeyTier, Permissions, ROTATION_GRACE_SECS};
use crate::rate_limit::RateLimitDecision;
use crate::{AppState, AppStateData, SERVICE_NAME};

pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub valid_keys_count: usize,
}

pub async fn health_handler(State(AppStateData { api_keys, .. }): AppState) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
        valid_keys_count: api_keys.len(),
    })
}

#[derive(Debug, Default, Deserialize)]
pub struct ValidateRequest {
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RateLimitStatus {
    pub limit: u32,
    pub remaining: u32,
    #[serde(serialize_with = "serialize_timestamp")]
    pub reset: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    pub key_type: KeyTier,
    pub rate_limit: RateLimitStatus,
    pub permissions: Permissions,
}

/// Picks the key to validate: a non-empty `api_key` in the JSON body wins over the `x-api-key` header.
fn extract_api_key(headers: &HeaderMap, body: &[u8]) -> Result<Option<String>, Error> {
    let request: ValidateRequest = parse_json_body(body)?;

    let from_header = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string);

    Ok(request
        .api_key
        .filter(|key| !key.is_empty())
        .or(from_header)
        .filter(|key| !key.is_empty()))
}

/// POST /validate - Check an API key against the allow-list and count it against its quota
pub async fn validate_handler(
    State(AppStateData {
        api_keys,
        rate_limiter,
    }): AppState,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ValidateResponse>, Error> {
    let key = extract_api_key(&headers, &body)?.ok_or(ErrorDetails::MissingApiKey)?;

    if !api_keys.contains(&key) {
        return Err(ErrorDetails::InvalidApiKey.into());
    }

    let tier = KeyTier::classify(&key);
    match rate_limiter.check(&key, tier.quota_per_minute(), Utc::now()) {
        RateLimitDecision::Allowed {
            limit,
            remaining,
            reset,
        } => Ok(Json(ValidateResponse {
            valid: true,
            key_type: tier,
            rate_limit: RateLimitStatus {
                limit,
                remaining,
                reset,
            },
            permissions: Permissions::for_key(&key),
        })),
        RateLimitDecision::Exceeded {
            limit,
            retry_after,
            reset,
        } => Err(ErrorDetails::RateLimited {
            limit,
            retry_after,
            reset,
        }
        .into()),
    }
}

#[derive(Debug, Serialize)]
pub struct KeyInfoResponse {
    pub key_id: String,
    #[serde(rename = "type")]
    pub key_type: KeyTier,
    pub created_at: &'static str,
    pub last_used: String,
    pub rate_limit: u32,
    pub active: bool,
}

/// GET /keys/{key_id}/info - Describe a key without counting it against its quota
pub async fn key_info_handler(
    State(AppStateData { api_keys, .. }): AppState,
    Path(key_id): Path<String>,
) -> Result<Json<KeyInfoResponse>, Error> {
    if !api_keys.contains(&key_id) {
        return Err(ErrorDetails::ApiKeyNotFound { key_id }.into());
    }

    let tier = KeyTier::classify(&key_id);
    Ok(Json(KeyInfoResponse {
        key_id,
        key_type: tier,
        created_at: KEY_CREATED_AT,
        last_used: format_timestamp(Utc::now()),
        rate_limit: tier.quota_per_minute(),
        active: true,
    }))
}

#[derive(Debug, Serialize)]
pub struct RotateKeyResponse {
    pub old_key: String,
    pub new_key: String,
    #[serde(serialize_with = "serialize_timestamp")]
    pub rotated_at: DateTime<Utc>,
    pub expires_in: u64,
}

/// POST /keys/{key_id}/rotate - Hand out a replacement key.
///
/// The allow-list is left untouched, so the new key is not actually accepted by `/validate`.
pub async fn rotate_key_handler(
    State(AppStateData { api_keys, .. }): AppState,
    Path(key_id): Path<String>,
) -> Result<Json<RotateKeyResponse>, Error> {
    if !api_keys.contains(&key_id) {
        return Err(ErrorDetails::ApiKeyNotFound { key_id }.into());
    }

    let now = Utc::now();
    let new_key = format!("{key_id}-rotated-{}", now.timestamp_millis());
    tracing::info!(old_key = %key_id, %new_key, "Simulated API key rotation");

    Ok(Json(RotateKeyResponse {
        old_key: key_id,
        new_key,
        rotated_at: now,
        expires_in: ROTATION_GRACE_SECS,
    }))
}
