//! Mock auth gate: validates API keys against a static allow-list and enforces a per-key
//! request quota.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::routing::{get, post};

use mock_apis_common::server::RouterExt as _;

pub mod endpoints;
pub mod keys;
pub mod rate_limit;

use keys::ApiKeyAllowList;
use rate_limit::RateLimiter;

pub const SERVICE_NAME: &str = "mock-auth-service";

#[derive(Clone, Debug)]
pub struct AppStateData {
    pub api_keys: Arc<ApiKeyAllowList>,
    pub rate_limiter: Arc<RateLimiter>,
}

pub type AppState = State<AppStateData>;

impl AppStateData {
    pub fn new(api_keys: impl IntoIterator<Item = String>) -> Self {
        Self {
            api_keys: Arc::new(ApiKeyAllowList::new(api_keys)),
            rate_limiter: Arc::new(RateLimiter::new()),
        }
    }
}

pub fn make_router(state: AppStateData) -> Router {
    Router::new()
        .route("/health", get(endpoints::health_handler))
        .route("/validate", post(endpoints::validate_handler))
        .route("/keys/{key_id}/info", get(endpoints::key_info_handler))
        .route("/keys/{key_id}/rotate", post(endpoints::rotate_key_handler))
        .with_state(state)
        .with_default_layers()
}
