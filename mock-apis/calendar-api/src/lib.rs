//! Mock calendar provider: randomized coach availability plus slot block/release calls
//! that fail and stall at a configurable rate.

use axum::Router;
use axum::extract::State;
use axum::routing::{get, post};

use mock_apis_common::FaultInjector;
use mock_apis_common::server::RouterExt as _;

pub mod endpoints;
pub mod slots;

pub const SERVICE_NAME: &str = "mock-calendar-api";

pub const DEFAULT_FAILURE_RATE: f64 = 0.1;

#[derive(Clone, Debug)]
pub struct AppStateData {
    pub faults: FaultInjector,
}

pub type AppState = State<AppStateData>;

impl AppStateData {
    pub fn new(faults: FaultInjector) -> Self {
        Self { faults }
    }
}

pub fn make_router(state: AppStateData) -> Router {
    Router::new()
        .route("/health", get(endpoints::health_handler))
        .route(
            "/coaches/{coach_id}/availability",
            get(endpoints::availability_handler),
        )
        .route(
            "/coaches/{coach_id}/block-slot",
            post(endpoints::block_slot_handler),
        )
        .route(
            "/coaches/{coach_id}/release-slot",
            post(endpoints::release_slot_handler),
        )
        .route(
            "/coaches/{coach_id}/settings",
            get(endpoints::settings_handler),
        )
        .route(
            "/webhooks/calendar-update",
            post(endpoints::calendar_update_handler),
        )
        .with_state(state)
        .with_default_layers()
}
