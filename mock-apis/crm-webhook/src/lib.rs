//! Mock CRM: receives appointment lifecycle webhooks, deduplicates them by idempotency key
//! and simulates an unreliable receiver.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::routing::{get, post};

use mock_apis_common::FaultInjector;
use mock_apis_common::server::RouterExt as _;

pub mod endpoints;
pub mod webhook_log;

use webhook_log::WebhookLog;

pub const SERVICE_NAME: &str = "mock-crm-webhook";

pub const DEFAULT_FAILURE_RATE: f64 = 0.3;

#[derive(Clone, Debug)]
pub struct AppStateData {
    pub faults: FaultInjector,
    pub webhook_log: Arc<WebhookLog>,
}

pub type AppState = State<AppStateData>;

impl AppStateData {
    pub fn new(faults: FaultInjector) -> Self {
        Self::with_log(faults, Arc::new(WebhookLog::new()))
    }

    pub fn with_log(faults: FaultInjector, webhook_log: Arc<WebhookLog>) -> Self {
        Self {
            faults,
            webhook_log,
        }
    }
}

pub fn make_router(state: AppStateData) -> Router {
    Router::new()
        .route("/health", get(endpoints::health_handler))
        .route(
            "/webhooks/appointment-created",
            post(endpoints::appointment_created_handler),
        )
        .route(
            "/webhooks/appointment-updated",
            post(endpoints::appointment_updated_handler),
        )
        .route(
            "/webhooks/appointment-cancelled",
            post(endpoints::appointment_cancelled_handler),
        )
        .route(
            "/webhooks/log",
            get(endpoints::webhook_log_handler).delete(endpoints::clear_webhook_log_handler),
        )
        .route("/contacts/{contact_id}", get(endpoints::contact_handler))
        .with_state(state)
        .with_default_layers()
}
