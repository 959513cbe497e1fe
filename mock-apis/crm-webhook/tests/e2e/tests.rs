#![expect(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use chrono::{DateTime, TimeDelta, Utc};
use serde_json::{Value, json};
use tower::ServiceExt;

use mock_apis_common::fault::{FixedRandom, ScriptedRandom};
use mock_apis_common::{FaultInjector, RandomSource};
use mock_crm_webhook::webhook_log::{WebhookKind, WebhookLog, WebhookLogEntry};
use mock_crm_webhook::{AppStateData, make_router};

fn router_with(failure_rate: f64, source: impl RandomSource + 'static) -> Router {
    let faults = FaultInjector::new(failure_rate, Arc::new(source));
    make_router(AppStateData::new(faults))
}

/// A router whose every random draw returns `draw`.
fn router(failure_rate: f64, draw: f64) -> Router {
    router_with(failure_rate, FixedRandom(draw))
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn webhook(kind: &str, idempotency_key: Option<&str>, payload: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(format!("/webhooks/{kind}"))
        .header("content-type", "application/json");
    if let Some(key) = idempotency_key {
        builder = builder.header("x-idempotency-key", key);
    }
    builder.body(Body::from(payload.to_string())).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let (status, body) = send(&router(0.3, 0.5), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "status": "healthy",
            "service": "mock-crm-webhook",
            "failure_rate": 0.3,
            "webhooks_received": 0,
        })
    );
}

#[tokio::test]
async fn test_missing_idempotency_key() {
    let router = router(0.0, 0.5);
    for kind in [
        "appointment-created",
        "appointment-updated",
        "appointment-cancelled",
    ] {
        let (status, body) = send(&router, webhook(kind, None, &json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Missing X-Idempotency-Key header" }));
    }

    let (_, body) = send(&router, get("/webhooks/log")).await;
    assert_eq!(body["total_received"], 0);
}

#[tokio::test(start_paused = true)]
async fn test_created_replay_returns_original_crm_id() {
    let router = router(0.0, 0.5);
    let payload = json!({ "appointment_id": "apt-1", "coach_id": "coach-1" });

    let start = tokio::time::Instant::now();
    let (status, first) = send(
        &router,
        webhook("appointment-created", Some("apt-1-created"), &payload),
    )
    .await;
    assert!(start.elapsed() >= Duration::from_millis(200));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["success"], true);
    assert!(first.get("message").is_none());
    let crm_id = first["crm_id"].as_str().unwrap();
    assert!(crm_id.starts_with("crm_"));
    assert!(DateTime::parse_from_rfc3339(first["processed_at"].as_str().unwrap()).is_ok());

    let (status, replay) = send(
        &router,
        webhook("appointment-created", Some("apt-1-created"), &payload),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        replay,
        json!({
            "success": true,
            "message": "Already processed",
            "crm_id": crm_id,
        })
    );

    let (_, log) = send(&router, get("/webhooks/log")).await;
    assert_eq!(log["total_received"], 1);
    let entry = &log["webhooks"][0];
    assert_eq!(entry["idempotencyKey"], "apt-1-created");
    assert_eq!(entry["crmId"], crm_id);
    assert_eq!(entry["type"], "appointment-created");
    assert_eq!(entry["payload"], payload);
}

#[tokio::test(start_paused = true)]
async fn test_updated_and_cancelled() {
    let router = router(0.0, 0.5);

    let (status, body) = send(
        &router,
        webhook("appointment-updated", Some("apt-1-updated"), &json!({ "status": "moved" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body.get("crm_id").is_none());
    assert!(body.get("processed_at").is_some());

    let (status, body) = send(
        &router,
        webhook("appointment-cancelled", Some("apt-1-cancelled"), &json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    for key in ["apt-1-updated", "apt-1-cancelled"] {
        let kind = key.replace("apt-1-", "appointment-");
        let (status, body) = send(&router, webhook(&kind, Some(key), &json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({ "success": true, "message": "Already processed" })
        );
    }

    let (_, log) = send(&router, get("/webhooks/log")).await;
    assert_eq!(log["total_received"], 2);
}

#[tokio::test]
async fn test_full_failure_rate_rejects_new_work() {
    let router = router(1.0, 0.5);
    for kind in [
        "appointment-created",
        "appointment-updated",
        "appointment-cancelled",
    ] {
        let response = router
            .clone()
            .oneshot(webhook(kind, Some("fresh-key"), &json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "5");
    }

    let (status, body) = send(&router, get("/contacts/42")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        body,
        json!({ "error": "Service temporarily unavailable", "retry_after": 5 })
    );

    // Failed attempts are not logged
    let (_, log) = send(&router, get("/webhooks/log")).await;
    assert_eq!(log["total_received"], 0);
}

#[tokio::test(start_paused = true)]
async fn test_failed_delivery_can_be_retried_with_same_key() {
    // Only the first draw trips the failure check
    let router = router_with(0.3, ScriptedRandom::new([0.0], 0.99));
    let payload = json!({ "appointment_id": "apt-9" });

    let (status, body) = send(
        &router,
        webhook("appointment-created", Some("apt-9-created"), &payload),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["retry_after"], 5);

    let (status, retried) = send(
        &router,
        webhook("appointment-created", Some("apt-9-created"), &payload),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(retried.get("message").is_none());
    let crm_id = retried["crm_id"].as_str().unwrap();
    assert!(crm_id.starts_with("crm_"));

    let (status, replay) = send(
        &router,
        webhook("appointment-created", Some("apt-9-created"), &payload),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(replay["message"], "Already processed");
    assert_eq!(replay["crm_id"], crm_id);

    let (_, log) = send(&router, get("/webhooks/log")).await;
    assert_eq!(log["total_received"], 1);
}

#[tokio::test]
async fn test_replays_bypass_failure_injection() {
    let webhook_log = Arc::new(WebhookLog::new());
    webhook_log.insert_if_absent(WebhookLogEntry {
        idempotency_key: "seen".to_string(),
        crm_id: Some("crm_1700000000000_abcdefghi".to_string()),
        kind: WebhookKind::AppointmentCreated,
        payload: json!({}),
        received_at: Utc::now(),
    });
    let faults = FaultInjector::new(1.0, Arc::new(FixedRandom(0.5)));
    let router = make_router(AppStateData::with_log(faults, webhook_log));

    let (status, body) = send(
        &router,
        webhook("appointment-created", Some("seen"), &json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["crm_id"], "crm_1700000000000_abcdefghi");
    assert_eq!(body["message"], "Already processed");
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_can_hang() {
    let router = router(0.0, 0.0);
    let pending = router
        .clone()
        .oneshot(webhook("appointment-cancelled", Some("hang"), &json!({})));
    let result = tokio::time::timeout(Duration::from_secs(30), pending).await;
    assert!(result.is_err(), "cancelled webhook should never respond");

    // The hang happens before the delivery is logged
    let (_, log) = send(&router, get("/webhooks/log")).await;
    assert_eq!(log["total_received"], 0);
}

#[tokio::test(start_paused = true)]
async fn test_log_is_capped_fifo() {
    let router = router(0.0, 0.5);
    for i in 0..=100 {
        let key = format!("key-{i}");
        let (status, _) = send(
            &router,
            webhook("appointment-updated", Some(&key), &json!({ "n": i })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, log) = send(&router, get("/webhooks/log")).await;
    assert_eq!(log["total_received"], 100);
    let webhooks = log["webhooks"].as_array().unwrap();
    assert_eq!(webhooks.len(), 20);
    assert_eq!(webhooks[0]["idempotencyKey"], "key-81");
    assert_eq!(webhooks[19]["idempotencyKey"], "key-100");

    // key-0 was evicted, so it is processed again rather than replayed
    let (status, body) = send(
        &router,
        webhook("appointment-updated", Some("key-0"), &json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.get("message").is_none());

    // key-2 is still retained
    let (_, body) = send(
        &router,
        webhook("appointment-updated", Some("key-2"), &json!({})),
    )
    .await;
    assert_eq!(body["message"], "Already processed");
}

#[tokio::test]
async fn test_clear_log() {
    let router = router(0.0, 0.5);
    send(
        &router,
        webhook("appointment-cancelled", Some("c-1"), &json!({})),
    )
    .await;

    let (status, body) = send(&router, delete("/webhooks/log")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "Webhook log cleared" }));

    let (_, health) = send(&router, get("/health")).await;
    assert_eq!(health["webhooks_received"], 0);
}

#[tokio::test]
async fn test_contact_lookup() {
    let (status, body) = send(&router(0.0, 0.5), get("/contacts/42")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "42");
    assert_eq!(body["email"], "contact42@example.com");
    assert_eq!(body["name"], "Contact 42");
    assert_eq!(body["phone"], "+1234567890");
    assert_eq!(body["tags"], json!(["lead", "scheduled"]));
    let score = body["score"].as_f64().unwrap();
    assert!((0.0..100.0).contains(&score));

    let created_at = DateTime::parse_from_rfc3339(body["created_at"].as_str().unwrap())
        .unwrap()
        .with_timezone(&Utc);
    let age = Utc::now() - created_at;
    assert!(age >= TimeDelta::zero());
    assert!(age <= TimeDelta::days(30));
}

#[tokio::test]
async fn test_contact_not_found() {
    // The first draw passes the failure check, the second trips the not-found chance
    let router = router_with(0.3, ScriptedRandom::new([0.5, 0.05], 0.5));
    let (status, body) = send(&router, get("/contacts/42")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "Contact not found" }));
}

#[tokio::test]
async fn test_malformed_payload() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/webhooks/appointment-created")
        .header("x-idempotency-key", "bad-json")
        .body(Body::from("{\"appointment_id\":"))
        .unwrap();
    let (status, _) = send(&router(0.0, 0.5), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
