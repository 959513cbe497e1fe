//! Bounded record of processed webhooks, used for idempotency dedup and the debug listing.
//!
//! The log is a FIFO: once it holds [`MAX_LOG_SIZE`] entries, each new entry evicts the
//! oldest one. An evicted idempotency key is forgotten, so a later replay of it is
//! processed again as if it were new.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use mock_apis_common::utils::serialize_timestamp;

pub const MAX_LOG_SIZE: usize = 100;

/// How many entries `GET /webhooks/log` returns.
pub const RECENT_ENTRIES: usize = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WebhookKind {
    AppointmentCreated,
    AppointmentUpdated,
    AppointmentCancelled,
}

impl WebhookKind {
    pub fn as_str(self) -> &'static str {
        match self {
            WebhookKind::AppointmentCreated => "appointment-created",
            WebhookKind::AppointmentUpdated => "appointment-updated",
            WebhookKind::AppointmentCancelled => "appointment-cancelled",
        }
    }
}

impl std::fmt::Display for WebhookKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WebhookLogEntry {
    #[serde(rename = "idempotencyKey")]
    pub idempotency_key: String,
    #[serde(rename = "crmId", skip_serializing_if = "Option::is_none")]
    pub crm_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: WebhookKind,
    pub payload: Value,
    #[serde(serialize_with = "serialize_timestamp")]
    pub received_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct WebhookLog {
    entries: Mutex<VecDeque<WebhookLogEntry>>,
    capacity: usize,
}

impl Default for WebhookLog {
    fn default() -> Self {
        Self::with_capacity(MAX_LOG_SIZE)
    }
}

impl WebhookLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    fn entries(&self) -> MutexGuard<'_, VecDeque<WebhookLogEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn find(&self, idempotency_key: &str) -> Option<WebhookLogEntry> {
        self.entries()
            .iter()
            .find(|entry| entry.idempotency_key == idempotency_key)
            .cloned()
    }

    /// Appends `entry` unless an entry with the same idempotency key is already present, in
    /// which case the existing entry is returned and the log is left untouched.
    ///
    /// Lookup and append happen under one lock, so two concurrent deliveries of the same key
    /// produce a single entry.
    pub fn insert_if_absent(&self, entry: WebhookLogEntry) -> Option<WebhookLogEntry> {
        let mut entries = self.entries();
        if let Some(existing) = entries
            .iter()
            .find(|existing| existing.idempotency_key == entry.idempotency_key)
        {
            return Some(existing.clone());
        }

        entries.push_back(entry);
        while entries.len() > self.capacity {
            if let Some(evicted) = entries.pop_front() {
                tracing::debug!(
                    idempotency_key = %evicted.idempotency_key,
                    "Evicted oldest webhook log entry"
                );
            }
        }
        None
    }

    /// The newest `count` entries, oldest first.
    pub fn recent(&self, count: usize) -> Vec<WebhookLogEntry> {
        let entries = self.entries();
        let skip = entries.len().saturating_sub(count);
        entries.iter().skip(skip).cloned().collect()
    }

    /// Empties the log and returns how many entries were dropped.
    pub fn clear(&self) -> usize {
        let mut entries = self.entries();
        let cleared = entries.len();
        entries.clear();
        cleared
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}
