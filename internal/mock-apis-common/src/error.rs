use std::sync::Arc;

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use thiserror::Error;

use crate::utils::format_timestamp;

/// Seconds clients are told to wait after an injected `503`.
pub const RETRY_AFTER_SECS: u64 = 5;

#[derive(Clone, Debug, Error)]
#[cfg_attr(test, derive(PartialEq))]
#[error(transparent)]
// As long as the struct member is private, we force people to use the `new` method and log the error.
pub struct Error(Arc<ErrorDetails>);

impl Error {
    pub fn new(details: ErrorDetails) -> Self {
        details.log();
        Error(Arc::new(details))
    }

    pub fn status_code(&self) -> StatusCode {
        self.0.status_code()
    }

    pub fn get_details(&self) -> &ErrorDetails {
        &self.0
    }

    pub fn log(&self) {
        self.0.log();
    }
}

impl From<ErrorDetails> for Error {
    fn from(details: ErrorDetails) -> Self {
        Error::new(details)
    }
}

#[derive(Debug, Error)]
#[cfg_attr(test, derive(PartialEq))]
pub enum ErrorDetails {
    MissingApiKey,
    InvalidApiKey,
    RateLimited {
        limit: u32,
        retry_after: u64,
        reset: DateTime<Utc>,
    },
    ApiKeyNotFound {
        key_id: String,
    },
    SlotConflict {
        coach_id: String,
        start_time: Option<String>,
        end_time: Option<String>,
    },
    ServiceUnavailable {
        retry_after: u64,
    },
    MissingIdempotencyKey,
    ContactNotFound {
        contact_id: String,
    },
    InvalidRequest {
        message: String,
    },
    RouteNotFound {
        path: String,
        method: String,
    },
    Config {
        message: String,
    },
    Observability {
        message: String,
    },
    Server {
        message: String,
    },
}

impl ErrorDetails {
    /// Defines the error level for logging this error
    fn level(&self) -> tracing::Level {
        match self {
            ErrorDetails::MissingApiKey => tracing::Level::WARN,
            ErrorDetails::InvalidApiKey => tracing::Level::WARN,
            ErrorDetails::RateLimited { .. } => tracing::Level::WARN,
            ErrorDetails::ApiKeyNotFound { .. } => tracing::Level::WARN,
            ErrorDetails::SlotConflict { .. } => tracing::Level::INFO,
            ErrorDetails::ServiceUnavailable { .. } => tracing::Level::INFO,
            ErrorDetails::MissingIdempotencyKey => tracing::Level::WARN,
            ErrorDetails::ContactNotFound { .. } => tracing::Level::INFO,
            ErrorDetails::InvalidRequest { .. } => tracing::Level::WARN,
            ErrorDetails::RouteNotFound { .. } => tracing::Level::WARN,
            ErrorDetails::Config { .. } => tracing::Level::ERROR,
            ErrorDetails::Observability { .. } => tracing::Level::ERROR,
            ErrorDetails::Server { .. } => tracing::Level::ERROR,
        }
    }

    /// Defines the HTTP status code for responses involving this error
    fn status_code(&self) -> StatusCode {
        match self {
            ErrorDetails::MissingApiKey => StatusCode::BAD_REQUEST,
            ErrorDetails::InvalidApiKey => StatusCode::UNAUTHORIZED,
            ErrorDetails::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ErrorDetails::ApiKeyNotFound { .. } => StatusCode::NOT_FOUND,
            ErrorDetails::SlotConflict { .. } => StatusCode::CONFLICT,
            ErrorDetails::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ErrorDetails::MissingIdempotencyKey => StatusCode::BAD_REQUEST,
            ErrorDetails::ContactNotFound { .. } => StatusCode::NOT_FOUND,
            ErrorDetails::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            ErrorDetails::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            ErrorDetails::Config { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorDetails::Observability { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorDetails::Server { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Seconds a client should wait before retrying, if the condition is transient.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            ErrorDetails::RateLimited { retry_after, .. }
            | ErrorDetails::ServiceUnavailable { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    /// The JSON body sent to the client. Always carries an `error` message; some
    /// conditions add the fields clients need to react to them.
    pub fn response_body(&self) -> Value {
        let mut body = json!({ "error": self.to_string() });
        match self {
            ErrorDetails::MissingApiKey | ErrorDetails::InvalidApiKey => {
                body["valid"] = json!(false);
            }
            ErrorDetails::RateLimited {
                limit,
                retry_after,
                reset,
            } => {
                body["valid"] = json!(false);
                body["retry_after"] = json!(retry_after);
                body["limit"] = json!(limit);
                body["remaining"] = json!(0);
                body["reset"] = json!(format_timestamp(*reset));
            }
            ErrorDetails::SlotConflict {
                coach_id,
                start_time,
                end_time,
            } => {
                body["coach_id"] = json!(coach_id);
                body["start_time"] = json!(start_time);
                body["end_time"] = json!(end_time);
            }
            ErrorDetails::ServiceUnavailable { retry_after } => {
                body["retry_after"] = json!(retry_after);
            }
            _ => {}
        }
        body
    }

    pub fn log_at_level(&self, prefix: &str, level: tracing::Level) {
        match level {
            tracing::Level::ERROR => tracing::error!("{prefix}{self}"),
            tracing::Level::WARN => tracing::warn!("{prefix}{self}"),
            tracing::Level::INFO => tracing::info!("{prefix}{self}"),
            tracing::Level::DEBUG => tracing::debug!("{prefix}{self}"),
            tracing::Level::TRACE => tracing::trace!("{prefix}{self}"),
        }
    }

    /// Log the error using the `tracing` library
    pub fn log(&self) {
        self.log_at_level("", self.level());
    }
}

impl std::fmt::Display for ErrorDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorDetails::MissingApiKey => write!(f, "Missing API key"),
            ErrorDetails::InvalidApiKey => write!(f, "Invalid API key"),
            ErrorDetails::RateLimited { .. } => write!(f, "Rate limit exceeded"),
            ErrorDetails::ApiKeyNotFound { .. } => write!(f, "Key not found"),
            ErrorDetails::SlotConflict { .. } => write!(f, "Slot already blocked"),
            ErrorDetails::ServiceUnavailable { .. } => {
                write!(f, "Service temporarily unavailable")
            }
            ErrorDetails::MissingIdempotencyKey => {
                write!(f, "Missing X-Idempotency-Key header")
            }
            ErrorDetails::ContactNotFound { .. } => write!(f, "Contact not found"),
            ErrorDetails::InvalidRequest { message } => write!(f, "Invalid request: {message}"),
            ErrorDetails::RouteNotFound { path, method } => {
                write!(f, "Route not found: {method} {path}")
            }
            ErrorDetails::Config { message } => write!(f, "Configuration error: {message}"),
            ErrorDetails::Observability { message } => write!(f, "{message}"),
            ErrorDetails::Server { message } => write!(f, "Server error: {message}"),
        }
    }
}

impl IntoResponse for Error {
    /// Convert the (already logged) error into an Axum response
    fn into_response(self) -> Response {
        let details = self.get_details();
        let mut response = (self.status_code(), Json(details.response_body())).into_response();
        if let Some(retry_after) = details.retry_after() {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
        }
        response
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::new(ErrorDetails::InvalidRequest {
            message: err.to_string(),
        })
    }
}
