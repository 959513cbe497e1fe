//! Shared plumbing for the mock third-party services used in integration tests.
//!
//! Each mock service (auth gate, calendar simulator, CRM webhook receiver) is its own
//! binary crate. This crate holds everything they have in common: the error type and its
//! HTTP rendering, log setup, failure/latency injection, and the server bootstrap.

pub mod config;
pub mod endpoints;
pub mod error;
pub mod fault;
pub mod observability;
pub mod server;
pub mod utils;

pub use error::{Error, ErrorDetails};
pub use fault::{FaultInjector, LatencyRange, RandomSource};
