// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod aggregate;
pub mod api;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod extract;
pub mod runtime;
pub mod soap;
pub mod telemetry;
pub mod transport;
pub mod xml;

// ---- Re-exports for stable public API ----
pub use crate::aggregate::{AggregatedResult, Aggregator};
pub use crate::api::router;
pub use crate::config::AppConfig;
pub use crate::error::{AggregatorError, FailureDetail};
pub use crate::extract::PathVariables;
pub use crate::runtime::AggregatorRuntime;
