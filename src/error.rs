//! Error taxonomy shared by the dispatcher, the orchestrator and the HTTP boundary.
//!
//! Per-source failures never cross the dispatch boundary as errors: they are folded into
//! a [`FailureDetail`] and only [`AggregatorError::AggregationFailed`] (or
//! [`AggregatorError::UnknownGroup`]) leaves `Aggregator::aggregate`.

use serde::Serialize;
use thiserror::Error;

use crate::extract::PathError;

#[derive(Debug, Error)]
pub enum AggregatorError {
    #[error(transparent)]
    PathResolution(#[from] PathError),

    /// Bad status, blank body, undecodable body or transport failure after retries.
    #[error("{0}")]
    RemoteCall(String),

    #[error("no SOAP request template registered for action '{0}'")]
    UnknownSoapAction(String),

    /// Query failure, pool creation failure or an empty row-set.
    #[error("{0}")]
    SqlExecution(String),

    /// A source definition that cannot be dispatched (e.g. DB source without a connection).
    #[error("invalid source definition '{source_name}': {reason}")]
    InvalidSource { source_name: String, reason: String },

    #[error("API group not found: {0}")]
    UnknownGroup(String),

    #[error("One or more APIs failed")]
    AggregationFailed(Vec<FailureDetail>),
}

impl AggregatorError {
    /// Failures carried by an aggregate error; empty for every other variant.
    pub fn failures(&self) -> &[FailureDetail] {
        match self {
            AggregatorError::AggregationFailed(f) => f,
            _ => &[],
        }
    }
}

/// Why one source failed during one aggregate call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureDetail {
    pub source_name: String,
    /// Substituted URL for REST/SOAP, connection URL for DB sources.
    pub target: String,
    pub reason: String,
}

/// Boundary payload rendered when an aggregation fails.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationFailurePayload {
    pub message: &'static str,
    pub failed_apis: Vec<FailedApi>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedApi {
    pub key: String,
    pub url: String,
    pub reason: String,
}

pub const AGGREGATION_FAILED_MESSAGE: &str = "API aggregation failed";

impl AggregationFailurePayload {
    pub fn from_failures(failures: &[FailureDetail]) -> Self {
        Self {
            message: AGGREGATION_FAILED_MESSAGE,
            failed_apis: failures
                .iter()
                .map(|f| FailedApi {
                    key: f.source_name.clone(),
                    url: f.target.clone(),
                    reason: f.reason.clone(),
                })
                .collect(),
        }
    }
}
