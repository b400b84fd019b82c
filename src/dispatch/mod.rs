// src/dispatch/mod.rs
//! Per-source dispatch: protocol strategy selection, fetch, validation and shaping.
//!
//! `Dispatcher::dispatch` never fails. Whatever goes wrong for one source ends up in
//! that source's [`CallOutcome`].

pub mod db;
pub mod rest;
pub mod soap;

pub use db::DbStrategy;
pub use rest::RestStrategy;
pub use soap::SoapStrategy;

use async_trait::async_trait;
use metrics::{counter, histogram};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::config::{Protocol, SourceDefinition};
use crate::db::ConnectionCache;
use crate::error::{AggregatorError, FailureDetail};
use crate::extract::{self, PathVariables};
use crate::soap::SoapTemplates;
use crate::transport::HttpFetcher;

/// Result of dispatching one source.
#[derive(Debug, Clone, PartialEq)]
pub struct CallOutcome {
    pub source_name: String,
    pub target: String,
    pub result: Result<Value, FailureDetail>,
}

impl CallOutcome {
    pub fn new(
        source_name: impl Into<String>,
        target: impl Into<String>,
        result: Result<Value, AggregatorError>,
    ) -> Self {
        let source_name = source_name.into();
        let target = target.into();
        let result = result.map_err(|e| FailureDetail {
            source_name: source_name.clone(),
            target: target.clone(),
            reason: e.to_string(),
        });
        Self {
            source_name,
            target,
            result,
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// One protocol's way of turning a source definition into a raw document.
#[async_trait]
pub trait ProtocolStrategy: Send + Sync {
    /// Diagnostic target reported with the outcome (never contains credentials).
    fn target(&self, source: &SourceDefinition, vars: &PathVariables) -> String;

    /// Fetches and validates the raw document, already in tree form.
    async fn fetch_document(
        &self,
        source: &SourceDefinition,
        target: &str,
        vars: &PathVariables,
    ) -> Result<Value, AggregatorError>;

    async fn execute(&self, source: &SourceDefinition, vars: &PathVariables) -> CallOutcome {
        let target = self.target(source, vars);
        let result = match self.fetch_document(source, &target, vars).await {
            Ok(doc) => extract::shape(&doc, &source.path, &source.fields).map_err(Into::into),
            Err(e) => Err(e),
        };
        CallOutcome::new(source.name.clone(), target, result)
    }
}

pub struct Dispatcher {
    rest: RestStrategy,
    soap: SoapStrategy,
    db: DbStrategy,
}

impl Dispatcher {
    pub fn new(
        fetcher: Arc<dyn HttpFetcher>,
        templates: Arc<SoapTemplates>,
        connections: Arc<ConnectionCache>,
    ) -> Self {
        Self {
            rest: RestStrategy::new(fetcher.clone()),
            soap: SoapStrategy::new(fetcher, templates),
            db: DbStrategy::new(connections),
        }
    }

    fn strategy(&self, protocol: Protocol) -> &dyn ProtocolStrategy {
        match protocol {
            Protocol::Rest => &self.rest,
            Protocol::Soap => &self.soap,
            Protocol::Db => &self.db,
        }
    }

    /// Diagnostic target the strategy for `source` would report.
    pub fn target(&self, source: &SourceDefinition, vars: &PathVariables) -> String {
        self.strategy(source.protocol).target(source, vars)
    }

    pub async fn dispatch(&self, source: &SourceDefinition, vars: &PathVariables) -> CallOutcome {
        let protocol = source.protocol.as_str();
        let t0 = Instant::now();
        info!(target: "dispatch", source = %source.name, protocol, "call source");

        let outcome = self.strategy(source.protocol).execute(source, vars).await;

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("source_dispatch_ms", "protocol" => protocol).record(ms);
        match &outcome.result {
            Ok(_) => info!(
                target: "dispatch",
                source = %source.name,
                target_url = %outcome.target,
                elapsed_ms = ms as u64,
                "source done"
            ),
            Err(f) => {
                counter!("source_failures_total", "protocol" => protocol).increment(1);
                warn!(
                    target: "dispatch",
                    source = %source.name,
                    target_url = %outcome.target,
                    reason = %f.reason,
                    "source failed"
                );
            }
        }
        outcome
    }
}
