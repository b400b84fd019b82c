// src/aggregate.rs
//! Aggregation orchestrator: fan out one dispatch per source, join all, merge in order.

use metrics::counter;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::config::GroupRegistry;
use crate::dispatch::{CallOutcome, Dispatcher};
use crate::error::{AggregatorError, FailureDetail};
use crate::extract::PathVariables;

/// Source name → extracted value, in declared source order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AggregatedResult(Map<String, Value>);

impl AggregatedResult {
    pub fn get(&self, source: &str) -> Option<&Value> {
        self.0.get(source)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

pub struct Aggregator {
    groups: Arc<GroupRegistry>,
    dispatcher: Arc<Dispatcher>,
    workers: Arc<Semaphore>,
}

impl Aggregator {
    /// `pool_size` bounds how many sources run at once, shared by all concurrent calls.
    pub fn new(groups: Arc<GroupRegistry>, dispatcher: Arc<Dispatcher>, pool_size: usize) -> Self {
        Self {
            groups,
            dispatcher,
            workers: Arc::new(Semaphore::new(pool_size.max(1))),
        }
    }

    /// Runs every source of `group_name` and merges the results.
    ///
    /// Waits for every source even after one fails; any failure turns the whole call
    /// into `AggregationFailed` listing each failed source in declared order.
    pub async fn aggregate(
        &self,
        group_name: &str,
        vars: &PathVariables,
    ) -> Result<AggregatedResult, AggregatorError> {
        let group = self
            .groups
            .get(group_name)
            .ok_or_else(|| AggregatorError::UnknownGroup(group_name.to_string()))?;
        counter!("aggregate_calls_total").increment(1);

        let vars = Arc::new(vars.clone());
        let handles: Vec<_> = group
            .sources
            .iter()
            .map(|source| {
                let source = Arc::clone(source);
                let vars = Arc::clone(&vars);
                let dispatcher = Arc::clone(&self.dispatcher);
                let workers = Arc::clone(&self.workers);
                tokio::spawn(async move {
                    // The semaphore is never closed, so acquire only fails if that changes.
                    let _permit = workers.acquire_owned().await.ok();
                    dispatcher.dispatch(&source, &vars).await
                })
            })
            .collect();

        // Join in declared order; completion order does not matter.
        let mut outcomes = Vec::with_capacity(handles.len());
        for (source, handle) in group.sources.iter().zip(handles) {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(join_err) => {
                    let target = self.dispatcher.target(source, &vars);
                    CallOutcome {
                        source_name: source.name.clone(),
                        target: target.clone(),
                        result: Err(FailureDetail {
                            source_name: source.name.clone(),
                            target,
                            reason: format!("dispatch task aborted: {join_err}"),
                        }),
                    }
                }
            };
            outcomes.push(outcome);
        }

        merge(group_name, outcomes)
    }
}

fn merge(group: &str, outcomes: Vec<CallOutcome>) -> Result<AggregatedResult, AggregatorError> {
    let total = outcomes.len();
    let mut merged = Map::with_capacity(total);
    let mut failures = Vec::new();
    for outcome in outcomes {
        match outcome.result {
            Ok(value) => {
                merged.insert(outcome.source_name, value);
            }
            Err(failure) => failures.push(failure),
        }
    }

    if failures.is_empty() {
        info!(target: "aggregate", group, sources = total, "aggregation complete");
        return Ok(AggregatedResult(merged));
    }

    counter!("aggregate_failures_total").increment(1);
    warn!(
        target: "aggregate",
        group,
        failed = failures.len(),
        sources = total,
        "aggregation failed"
    );
    Err(AggregatorError::AggregationFailed(failures))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ok(name: &str, v: Value) -> CallOutcome {
        CallOutcome::new(name, "t", Ok(v))
    }

    fn failed(name: &str) -> CallOutcome {
        CallOutcome::new(name, "t", Err(AggregatorError::RemoteCall("down".into())))
    }

    #[test]
    fn merge_keeps_outcome_order() {
        let r = merge("g", vec![ok("b", json!(1)), ok("a", json!(2))]).unwrap();
        assert_eq!(r.keys().collect::<Vec<_>>(), ["b", "a"]);
        assert_eq!(serde_json::to_string(&r).unwrap(), r#"{"b":1,"a":2}"#);
    }

    #[test]
    fn merge_drops_successes_when_anything_failed() {
        let err = merge("g", vec![failed("x"), ok("a", json!(2)), failed("y")]).unwrap_err();
        let names: Vec<&str> = err.failures().iter().map(|f| f.source_name.as_str()).collect();
        assert_eq!(names, ["x", "y"]);
    }
}
