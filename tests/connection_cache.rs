// tests/connection_cache.rs
//
// Pools are keyed by (url, username); the password is not part of the identity.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use serde_json::json;

use api_aggregator::config::SourceDefinition;
use common::{pg_target, registry, runtime, vars, FakeFetcher, FakeSessions};

#[tokio::test]
async fn same_url_and_user_share_one_pool_across_sources_and_calls() {
    let sessions = Arc::new(
        FakeSessions::new()
            .with_open_delay(30)
            .rows("select 1 as a", json!([{"a": 1}]))
            .rows("select 2 as b", json!([{"b": 2}])),
    );
    let groups = registry(vec![(
        "g",
        vec![
            SourceDefinition::db("first", pg_target("shop", "old-secret"), "select 1 as a"),
            SourceDefinition::db("second", pg_target("shop", "new-secret"), "select 2 as b"),
        ],
    )]);
    let rt = runtime(groups, Arc::new(FakeFetcher::new()), sessions.clone(), 10);

    let out = rt.aggregator.aggregate("g", &vars(&[])).await.unwrap();
    assert_eq!(out.get("first").unwrap(), &json!([{"a": 1}]));
    assert_eq!(out.get("second").unwrap(), &json!([{"b": 2}]));
    assert_eq!(sessions.open_count(), 1);

    rt.aggregator.aggregate("g", &vars(&[])).await.unwrap();
    assert_eq!(sessions.open_count(), 1);
    assert_eq!(rt.connections.len(), 1);
}

#[tokio::test]
async fn different_user_gets_a_separate_pool() {
    let sessions = Arc::new(FakeSessions::new().rows("select 1 as a", json!([{"a": 1}])));
    let groups = registry(vec![(
        "g",
        vec![
            SourceDefinition::db("reader", pg_target("reader", "pw"), "select 1 as a"),
            SourceDefinition::db("writer", pg_target("writer", "pw"), "select 1 as a"),
        ],
    )]);
    let rt = runtime(groups, Arc::new(FakeFetcher::new()), sessions.clone(), 10);

    rt.aggregator.aggregate("g", &vars(&[])).await.unwrap();
    assert_eq!(sessions.open_count(), 2);
    assert_eq!(rt.connections.len(), 2);
}

#[tokio::test]
async fn shutdown_closes_every_open_pool() {
    let sessions = Arc::new(FakeSessions::new().rows("select 1 as a", json!([{"a": 1}])));
    let groups = registry(vec![(
        "g",
        vec![
            SourceDefinition::db("a", pg_target("a", "pw"), "select 1 as a"),
            SourceDefinition::db("b", pg_target("b", "pw"), "select 1 as a"),
        ],
    )]);
    let rt = runtime(groups, Arc::new(FakeFetcher::new()), sessions.clone(), 10);

    rt.aggregator.aggregate("g", &vars(&[])).await.unwrap();
    rt.shutdown().await;
    assert_eq!(sessions.closed.load(Ordering::SeqCst), 2);
    assert!(rt.connections.is_empty());
}
