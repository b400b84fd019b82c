// tests/common/mod.rs
//
// In-process fakes for the transport and SQL collaborators, with counters so tests can
// observe dispatch, concurrency and pool creation.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use api_aggregator::config::{ConnectionTarget, GroupRegistry, SourceDefinition, SourceGroup};
use api_aggregator::db::{Row, SessionFactory, SqlSession};
use api_aggregator::soap::SoapTemplates;
use api_aggregator::transport::{FetchRequest, FetchResponse, HttpFetcher};
use api_aggregator::AggregatorRuntime;

#[derive(Clone)]
enum Reply {
    Respond {
        status: Option<u16>,
        body: Option<String>,
        delay: Duration,
    },
    Fail {
        message: String,
        delay: Duration,
    },
}

#[derive(Default)]
pub struct FakeFetcher {
    routes: Mutex<HashMap<String, Reply>>,
    pub requests: Mutex<Vec<FetchRequest>>,
    pub calls: AtomicUsize,
    pub completed: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn route(self, url: &str, reply: Reply) -> Self {
        self.routes.lock().insert(url.to_string(), reply);
        self
    }

    pub fn json(self, url: &str, body: &str) -> Self {
        self.delayed(url, body, 0)
    }

    pub fn delayed(self, url: &str, body: &str, delay_ms: u64) -> Self {
        self.route(
            url,
            Reply::Respond {
                status: Some(200),
                body: Some(body.to_string()),
                delay: Duration::from_millis(delay_ms),
            },
        )
    }

    pub fn status(self, url: &str, status: u16, body: &str) -> Self {
        self.route(
            url,
            Reply::Respond {
                status: Some(status),
                body: Some(body.to_string()),
                delay: Duration::ZERO,
            },
        )
    }

    pub fn error(self, url: &str, message: &str) -> Self {
        self.error_after(url, message, 0)
    }

    pub fn error_after(self, url: &str, message: &str, delay_ms: u64) -> Self {
        self.route(
            url,
            Reply::Fail {
                message: message.to_string(),
                delay: Duration::from_millis(delay_ms),
            },
        )
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests_to(&self, url: &str) -> Vec<FetchRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.url == url)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl HttpFetcher for FakeFetcher {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let reply = self.routes.lock().get(&request.url).cloned();
        self.requests.lock().push(request.clone());

        let out = match reply {
            Some(Reply::Respond {
                status,
                body,
                delay,
            }) => {
                tokio::time::sleep(delay).await;
                Ok(FetchResponse { status, body })
            }
            Some(Reply::Fail { message, delay }) => {
                tokio::time::sleep(delay).await;
                Err(anyhow!(message))
            }
            None => Err(anyhow!("no route for {}", request.url)),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);
        out
    }
}

#[derive(Clone)]
enum Answer {
    Rows(Vec<Row>),
    Fail(String),
    Panic,
}

type Script = HashMap<String, Answer>;

/// Session factory whose sessions answer from a statement → rows script.
#[derive(Default)]
pub struct FakeSessions {
    script: Arc<Mutex<Script>>,
    pub opened: AtomicUsize,
    pub closed: Arc<AtomicUsize>,
    pub executed: Arc<Mutex<Vec<String>>>,
    pub open_delay_ms: u64,
}

impl FakeSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_open_delay(mut self, ms: u64) -> Self {
        self.open_delay_ms = ms;
        self
    }

    pub fn rows(self, statement: &str, rows: Value) -> Self {
        let rows = rows
            .as_array()
            .expect("rows fixture must be an array")
            .iter()
            .map(|r| r.as_object().expect("row must be an object").clone())
            .collect();
        self.script
            .lock()
            .insert(statement.to_string(), Answer::Rows(rows));
        self
    }

    pub fn fails(self, statement: &str, message: &str) -> Self {
        self.script
            .lock()
            .insert(statement.to_string(), Answer::Fail(message.to_string()));
        self
    }

    /// The session panics while executing `statement`.
    pub fn panics(self, statement: &str) -> Self {
        self.script
            .lock()
            .insert(statement.to_string(), Answer::Panic);
        self
    }

    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

struct FakeSession {
    script: Arc<Mutex<Script>>,
    closed: Arc<AtomicUsize>,
    executed: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl SqlSession for FakeSession {
    async fn execute(&self, statement: &str) -> Result<Vec<Row>> {
        self.executed.lock().push(statement.to_string());
        let entry = self.script.lock().get(statement).cloned();
        match entry {
            Some(Answer::Rows(rows)) => Ok(rows),
            Some(Answer::Fail(message)) => Err(anyhow!(message)),
            Some(Answer::Panic) => panic!("session blew up on: {statement}"),
            None => Err(anyhow!("unexpected statement: {statement}")),
        }
    }

    async fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SessionFactory for FakeSessions {
    async fn open(&self, _target: &ConnectionTarget) -> Result<Arc<dyn SqlSession>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(self.open_delay_ms)).await;
        Ok(Arc::new(FakeSession {
            script: self.script.clone(),
            closed: self.closed.clone(),
            executed: self.executed.clone(),
        }))
    }
}

pub fn pg_target(username: &str, password: &str) -> ConnectionTarget {
    ConnectionTarget {
        url: "postgres://db.internal/shop".to_string(),
        username: username.to_string(),
        password: password.to_string(),
        driver: Some("org.postgresql.Driver".to_string()),
    }
}

pub fn registry(groups: Vec<(&str, Vec<SourceDefinition>)>) -> GroupRegistry {
    let mut reg = GroupRegistry::new();
    for (name, sources) in groups {
        reg.insert(SourceGroup::new(name, sources).expect("valid test group"));
    }
    reg
}

pub fn runtime(
    groups: GroupRegistry,
    fetcher: Arc<FakeFetcher>,
    sessions: Arc<FakeSessions>,
    pool_size: usize,
) -> AggregatorRuntime {
    AggregatorRuntime::from_parts(groups, fetcher, sessions, SoapTemplates::default(), pool_size)
}

pub fn vars(pairs: &[(&str, &str)]) -> api_aggregator::PathVariables {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
