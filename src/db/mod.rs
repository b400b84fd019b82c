// src/db/mod.rs
//! Database collaborators and the shared connection cache for DB sources.

pub mod any_pool;

pub use any_pool::AnyPoolFactory;

use anyhow::Result;
use async_trait::async_trait;
use metrics::gauge;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::config::{ConnectionKey, ConnectionTarget};

pub type Row = Map<String, Value>;

/// A pooled session for one connection target, shared by every caller with the same key.
#[async_trait]
pub trait SqlSession: Send + Sync {
    async fn execute(&self, statement: &str) -> Result<Vec<Row>>;

    async fn close(&self);
}

/// Opens sessions; called at most once per connection key while the cache holds it.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self, target: &ConnectionTarget) -> Result<Arc<dyn SqlSession>>;
}

type Slot = Arc<OnceCell<Arc<dyn SqlSession>>>;

/// Keyed by `(url, username)`. Concurrent first access for one key creates the session
/// once; a failed creation leaves the slot empty so the next caller tries again.
pub struct ConnectionCache {
    factory: Arc<dyn SessionFactory>,
    slots: Mutex<HashMap<ConnectionKey, Slot>>,
}

impl ConnectionCache {
    pub fn new(factory: Arc<dyn SessionFactory>) -> Self {
        Self {
            factory,
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<ConnectionKey, Slot>> {
        match self.slots.lock() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        }
    }

    pub async fn acquire(&self, target: &ConnectionTarget) -> Result<Arc<dyn SqlSession>> {
        let key = target.key();
        let slot = self.slots().entry(key.clone()).or_default().clone();

        let session = slot
            .get_or_try_init(|| async {
                debug!(target: "db", url = %key.url, username = %key.username, "opening pool");
                let s = self.factory.open(target).await?;
                gauge!("db_pools_open").increment(1.0);
                Ok::<_, anyhow::Error>(s)
            })
            .await?;
        Ok(Arc::clone(session))
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.slots()
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Closes and forgets every cached session. Call once at shutdown, with no calls in flight.
    pub async fn release_all(&self) {
        let drained: Vec<(ConnectionKey, Slot)> = self.slots().drain().collect();
        let mut closed = 0usize;
        for (key, slot) in drained {
            if let Some(session) = slot.get() {
                session.close().await;
                gauge!("db_pools_open").decrement(1.0);
                closed += 1;
                debug!(target: "db", %key, "pool closed");
            }
        }
        info!(target: "db", closed, "connection cache released");
    }
}
