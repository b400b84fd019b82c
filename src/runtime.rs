// src/runtime.rs
use std::sync::Arc;
use tracing::info;

use crate::aggregate::Aggregator;
use crate::config::{AppConfig, GroupRegistry};
use crate::db::{AnyPoolFactory, ConnectionCache, SessionFactory};
use crate::dispatch::Dispatcher;
use crate::soap::SoapTemplates;
use crate::transport::{HttpFetcher, ReqwestFetcher};

/// Wired aggregator plus the resources that need explicit teardown.
pub struct AggregatorRuntime {
    pub aggregator: Arc<Aggregator>,
    pub connections: Arc<ConnectionCache>,
}

impl AggregatorRuntime {
    /// Production wiring: reqwest transport and sqlx pools, both with the configured retry.
    pub fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        let retry = cfg.fetch.retry_policy();
        let fetcher = Arc::new(ReqwestFetcher::new(cfg.fetch.timeout(), retry)?);
        let sessions = Arc::new(AnyPoolFactory::new(cfg.database.clone(), retry));
        let templates = SoapTemplates::with_overrides(&cfg.soap_actions);

        info!(
            groups = ?cfg.groups.names(),
            pool_size = cfg.executor.pool_size,
            soap_actions = templates.len(),
            max_retries = retry.max_retries,
            "aggregator configured"
        );
        Ok(Self::from_parts(
            cfg.groups.clone(),
            fetcher,
            sessions,
            templates,
            cfg.executor.pool_size,
        ))
    }

    /// Wiring with caller-supplied collaborators.
    pub fn from_parts(
        groups: GroupRegistry,
        fetcher: Arc<dyn HttpFetcher>,
        sessions: Arc<dyn SessionFactory>,
        templates: SoapTemplates,
        pool_size: usize,
    ) -> Self {
        let connections = Arc::new(ConnectionCache::new(sessions));
        let dispatcher = Arc::new(Dispatcher::new(
            fetcher,
            Arc::new(templates),
            connections.clone(),
        ));
        let aggregator = Arc::new(Aggregator::new(Arc::new(groups), dispatcher, pool_size));
        Self {
            aggregator,
            connections,
        }
    }

    pub async fn shutdown(&self) {
        self.connections.release_all().await;
    }
}
