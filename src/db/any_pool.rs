// src/db/any_pool.rs
//! `sqlx` AnyPool-backed sessions. The driver (Postgres/MySQL/SQLite) follows the URL scheme.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;
use sha2::{Digest, Sha256};
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{AnyPool, Column, Row as _};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::{Row, SessionFactory, SqlSession};
use crate::config::{ConnectionTarget, DatabaseSettings};
use crate::transport::RetryPolicy;

pub struct AnyPoolFactory {
    settings: DatabaseSettings,
    retry: RetryPolicy,
}

impl AnyPoolFactory {
    pub fn new(settings: DatabaseSettings, retry: RetryPolicy) -> Self {
        sqlx::any::install_default_drivers();
        Self { settings, retry }
    }
}

#[async_trait]
impl SessionFactory for AnyPoolFactory {
    async fn open(&self, target: &ConnectionTarget) -> Result<Arc<dyn SqlSession>> {
        let url = connection_url(target);
        let label = pool_label(target);
        let s = &self.settings;
        let pool = AnyPoolOptions::new()
            .max_connections(s.max_connections)
            .min_connections(s.min_connections)
            .acquire_timeout(Duration::from_secs(s.acquire_timeout_secs))
            .idle_timeout(Some(Duration::from_secs(s.idle_timeout_secs)))
            .max_lifetime(Some(Duration::from_secs(s.max_lifetime_secs)))
            .connect(&url)
            .await
            .with_context(|| format!("connecting {label} to {}", target.url))?;

        info!(
            target: "db",
            pool = %label,
            url = %target.url,
            driver = target.driver.as_deref().unwrap_or("auto"),
            "pool created"
        );
        Ok(Arc::new(AnySession {
            pool,
            label,
            retry: self.retry,
        }))
    }
}

struct AnySession {
    pool: AnyPool,
    label: String,
    retry: RetryPolicy,
}

#[async_trait]
impl SqlSession for AnySession {
    async fn execute(&self, statement: &str) -> Result<Vec<Row>> {
        let pool = &self.pool;
        let rows: Vec<AnyRow> = self
            .retry
            .run(&self.label, move || async move {
                sqlx::query(statement)
                    .fetch_all(pool)
                    .await
                    .context("query failed")
            })
            .await?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Strips a JDBC prefix and fills in credentials when the URL carries none.
pub(crate) fn connection_url(target: &ConnectionTarget) -> String {
    let raw = target.url.strip_prefix("jdbc:").unwrap_or(&target.url);
    if target.username.is_empty() {
        return raw.to_string();
    }
    let Ok(mut url) = Url::parse(raw) else {
        return raw.to_string();
    };
    if !url.username().is_empty() || url.cannot_be_a_base() {
        return raw.to_string();
    }
    if url.set_username(&target.username).is_err() {
        return raw.to_string();
    }
    if !target.password.is_empty() && url.set_password(Some(&target.password)).is_err() {
        return raw.to_string();
    }
    url.to_string()
}

pub(crate) fn pool_label(target: &ConnectionTarget) -> String {
    let mut hasher = Sha256::new();
    hasher.update(target.key().to_string().as_bytes());
    let digest = hasher.finalize();
    let mut out = String::from("pool-");
    for b in digest.iter().take(4) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

fn row_to_json(row: &AnyRow) -> Row {
    let mut out = Row::new();
    for col in row.columns() {
        out.insert(col.name().to_string(), column_value(row, col.ordinal()));
    }
    out
}

fn column_value(row: &AnyRow, idx: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(idx) {
        return v.map(Value::Bool).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return v.map(Value::String).unwrap_or(Value::Null);
    }
    Value::Null
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(url: &str, user: &str, password: &str) -> ConnectionTarget {
        ConnectionTarget {
            url: url.into(),
            username: user.into(),
            password: password.into(),
            driver: Some("org.postgresql.Driver".into()),
        }
    }

    #[test]
    fn jdbc_prefix_is_stripped_and_credentials_applied() {
        let t = target("jdbc:postgresql://localhost:5432/shop", "shop", "pw");
        assert_eq!(connection_url(&t), "postgresql://shop:pw@localhost:5432/shop");
    }

    #[test]
    fn existing_credentials_are_kept() {
        let t = target("postgres://me:x@localhost/db", "shop", "pw");
        assert_eq!(connection_url(&t), "postgres://me:x@localhost/db");
    }

    #[test]
    fn sqlite_urls_pass_through() {
        let t = target("sqlite::memory:", "ignored", "");
        assert_eq!(connection_url(&t), "sqlite::memory:");
    }

    #[test]
    fn label_depends_on_url_and_username_only() {
        let a = target("postgres://h/db", "u", "p1");
        let b = target("postgres://h/db", "u", "p2");
        let c = target("postgres://h/db", "v", "p1");
        assert_eq!(pool_label(&a), pool_label(&b));
        assert_ne!(pool_label(&a), pool_label(&c));
        assert_eq!(pool_label(&a).len(), "pool-".len() + 8);
    }

    #[tokio::test]
    async fn sqlite_rows_become_json_objects() {
        let factory = AnyPoolFactory::new(
            DatabaseSettings {
                max_connections: 1,
                min_connections: 0,
                ..Default::default()
            },
            RetryPolicy::none(),
        );
        let session = factory
            .open(&target("sqlite::memory:", "", ""))
            .await
            .unwrap();
        let rows = session
            .execute("select 7 as id, 'alice' as name, null as note")
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], serde_json::json!(7));
        assert_eq!(rows[0]["name"], serde_json::json!("alice"));
        assert_eq!(rows[0]["note"], Value::Null);
        session.close().await;
    }
}
