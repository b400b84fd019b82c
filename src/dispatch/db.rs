// src/dispatch/db.rs
use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;
use std::sync::Arc;

use super::ProtocolStrategy;
use crate::config::SourceDefinition;
use crate::db::ConnectionCache;
use crate::error::AggregatorError;
use crate::extract::{substitute, PathVariables};

pub struct DbStrategy {
    connections: Arc<ConnectionCache>,
}

impl DbStrategy {
    pub fn new(connections: Arc<ConnectionCache>) -> Self {
        Self { connections }
    }
}

#[async_trait]
impl ProtocolStrategy for DbStrategy {
    fn target(&self, source: &SourceDefinition, _vars: &PathVariables) -> String {
        source
            .connection
            .as_ref()
            .map(|c| redact(&c.url))
            .unwrap_or_default()
    }

    async fn fetch_document(
        &self,
        source: &SourceDefinition,
        target: &str,
        vars: &PathVariables,
    ) -> Result<Value, AggregatorError> {
        let invalid = |reason: &str| AggregatorError::InvalidSource {
            source_name: source.name.clone(),
            reason: reason.to_string(),
        };
        let connection = source
            .connection
            .as_ref()
            .ok_or_else(|| invalid("DB source has no connection"))?;
        let statement = source
            .query
            .as_deref()
            .map(|q| substitute(q, vars))
            .ok_or_else(|| invalid("DB source has no query"))?;

        let session = self
            .connections
            .acquire(connection)
            .await
            .map_err(|e| AggregatorError::SqlExecution(format!("{e:#}")))?;
        let rows = session
            .execute(&statement)
            .await
            .map_err(|e| AggregatorError::SqlExecution(format!("{e:#}")))?;

        if rows.is_empty() {
            return Err(AggregatorError::SqlExecution(format!(
                "Empty response from database: {target}"
            )));
        }
        Ok(Value::Array(rows.into_iter().map(Value::Object).collect()))
    }
}

/// Drops an inline password from a connection URL.
fn redact(raw: &str) -> String {
    let (prefix, rest) = match raw.strip_prefix("jdbc:") {
        Some(rest) => ("jdbc:", rest),
        None => ("", raw),
    };
    match Url::parse(rest) {
        Ok(mut url) if url.password().is_some() => {
            if url.set_password(None).is_ok() {
                format!("{prefix}{url}")
            } else {
                raw.to_string()
            }
        }
        _ => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_removes_inline_password_only() {
        assert_eq!(redact("postgres://me:secret@h/db"), "postgres://me@h/db");
        assert_eq!(redact("jdbc:postgresql://h:5432/db"), "jdbc:postgresql://h:5432/db");
        assert_eq!(redact("sqlite::memory:"), "sqlite::memory:");
    }
}
