// src/dispatch/rest.rs
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::ProtocolStrategy;
use crate::config::SourceDefinition;
use crate::error::AggregatorError;
use crate::extract::{substitute, PathVariables};
use crate::transport::{FetchRequest, FetchResponse, HttpFetcher};

/// Disables transparent compression so the body arrives exactly as sent.
pub const ACCEPT_ENCODING_IDENTITY: (&str, &str) = ("Accept-Encoding", "identity");

pub struct RestStrategy {
    fetcher: Arc<dyn HttpFetcher>,
}

impl RestStrategy {
    pub fn new(fetcher: Arc<dyn HttpFetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl ProtocolStrategy for RestStrategy {
    fn target(&self, source: &SourceDefinition, vars: &PathVariables) -> String {
        endpoint(source, vars)
    }

    async fn fetch_document(
        &self,
        _source: &SourceDefinition,
        target: &str,
        _vars: &PathVariables,
    ) -> Result<Value, AggregatorError> {
        let (name, value) = ACCEPT_ENCODING_IDENTITY;
        let request = FetchRequest::get(target).header(name, value);
        let body = call(self.fetcher.as_ref(), request).await?;
        serde_json::from_str(&body).map_err(|e| {
            AggregatorError::RemoteCall(format!("invalid JSON body from {target}: {e}"))
        })
    }
}

pub(crate) fn endpoint(source: &SourceDefinition, vars: &PathVariables) -> String {
    source
        .url
        .as_deref()
        .map(|u| substitute(u, vars))
        .unwrap_or_default()
}

/// Invokes the fetcher and returns the validated body.
pub(crate) async fn call(
    fetcher: &dyn HttpFetcher,
    request: FetchRequest,
) -> Result<String, AggregatorError> {
    let url = request.url.clone();
    if url.is_empty() {
        return Err(AggregatorError::RemoteCall("no endpoint URL configured".into()));
    }
    let response = fetcher
        .fetch(request)
        .await
        .map_err(|e| AggregatorError::RemoteCall(format!("{e:#}")))?;
    validate_http(response, &url)
}

/// Status must be present and below 400; body must be present and non-blank.
pub fn validate_http(response: FetchResponse, target: &str) -> Result<String, AggregatorError> {
    match response.status {
        Some(status) if status < 400 => {}
        Some(status) => {
            return Err(AggregatorError::RemoteCall(format!(
                "HTTP {status} when calling {target}"
            )))
        }
        None => {
            return Err(AggregatorError::RemoteCall(format!(
                "HTTP status missing when calling {target}"
            )))
        }
    }
    match response.body {
        Some(body) if !body.trim().is_empty() => Ok(body),
        _ => Err(AggregatorError::RemoteCall(format!(
            "Empty response body from {target}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rsp(status: Option<u16>, body: Option<&str>) -> FetchResponse {
        FetchResponse {
            status,
            body: body.map(str::to_string),
        }
    }

    #[test]
    fn accepts_2xx_and_3xx_with_body() {
        assert_eq!(validate_http(rsp(Some(200), Some("{}")), "u").unwrap(), "{}");
        assert!(validate_http(rsp(Some(304), Some("x")), "u").is_ok());
    }

    #[test]
    fn rejects_error_status_missing_status_and_blank_body() {
        let e = validate_http(rsp(Some(404), Some("nope")), "http://x").unwrap_err();
        assert_eq!(e.to_string(), "HTTP 404 when calling http://x");
        assert!(validate_http(rsp(None, Some("x")), "u").is_err());
        let blank = validate_http(rsp(Some(200), Some("  \n")), "http://x").unwrap_err();
        assert_eq!(blank.to_string(), "Empty response body from http://x");
        assert!(validate_http(rsp(Some(200), None), "u").is_err());
    }
}
