// src/transport/mod.rs
//! Outbound HTTP collaborator used by REST and SOAP sources.

pub mod retry;

pub use retry::RetryPolicy;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub method: HttpMethod,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::Get,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn post(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::Post,
            headers: Vec::new(),
            body: Some(body.into()),
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Raw response as seen by the dispatcher; either part may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: Option<u16>,
    pub body: Option<String>,
}

/// Fetch contract: apply retry/backoff internally and surface only the terminal result.
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse>;
}

/// `reqwest`-backed fetcher. Retries transport errors and 5xx responses.
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: Client,
    retry: RetryPolicy,
}

impl ReqwestFetcher {
    pub fn new(timeout: Duration, retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("api-aggregator/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .timeout(timeout)
            .build()
            .context("building reqwest client")?;
        Ok(Self { client, retry })
    }

    async fn send_once(&self, request: &FetchRequest) -> Result<FetchResponse> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let rsp = builder
            .send()
            .await
            .with_context(|| format!("request to {} failed", request.url))?;
        let status = rsp.status();
        if status.is_server_error() {
            bail!("HTTP {} when calling {}", status.as_u16(), request.url);
        }
        let body = rsp
            .text()
            .await
            .with_context(|| format!("reading body from {}", request.url))?;
        Ok(FetchResponse {
            status: Some(status.as_u16()),
            body: Some(body),
        })
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
        let req = &request;
        self.retry
            .run(&request.url, move || self.send_once(req))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_is_case_insensitive() {
        let r = FetchRequest::get("http://x").header("Accept-Encoding", "identity");
        assert_eq!(r.header_value("accept-encoding"), Some("identity"));
        assert_eq!(r.header_value("content-type"), None);
    }

    #[test]
    fn post_carries_body() {
        let r = FetchRequest::post("http://x", "<a/>");
        assert_eq!(r.method, HttpMethod::Post);
        assert_eq!(r.body.as_deref(), Some("<a/>"));
    }
}
