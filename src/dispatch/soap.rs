// src/dispatch/soap.rs
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::rest::{call, endpoint, ACCEPT_ENCODING_IDENTITY};
use super::ProtocolStrategy;
use crate::config::SourceDefinition;
use crate::error::AggregatorError;
use crate::extract::PathVariables;
use crate::soap::SoapTemplates;
use crate::transport::{FetchRequest, HttpFetcher};
use crate::xml::xml_to_value;

pub const SOAP_CONTENT_TYPE: &str = "text/xml; charset=utf-8";

pub struct SoapStrategy {
    fetcher: Arc<dyn HttpFetcher>,
    templates: Arc<SoapTemplates>,
}

impl SoapStrategy {
    pub fn new(fetcher: Arc<dyn HttpFetcher>, templates: Arc<SoapTemplates>) -> Self {
        Self { fetcher, templates }
    }
}

#[async_trait]
impl ProtocolStrategy for SoapStrategy {
    fn target(&self, source: &SourceDefinition, vars: &PathVariables) -> String {
        endpoint(source, vars)
    }

    async fn fetch_document(
        &self,
        source: &SourceDefinition,
        target: &str,
        _vars: &PathVariables,
    ) -> Result<Value, AggregatorError> {
        let action = source.soap_action.as_deref().unwrap_or_default();
        let envelope = self
            .templates
            .get(action)
            .ok_or_else(|| AggregatorError::UnknownSoapAction(action.to_string()))?;

        let (name, value) = ACCEPT_ENCODING_IDENTITY;
        let request = FetchRequest::post(target, envelope)
            .header("Content-Type", SOAP_CONTENT_TYPE)
            .header(name, value);
        let body = call(self.fetcher.as_ref(), request).await?;
        xml_to_value(&body).map_err(|e| {
            AggregatorError::RemoteCall(format!("invalid XML body from {target}: {e:#}"))
        })
    }
}
