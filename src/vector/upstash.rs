//! Upstash Vector REST backend.

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

use super::types::{MetadataFilter, QueryMatch, VectorQuery, VectorRecord};
use super::VectorIndex;
use crate::error::{Error, Result};
use crate::llm::build_http_client;

/// Connection settings for an Upstash Vector index.
#[derive(Debug, Clone)]
pub struct UpstashConfig {
    /// REST endpoint, e.g. `https://xyz-us1-vector.upstash.io`
    pub url: String,
    /// Bearer token
    pub token: String,
    /// Whole-request timeout in seconds
    pub timeout_secs: u64,
}

impl UpstashConfig {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            timeout_secs: 30,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

pub struct UpstashIndex {
    config: UpstashConfig,
    http: Client,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_vectors: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<String>,
}

#[derive(Debug, Serialize)]
struct DeleteByFilter {
    filter: String,
}

#[derive(Debug, Deserialize)]
struct DeleteResult {
    deleted: u64,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    result: Option<T>,
    error: Option<String>,
}

impl UpstashIndex {
    pub fn new(config: UpstashConfig) -> Result<Self> {
        let http = build_http_client(
            Duration::from_secs(10),
            Some(Duration::from_secs(config.timeout_secs)),
        )?;
        Ok(Self { config, http })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.url.trim_end_matches('/'), path)
    }

    async fn call<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned + Send,
    {
        let operation = format!("vector {}", path);
        let response = self
            .http
            .request(method, self.endpoint(path))
            .bearer_auth(&self.config.token)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                error!(path, error = %e, "Upstash request failed");
                Error::transport(&operation, format!("Upstash request failed: {}", e))
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            error!(path, error = %e, "Failed to read Upstash response");
            Error::transport(&operation, format!("Failed to read response: {}", e))
        })?;

        if !status.is_success() {
            error!(path, %status, body = %text, "Upstash API error");
            return Err(Error::transport(
                &operation,
                format!("Upstash API error {}: {}", status, text),
            ));
        }

        let envelope: Envelope<T> = serde_json::from_str(&text)?;
        match (envelope.result, envelope.error) {
            (_, Some(message)) => {
                error!(path, message = %message, "Upstash returned an error");
                Err(Error::transport(&operation, message))
            }
            (Some(result), None) => Ok(result),
            (None, None) => Err(Error::transport(&operation, "response has no result")),
        }
    }
}

#[async_trait]
impl VectorIndex for UpstashIndex {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<usize> {
        debug!(count = records.len(), "Upserting vectors");
        let _: serde_json::Value = self.call(Method::POST, "upsert", records).await?;
        Ok(records.len())
    }

    async fn query(&self, query: &VectorQuery) -> Result<Vec<QueryMatch>> {
        let request = QueryRequest {
            vector: &query.vector,
            top_k: query.top_k,
            include_metadata: query.include_metadata,
            include_vectors: query.include_vectors,
            filter: query.filter.as_ref().map(MetadataFilter::render),
        };
        self.call(Method::POST, "query", &request).await
    }

    async fn delete_ids(&self, ids: &[String]) -> Result<u64> {
        let result: DeleteResult = self.call(Method::DELETE, "delete", ids).await?;
        Ok(result.deleted)
    }

    async fn delete_where(&self, filter: &MetadataFilter) -> Result<u64> {
        let body = DeleteByFilter {
            filter: filter.render(),
        };
        let result: DeleteResult = self.call(Method::DELETE, "delete", &body).await?;
        Ok(result.deleted)
    }
}
