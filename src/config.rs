//! Environment-provided configuration.

use std::sync::Arc;
use std::time::Duration;

use crate::dispatch::DispatchConfig;
use crate::error::{Error, Result};
use crate::llm::{AnthropicClient, ClientConfig, ModelSelector, ModelSpec};
use crate::retry::{RetryPolicy, DEFAULT_DELAYS_SECS, DEFAULT_MAX_RETRIES};
use crate::vector::{EmbeddingIndexClient, UpstashConfig, UpstashIndex};

pub const ENV_API_KEY: &str = "ANTHROPIC_API_KEY";
pub const ENV_BASE_URL: &str = "ANTHROPIC_BASE_URL";
pub const ENV_FAST_MODEL: &str = "TUTOR_FAST_MODEL";
pub const ENV_DEEP_MODEL: &str = "TUTOR_DEEP_MODEL";
pub const ENV_REQUEST_TIMEOUT: &str = "TUTOR_REQUEST_TIMEOUT_SECS";
pub const ENV_VECTOR_URL: &str = "UPSTASH_VECTOR_REST_URL";
pub const ENV_VECTOR_TOKEN: &str = "UPSTASH_VECTOR_REST_TOKEN";
pub const ENV_RETRY_MAX: &str = "TUTOR_RETRY_MAX";
pub const ENV_RETRY_DELAYS: &str = "TUTOR_RETRY_DELAYS_SECS";

/// Process-wide configuration, read once at start-up.
#[derive(Debug, Clone)]
pub struct TutorConfig {
    pub client: ClientConfig,
    pub fast_model: ModelSpec,
    pub deep_model: ModelSpec,
    pub request_timeout: Option<Duration>,
    pub vector: Option<UpstashConfig>,
    pub retry: RetryPolicy,
}

impl TutorConfig {
    /// Create configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = var(ENV_API_KEY)
            .ok_or_else(|| Error::Config(format!("{} is not set", ENV_API_KEY)))?;
        let mut client = ClientConfig::new(api_key);
        if let Some(url) = var(ENV_BASE_URL) {
            client = client.with_base_url(url);
        }

        let mut fast_model = ModelSpec::claude_haiku();
        if let Some(id) = var(ENV_FAST_MODEL) {
            fast_model = fast_model.with_id(id);
        }
        let mut deep_model = ModelSpec::claude_sonnet();
        if let Some(id) = var(ENV_DEEP_MODEL) {
            deep_model = deep_model.with_id(id);
        }

        let request_timeout = var(ENV_REQUEST_TIMEOUT)
            .map(|v| parse_number::<u64>(ENV_REQUEST_TIMEOUT, &v))
            .transpose()?
            .map(Duration::from_secs);

        let vector = match (var(ENV_VECTOR_URL), var(ENV_VECTOR_TOKEN)) {
            (Some(url), Some(token)) => Some(UpstashConfig::new(url, token)),
            (None, None) => None,
            _ => {
                return Err(Error::Config(format!(
                    "{} and {} must be set together",
                    ENV_VECTOR_URL, ENV_VECTOR_TOKEN
                )))
            }
        };

        let max_retries = var(ENV_RETRY_MAX)
            .map(|v| parse_number::<u32>(ENV_RETRY_MAX, &v))
            .transpose()?
            .unwrap_or(DEFAULT_MAX_RETRIES);
        let delays = match var(ENV_RETRY_DELAYS) {
            Some(v) => parse_delays(&v)?,
            None => DEFAULT_DELAYS_SECS
                .iter()
                .map(|s| Duration::from_secs(*s))
                .collect(),
        };

        Ok(Self {
            client,
            fast_model,
            deep_model,
            request_timeout,
            vector,
            retry: RetryPolicy::new(max_retries, delays),
        })
    }

    pub fn model_selector(&self) -> ModelSelector {
        ModelSelector::new(self.fast_model.clone(), self.deep_model.clone())
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig::new(self.model_selector()).with_request_timeout(self.request_timeout)
    }

    pub fn completion_client(&self) -> Result<Arc<AnthropicClient>> {
        AnthropicClient::new(self.client.clone()).map(Arc::new)
    }

    /// The embedding client, when a vector index is configured.
    pub fn embedding_client(&self) -> Result<Option<EmbeddingIndexClient>> {
        let Some(vector) = &self.vector else {
            return Ok(None);
        };
        let index = UpstashIndex::new(vector.clone())?;
        Ok(Some(
            EmbeddingIndexClient::new(Arc::new(index)).with_policy(self.retry.clone()),
        ))
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::Config(format!("{} must be a non-negative integer, got '{}'", key, value)))
}

/// Parse a comma-separated list of delays in seconds.
pub fn parse_delays(value: &str) -> Result<Vec<Duration>> {
    let delays = value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| parse_number::<u64>(ENV_RETRY_DELAYS, s).map(Duration::from_secs))
        .collect::<Result<Vec<_>>>()?;

    if delays.is_empty() {
        return Err(Error::Config(format!("{} must list at least one delay", ENV_RETRY_DELAYS)));
    }
    Ok(delays)
}
