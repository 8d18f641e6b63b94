//! Streaming completion client.

use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use reqwest::Client;
use std::collections::VecDeque;
use std::fmt::Display;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, error};

use crate::error::{Error, Result};
use crate::stream::RawEvent;

use super::sse::{SseDecoder, SseFrame};
use super::types::CompletionRequest;

const OPERATION: &str = "stream completion";

/// Provider events in emission order. An `Err` item ends the stream.
pub type RawEventStream = Pin<Box<dyn Stream<Item = Result<RawEvent>> + Send>>;

/// A client able to open one streaming completion.
///
/// Implementations never retry: a partially consumed stream cannot be
/// replayed without duplicating output.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn stream(&self, request: CompletionRequest) -> Result<RawEventStream>;
}

/// Configuration for the completion client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API key
    pub api_key: String,
    /// Base URL override
    pub base_url: Option<String>,
    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
            connect_timeout_secs: 30,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }
}

/// Build the shared HTTP client.
///
/// `request_timeout` bounds whole requests and must stay unset for streaming
/// bodies, whose deadline is enforced by the dispatcher.
pub(crate) fn build_http_client(
    connect_timeout: Duration,
    request_timeout: Option<Duration>,
) -> Result<Client> {
    let builder = || {
        let builder = Client::builder().connect_timeout(connect_timeout);
        match request_timeout {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        }
    };

    // Some sandboxed macOS environments can panic during proxy auto-detection
    // in reqwest's default client builder. Fall back to no-proxy in that case.
    match catch_unwind(AssertUnwindSafe(|| builder().build())) {
        Ok(Ok(client)) => Ok(client),
        Ok(Err(_)) | Err(_) => builder()
            .no_proxy()
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e))),
    }
}

/// Anthropic Messages API client.
pub struct AnthropicClient {
    config: ClientConfig,
    http: Client,
}

impl AnthropicClient {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.anthropic.com";
    const API_VERSION: &'static str = "2023-06-01";

    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = build_http_client(Duration::from_secs(config.connect_timeout_secs), None)?;

        Ok(Self { config, http })
    }

    fn base_url(&self) -> &str {
        self.config
            .base_url
            .as_deref()
            .unwrap_or(Self::DEFAULT_BASE_URL)
            .trim_end_matches('/')
    }
}

#[async_trait]
impl CompletionClient for AnthropicClient {
    async fn stream(&self, request: CompletionRequest) -> Result<RawEventStream> {
        let url = format!("{}/v1/messages", self.base_url());

        let response = self
            .http
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", Self::API_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Anthropic request failed");
                Error::transport(OPERATION, format!("Anthropic request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, body = %body, "Anthropic API error");
            return Err(Error::transport(
                OPERATION,
                format!("Anthropic API error {}: {}", status, body),
            ));
        }

        Ok(events_from_body(response.bytes_stream()))
    }
}

/// Decode one SSE frame. `Ok(None)` frames carry nothing for the consumer.
pub(crate) fn decode_frame(frame: &SseFrame) -> Result<Option<RawEvent>> {
    if frame.data.trim().is_empty() {
        return Ok(None);
    }

    match serde_json::from_str::<RawEvent>(&frame.data)? {
        RawEvent::Ping => Ok(None),
        RawEvent::Error { error: provider } => {
            error!(kind = %provider.kind, message = %provider.message, "Provider stream error");
            Err(Error::transport(
                OPERATION,
                format!("{}: {}", provider.kind, provider.message),
            ))
        }
        event => Ok(Some(event)),
    }
}

struct BodyState<S> {
    body: Pin<Box<S>>,
    decoder: SseDecoder,
    pending: VecDeque<Result<RawEvent>>,
    finished: bool,
}

impl<S> BodyState<S> {
    fn enqueue(&mut self, frame: SseFrame) {
        debug!(event = ?frame.event, bytes = frame.data.len(), "SSE frame");
        if let Some(item) = decode_frame(&frame).transpose() {
            self.pending.push_back(item);
        }
    }
}

/// Turn a chunked SSE body into raw provider events.
pub(crate) fn events_from_body<S, B, E>(body: S) -> RawEventStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = BodyState {
        body: Box::pin(body),
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    let events = stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                if item.is_err() {
                    state.finished = true;
                    state.pending.clear();
                }
                return Some((item, state));
            }
            if state.finished {
                return None;
            }

            match state.body.next().await {
                Some(Ok(chunk)) => {
                    for frame in state.decoder.push(chunk.as_ref()) {
                        state.enqueue(frame);
                    }
                }
                Some(Err(e)) => {
                    error!(error = %e, "Stream body failed");
                    state
                        .pending
                        .push_back(Err(Error::transport(OPERATION, e.to_string())));
                }
                None => {
                    state.finished = true;
                    if let Some(frame) = state.decoder.finish() {
                        state.enqueue(frame);
                    }
                }
            }
        }
    });

    Box::pin(events)
}
