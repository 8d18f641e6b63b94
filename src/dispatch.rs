//! Request dispatch: classify, plan, build the provider request and stream
//! the normalized response.
//!
//! Each call to [`Dispatcher::dispatch`] spawns one producer task that pulls
//! provider events, normalizes them and pushes them onto a bounded channel.
//! The returned stream is the receiving end; dropping it closes the channel,
//! which stops the producer and releases the provider connection.

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, info_span, instrument, warn, Instrument};
use uuid::Uuid;

use crate::classify::QueryClassifier;
use crate::error::{Error, Result};
use crate::llm::{
    apply_cache_markers, CompletionClient, CompletionRequest, GenerationPlan, Message, Model,
    ModelSelector, ModelSpec, PromptAssembler, RawEventStream, Role, RoutingInput,
    WebSearchTool,
};
use crate::mode::{Complexity, LearningMode, Urgency, UserLevel};
use crate::retrieval::RetrievalContext;
use crate::stream::{RawEvent, RequestTags, StreamEvent, StreamNormalizer};
use crate::thinking::{ThinkingGate, ThinkingInput};

/// Normalized events for one request. An `Err` item ends the stream.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// Everything the caller knows about one tutoring request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationContext {
    pub messages: Vec<Message>,
    #[serde(default)]
    pub system_prompt_key: Option<String>,
    #[serde(default)]
    pub thinking_requested: Option<bool>,
    #[serde(default)]
    pub learning_mode: Option<LearningMode>,
    #[serde(default)]
    pub model: Option<Model>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub user_level: Option<UserLevel>,
    #[serde(default)]
    pub complexity: Option<Complexity>,
    #[serde(default)]
    pub urgency: Option<Urgency>,
    /// Already-retrieved passages for the latest user turn
    #[serde(default)]
    pub retrieval_context: Vec<String>,
}

impl ConversationContext {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    pub fn with_learning_mode(mut self, mode: LearningMode) -> Self {
        self.learning_mode = Some(mode);
        self
    }

    pub fn with_thinking_requested(mut self, requested: bool) -> Self {
        self.thinking_requested = Some(requested);
        self
    }

    pub fn with_model(mut self, model: Model) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_complexity(mut self, complexity: Complexity) -> Self {
        self.complexity = Some(complexity);
        self
    }

    pub fn with_user_level(mut self, level: UserLevel) -> Self {
        self.user_level = Some(level);
        self
    }

    pub fn with_urgency(mut self, urgency: Urgency) -> Self {
        self.urgency = Some(urgency);
        self
    }

    pub fn with_retrieval_context(mut self, passages: Vec<String>) -> Self {
        self.retrieval_context = passages;
        self
    }

    /// Text of the most recent user message.
    pub fn latest_user_query(&self) -> Option<String> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(Message::text)
    }
}

/// Decisions taken for one request before any network call.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestPlan {
    pub mode: LearningMode,
    pub thinking: bool,
    pub generation: GenerationPlan,
    pub tags: RequestTags,
}

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub selector: ModelSelector,
    /// Deadline for the whole request, connection included
    pub request_timeout: Option<Duration>,
    pub channel_capacity: usize,
    pub web_search_max_uses: u32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self::new(ModelSelector::default())
    }
}

impl DispatchConfig {
    pub fn new(selector: ModelSelector) -> Self {
        Self {
            selector,
            request_timeout: None,
            channel_capacity: 100,
            web_search_max_uses: 3,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }
}

/// Public entry point of the tutoring pipeline.
pub struct Dispatcher {
    client: Arc<dyn CompletionClient>,
    config: DispatchConfig,
    classifier: QueryClassifier,
    gate: ThinkingGate,
    assembler: PromptAssembler,
}

impl Dispatcher {
    pub fn new(client: Arc<dyn CompletionClient>, config: DispatchConfig) -> Self {
        Self {
            client,
            config,
            classifier: QueryClassifier::new(),
            gate: ThinkingGate::new(),
            assembler: PromptAssembler::new(),
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Classify, gate and route a request.
    pub fn plan(&self, context: &ConversationContext) -> RequestPlan {
        let query = context.latest_user_query().unwrap_or_default();
        let mode = context
            .learning_mode
            .unwrap_or_else(|| self.classifier.classify(&query));

        let thinking_input = ThinkingInput::new(mode, &query).with_complexity(context.complexity);
        let thinking = self
            .gate
            .resolve(&thinking_input, context.thinking_requested);

        let routing = RoutingInput::new(mode, query.as_str())
            .with_complexity(context.complexity)
            .with_thinking(thinking)
            .with_model_override(context.model)
            .with_temperature_override(context.temperature);
        let generation = self.config.selector.plan(&routing);

        RequestPlan {
            mode,
            thinking,
            generation,
            tags: RequestTags {
                mode: Some(mode),
                user_level: context.user_level,
                urgency: context.urgency,
                complexity: context.complexity,
            },
        }
    }

    /// Build the provider request for a planned conversation.
    ///
    /// Temperature is not sent with thinking enabled; the provider rejects
    /// anything but its default in that case.
    pub fn build_request(
        &self,
        context: &ConversationContext,
        plan: &RequestPlan,
    ) -> CompletionRequest {
        let mut messages = context.messages.clone();
        RetrievalContext::new(context.retrieval_context.clone()).apply(&mut messages);

        let generation = &plan.generation;
        let request = CompletionRequest::new(&generation.spec.id, generation.max_tokens)
            .with_system(self.assembler.assemble(plan.mode))
            .with_messages(apply_cache_markers(&messages))
            .with_tool(WebSearchTool::new(self.config.web_search_max_uses));

        match generation.thinking_budget {
            Some(budget) => request.with_thinking(budget),
            None => request.with_temperature(generation.temperature),
        }
    }

    /// Start a streaming response.
    ///
    /// Failures before the first provider event are returned directly; later
    /// failures arrive as the final `Err` item of the stream.
    #[instrument(skip(self, context), fields(request_id = tracing::field::Empty))]
    pub async fn dispatch(&self, context: ConversationContext) -> Result<EventStream> {
        let request_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("request_id", request_id.as_str());

        let plan = self.plan(&context);
        info!(
            mode = %plan.mode,
            model = %plan.generation.model,
            model_id = %plan.generation.spec.id,
            thinking = plan.thinking,
            temperature = plan.generation.temperature,
            max_tokens = plan.generation.max_tokens,
            prompt_key = context.system_prompt_key.as_deref().unwrap_or("default"),
            reason = %plan.generation.reason,
            "Dispatching tutoring request"
        );

        let request = self.build_request(&context, &plan);
        let timeout = self.config.request_timeout;
        let deadline = match timeout {
            Some(t) => Some(Instant::now().checked_add(t).ok_or_else(|| {
                Error::Config(format!("request timeout of {}s is out of range", t.as_secs()))
            })?),
            None => None,
        };

        let raw = match deadline {
            Some(at) => tokio::time::timeout_at(at, self.client.stream(request))
                .await
                .map_err(|_| timeout_error(timeout))??,
            None => self.client.stream(request).await?,
        };

        let (tx, rx) = mpsc::channel(self.config.channel_capacity);
        let producer = Producer {
            raw,
            normalizer: StreamNormalizer::new(plan.tags),
            tx,
            deadline,
            timeout,
            spec: plan.generation.spec,
        };
        tokio::spawn(
            producer
                .run()
                .instrument(info_span!("produce", request_id = %request_id)),
        );

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

fn timeout_error(timeout: Option<Duration>) -> Error {
    let ms = timeout.map(|t| t.as_millis() as u64).unwrap_or_default();
    warn!(timeout_ms = ms, "Request deadline elapsed");
    Error::timeout(ms)
}

struct Producer {
    raw: RawEventStream,
    normalizer: StreamNormalizer,
    tx: mpsc::Sender<Result<StreamEvent>>,
    deadline: Option<Instant>,
    timeout: Option<Duration>,
    spec: ModelSpec,
}

/// Resolves once `deadline` has passed; never without one.
async fn deadline_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

impl Producer {
    async fn run(mut self) {
        loop {
            let next = tokio::select! {
                biased;
                _ = self.tx.closed() => {
                    debug!("Consumer dropped the stream");
                    return;
                }
                _ = deadline_elapsed(self.deadline) => {
                    self.expire().await;
                    return;
                }
                next = self.raw.next() => next,
            };

            match next {
                Some(Ok(raw)) => match self.normalizer.push(raw) {
                    Ok(Some(event)) => {
                        let stop = event == StreamEvent::MessageStop;
                        if !self.forward(event).await {
                            return;
                        }
                        if stop {
                            let usage = self.normalizer.usage();
                            info!(
                                input_tokens = usage.input_tokens,
                                output_tokens = usage.output_tokens,
                                cache_creation_tokens = usage.cache_creation_tokens,
                                cache_read_tokens = usage.cache_read_tokens,
                                total_tokens = usage.total(),
                                estimated_cost_usd = usage.estimated_cost(&self.spec),
                                "Response complete"
                            );
                            return;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        self.fail(e).await;
                        return;
                    }
                },
                Some(Err(e)) => {
                    self.normalizer.fail();
                    self.fail(e).await;
                    return;
                }
                None => {
                    if let Err(e) = self.normalizer.finish() {
                        self.fail(e).await;
                    }
                    return;
                }
            }
        }
    }

    /// Hand one event to the consumer. Returns `false` when the stream is over,
    /// either because the consumer left or the deadline passed while waiting
    /// for channel capacity.
    async fn forward(&mut self, event: StreamEvent) -> bool {
        tokio::select! {
            biased;
            sent = self.tx.send(Ok(event)) => {
                if sent.is_err() {
                    debug!("Consumer dropped the stream");
                }
                sent.is_ok()
            }
            _ = deadline_elapsed(self.deadline) => {
                self.expire().await;
                false
            }
        }
    }

    async fn expire(&mut self) {
        self.normalizer.fail();
        self.fail(timeout_error(self.timeout)).await;
    }

    async fn fail(&mut self, err: Error) {
        error!(error = %err, "Response stream failed");
        // Release the provider connection before waiting on the consumer.
        self.raw = Box::pin(futures::stream::empty::<Result<RawEvent>>());
        // The consumer may already be gone.
        let _ = self.tx.send(Err(err)).await;
    }
}
