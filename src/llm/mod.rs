//! Completion-side building blocks: model routing, prompt assembly, cache
//! markers and the streaming provider client.
//!
//! ## Example
//!
//! ```rust,ignore
//! use tutor_core::llm::{
//!     apply_cache_markers, AnthropicClient, ClientConfig, CompletionClient,
//!     CompletionRequest, Message, ModelSelector, PromptAssembler, RoutingInput,
//! };
//! use tutor_core::LearningMode;
//!
//! let client = AnthropicClient::new(ClientConfig::new("your-api-key"))?;
//!
//! let plan = ModelSelector::default()
//!     .plan(&RoutingInput::new(LearningMode::DebugCode, "why does this panic?"));
//!
//! let request = CompletionRequest::new(&plan.spec.id, plan.max_tokens)
//!     .with_system(PromptAssembler::new().assemble(LearningMode::DebugCode))
//!     .with_messages(apply_cache_markers(&[Message::user("why does this panic?")]))
//!     .with_temperature(plan.temperature);
//!
//! let events = client.stream(request).await?;
//! ```

mod cache;
mod client;
mod prompt;
mod router;
mod sse;
mod types;

pub use cache::{
    apply_cache_markers, convert_message, find_cache_breakpoints, limit_cache_breakpoints,
    MAX_MESSAGE_BREAKPOINTS,
};
pub(crate) use client::build_http_client;
pub use client::{AnthropicClient, ClientConfig, CompletionClient, RawEventStream};
pub use prompt::{mode_instructions, PromptAssembler};
pub use router::{
    base_model, select_temperature, GenerationPlan, ModelSelector, RoutingInput,
    THINKING_BUDGET_TOKENS,
};
pub use sse::{SseDecoder, SseFrame};
pub use types::{
    CacheControl, CompletionRequest, ContentBlock, ImageSource, Message, MessageContent, Model,
    ModelSpec, ProviderContent, ProviderMessage, Role, SystemBlock, ThinkingConfig,
    WebSearchTool,
};
