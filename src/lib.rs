//! # tutor-core
//!
//! Request pipeline for an adaptive programming tutor: classify the learner's
//! query, decide whether to reason, pick a model tier, assemble a cached
//! prompt, and stream a normalized response.
//!
//! ## Core Components
//!
//! - **Classify**: Keyword rules mapping a query to a [`LearningMode`]
//! - **Thinking**: Extended-reasoning gate
//! - **LLM**: Model routing, prompt assembly, cache markers, provider client
//! - **Stream**: Provider event decoding and the normalized event protocol
//! - **Dispatch**: The end-to-end pipeline behind [`Dispatcher::dispatch`]
//! - **Vector**: Embedding storage with retried mutations
//!
//! ## Example
//!
//! ```rust,ignore
//! use futures::StreamExt;
//! use tutor_core::{ConversationContext, Dispatcher, Message, TutorConfig};
//!
//! let config = TutorConfig::from_env()?;
//! let dispatcher = Dispatcher::new(config.completion_client()?, config.dispatch_config());
//!
//! let context = ConversationContext::new(vec![Message::user("why does my loop never end?")]);
//! let mut events = dispatcher.dispatch(context).await?;
//! while let Some(event) = events.next().await {
//!     if let Some(wire) = event?.to_wire() {
//!         println!("{}", serde_json::to_string(&wire)?);
//!     }
//! }
//! ```

pub mod classify;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod llm;
pub mod mode;
pub mod retrieval;
pub mod retry;
pub mod stream;
pub mod thinking;
pub mod vector;

// Re-exports for convenience
pub use classify::{KeywordSet, QueryClassifier};
pub use config::TutorConfig;
pub use dispatch::{ConversationContext, DispatchConfig, Dispatcher, EventStream, RequestPlan};
pub use error::{Error, Result};
pub use llm::{
    AnthropicClient, ClientConfig, CompletionClient, CompletionRequest, ContentBlock,
    GenerationPlan, Message, MessageContent, Model, ModelSelector, ModelSpec, PromptAssembler,
    Role,
};
pub use mode::{Complexity, LearningMode, Urgency, UserLevel};
pub use retrieval::RetrievalContext;
pub use retry::{with_retry, with_retry_cancellable, RetryPolicy};
pub use stream::{RequestTags, StreamEvent, StreamNormalizer, UsageUpdate, WireEvent};
pub use thinking::{ThinkingGate, ThinkingInput};
pub use vector::{
    DocumentChunk, EmbeddingIndexClient, MemoryIndex, MetadataFilter, QueryMatch, UpstashConfig,
    UpstashIndex, VectorIndex, VectorQuery, VectorRecord,
};
