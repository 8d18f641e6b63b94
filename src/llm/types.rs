//! LLM types for conversations, requests, and model definitions.

use serde::{Deserialize, Serialize};

/// Completion tier chosen once per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Model {
    /// Fast and cheap (e.g., Claude Haiku)
    Fast,
    /// Deep and expensive, supports extended thinking (e.g., Claude Sonnet)
    Deep,
}

impl std::fmt::Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fast => write!(f, "FAST"),
            Self::Deep => write!(f, "DEEP"),
        }
    }
}

/// Model definition with output ceilings and pricing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Provider model identifier (e.g., "claude-sonnet-4-20250514")
    pub id: String,
    /// Maximum output tokens without extended thinking
    pub max_output: u32,
    /// Maximum output tokens with extended thinking (if supported)
    pub thinking_max_output: Option<u32>,
    /// Input cost per million tokens (USD)
    pub input_cost_per_m: f64,
    /// Output cost per million tokens (USD)
    pub output_cost_per_m: f64,
}

impl ModelSpec {
    /// Calculate cost for the four usage counters.
    ///
    /// Cache writes are billed at 1.25x the input price, cache reads at 0.1x.
    pub fn calculate_cost(
        &self,
        input_tokens: u64,
        output_tokens: u64,
        cache_creation_tokens: u64,
        cache_read_tokens: u64,
    ) -> f64 {
        let per_token_in = self.input_cost_per_m / 1_000_000.0;
        let per_token_out = self.output_cost_per_m / 1_000_000.0;

        input_tokens as f64 * per_token_in
            + output_tokens as f64 * per_token_out
            + cache_creation_tokens as f64 * per_token_in * 1.25
            + cache_read_tokens as f64 * per_token_in * 0.1
    }

    /// Output ceiling for a request, raised when thinking is enabled.
    pub fn output_ceiling(&self, thinking: bool) -> u32 {
        if thinking {
            self.thinking_max_output.unwrap_or(self.max_output)
        } else {
            self.max_output
        }
    }

    /// Override the provider model id, keeping limits and pricing.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

/// Well-known models.
impl ModelSpec {
    pub fn claude_haiku() -> Self {
        Self {
            id: "claude-3-5-haiku-20241022".to_string(),
            max_output: 8192,
            thinking_max_output: None,
            input_cost_per_m: 0.8,
            output_cost_per_m: 4.0,
        }
    }

    pub fn claude_sonnet() -> Self {
        Self {
            id: "claude-sonnet-4-20250514".to_string(),
            max_output: 16_000,
            thinking_max_output: Some(32_000),
            input_cost_per_m: 3.0,
            output_cost_per_m: 15.0,
        }
    }
}

/// Role in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A unit of message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ContentBlock {
    #[serde(rename_all = "camelCase")]
    Text {
        value: String,
        #[serde(default)]
        cacheable: bool,
    },
    #[serde(rename_all = "camelCase")]
    Image {
        mime_type: String,
        base64_data: String,
        #[serde(default)]
        cacheable: bool,
    },
}

impl ContentBlock {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text {
            value: value.into(),
            cacheable: false,
        }
    }

    pub fn image(mime_type: impl Into<String>, base64_data: impl Into<String>) -> Self {
        Self::Image {
            mime_type: mime_type.into(),
            base64_data: base64_data.into(),
            cacheable: false,
        }
    }

    /// Mark this block eligible for prompt caching.
    pub fn cached(mut self) -> Self {
        match &mut self {
            Self::Text { cacheable, .. } | Self::Image { cacheable, .. } => *cacheable = true,
        }
        self
    }
}

/// Message content: plain text or a list of blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// A message in the conversation. Owned by the caller; never persisted here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(content.into()),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(content.into()),
        }
    }

    pub fn with_blocks(role: Role, blocks: Vec<ContentBlock>) -> Self {
        Self {
            role,
            content: MessageContent::Blocks(blocks),
        }
    }

    /// Concatenated text content, ignoring images.
    pub fn text(&self) -> String {
        match &self.content {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text { value, .. } => Some(value.as_str()),
                    ContentBlock::Image { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

// Provider wire types

/// Cache control directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CacheControl {
    Ephemeral,
}

/// A system prompt block as sent upstream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename = "text")]
pub struct SystemBlock {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<CacheControl>,
}

impl SystemBlock {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            cache_control: None,
        }
    }

    pub fn with_cache(mut self) -> Self {
        self.cache_control = Some(CacheControl::Ephemeral);
        self
    }

    pub fn is_cached(&self) -> bool {
        self.cache_control.is_some()
    }
}

/// Base64 image payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename = "base64")]
pub struct ImageSource {
    pub media_type: String,
    pub data: String,
}

/// A message content block in the provider's shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderContent {
    Text {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        cache_control: Option<CacheControl>,
    },
    Image {
        source: ImageSource,
        #[serde(skip_serializing_if = "Option::is_none")]
        cache_control: Option<CacheControl>,
    },
}

impl ProviderContent {
    pub fn cache_control(&self) -> Option<CacheControl> {
        match self {
            Self::Text { cache_control, .. } | Self::Image { cache_control, .. } => *cache_control,
        }
    }

    pub fn clear_cache_control(&mut self) {
        match self {
            Self::Text { cache_control, .. } | Self::Image { cache_control, .. } => {
                *cache_control = None
            }
        }
    }
}

/// A message in the provider's shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderMessage {
    pub role: Role,
    pub content: Vec<ProviderContent>,
}

/// Extended thinking parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ThinkingConfig {
    Enabled { budget_tokens: u32 },
}

/// Server-side web search tool offered to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebSearchTool {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub name: String,
    pub max_uses: u32,
}

impl WebSearchTool {
    pub fn new(max_uses: u32) -> Self {
        Self {
            tool_type: "web_search_20250305".to_string(),
            name: "web_search".to_string(),
            max_uses,
        }
    }
}

/// Streaming completion request, serialized as the provider request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub max_tokens: u32,
    pub system: Vec<SystemBlock>,
    pub messages: Vec<ProviderMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<ThinkingConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<WebSearchTool>,
    pub stream: bool,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            max_tokens,
            system: Vec::new(),
            messages: Vec::new(),
            temperature: None,
            thinking: None,
            tools: Vec::new(),
            stream: true,
        }
    }

    pub fn with_system(mut self, system: Vec<SystemBlock>) -> Self {
        self.system = system;
        self
    }

    pub fn with_messages(mut self, messages: Vec<ProviderMessage>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature.clamp(0.0, 1.0));
        self
    }

    pub fn with_thinking(mut self, budget_tokens: u32) -> Self {
        self.thinking = Some(ThinkingConfig::Enabled { budget_tokens });
        self
    }

    pub fn with_tool(mut self, tool: WebSearchTool) -> Self {
        self.tools.push(tool);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_model_cost_calculation() {
        let sonnet = ModelSpec::claude_sonnet();
        // 1M input + 500k output = $3 + $7.5
        let cost = sonnet.calculate_cost(1_000_000, 500_000, 0, 0);
        assert!((cost - 10.5).abs() < 0.01);

        // Cache write at 1.25x, cache read at 0.1x of $3/M
        let cached = sonnet.calculate_cost(0, 0, 1_000_000, 1_000_000);
        assert!((cached - (3.75 + 0.3)).abs() < 0.001);
    }

    #[test]
    fn test_output_ceiling() {
        let sonnet = ModelSpec::claude_sonnet();
        assert_eq!(sonnet.output_ceiling(false), 16_000);
        assert_eq!(sonnet.output_ceiling(true), 32_000);

        let haiku = ModelSpec::claude_haiku();
        assert_eq!(haiku.output_ceiling(true), haiku.max_output);
    }

    #[test]
    fn test_content_block_serde() {
        let block: ContentBlock = serde_json::from_value(json!({
            "type": "image",
            "mimeType": "image/png",
            "base64Data": "AAAA"
        }))
        .unwrap();
        assert_eq!(block, ContentBlock::image("image/png", "AAAA"));

        let text = serde_json::to_value(ContentBlock::text("hi").cached()).unwrap();
        assert_eq!(text, json!({"type": "text", "value": "hi", "cacheable": true}));
    }

    #[test]
    fn test_message_content_untagged() {
        let msg: Message = serde_json::from_value(json!({
            "role": "user",
            "content": "plain question"
        }))
        .unwrap();
        assert_eq!(msg, Message::user("plain question"));

        let blocks: Message = serde_json::from_value(json!({
            "role": "assistant",
            "content": [{"type": "text", "value": "a"}, {"type": "text", "value": "b"}]
        }))
        .unwrap();
        assert_eq!(blocks.role, Role::Assistant);
        assert_eq!(blocks.text(), "a\nb");
    }

    #[test]
    fn test_request_body_shape() {
        let request = CompletionRequest::new("claude-sonnet-4-20250514", 32_000)
            .with_system(vec![
                SystemBlock::new("base"),
                SystemBlock::new("mode").with_cache(),
            ])
            .with_messages(vec![ProviderMessage {
                role: Role::User,
                content: vec![ProviderContent::Text {
                    text: "hi".to_string(),
                    cache_control: None,
                }],
            }])
            .with_thinking(10_000)
            .with_tool(WebSearchTool::new(3));

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(
            body,
            json!({
                "model": "claude-sonnet-4-20250514",
                "max_tokens": 32000,
                "system": [
                    {"type": "text", "text": "base"},
                    {"type": "text", "text": "mode", "cache_control": {"type": "ephemeral"}}
                ],
                "messages": [
                    {"role": "user", "content": [{"type": "text", "text": "hi"}]}
                ],
                "thinking": {"type": "enabled", "budget_tokens": 10000},
                "tools": [{"type": "web_search_20250305", "name": "web_search", "max_uses": 3}],
                "stream": true
            })
        );
    }

    #[test]
    fn test_temperature_clamped() {
        let request = CompletionRequest::new("m", 10).with_temperature(1.7);
        assert_eq!(request.temperature, Some(1.0));
    }
}
