//! Normalized stream events and their wire form.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::mode::{Complexity, LearningMode, Urgency, UserLevel};

/// Request attributes attached to usage events for downstream telemetry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestTags {
    pub mode: Option<LearningMode>,
    pub user_level: Option<UserLevel>,
    pub urgency: Option<Urgency>,
    pub complexity: Option<Complexity>,
}

/// Accumulated usage at the time of a provider `message_delta`.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageUpdate {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
    /// Always the sum of the four counters
    pub total_tokens: u64,
    pub stop_reason: Option<String>,
    pub stop_sequence: Option<String>,
    pub tags: RequestTags,
}

/// One event of a normalized response stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    MessageStart { message_id: String, model: String },
    /// A reasoning block opened
    ThinkingStart,
    ThinkingDelta { text: String },
    SignatureDelta { signature: String },
    TextDelta { text: String },
    UsageUpdate(UsageUpdate),
    /// Clean end of the response; never serialized
    MessageStop,
}

/// Usage metadata on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMetadata {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_input_tokens: u64,
    pub cache_read_input_tokens: u64,
    pub total_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learning_mode: Option<LearningMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_level: Option<UserLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency: Option<Urgency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<Complexity>,
}

/// Serialized form of a [`StreamEvent`], one JSON object per event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<WireMetadata>,
}

impl WireEvent {
    fn new(kind: &str, data: Value) -> Self {
        Self {
            kind: kind.to_string(),
            data,
            metadata: None,
        }
    }
}

impl StreamEvent {
    /// Wire representation, `None` for [`StreamEvent::MessageStop`].
    pub fn to_wire(&self) -> Option<WireEvent> {
        let wire = match self {
            Self::MessageStart { message_id, model } => {
                let mut data = Map::new();
                data.insert("messageId".to_string(), Value::from(message_id.as_str()));
                data.insert("model".to_string(), Value::from(model.as_str()));
                WireEvent::new("message_start", Value::Object(data))
            }
            Self::ThinkingStart => WireEvent::new("thinking", Value::from("")),
            Self::ThinkingDelta { text } => WireEvent::new("thinking_delta", Value::from(text.as_str())),
            Self::SignatureDelta { signature } => {
                WireEvent::new("signature_delta", Value::from(signature.as_str()))
            }
            Self::TextDelta { text } => WireEvent::new("text_delta", Value::from(text.as_str())),
            Self::UsageUpdate(usage) => {
                let mut data = Map::new();
                if let Some(reason) = &usage.stop_reason {
                    data.insert("stop_reason".to_string(), Value::from(reason.as_str()));
                }
                if let Some(sequence) = &usage.stop_sequence {
                    data.insert("stop_sequence".to_string(), Value::from(sequence.as_str()));
                }
                WireEvent {
                    kind: "message_delta".to_string(),
                    data: Value::Object(data),
                    metadata: Some(WireMetadata {
                        input_tokens: usage.input_tokens,
                        output_tokens: usage.output_tokens,
                        cache_creation_input_tokens: usage.cache_creation_tokens,
                        cache_read_input_tokens: usage.cache_read_tokens,
                        total_tokens: usage.total_tokens,
                        learning_mode: usage.tags.mode,
                        user_level: usage.tags.user_level,
                        urgency: usage.tags.urgency,
                        complexity: usage.tags.complexity,
                    }),
                }
            }
            Self::MessageStop => return None,
        };
        Some(wire)
    }
}
