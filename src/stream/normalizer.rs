//! Provider-event to [`StreamEvent`] state machine.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::event::{RequestTags, StreamEvent, UsageUpdate};
use super::raw::{RawContentBlock, RawDelta, RawEvent, RawUsage};
use crate::error::{Error, Result};
use crate::llm::ModelSpec;

const OPERATION: &str = "normalize stream";

/// Normalizer lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizerState {
    Idle,
    Started,
    ThinkingOpen,
    TextOpen,
    Stopped,
    Errored,
}

impl NormalizerState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Errored)
    }
}

/// Running token usage for one response.
///
/// The provider reports cumulative counters, so `message_start` seeds all
/// four and each `message_delta` overwrites the ones it carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageAccumulator {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
}

impl UsageAccumulator {
    pub fn seed(&mut self, usage: &RawUsage) {
        self.input_tokens = usage.input_tokens.unwrap_or(0);
        self.output_tokens = usage.output_tokens.unwrap_or(0);
        self.cache_creation_tokens = usage.cache_creation_input_tokens.unwrap_or(0);
        self.cache_read_tokens = usage.cache_read_input_tokens.unwrap_or(0);
    }

    pub fn apply(&mut self, usage: &RawUsage) {
        if let Some(n) = usage.input_tokens {
            self.input_tokens = n;
        }
        if let Some(n) = usage.output_tokens {
            self.output_tokens = n;
        }
        if let Some(n) = usage.cache_creation_input_tokens {
            self.cache_creation_tokens = n;
        }
        if let Some(n) = usage.cache_read_input_tokens {
            self.cache_read_tokens = n;
        }
    }

    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens + self.cache_creation_tokens + self.cache_read_tokens
    }

    /// Estimated cost in USD at the model's list prices.
    pub fn estimated_cost(&self, spec: &ModelSpec) -> f64 {
        spec.calculate_cost(
            self.input_tokens,
            self.output_tokens,
            self.cache_creation_tokens,
            self.cache_read_tokens,
        )
    }
}

/// Converts provider events into the normalized protocol, one at a time.
#[derive(Debug, Clone)]
pub struct StreamNormalizer {
    state: NormalizerState,
    usage: UsageAccumulator,
    tags: RequestTags,
}

impl StreamNormalizer {
    pub fn new(tags: RequestTags) -> Self {
        Self {
            state: NormalizerState::Idle,
            usage: UsageAccumulator::default(),
            tags,
        }
    }

    pub fn state(&self) -> NormalizerState {
        self.state
    }

    pub fn usage(&self) -> &UsageAccumulator {
        &self.usage
    }

    /// Feed one provider event.
    ///
    /// Returns the event to forward, if any. Events after a terminal state
    /// are ignored.
    pub fn push(&mut self, event: RawEvent) -> Result<Option<StreamEvent>> {
        if self.state.is_terminal() {
            debug!(kind = event.kind(), state = ?self.state, "Ignoring event after terminal state");
            return Ok(None);
        }

        let out = match event {
            RawEvent::MessageStart { message } => {
                self.state = NormalizerState::Started;
                self.usage.seed(&message.usage);
                Some(StreamEvent::MessageStart {
                    message_id: message.id,
                    model: message.model,
                })
            }
            RawEvent::ContentBlockStart { content_block, .. } => match content_block {
                RawContentBlock::Thinking { .. } => {
                    self.state = NormalizerState::ThinkingOpen;
                    Some(StreamEvent::ThinkingStart)
                }
                RawContentBlock::Text { text } => {
                    self.state = NormalizerState::TextOpen;
                    (!text.is_empty()).then_some(StreamEvent::TextDelta { text })
                }
                RawContentBlock::Other => {
                    debug!("Ignoring non-text content block");
                    None
                }
            },
            RawEvent::ContentBlockDelta { delta, .. } => match delta {
                RawDelta::ThinkingDelta { thinking } => {
                    self.state = NormalizerState::ThinkingOpen;
                    Some(StreamEvent::ThinkingDelta { text: thinking })
                }
                RawDelta::SignatureDelta { signature } => {
                    self.state = NormalizerState::ThinkingOpen;
                    Some(StreamEvent::SignatureDelta { signature })
                }
                RawDelta::TextDelta { text } => {
                    self.state = NormalizerState::TextOpen;
                    Some(StreamEvent::TextDelta { text })
                }
                RawDelta::Other => {
                    debug!("Ignoring unsupported delta kind");
                    None
                }
            },
            RawEvent::MessageDelta { delta, usage } => {
                self.usage.apply(&usage);
                Some(StreamEvent::UsageUpdate(UsageUpdate {
                    input_tokens: self.usage.input_tokens,
                    output_tokens: self.usage.output_tokens,
                    cache_creation_tokens: self.usage.cache_creation_tokens,
                    cache_read_tokens: self.usage.cache_read_tokens,
                    total_tokens: self.usage.total(),
                    stop_reason: delta.stop_reason,
                    stop_sequence: delta.stop_sequence,
                    tags: self.tags,
                }))
            }
            RawEvent::MessageStop => {
                self.state = NormalizerState::Stopped;
                Some(StreamEvent::MessageStop)
            }
            RawEvent::Error { error } => {
                self.state = NormalizerState::Errored;
                return Err(Error::transport(
                    OPERATION,
                    format!("{}: {}", error.kind, error.message),
                ));
            }
            other @ (RawEvent::ContentBlockStop { .. } | RawEvent::Ping | RawEvent::Unknown) => {
                debug!(kind = other.kind(), "Ignoring provider event");
                None
            }
        };

        Ok(out)
    }

    /// Mark the stream failed.
    pub fn fail(&mut self) {
        self.state = NormalizerState::Errored;
    }

    /// Close the stream once the provider sequence has ended.
    ///
    /// Fails unless `message_stop` was seen.
    pub fn finish(&mut self) -> Result<()> {
        match self.state {
            NormalizerState::Stopped => Ok(()),
            state => {
                self.state = NormalizerState::Errored;
                Err(Error::transport(
                    OPERATION,
                    format!("provider stream ended without message_stop (state: {:?})", state),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::{Complexity, LearningMode};
    use crate::stream::raw::{RawMessage, RawMessageDelta};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn start() -> RawEvent {
        RawEvent::MessageStart {
            message: RawMessage {
                id: "msg_1".to_string(),
                model: "claude-sonnet-4-20250514".to_string(),
                usage: RawUsage {
                    input_tokens: Some(100),
                    output_tokens: Some(1),
                    ..RawUsage::default()
                },
            },
        }
    }

    fn delta(delta: RawDelta) -> RawEvent {
        RawEvent::ContentBlockDelta { index: 0, delta }
    }

    fn thinking(text: &str) -> RawEvent {
        delta(RawDelta::ThinkingDelta {
            thinking: text.to_string(),
        })
    }

    fn text(text: &str) -> RawEvent {
        delta(RawDelta::TextDelta {
            text: text.to_string(),
        })
    }

    fn message_delta(usage: RawUsage) -> RawEvent {
        RawEvent::MessageDelta {
            delta: RawMessageDelta {
                stop_reason: Some("end_turn".to_string()),
                stop_sequence: None,
            },
            usage,
        }
    }

    fn run(normalizer: &mut StreamNormalizer, events: Vec<RawEvent>) -> Vec<StreamEvent> {
        events
            .into_iter()
            .filter_map(|e| normalizer.push(e).unwrap())
            .collect()
    }

    #[test]
    fn test_scripted_order_preserved() {
        let tags = RequestTags {
            mode: Some(LearningMode::SystemDesign),
            complexity: Some(Complexity::Complex),
            ..RequestTags::default()
        };
        let mut normalizer = StreamNormalizer::new(tags);
        let events = run(
            &mut normalizer,
            vec![
                start(),
                thinking("Consider"),
                thinking(" the load."),
                text("Use "),
                text("a token "),
                text("bucket."),
                message_delta(RawUsage {
                    output_tokens: Some(42),
                    ..RawUsage::default()
                }),
                RawEvent::MessageStop,
            ],
        );

        assert_eq!(
            events,
            vec![
                StreamEvent::MessageStart {
                    message_id: "msg_1".to_string(),
                    model: "claude-sonnet-4-20250514".to_string(),
                },
                StreamEvent::ThinkingDelta {
                    text: "Consider".to_string()
                },
                StreamEvent::ThinkingDelta {
                    text: " the load.".to_string()
                },
                StreamEvent::TextDelta {
                    text: "Use ".to_string()
                },
                StreamEvent::TextDelta {
                    text: "a token ".to_string()
                },
                StreamEvent::TextDelta {
                    text: "bucket.".to_string()
                },
                StreamEvent::UsageUpdate(UsageUpdate {
                    input_tokens: 100,
                    output_tokens: 42,
                    cache_creation_tokens: 0,
                    cache_read_tokens: 0,
                    total_tokens: 142,
                    stop_reason: Some("end_turn".to_string()),
                    stop_sequence: None,
                    tags,
                }),
                StreamEvent::MessageStop,
            ]
        );
        assert_eq!(normalizer.state(), NormalizerState::Stopped);
        assert!(normalizer.finish().is_ok());
    }

    #[test]
    fn test_state_transitions() {
        let mut normalizer = StreamNormalizer::new(RequestTags::default());
        assert_eq!(normalizer.state(), NormalizerState::Idle);

        normalizer.push(start()).unwrap();
        assert_eq!(normalizer.state(), NormalizerState::Started);

        let announced = normalizer
            .push(RawEvent::ContentBlockStart {
                index: 0,
                content_block: RawContentBlock::Thinking {
                    thinking: String::new(),
                },
            })
            .unwrap();
        assert_eq!(announced, Some(StreamEvent::ThinkingStart));
        assert_eq!(normalizer.state(), NormalizerState::ThinkingOpen);

        normalizer
            .push(delta(RawDelta::SignatureDelta {
                signature: "sig".to_string(),
            }))
            .unwrap();
        assert_eq!(normalizer.state(), NormalizerState::ThinkingOpen);

        normalizer.push(text("a")).unwrap();
        assert_eq!(normalizer.state(), NormalizerState::TextOpen);

        normalizer.push(RawEvent::MessageStop).unwrap();
        assert_eq!(normalizer.state(), NormalizerState::Stopped);

        // Ignored once stopped.
        assert_eq!(normalizer.push(text("late")).unwrap(), None);
    }

    #[test]
    fn test_unknown_events_ignored() {
        let mut normalizer = StreamNormalizer::new(RequestTags::default());
        let events = run(
            &mut normalizer,
            vec![
                start(),
                RawEvent::Unknown,
                RawEvent::Ping,
                RawEvent::ContentBlockStart {
                    index: 1,
                    content_block: RawContentBlock::Other,
                },
                delta(RawDelta::Other),
                RawEvent::ContentBlockStop { index: 1 },
            ],
        );
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_finish_without_stop_is_error() {
        let mut normalizer = StreamNormalizer::new(RequestTags::default());
        run(&mut normalizer, vec![start(), text("partial")]);

        let err = normalizer.finish().unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
        assert_eq!(normalizer.state(), NormalizerState::Errored);
    }

    #[test]
    fn test_usage_overwrite_and_cost() {
        let mut usage = UsageAccumulator::default();
        usage.seed(&RawUsage {
            input_tokens: Some(1_000_000),
            cache_read_input_tokens: Some(1_000_000),
            ..RawUsage::default()
        });
        usage.apply(&RawUsage {
            output_tokens: Some(100_000),
            ..RawUsage::default()
        });

        assert_eq!(usage.input_tokens, 1_000_000);
        assert_eq!(usage.output_tokens, 100_000);
        assert_eq!(usage.total(), 2_100_000);

        // $3 input + $1.5 output + $0.3 cache read
        let cost = usage.estimated_cost(&ModelSpec::claude_sonnet());
        assert!((cost - 4.8).abs() < 1e-9);
    }

    fn counter() -> impl Strategy<Value = Option<u64>> {
        prop_oneof![Just(None), Just(Some(0u64)), (0u64..1_000_000).prop_map(Some)]
    }

    proptest! {
        #[test]
        fn usage_total_is_sum_of_counters(
            seed in (counter(), counter(), counter(), counter()),
            update in (counter(), counter(), counter(), counter()),
        ) {
            let mut normalizer = StreamNormalizer::new(RequestTags::default());
            let mut message = match start() {
                RawEvent::MessageStart { message } => message,
                _ => unreachable!(),
            };
            message.usage = RawUsage {
                input_tokens: seed.0,
                output_tokens: seed.1,
                cache_creation_input_tokens: seed.2,
                cache_read_input_tokens: seed.3,
            };
            normalizer.push(RawEvent::MessageStart { message }).unwrap();

            let event = normalizer
                .push(message_delta(RawUsage {
                    input_tokens: update.0,
                    output_tokens: update.1,
                    cache_creation_input_tokens: update.2,
                    cache_read_input_tokens: update.3,
                }))
                .unwrap();

            match event {
                Some(StreamEvent::UsageUpdate(u)) => prop_assert_eq!(
                    u.total_tokens,
                    u.input_tokens + u.output_tokens + u.cache_creation_tokens + u.cache_read_tokens
                ),
                other => prop_assert!(false, "unexpected event {:?}", other),
            }
        }
    }
}
