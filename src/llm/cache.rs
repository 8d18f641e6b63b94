//! Prompt caching markers for conversation messages.
//!
//! The provider accepts at most four `cache_control` breakpoints per request.
//! The cached system mode block always takes one, which leaves
//! [`MAX_MESSAGE_BREAKPOINTS`] for the conversation itself.

use super::types::{
    CacheControl, ContentBlock, ImageSource, Message, MessageContent, ProviderContent,
    ProviderMessage, Role,
};

/// Message-level breakpoints kept per request.
pub const MAX_MESSAGE_BREAKPOINTS: usize = 3;

fn marker(cacheable: bool) -> Option<CacheControl> {
    cacheable.then_some(CacheControl::Ephemeral)
}

/// Convert one message to the provider's shape, marking cacheable content.
///
/// Assistant text is cacheable by default. User string content never is.
/// Explicit block flags are honoured as given.
pub fn convert_message(message: &Message) -> ProviderMessage {
    let content = match &message.content {
        MessageContent::Text(text) => vec![ProviderContent::Text {
            text: text.clone(),
            cache_control: marker(message.role == Role::Assistant),
        }],
        MessageContent::Blocks(blocks) => blocks
            .iter()
            .map(|block| match block {
                ContentBlock::Text { value, cacheable } => ProviderContent::Text {
                    text: value.clone(),
                    cache_control: marker(*cacheable || message.role == Role::Assistant),
                },
                ContentBlock::Image {
                    mime_type,
                    base64_data,
                    cacheable,
                } => ProviderContent::Image {
                    source: ImageSource {
                        media_type: mime_type.clone(),
                        data: base64_data.clone(),
                    },
                    cache_control: marker(*cacheable),
                },
            })
            .collect(),
    };

    ProviderMessage {
        role: message.role,
        content,
    }
}

/// Positions `(message, block)` of every cache marker, in conversation order.
pub fn find_cache_breakpoints(messages: &[ProviderMessage]) -> Vec<(usize, usize)> {
    messages
        .iter()
        .enumerate()
        .flat_map(|(i, msg)| {
            msg.content
                .iter()
                .enumerate()
                .filter(|(_, block)| block.cache_control().is_some())
                .map(move |(j, _)| (i, j))
        })
        .collect()
}

/// Keep only the `max` most recent cache markers.
pub fn limit_cache_breakpoints(messages: &mut [ProviderMessage], max: usize) {
    let breakpoints = find_cache_breakpoints(messages);
    let excess = breakpoints.len().saturating_sub(max);

    for &(i, j) in &breakpoints[..excess] {
        messages[i].content[j].clear_cache_control();
    }
}

/// Convert a conversation and apply the breakpoint cap.
pub fn apply_cache_markers(messages: &[Message]) -> Vec<ProviderMessage> {
    let mut converted: Vec<_> = messages.iter().map(convert_message).collect();
    limit_cache_breakpoints(&mut converted, MAX_MESSAGE_BREAKPOINTS);
    converted
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_user_string_never_cached() {
        let converted = convert_message(&Message::user("hello"));
        assert_eq!(converted.content[0].cache_control(), None);
    }

    #[test]
    fn test_assistant_text_cached() {
        let converted = convert_message(&Message::assistant("answer"));
        assert_eq!(
            converted.content[0].cache_control(),
            Some(CacheControl::Ephemeral)
        );
    }

    #[test]
    fn test_explicit_block_flags() {
        let message = Message::with_blocks(
            Role::User,
            vec![
                ContentBlock::text("context").cached(),
                ContentBlock::image("image/png", "AAAA"),
                ContentBlock::image("image/jpeg", "BBBB").cached(),
            ],
        );
        let converted = convert_message(&message);
        let markers: Vec<_> = converted.content.iter().map(|c| c.cache_control()).collect();

        assert_eq!(
            markers,
            vec![Some(CacheControl::Ephemeral), None, Some(CacheControl::Ephemeral)]
        );
        assert_eq!(
            converted.content[1],
            ProviderContent::Image {
                source: ImageSource {
                    media_type: "image/png".to_string(),
                    data: "AAAA".to_string(),
                },
                cache_control: None,
            }
        );
    }

    #[test]
    fn test_find_cache_breakpoints() {
        let converted: Vec<_> = [
            Message::user("q1"),
            Message::assistant("a1"),
            Message::user("q2"),
        ]
        .iter()
        .map(convert_message)
        .collect();

        assert_eq!(find_cache_breakpoints(&converted), vec![(1, 0)]);
    }

    #[test]
    fn test_apply_cache_markers_keeps_most_recent() {
        let mut history = Vec::new();
        for i in 0..5 {
            history.push(Message::user(format!("q{}", i)));
            history.push(Message::assistant(format!("a{}", i)));
        }
        history.push(Message::user("latest"));

        let converted = apply_cache_markers(&history);
        assert_eq!(
            find_cache_breakpoints(&converted),
            vec![(5, 0), (7, 0), (9, 0)]
        );
        assert_eq!(converted.len(), history.len());
    }
}
