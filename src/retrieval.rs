//! Retrieved context interpolated into the latest user turn.

use crate::llm::{ContentBlock, Message, MessageContent, Role};
use crate::vector::QueryMatch;

/// Context strings in relevance order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetrievalContext {
    passages: Vec<String>,
}

impl RetrievalContext {
    pub fn new(passages: Vec<String>) -> Self {
        Self {
            passages: passages
                .into_iter()
                .filter(|p| !p.trim().is_empty())
                .collect(),
        }
    }

    /// Extract chunk text from query matches, skipping matches without any.
    pub fn from_matches(matches: &[QueryMatch]) -> Self {
        Self::new(
            matches
                .iter()
                .filter_map(|m| m.text().map(str::to_string))
                .collect(),
        )
    }

    pub fn passages(&self) -> &[String] {
        &self.passages
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    /// The `<context>` section placed ahead of the question.
    pub fn render(&self) -> String {
        let body = self
            .passages
            .iter()
            .enumerate()
            .map(|(i, p)| format!("[{}] {}", i + 1, p.trim()))
            .collect::<Vec<_>>()
            .join("\n\n");
        format!(
            "<context>\n{}\n</context>\n\nUse the context above when it is relevant to the question.",
            body
        )
    }

    /// Prefix the most recent user message with the rendered context.
    ///
    /// Leaves `messages` untouched when there is no context or no user turn.
    pub fn apply(&self, messages: &mut [Message]) {
        if self.is_empty() {
            return;
        }
        let Some(latest) = messages.iter_mut().rev().find(|m| m.role == Role::User) else {
            return;
        };

        let section = self.render();
        match &mut latest.content {
            MessageContent::Text(text) => {
                *text = format!("{}\n\n{}", section, text);
            }
            MessageContent::Blocks(blocks) => {
                blocks.insert(0, ContentBlock::text(section));
            }
        }
    }
}
