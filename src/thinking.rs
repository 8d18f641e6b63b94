//! Extended-reasoning ("thinking") gate.

use regex::Regex;
use std::sync::LazyLock;

use crate::mode::{Complexity, LearningMode};

static REASONING_REQUEST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(think\s+step\s+by\s+step|step\s+by\s+step|think\s+through|think\s+carefully|think\s+deeply|reason\s+through|show\s+your\s+reasoning|explain\s+your\s+reasoning|chain\s+of\s+thought)",
    )
    .expect("invalid regex")
});

/// Inputs to the thinking decision.
#[derive(Debug, Clone, Copy)]
pub struct ThinkingInput<'a> {
    pub mode: LearningMode,
    pub complexity: Option<Complexity>,
    pub query: &'a str,
}

impl<'a> ThinkingInput<'a> {
    pub fn new(mode: LearningMode, query: &'a str) -> Self {
        Self {
            mode,
            complexity: None,
            query,
        }
    }

    pub fn with_complexity(mut self, complexity: Option<Complexity>) -> Self {
        self.complexity = complexity;
        self
    }
}

/// Decides whether a request warrants an extended-reasoning pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThinkingGate;

impl ThinkingGate {
    pub fn new() -> Self {
        Self
    }

    /// Modes that always reason before answering.
    pub fn is_reasoning_mode(mode: LearningMode) -> bool {
        matches!(
            mode,
            LearningMode::SystemDesign
                | LearningMode::ExplainOrDesignAlgorithm
                | LearningMode::AnalyzeAlgorithm
                | LearningMode::CodeReview
        )
    }

    /// Whether the query explicitly asks for step-by-step reasoning.
    pub fn requests_reasoning(query: &str) -> bool {
        REASONING_REQUEST.is_match(query)
    }

    /// Evaluate the gate. General chat never thinks.
    pub fn should_think(&self, input: &ThinkingInput<'_>) -> bool {
        if input.mode == LearningMode::GeneralChat {
            return false;
        }
        if Self::is_reasoning_mode(input.mode) {
            return true;
        }
        if input.complexity == Some(Complexity::Complex) {
            return true;
        }
        Self::requests_reasoning(input.query)
    }

    /// Apply a caller's explicit preference on top of the gate.
    ///
    /// `Some(false)` always disables thinking; `Some(true)` enables it for
    /// every mode except general chat.
    pub fn resolve(&self, input: &ThinkingInput<'_>, requested: Option<bool>) -> bool {
        match requested {
            Some(false) => false,
            Some(true) => input.mode != LearningMode::GeneralChat,
            None => self.should_think(input),
        }
    }
}
