//! Learning modes and the caller-supplied request hints.

use serde::{Deserialize, Serialize};

/// Pedagogical/technical intent of a user query.
///
/// Exactly one mode is chosen per request and never changes mid-stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LearningMode {
    DebugCode,
    SystemDesign,
    AnalyzeAlgorithm,
    ExplainOrDesignAlgorithm,
    CreateTutorial,
    CodeReview,
    AnalyseCode,
    CareerAdvice,
    GeneralChat,
    Default,
}

impl LearningMode {
    /// Every mode, in declaration order.
    pub const ALL: [LearningMode; 10] = [
        Self::DebugCode,
        Self::SystemDesign,
        Self::AnalyzeAlgorithm,
        Self::ExplainOrDesignAlgorithm,
        Self::CreateTutorial,
        Self::CodeReview,
        Self::AnalyseCode,
        Self::CareerAdvice,
        Self::GeneralChat,
        Self::Default,
    ];

    /// Wire name of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DebugCode => "debug-code",
            Self::SystemDesign => "system-design",
            Self::AnalyzeAlgorithm => "analyze-algorithm",
            Self::ExplainOrDesignAlgorithm => "explain-or-design-algorithm",
            Self::CreateTutorial => "create-tutorial",
            Self::CodeReview => "code-review",
            Self::AnalyseCode => "analyse-code",
            Self::CareerAdvice => "career-advice",
            Self::GeneralChat => "general-chat",
            Self::Default => "default",
        }
    }
}

impl std::fmt::Display for LearningMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse complexity hint supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Complex,
}

impl Complexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Complex => "complex",
        }
    }
}

/// Self-reported experience level of the learner (telemetry only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl UserLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }
}

/// How urgently the learner needs an answer (telemetry only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Normal,
    High,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
        }
    }
}
