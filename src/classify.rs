//! Keyword-based query classification into learning modes.
//!
//! Classification is a single ordered table of `(LearningMode, KeywordSet)`
//! rules evaluated top to bottom; the first rule whose keyword set matches
//! wins. A general-conversation pre-check runs before the table so that
//! small talk without any technical vocabulary never reaches the mode rules.
//!
//! Matching is case-insensitive substring matching.

use regex::Regex;
use std::sync::LazyLock;

use crate::mode::LearningMode;

/// A named set of keywords compiled into one case-insensitive alternation.
#[derive(Debug)]
pub struct KeywordSet {
    name: &'static str,
    keywords: &'static [&'static str],
    pattern: Regex,
}

impl KeywordSet {
    /// Compile a keyword set. Keywords are matched literally.
    pub fn new(name: &'static str, keywords: &'static [&'static str]) -> Self {
        let alternation = keywords
            .iter()
            .map(|k| regex::escape(k))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = Regex::new(&format!("(?i)(?:{})", alternation)).expect("invalid regex");

        Self {
            name,
            keywords,
            pattern,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn keywords(&self) -> &'static [&'static str] {
        self.keywords
    }

    /// Whether any keyword occurs in `text`.
    pub fn is_match(&self, text: &str) -> bool {
        !self.keywords.is_empty() && self.pattern.is_match(text)
    }
}

const GENERAL_KEYWORDS: &[&str] = &[
    "hello",
    "hi there",
    "hey there",
    "good morning",
    "good afternoon",
    "good evening",
    "how are you",
    "thank you",
    "thanks",
    "who are you",
    "what's up",
    "nice to meet",
    "goodbye",
    "tell me a joke",
    "what can you do",
];

const PROGRAMMING_KEYWORDS: &[&str] = &[
    "code",
    "function",
    "program",
    "variable",
    "class",
    "api",
    "database",
    "compile",
    "runtime",
    "server",
    "deploy",
    "python",
    "javascript",
    "typescript",
    "rust",
    "java",
    "sql",
    "react",
    "git",
    "docker",
];

const DEBUG_KEYWORDS: &[&str] = &[
    "debug",
    "error",
    "exception",
    "bug",
    "fix",
    "crash",
    "not working",
    "doesn't work",
    "broken",
    "stack trace",
    "traceback",
    "throws",
    "failing",
    "segfault",
    "null pointer",
];

const SYSTEM_DESIGN_KEYWORDS: &[&str] = &[
    "system design",
    "design a",
    "architecture",
    "scalable",
    "distributed",
    "microservice",
    "load balancer",
    "rate limiter",
    "high availability",
    "sharding",
];

const ALGORITHM_KEYWORDS: &[&str] = &[
    "algorithm",
    "time complexity",
    "space complexity",
    "big o",
    "big-o",
    "sorting",
    "binary search",
    "dynamic programming",
    "recursion",
    "graph traversal",
    "leetcode",
    "data structure",
];

const TUTORIAL_KEYWORDS: &[&str] = &[
    "tutorial",
    "teach me",
    "walk me through",
    "step-by-step guide",
    "lesson",
    "course",
    "how do i learn",
];

const REVIEW_KEYWORDS: &[&str] = &[
    "review",
    "feedback on my code",
    "improve my code",
    "best practice",
    "refactor",
    "clean code",
    "code smell",
];

const CAREER_KEYWORDS: &[&str] = &[
    "career",
    "resume",
    "interview",
    "salary",
    "job",
    "promotion",
    "hiring",
    "portfolio",
    "should i learn",
];

const ANALYSIS_KEYWORDS: &[&str] = &[
    "analyze",
    "analyse",
    "explain this code",
    "what does this code",
    "how does this code",
    "understand this code",
];

static GENERAL: LazyLock<KeywordSet> =
    LazyLock::new(|| KeywordSet::new("general", GENERAL_KEYWORDS));

static PROGRAMMING: LazyLock<KeywordSet> =
    LazyLock::new(|| KeywordSet::new("programming", PROGRAMMING_KEYWORDS));

// Precedence lives here and nowhere else.
static RULES: LazyLock<Vec<(LearningMode, KeywordSet)>> = LazyLock::new(|| {
    vec![
        (LearningMode::DebugCode, KeywordSet::new("debug", DEBUG_KEYWORDS)),
        (
            LearningMode::SystemDesign,
            KeywordSet::new("system-design", SYSTEM_DESIGN_KEYWORDS),
        ),
        (
            LearningMode::AnalyzeAlgorithm,
            KeywordSet::new("algorithm", ALGORITHM_KEYWORDS),
        ),
        (
            LearningMode::CreateTutorial,
            KeywordSet::new("tutorial", TUTORIAL_KEYWORDS),
        ),
        (LearningMode::CodeReview, KeywordSet::new("review", REVIEW_KEYWORDS)),
        (LearningMode::CareerAdvice, KeywordSet::new("career", CAREER_KEYWORDS)),
        (
            LearningMode::AnalyseCode,
            KeywordSet::new("analysis", ANALYSIS_KEYWORDS),
        ),
    ]
});

/// Ordered-rule query classifier.
///
/// Total and pure: every query maps to exactly one mode, falling back to
/// [`LearningMode::Default`].
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryClassifier;

impl QueryClassifier {
    pub fn new() -> Self {
        Self
    }

    /// The mode rules in evaluation order.
    pub fn rules(&self) -> &'static [(LearningMode, KeywordSet)] {
        RULES.as_slice()
    }

    /// Whether the query contains any technical vocabulary, including every
    /// keyword of every mode rule.
    pub fn has_technical_indicator(&self, query: &str) -> bool {
        PROGRAMMING.is_match(query) || RULES.iter().any(|(_, set)| set.is_match(query))
    }

    /// Whether the query is small talk with no technical content.
    pub fn is_general_chat(&self, query: &str) -> bool {
        GENERAL.is_match(query) && !self.has_technical_indicator(query)
    }

    /// Classify a query into a learning mode.
    pub fn classify(&self, query: &str) -> LearningMode {
        if self.is_general_chat(query) {
            return LearningMode::GeneralChat;
        }

        self.rules()
            .iter()
            .find(|(_, set)| set.is_match(query))
            .map(|(mode, _)| *mode)
            .unwrap_or(LearningMode::Default)
    }
}
