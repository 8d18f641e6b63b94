//! Mode-aware model, temperature and token-budget selection.
//!
//! Routes a classified request to a completion tier based on:
//! - A fixed base table keyed by learning mode
//! - Mode-specific overrides (general chat, tactical career questions)
//! - The caller's complexity hint combined with indicator phrases
//! - Whether extended thinking was enabled, which forces the deep tier

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use super::types::{Model, ModelSpec};
use crate::mode::{Complexity, LearningMode};

/// Reasoning-token budget attached whenever thinking is enabled.
pub const THINKING_BUDGET_TOKENS: u32 = 10_000;

static TACTICAL_CAREER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(resume|interview|salary|should\s+i|how\s+to|which\s+framework)")
        .expect("invalid regex")
});

static COMPLEXITY_INDICATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(production|scalable|scale|concurren(cy|t)|distributed|performance|race\s+condition|memory\s+leak|multithread)",
    )
    .expect("invalid regex")
});

static SIMPLICITY_INDICATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(basic|quick|overview|simple|brief|summary|beginner)").expect("invalid regex")
});

/// Tier chosen for a mode before any query-specific adjustment.
pub fn base_model(mode: LearningMode) -> Model {
    match mode {
        LearningMode::SystemDesign
        | LearningMode::ExplainOrDesignAlgorithm
        | LearningMode::AnalyzeAlgorithm
        | LearningMode::CreateTutorial => Model::Deep,
        LearningMode::DebugCode
        | LearningMode::CodeReview
        | LearningMode::AnalyseCode
        | LearningMode::CareerAdvice
        | LearningMode::GeneralChat
        | LearningMode::Default => Model::Fast,
    }
}

/// Sampling temperature for a mode.
pub fn select_temperature(mode: LearningMode) -> f64 {
    match mode {
        LearningMode::DebugCode | LearningMode::AnalyzeAlgorithm => 0.1,
        LearningMode::ExplainOrDesignAlgorithm
        | LearningMode::CodeReview
        | LearningMode::AnalyseCode => 0.2,
        LearningMode::SystemDesign => 0.3,
        LearningMode::CreateTutorial => 0.4,
        LearningMode::CareerAdvice | LearningMode::Default => 0.5,
        LearningMode::GeneralChat => 0.7,
    }
}

/// Inputs for a routing decision.
#[derive(Debug, Clone, Default)]
pub struct RoutingInput {
    pub mode: Option<LearningMode>,
    pub query: String,
    pub complexity: Option<Complexity>,
    /// Whether the thinking gate passed
    pub thinking: bool,
    /// Caller-forced tier
    pub model_override: Option<Model>,
    /// Caller-forced temperature
    pub temperature_override: Option<f64>,
}

impl RoutingInput {
    pub fn new(mode: LearningMode, query: impl Into<String>) -> Self {
        Self {
            mode: Some(mode),
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn with_complexity(mut self, complexity: Option<Complexity>) -> Self {
        self.complexity = complexity;
        self
    }

    pub fn with_thinking(mut self, thinking: bool) -> Self {
        self.thinking = thinking;
        self
    }

    pub fn with_model_override(mut self, model: Option<Model>) -> Self {
        self.model_override = model;
        self
    }

    pub fn with_temperature_override(mut self, temperature: Option<f64>) -> Self {
        self.temperature_override = temperature;
        self
    }

    fn mode(&self) -> LearningMode {
        self.mode.unwrap_or(LearningMode::Default)
    }
}

/// Routing decision output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationPlan {
    /// Selected tier
    pub model: Model,
    /// Concrete model for the tier
    pub spec: ModelSpec,
    /// Sampling temperature
    pub temperature: f64,
    /// Output token ceiling
    pub max_tokens: u32,
    /// Reasoning-token budget, present iff thinking is enabled
    pub thinking_budget: Option<u32>,
    /// Reasoning for selection
    pub reason: String,
}

impl GenerationPlan {
    pub fn thinking(&self) -> bool {
        self.thinking_budget.is_some()
    }
}

/// Mode-aware model selector.
#[derive(Debug, Clone)]
pub struct ModelSelector {
    fast: ModelSpec,
    deep: ModelSpec,
}

impl Default for ModelSelector {
    fn default() -> Self {
        Self::new(ModelSpec::claude_haiku(), ModelSpec::claude_sonnet())
    }
}

impl ModelSelector {
    pub fn new(fast: ModelSpec, deep: ModelSpec) -> Self {
        Self { fast, deep }
    }

    /// The model serving a tier.
    pub fn spec(&self, model: Model) -> &ModelSpec {
        match model {
            Model::Fast => &self.fast,
            Model::Deep => &self.deep,
        }
    }

    /// Select a tier for a mode and query, ignoring thinking.
    pub fn select_model(
        &self,
        mode: LearningMode,
        query: &str,
        complexity: Option<Complexity>,
    ) -> Model {
        if mode == LearningMode::GeneralChat {
            return Model::Fast;
        }
        if mode == LearningMode::CareerAdvice && TACTICAL_CAREER.is_match(query) {
            return Model::Fast;
        }

        let base = base_model(mode);
        match (complexity, base) {
            (Some(Complexity::Complex), Model::Fast)
                if matches!(mode, LearningMode::AnalyseCode | LearningMode::DebugCode)
                    && COMPLEXITY_INDICATOR.is_match(query) =>
            {
                Model::Deep
            }
            (Some(Complexity::Simple), Model::Deep) if SIMPLICITY_INDICATOR.is_match(query) => {
                Model::Fast
            }
            _ => base,
        }
    }

    /// Produce the full generation plan for a request.
    pub fn plan(&self, input: &RoutingInput) -> GenerationPlan {
        let mode = input.mode();
        let selected = self.select_model(mode, &input.query, input.complexity);
        let chosen = input.model_override.unwrap_or(selected);

        let model = if input.thinking { Model::Deep } else { chosen };
        let spec = self.spec(model).clone();
        let max_tokens = spec.output_ceiling(input.thinking);
        let temperature = input
            .temperature_override
            .unwrap_or_else(|| select_temperature(mode));

        let reason = format!(
            "mode '{}' -> {} (selected {}{}{})",
            mode,
            model,
            selected,
            if input.model_override.is_some() { ", caller override" } else { "" },
            if input.thinking { ", thinking forces DEEP" } else { "" },
        );

        GenerationPlan {
            model,
            spec,
            temperature,
            max_tokens,
            thinking_budget: input.thinking.then_some(THINKING_BUDGET_TOKENS),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_base_table() {
        assert_eq!(base_model(LearningMode::SystemDesign), Model::Deep);
        assert_eq!(base_model(LearningMode::ExplainOrDesignAlgorithm), Model::Deep);
        assert_eq!(base_model(LearningMode::AnalyzeAlgorithm), Model::Deep);
        assert_eq!(base_model(LearningMode::CreateTutorial), Model::Deep);
        assert_eq!(base_model(LearningMode::DebugCode), Model::Fast);
        assert_eq!(base_model(LearningMode::CodeReview), Model::Fast);
        assert_eq!(base_model(LearningMode::AnalyseCode), Model::Fast);
        assert_eq!(base_model(LearningMode::CareerAdvice), Model::Fast);
        assert_eq!(base_model(LearningMode::Default), Model::Fast);
    }

    #[test]
    fn test_temperature_range() {
        for mode in LearningMode::ALL {
            let t = select_temperature(mode);
            assert!((0.1..=0.7).contains(&t), "{} -> {}", mode, t);
            assert!(t <= select_temperature(LearningMode::GeneralChat));
        }
        assert_eq!(select_temperature(LearningMode::DebugCode), 0.1);
        assert_eq!(select_temperature(LearningMode::AnalyzeAlgorithm), 0.1);
    }

    #[test]
    fn test_career_tactical_is_fast() {
        let selector = ModelSelector::default();
        assert_eq!(
            selector.select_model(
                LearningMode::CareerAdvice,
                "how to prepare for an interview",
                Some(Complexity::Complex)
            ),
            Model::Fast
        );
    }

    #[test]
    fn test_complex_upgrade_requires_indicator() {
        let selector = ModelSelector::default();
        let complex = Some(Complexity::Complex);

        assert_eq!(
            selector.select_model(
                LearningMode::DebugCode,
                "race condition in production",
                complex
            ),
            Model::Deep
        );
        assert_eq!(
            selector.select_model(LearningMode::DebugCode, "typo in my loop", complex),
            Model::Fast
        );
        // Only analyse-code and debug-code upgrade.
        assert_eq!(
            selector.select_model(LearningMode::CodeReview, "production service", complex),
            Model::Fast
        );
    }

    #[test]
    fn test_simple_downgrade_requires_indicator() {
        let selector = ModelSelector::default();
        let simple = Some(Complexity::Simple);

        assert_eq!(
            selector.select_model(LearningMode::CreateTutorial, "a quick overview of git", simple),
            Model::Fast
        );
        assert_eq!(
            selector.select_model(LearningMode::CreateTutorial, "ownership in rust", simple),
            Model::Deep
        );
    }

    #[test]
    fn test_thinking_forces_deep_and_raises_ceiling() {
        let selector = ModelSelector::default();
        let input = RoutingInput::new(LearningMode::DebugCode, "fix this").with_thinking(true);
        let plan = selector.plan(&input);

        assert_eq!(plan.model, Model::Deep);
        assert_eq!(plan.max_tokens, 32_000);
        assert!(plan.max_tokens > selector.spec(Model::Deep).max_output);
        assert_eq!(plan.thinking_budget, Some(THINKING_BUDGET_TOKENS));
        assert!(plan.thinking());
    }

    #[test]
    fn test_plan_without_thinking() {
        let selector = ModelSelector::default();
        let plan = selector.plan(&RoutingInput::new(LearningMode::DebugCode, "fix this"));

        assert_eq!(plan.model, Model::Fast);
        assert_eq!(plan.max_tokens, 8192);
        assert_eq!(plan.temperature, 0.1);
        assert_eq!(plan.thinking_budget, None);
    }

    #[test]
    fn test_caller_overrides() {
        let selector = ModelSelector::default();
        let input = RoutingInput::new(LearningMode::DebugCode, "fix this")
            .with_model_override(Some(Model::Deep))
            .with_temperature_override(Some(0.9));
        let plan = selector.plan(&input);

        assert_eq!(plan.model, Model::Deep);
        assert_eq!(plan.temperature, 0.9);
        assert!(plan.reason.contains("caller override"));
    }

    proptest! {
        #[test]
        fn general_chat_is_always_fast(
            query in ".{0,80}",
            complexity in prop_oneof![
                Just(None),
                Just(Some(Complexity::Simple)),
                Just(Some(Complexity::Complex)),
            ]
        ) {
            let selector = ModelSelector::default();
            prop_assert_eq!(
                selector.select_model(LearningMode::GeneralChat, &query, complexity),
                Model::Fast
            );
        }
    }
}
