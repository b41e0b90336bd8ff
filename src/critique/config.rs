//! Immutable per-run configuration.

use crate::error::{CritiqueError, Result};
use crate::llm::RetryPolicy;

pub const DEFAULT_MODEL: &str = "deepseek/deepseek-r1";
pub const DEFAULT_ITERATIONS: u32 = 3;
pub const DEFAULT_CRITIQUE_TYPE: &str = "critical review";

/// Everything one run needs, fixed before the first request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Produces the initial answer (iteration 1)
    pub primary_model: String,
    /// Critiques even iterations
    pub critic_a_model: String,
    /// Critiques odd iterations
    pub critic_b_model: String,
    /// Total iterations including the primary turn
    pub iterations: u32,
    /// Free-text style label, e.g. "critical review"
    pub critique_type: String,
    pub user_prompt: String,
    pub include_reasoning: bool,
    pub retry: RetryPolicy,
}

impl RunConfig {
    /// Defaults for everything but the prompt
    pub fn new(user_prompt: impl Into<String>) -> Self {
        Self {
            primary_model: DEFAULT_MODEL.to_string(),
            critic_a_model: DEFAULT_MODEL.to_string(),
            critic_b_model: DEFAULT_MODEL.to_string(),
            iterations: DEFAULT_ITERATIONS,
            critique_type: DEFAULT_CRITIQUE_TYPE.to_string(),
            user_prompt: user_prompt.into(),
            include_reasoning: true,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_models(
        mut self,
        primary: impl Into<String>,
        critic_a: impl Into<String>,
        critic_b: impl Into<String>,
    ) -> Self {
        self.primary_model = primary.into();
        self.critic_a_model = critic_a.into();
        self.critic_b_model = critic_b.into();
        self
    }

    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_critique_type(mut self, critique_type: impl Into<String>) -> Self {
        self.critique_type = critique_type.into();
        self
    }

    pub fn with_reasoning(mut self, include_reasoning: bool) -> Self {
        self.include_reasoning = include_reasoning;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let required = [
            ("primary model", &self.primary_model),
            ("critic A model", &self.critic_a_model),
            ("critic B model", &self.critic_b_model),
            ("critique type", &self.critique_type),
            ("user prompt", &self.user_prompt),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(CritiqueError::Configuration(format!("{} must not be empty", name)));
            }
        }

        if self.iterations == 0 {
            return Err(CritiqueError::Configuration(
                "iterations must be at least 1".to_string(),
            ));
        }

        self.retry.validate()
    }
}

/// Critic for a critique iteration: A on even iterations, B on odd ones
pub fn select_critic(iteration: u32, config: &RunConfig) -> &str {
    if iteration % 2 == 0 {
        &config.critic_a_model
    } else {
        &config.critic_b_model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RunConfig {
        RunConfig::new("what is 2+2?").with_models("primary", "critic-a", "critic-b")
    }

    #[test]
    fn test_defaults() {
        let config = RunConfig::new("q");
        assert_eq!(config.primary_model, DEFAULT_MODEL);
        assert_eq!(config.iterations, 3);
        assert_eq!(config.critique_type, "critical review");
        assert!(config.include_reasoning);
        assert_eq!(config.retry, RetryPolicy::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_select_critic_by_parity() {
        let config = config();
        assert_eq!(select_critic(2, &config), "critic-a");
        assert_eq!(select_critic(3, &config), "critic-b");
        assert_eq!(select_critic(4, &config), "critic-a");
        assert_eq!(select_critic(11, &config), "critic-b");
    }

    #[test]
    fn test_same_model_for_both_critics() {
        let config = RunConfig::new("q").with_models("p", "same", "same");
        assert_eq!(select_critic(2, &config), select_critic(3, &config));
    }

    #[test]
    fn test_validate_rejects_zero_iterations() {
        let err = config().with_iterations(0).validate().unwrap_err();
        assert!(matches!(err, CritiqueError::Configuration(_)));
    }

    #[test]
    fn test_validate_rejects_empty_fields() {
        assert!(RunConfig::new("  ").validate().is_err());
        assert!(config().with_models("", "a", "b").validate().is_err());
        assert!(config().with_models("p", "a", "").validate().is_err());
        assert!(config().with_critique_type("").validate().is_err());
    }

    #[test]
    fn test_validate_checks_retry_policy() {
        let config = config().with_retry(RetryPolicy::from_secs(0, &[]));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_single_iteration_is_valid() {
        assert!(config().with_iterations(1).validate().is_ok());
    }
}
