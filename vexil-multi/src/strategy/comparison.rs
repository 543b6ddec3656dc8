use super::{
    EvaluationStrategy, FinalResult, ProviderResolutionResult, RunMode,
    StrategyEvaluationContext, collect_provider_errors,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::warn;
use vexil_core::{EvaluationContext, FlagValue};

/// Called with `{provider name -> value}` of every success when children disagree
pub type MismatchCallback = Arc<dyn Fn(&HashMap<String, FlagValue>) + Send + Sync>;

/// Asks every child at once and compares the successful answers.
///
/// When they disagree the mismatch callback fires, and the fallback child's
/// answer (if configured and successful) is preferred over the first one.
#[derive(Clone, Default)]
pub struct ComparisonStrategy {
    fallback_provider: Option<String>,
    on_mismatch: Option<MismatchCallback>,
}

impl ComparisonStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefer this child's answer on disagreement
    pub fn with_fallback_provider(mut self, name: impl Into<String>) -> Self {
        self.fallback_provider = Some(name.into());
        self
    }

    pub fn with_mismatch_callback(
        mut self,
        callback: impl Fn(&HashMap<String, FlagValue>) + Send + Sync + 'static,
    ) -> Self {
        self.on_mismatch = Some(Arc::new(callback));
        self
    }

    pub(crate) fn with_shared_callback(mut self, callback: Option<MismatchCallback>) -> Self {
        self.on_mismatch = callback;
        self
    }

    pub fn fallback_provider(&self) -> Option<&str> {
        self.fallback_provider.as_deref()
    }
}

impl fmt::Debug for ComparisonStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComparisonStrategy")
            .field("fallback_provider", &self.fallback_provider)
            .field("has_mismatch_callback", &self.on_mismatch.is_some())
            .finish()
    }
}

impl EvaluationStrategy for ComparisonStrategy {
    fn name(&self) -> &str {
        "Comparison"
    }

    fn run_mode(&self) -> RunMode {
        RunMode::Parallel
    }

    fn determine_final_result(
        &self,
        strategy_context: &StrategyEvaluationContext,
        _flag_key: &str,
        default_value: &FlagValue,
        _evaluation_context: &EvaluationContext,
        results: Vec<ProviderResolutionResult>,
    ) -> FinalResult {
        let errors = collect_provider_errors(&results);
        let mut successes: Vec<ProviderResolutionResult> = results
            .into_iter()
            .filter(ProviderResolutionResult::is_success)
            .collect();

        if successes.is_empty() {
            return FinalResult::not_ready(strategy_context, default_value.clone(), errors);
        }

        let first_value = &successes[0].details.value;
        let agree = successes.iter().all(|r| &r.details.value == first_value);

        if !agree {
            warn!(
                flag_key = %strategy_context.flag_key,
                providers = successes.len(),
                "Providers disagree on flag value"
            );

            if let Some(callback) = &self.on_mismatch {
                let values: HashMap<String, FlagValue> = successes
                    .iter()
                    .map(|r| (r.provider_name.clone(), r.details.value.clone()))
                    .collect();
                callback(&values);
            }

            if let Some(fallback) = &self.fallback_provider
                && let Some(index) = successes.iter().position(|r| &r.provider_name == fallback)
            {
                return successes.swap_remove(index).into_final_result(Vec::new());
            }
        }

        successes.swap_remove(0).into_final_result(Vec::new())
    }
}
