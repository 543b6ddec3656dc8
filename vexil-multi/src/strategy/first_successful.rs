use super::{
    EvaluationStrategy, FinalResult, ProviderResolutionResult, RunMode,
    StrategyEvaluationContext, StrategyPerProviderContext, collect_provider_errors,
};
use vexil_core::{ErrorType, EvaluationContext, FlagValue, ResolutionDetails};

/// Message of the result returned when every child failed
pub const ALL_PROVIDERS_FAILED_MESSAGE: &str = "All providers failed";

/// Asks children in order and keeps the first success, skipping over any failure
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstSuccessfulStrategy;

impl FirstSuccessfulStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl EvaluationStrategy for FirstSuccessfulStrategy {
    fn name(&self) -> &str {
        "FirstSuccessful"
    }

    fn run_mode(&self) -> RunMode {
        RunMode::Sequential
    }

    fn should_evaluate_next_provider(
        &self,
        _provider_context: &StrategyPerProviderContext,
        _evaluation_context: &EvaluationContext,
        result: &ProviderResolutionResult,
    ) -> bool {
        result.has_error()
    }

    fn determine_final_result(
        &self,
        strategy_context: &StrategyEvaluationContext,
        flag_key: &str,
        default_value: &FlagValue,
        _evaluation_context: &EvaluationContext,
        results: Vec<ProviderResolutionResult>,
    ) -> FinalResult {
        let errors = collect_provider_errors(&results);

        match results.into_iter().find(ProviderResolutionResult::is_success) {
            Some(winner) => winner.into_final_result(Vec::new()),
            None => FinalResult::synthetic(
                strategy_context.multi_provider_name.clone(),
                ResolutionDetails::error(
                    flag_key,
                    default_value.clone(),
                    ErrorType::General,
                    ALL_PROVIDERS_FAILED_MESSAGE,
                ),
                errors,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use vexil_core::{ProviderError, ProviderStatus};

    fn run(results: Vec<ProviderResolutionResult>) -> FinalResult {
        FirstSuccessfulStrategy::new().determine_final_result(
            &strategy_context(),
            "flag",
            &FlagValue::boolean(false),
            &EvaluationContext::new(),
            results,
        )
    }

    #[test]
    fn test_stops_on_success() {
        let strategy = FirstSuccessfulStrategy::new();
        let provider = per_provider("a", ProviderStatus::Ready);
        let ctx = EvaluationContext::new();

        assert!(strategy.should_evaluate_next_provider(
            &provider,
            &ctx,
            &error("a", ErrorType::General)
        ));
        assert!(strategy.should_evaluate_next_provider(
            &provider,
            &ctx,
            &caught("a", ProviderError::Cancelled)
        ));
        assert!(!strategy.should_evaluate_next_provider(&provider, &ctx, &success("a", true)));
    }

    #[test]
    fn test_first_success_wins() {
        let result = run(vec![
            error("a", ErrorType::General),
            error("b", ErrorType::FlagNotFound),
            success("c", true),
        ]);

        assert_eq!(result.provider_name, "c");
        assert!(result.details.is_success());
    }

    #[test]
    fn test_all_failed_reports_every_error() {
        let result = run(vec![
            error("a", ErrorType::General),
            caught("b", ProviderError::Other("timeout".into())),
            error("c", ErrorType::FlagNotFound),
        ]);

        assert_eq!(result.provider_name, "MultiProvider");
        assert_eq!(result.details.error_type, Some(ErrorType::General));
        assert_eq!(
            result.details.error_message.as_deref(),
            Some(ALL_PROVIDERS_FAILED_MESSAGE)
        );

        let names: Vec<_> = result.errors.iter().map(|e| e.provider_name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert!(matches!(result.errors[1].error, ProviderError::Other(_)));
    }
}
