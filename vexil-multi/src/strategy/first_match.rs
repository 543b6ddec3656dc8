use super::{
    EvaluationStrategy, FinalResult, NO_PROVIDERS_MESSAGE, ProviderErrorEntry,
    ProviderResolutionResult, RunMode, StrategyEvaluationContext, StrategyPerProviderContext,
    collect_provider_errors,
};
use vexil_core::{ErrorType, EvaluationContext, FlagValue, ProviderError};

/// Asks children in order and keeps the first answer that is not `FlagNotFound`.
///
/// Any other error (including a failed call) ends the walk and becomes the
/// final result.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstMatchStrategy;

impl FirstMatchStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl EvaluationStrategy for FirstMatchStrategy {
    fn name(&self) -> &str {
        "FirstMatch"
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
        result.error.is_none() && result.details.error_type == Some(ErrorType::FlagNotFound)
    }

    fn determine_final_result(
        &self,
        strategy_context: &StrategyEvaluationContext,
        _flag_key: &str,
        default_value: &FlagValue,
        _evaluation_context: &EvaluationContext,
        mut results: Vec<ProviderResolutionResult>,
    ) -> FinalResult {
        let errors = collect_provider_errors(&results);

        match results.pop() {
            Some(last) if last.is_success() => last.into_final_result(Vec::new()),
            Some(last) => last.into_final_result(errors),
            None => {
                let error = ProviderErrorEntry {
                    provider_name: strategy_context.multi_provider_name.clone(),
                    error: ProviderError::resolution(
                        ErrorType::ProviderNotReady,
                        NO_PROVIDERS_MESSAGE,
                    ),
                };
                FinalResult::not_ready(strategy_context, default_value.clone(), vec![error])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use vexil_core::ProviderStatus;

    fn run(results: Vec<ProviderResolutionResult>) -> FinalResult {
        FirstMatchStrategy::new().determine_final_result(
            &strategy_context(),
            "flag",
            &FlagValue::boolean(false),
            &EvaluationContext::new(),
            results,
        )
    }

    #[test]
    fn test_continues_only_on_flag_not_found() {
        let strategy = FirstMatchStrategy::new();
        let provider = per_provider("a", ProviderStatus::Ready);
        let ctx = EvaluationContext::new();

        assert!(strategy.should_evaluate_next_provider(
            &provider,
            &ctx,
            &error("a", ErrorType::FlagNotFound)
        ));
        assert!(!strategy.should_evaluate_next_provider(
            &provider,
            &ctx,
            &error("a", ErrorType::General)
        ));
        assert!(!strategy.should_evaluate_next_provider(&provider, &ctx, &success("a", true)));
        assert!(!strategy.should_evaluate_next_provider(
            &provider,
            &ctx,
            &caught("a", ProviderError::flag_not_found("flag"))
        ));
    }

    #[test]
    fn test_last_result_wins() {
        let result = run(vec![
            error("a", ErrorType::FlagNotFound),
            error("b", ErrorType::FlagNotFound),
            success("c", true),
        ]);

        assert_eq!(result.provider_name, "c");
        assert_eq!(result.details.value, FlagValue::boolean(true));
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_error_after_not_found_is_final() {
        let result = run(vec![
            error("a", ErrorType::FlagNotFound),
            error("b", ErrorType::General),
        ]);

        assert_eq!(result.provider_name, "b");
        assert_eq!(result.details.error_type, Some(ErrorType::General));
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn test_no_results_is_not_ready() {
        let result = run(Vec::new());

        assert_eq!(result.provider_name, "MultiProvider");
        assert!(result.provider.is_none());
        assert_eq!(result.details.error_type, Some(ErrorType::ProviderNotReady));
        assert_eq!(
            result.details.error_message.as_deref(),
            Some(NO_PROVIDERS_MESSAGE)
        );
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].provider_name, "MultiProvider");
    }
}
