//! Evaluation dispatch
//!
//! Builds a per-child context for every registered child, filters by the
//! strategy's eligibility rule and resolves the survivors either one by one
//! or concurrently. Results always come back in registry order.

use crate::hooks::resolve_with_hooks;
use crate::registry::ProviderRegistry;
use crate::strategy::{
    EvaluationStrategy, FinalResult, ProviderResolutionResult, RunMode,
    StrategyEvaluationContext, StrategyPerProviderContext,
};
use tracing::{debug, trace};
use vexil_core::{CancellationToken, EvaluationContext, FlagValue, ProviderError};

/// Drives one evaluation through a strategy
pub struct Dispatcher<'a> {
    registry: &'a ProviderRegistry,
    strategy: &'a dyn EvaluationStrategy,
}

impl<'a> Dispatcher<'a> {
    pub fn new(registry: &'a ProviderRegistry, strategy: &'a dyn EvaluationStrategy) -> Self {
        Self { registry, strategy }
    }

    /// Evaluate `flag_key` and reduce the answers to a final result
    pub async fn evaluate(
        &self,
        multi_provider_name: &str,
        flag_key: &str,
        default_value: FlagValue,
        evaluation_context: &EvaluationContext,
        cancel: &CancellationToken,
    ) -> FinalResult {
        let strategy_context = StrategyEvaluationContext {
            flag_key: flag_key.to_string(),
            value_type: default_value.value_type(),
            multi_provider_name: multi_provider_name.to_string(),
        };

        let eligible = self.eligible_providers(flag_key, &default_value, evaluation_context);
        debug!(
            flag_key,
            strategy = self.strategy.name(),
            eligible = eligible.len(),
            "Dispatching evaluation"
        );

        let results = match self.strategy.run_mode() {
            RunMode::Sequential => {
                self.run_sequential(eligible, flag_key, &default_value, evaluation_context, cancel)
                    .await
            }
            RunMode::Parallel => {
                run_parallel(eligible, flag_key, &default_value, evaluation_context, cancel).await
            }
        };

        self.strategy.determine_final_result(
            &strategy_context,
            flag_key,
            &default_value,
            evaluation_context,
            results,
        )
    }

    fn eligible_providers(
        &self,
        flag_key: &str,
        default_value: &FlagValue,
        evaluation_context: &EvaluationContext,
    ) -> Vec<StrategyPerProviderContext> {
        self.registry
            .iter()
            .map(|registered| StrategyPerProviderContext {
                provider: registered.provider().clone(),
                provider_name: registered.name().to_string(),
                provider_status: registered.status(),
                flag_key: flag_key.to_string(),
                value_type: default_value.value_type(),
            })
            .filter(|ctx| {
                let eligible = self
                    .strategy
                    .should_evaluate_this_provider(ctx, evaluation_context);
                if !eligible {
                    trace!(provider = %ctx.provider_name, status = %ctx.provider_status, "Skipping provider");
                }
                eligible
            })
            .collect()
    }

    async fn run_sequential(
        &self,
        providers: Vec<StrategyPerProviderContext>,
        flag_key: &str,
        default_value: &FlagValue,
        evaluation_context: &EvaluationContext,
        cancel: &CancellationToken,
    ) -> Vec<ProviderResolutionResult> {
        let mut results = Vec::with_capacity(providers.len());

        for provider_context in providers {
            if cancel.is_cancelled() {
                debug!(flag_key, "Evaluation cancelled, not scheduling further providers");
                break;
            }

            let result = resolve_with_hooks(
                provider_context.provider.clone(),
                &provider_context.provider_name,
                flag_key,
                default_value.clone(),
                evaluation_context,
                cancel,
            )
            .await;

            let proceed = self.strategy.should_evaluate_next_provider(
                &provider_context,
                evaluation_context,
                &result,
            );
            results.push(result);

            if !proceed {
                break;
            }
        }

        results
    }
}

async fn run_parallel(
    providers: Vec<StrategyPerProviderContext>,
    flag_key: &str,
    default_value: &FlagValue,
    evaluation_context: &EvaluationContext,
    cancel: &CancellationToken,
) -> Vec<ProviderResolutionResult> {
    let handles: Vec<_> = providers
        .iter()
        .map(|provider_context| {
            let provider = provider_context.provider.clone();
            let provider_name = provider_context.provider_name.clone();
            let flag_key = flag_key.to_string();
            let default_value = default_value.clone();
            let evaluation_context = evaluation_context.clone();
            let cancel = cancel.clone();

            tokio::spawn(async move {
                resolve_with_hooks(
                    provider,
                    &provider_name,
                    &flag_key,
                    default_value,
                    &evaluation_context,
                    &cancel,
                )
                .await
            })
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for (provider_context, handle) in providers.into_iter().zip(handles) {
        let result = match handle.await {
            Ok(result) => result,
            Err(join_error) => ProviderResolutionResult::failed(
                provider_context.provider,
                provider_context.provider_name,
                flag_key,
                default_value.clone(),
                ProviderError::from(join_error),
            ),
        };
        results.push(result);
    }
    results
}
