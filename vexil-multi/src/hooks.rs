//! Hook pipeline around a single child resolution
//!
//! Stage order for one child:
//!
//! 1. `before`, in declared order. Returned contexts are merged over the current one.
//! 2. The child's resolver.
//! 3. `after`, in reverse order, only when resolution succeeded.
//! 4. `error`, in reverse order, when anything above failed.
//! 5. `finally`, in reverse order, always.
//!
//! Failures in `error` and `finally` are logged and swallowed.

use crate::strategy::ProviderResolutionResult;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, warn};
use vexil_core::{
    CancellationToken, EvaluationContext, FeatureProvider, FlagValue, Hook, HookContext,
    HookHints, HookResult, ProviderError, ResolutionDetails, resolve_flag_value,
};

/// Runs one child's hooks
pub struct HookRunner {
    hooks: Vec<Arc<dyn Hook>>,
    hints: HookHints,
}

impl HookRunner {
    pub fn new(hooks: Vec<Arc<dyn Hook>>) -> Self {
        Self {
            hooks,
            hints: HookHints::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Run `before` hooks in order; stops at the first failure
    pub async fn run_before(
        &self,
        context: &mut HookContext,
        cancel: &CancellationToken,
    ) -> HookResult {
        for hook in &self.hooks {
            if let Some(replacement) = hook.before(context, &self.hints, cancel).await? {
                context.evaluation_context = context.evaluation_context.merge(&replacement);
            }
        }
        Ok(())
    }

    /// Run `after` hooks in reverse order; stops at the first failure
    pub async fn run_after(
        &self,
        context: &HookContext,
        details: &ResolutionDetails<FlagValue>,
        cancel: &CancellationToken,
    ) -> HookResult {
        for hook in self.hooks.iter().rev() {
            hook.after(context, details, &self.hints, cancel).await?;
        }
        Ok(())
    }

    /// Run `error` hooks in reverse order
    pub async fn run_error(
        &self,
        context: &HookContext,
        failure: &ProviderError,
        cancel: &CancellationToken,
    ) {
        for hook in self.hooks.iter().rev() {
            if let Err(e) = hook.error(context, failure, &self.hints, cancel).await {
                error!(
                    hook = hook.name(),
                    provider = %context.provider_name,
                    flag_key = %context.flag_key,
                    error = %e,
                    "Error hook failed"
                );
            }
        }
    }

    /// Run `finally` hooks in reverse order
    pub async fn run_finally(
        &self,
        context: &HookContext,
        details: &ResolutionDetails<FlagValue>,
        cancel: &CancellationToken,
    ) {
        for hook in self.hooks.iter().rev() {
            if let Err(e) = hook.finally(context, details, &self.hints, cancel).await {
                warn!(
                    hook = hook.name(),
                    provider = %context.provider_name,
                    flag_key = %context.flag_key,
                    error = %e,
                    "Finally hook failed"
                );
            }
        }
    }
}

/// Resolve `flag_key` against one child, running its hooks.
///
/// Never fails: errors from the child or its hooks end up on the returned result.
pub async fn resolve_with_hooks(
    provider: Arc<dyn FeatureProvider>,
    provider_name: &str,
    flag_key: &str,
    default_value: FlagValue,
    evaluation_context: &EvaluationContext,
    cancel: &CancellationToken,
) -> ProviderResolutionResult {
    let runner = HookRunner::new(provider.hooks());
    let mut hook_context = HookContext::new(
        flag_key,
        default_value.clone(),
        provider_name,
        evaluation_context.clone(),
    );

    let failed = |error: ProviderError| {
        ProviderResolutionResult::failed(
            provider.clone(),
            provider_name,
            flag_key,
            default_value.clone(),
            error,
        )
    };

    let result = match runner.run_before(&mut hook_context, cancel).await {
        Err(e) => {
            warn!(provider = %provider_name, flag_key, error = %e, "Before hook failed");
            failed(e)
        }
        Ok(()) => {
            let resolution = AssertUnwindSafe(resolve_flag_value(
                provider.as_ref(),
                flag_key,
                default_value.clone(),
                &hook_context.evaluation_context,
                cancel,
            ))
            .catch_unwind()
            .await;

            match resolution {
                Ok(Ok(details)) if details.is_success() => {
                    match runner.run_after(&hook_context, &details, cancel).await {
                        Ok(()) => {
                            ProviderResolutionResult::new(provider.clone(), provider_name, details)
                        }
                        Err(e) => {
                            warn!(provider = %provider_name, flag_key, error = %e, "After hook failed");
                            failed(e)
                        }
                    }
                }
                Ok(Ok(details)) => {
                    ProviderResolutionResult::new(provider.clone(), provider_name, details)
                }
                Ok(Err(e)) => {
                    debug!(provider = %provider_name, flag_key, error = %e, "Provider failed");
                    failed(e)
                }
                Err(panic) => {
                    error!(provider = %provider_name, flag_key, "Provider panicked");
                    failed(ProviderError::Task(panic_message(panic.as_ref())))
                }
            }
        }
    };

    if result.has_error() && !runner.is_empty() {
        let failure = match &result.error {
            Some(e) => e.clone(),
            None => ProviderError::resolution(
                result
                    .details
                    .error_type
                    .unwrap_or(vexil_core::ErrorType::General),
                result.details.error_message.clone().unwrap_or_default(),
            ),
        };
        runner.run_error(&hook_context, &failure, cancel).await;
    }
    runner
        .run_finally(&hook_context, &result.details, cancel)
        .await;

    result
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vexil_core::{ErrorType, HookStage};
    use vexil_testing::{MockOutcome, MockProvider, RecordingHook, hook_log};

    async fn resolve(provider: MockProvider, flag_key: &str) -> ProviderResolutionResult {
        resolve_with_hooks(
            Arc::new(provider),
            "mock",
            flag_key,
            FlagValue::boolean(false),
            &EvaluationContext::new().with_attribute("plan", "free"),
            &CancellationToken::new(),
        )
        .await
    }

    #[tokio::test]
    async fn test_stage_order_on_success() {
        let log = hook_log();
        let provider = MockProvider::new("mock")
            .with_flag("flag", true)
            .with_hook(Arc::new(RecordingHook::new("first", log.clone())))
            .with_hook(Arc::new(RecordingHook::new("second", log.clone())));

        let result = resolve(provider, "flag").await;

        assert!(result.is_success());
        assert_eq!(
            *log.lock(),
            vec![
                "first:before",
                "second:before",
                "second:after",
                "first:after",
                "second:finally",
                "first:finally",
            ]
        );
    }

    #[tokio::test]
    async fn test_error_result_runs_error_hooks() {
        let log = hook_log();
        let provider = MockProvider::new("mock")
            .with_hook(Arc::new(RecordingHook::new("audit", log.clone())));

        let result = resolve(provider, "missing").await;

        assert_eq!(result.details.error_type, Some(ErrorType::FlagNotFound));
        assert!(result.error.is_none());
        assert_eq!(
            *log.lock(),
            vec!["audit:before", "audit:error", "audit:finally"]
        );
    }

    #[tokio::test]
    async fn test_before_failure_skips_resolver() {
        let log = hook_log();
        let provider = Arc::new(
            MockProvider::new("mock")
                .with_flag("flag", true)
                .with_hook(Arc::new(
                    RecordingHook::new("guard", log.clone()).failing_on(HookStage::Before),
                )),
        );

        let result = resolve_with_hooks(
            provider.clone(),
            "mock",
            "flag",
            FlagValue::boolean(false),
            &EvaluationContext::new(),
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(result.details.error_type, Some(ErrorType::General));
        assert!(matches!(result.error, Some(ProviderError::Hook { .. })));
        assert_eq!(provider.resolve_count(), 0);
        assert_eq!(
            *log.lock(),
            vec!["guard:before", "guard:error", "guard:finally"]
        );
    }

    #[tokio::test]
    async fn test_after_failure_turns_result_into_error() {
        let log = hook_log();
        let provider = MockProvider::new("mock")
            .with_flag("flag", true)
            .with_hook(Arc::new(
                RecordingHook::new("check", log.clone()).failing_on(HookStage::After),
            ));

        let result = resolve(provider, "flag").await;

        assert_eq!(result.details.error_type, Some(ErrorType::General));
        assert_eq!(result.details.value, FlagValue::boolean(false));
        assert_eq!(
            *log.lock(),
            vec!["check:before", "check:after", "check:error", "check:finally"]
        );
    }

    #[tokio::test]
    async fn test_finally_failure_is_swallowed() {
        let log = hook_log();
        let provider = MockProvider::new("mock")
            .with_flag("flag", true)
            .with_hook(Arc::new(
                RecordingHook::new("noisy", log.clone()).failing_on(HookStage::Finally),
            ));

        let result = resolve(provider, "flag").await;

        assert!(result.is_success());
        assert_eq!(result.details.value, FlagValue::boolean(true));
    }

    #[tokio::test]
    async fn test_before_context_is_merged() {
        let log = hook_log();
        let enrich = RecordingHook::new("enrich", log.clone())
            .replacing_context(EvaluationContext::new().with_attribute("plan", "pro"));
        let observer = RecordingHook::new("observer", log.clone());
        let provider = Arc::new(
            MockProvider::new("mock")
                .with_flag("flag", true)
                .with_hook(Arc::new(enrich))
                .with_hook(Arc::new(observer.clone())),
        );

        resolve_with_hooks(
            provider.clone(),
            "mock",
            "flag",
            FlagValue::boolean(false),
            &EvaluationContext::new()
                .with_targeting_key("user-1")
                .with_attribute("plan", "free"),
            &CancellationToken::new(),
        )
        .await;

        let received = provider.received_contexts();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].get("plan"), Some(&FlagValue::string("pro")));
        assert_eq!(received[0].targeting_key(), Some("user-1"));

        let seen = observer.seen_contexts();
        assert_eq!(seen[0].1.get("plan"), Some(&FlagValue::string("pro")));
    }

    #[tokio::test]
    async fn test_provider_failure_and_panic_are_caught() {
        let provider = MockProvider::new("mock")
            .with_flag_failure("broken", ProviderError::Other("connection reset".into()))
            .with_outcome("panics", MockOutcome::Panic("resolver exploded".into()));
        let provider: Arc<dyn FeatureProvider> = Arc::new(provider);
        let cancel = CancellationToken::new();
        let context = EvaluationContext::new();

        let result = resolve_with_hooks(
            provider.clone(),
            "mock",
            "broken",
            FlagValue::boolean(false),
            &context,
            &cancel,
        )
        .await;
        assert!(matches!(result.error, Some(ProviderError::Other(_))));

        let result = resolve_with_hooks(
            provider,
            "mock",
            "panics",
            FlagValue::boolean(false),
            &context,
            &cancel,
        )
        .await;
        match result.error {
            Some(ProviderError::Task(message)) => assert!(message.contains("resolver exploded")),
            other => panic!("expected task error, got {:?}", other),
        }
    }
}
