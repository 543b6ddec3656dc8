// Hooks run around every provider resolution

use crate::{EvaluationContext, FlagValue, FlagValueType, ProviderError, ResolutionDetails};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

/// Result of a hook stage
pub type HookResult<T = ()> = Result<T, ProviderError>;

/// Free-form hints passed to every hook stage
pub type HookHints = HashMap<String, FlagValue>;

/// Data available to hooks during one evaluation
#[derive(Debug, Clone)]
pub struct HookContext {
    pub flag_key: String,
    pub value_type: FlagValueType,
    pub default_value: FlagValue,
    pub provider_name: String,
    /// Context as seen by this stage (after earlier `before` replacements)
    pub evaluation_context: EvaluationContext,
}

impl HookContext {
    pub fn new(
        flag_key: impl Into<String>,
        default_value: FlagValue,
        provider_name: impl Into<String>,
        evaluation_context: EvaluationContext,
    ) -> Self {
        Self {
            flag_key: flag_key.into(),
            value_type: default_value.value_type(),
            default_value,
            provider_name: provider_name.into(),
            evaluation_context,
        }
    }
}

/// Interceptor invoked around flag resolution.
///
/// Every stage has a no-op default so hooks only implement what they need.
#[async_trait]
pub trait Hook: Send + Sync {
    /// Name used in logs and errors
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Runs before resolution; may return a context to merge over the current one
    async fn before(
        &self,
        _context: &HookContext,
        _hints: &HookHints,
        _cancel: &CancellationToken,
    ) -> HookResult<Option<EvaluationContext>> {
        Ok(None)
    }

    /// Runs after a successful resolution
    async fn after(
        &self,
        _context: &HookContext,
        _details: &ResolutionDetails<FlagValue>,
        _hints: &HookHints,
        _cancel: &CancellationToken,
    ) -> HookResult {
        Ok(())
    }

    /// Runs when resolution (or an earlier stage) failed
    async fn error(
        &self,
        _context: &HookContext,
        _error: &ProviderError,
        _hints: &HookHints,
        _cancel: &CancellationToken,
    ) -> HookResult {
        Ok(())
    }

    /// Runs unconditionally at the end
    async fn finally(
        &self,
        _context: &HookContext,
        _details: &ResolutionDetails<FlagValue>,
        _hints: &HookHints,
        _cancel: &CancellationToken,
    ) -> HookResult {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopHook;

    #[async_trait]
    impl Hook for NoopHook {}

    #[tokio::test]
    async fn test_default_stages_are_noops() {
        let hook = NoopHook;
        let context = HookContext::new(
            "flag",
            FlagValue::boolean(false),
            "provider",
            EvaluationContext::new(),
        );
        let hints = HookHints::new();
        let cancel = CancellationToken::new();

        let replaced = hook.before(&context, &hints, &cancel).await.unwrap();
        assert!(replaced.is_none());

        let details = ResolutionDetails::success("flag", FlagValue::boolean(true));
        assert!(hook.after(&context, &details, &hints, &cancel).await.is_ok());
        assert!(hook.finally(&context, &details, &hints, &cancel).await.is_ok());
    }

    #[test]
    fn test_hook_context_value_type() {
        let context = HookContext::new(
            "limit",
            FlagValue::integer(3),
            "provider",
            EvaluationContext::new(),
        );
        assert_eq!(context.value_type, FlagValueType::Integer);
    }
}
