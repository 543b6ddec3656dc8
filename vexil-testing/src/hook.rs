// Recording hooks for testing

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use vexil_core::{
    CancellationToken, EvaluationContext, FlagValue, Hook, HookContext, HookHints, HookResult,
    HookStage, ProviderError, ResolutionDetails,
};

/// Shared, ordered log of hook invocations (`"<hook>:<stage>"`)
pub type HookLog = Arc<Mutex<Vec<String>>>;

/// Create an empty hook log
pub fn hook_log() -> HookLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Hook that records each stage it sees
#[derive(Clone)]
pub struct RecordingHook {
    name: String,
    log: HookLog,
    fail_on: Option<HookStage>,
    before_context: Option<EvaluationContext>,
    seen_contexts: Arc<Mutex<Vec<(HookStage, EvaluationContext)>>>,
}

impl RecordingHook {
    pub fn new(name: impl Into<String>, log: HookLog) -> Self {
        Self {
            name: name.into(),
            log,
            fail_on: None,
            before_context: None,
            seen_contexts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Fail when `stage` runs
    pub fn failing_on(mut self, stage: HookStage) -> Self {
        self.fail_on = Some(stage);
        self
    }

    /// Return `context` from `before`
    pub fn replacing_context(mut self, context: EvaluationContext) -> Self {
        self.before_context = Some(context);
        self
    }

    /// Contexts this hook observed, with the stage that observed them
    pub fn seen_contexts(&self) -> Vec<(HookStage, EvaluationContext)> {
        self.seen_contexts.lock().clone()
    }

    fn record(&self, stage: HookStage, context: &HookContext) -> HookResult {
        self.log.lock().push(format!("{}:{}", self.name, stage));
        self.seen_contexts
            .lock()
            .push((stage, context.evaluation_context.clone()));

        if self.fail_on == Some(stage) {
            return Err(ProviderError::Hook {
                hook: self.name.clone(),
                stage,
                message: "scripted failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Hook for RecordingHook {
    fn name(&self) -> &str {
        &self.name
    }

    async fn before(
        &self,
        context: &HookContext,
        _hints: &HookHints,
        _cancel: &CancellationToken,
    ) -> HookResult<Option<EvaluationContext>> {
        self.record(HookStage::Before, context)?;
        Ok(self.before_context.clone())
    }

    async fn after(
        &self,
        context: &HookContext,
        _details: &ResolutionDetails<FlagValue>,
        _hints: &HookHints,
        _cancel: &CancellationToken,
    ) -> HookResult {
        self.record(HookStage::After, context)
    }

    async fn error(
        &self,
        context: &HookContext,
        _error: &ProviderError,
        _hints: &HookHints,
        _cancel: &CancellationToken,
    ) -> HookResult {
        self.record(HookStage::Error, context)
    }

    async fn finally(
        &self,
        context: &HookContext,
        _details: &ResolutionDetails<FlagValue>,
        _hints: &HookHints,
        _cancel: &CancellationToken,
    ) -> HookResult {
        self.record(HookStage::Finally, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recording_hook_logs_and_fails() {
        let log = hook_log();
        let hook = RecordingHook::new("audit", log.clone()).failing_on(HookStage::Finally);
        let context = HookContext::new(
            "flag",
            FlagValue::boolean(false),
            "mock",
            EvaluationContext::new(),
        );
        let hints = HookHints::new();
        let cancel = CancellationToken::new();
        let details = ResolutionDetails::success("flag", FlagValue::boolean(true));

        assert!(hook.before(&context, &hints, &cancel).await.is_ok());
        assert!(hook.finally(&context, &details, &hints, &cancel).await.is_err());
        assert_eq!(*log.lock(), vec!["audit:before", "audit:finally"]);
    }
}
