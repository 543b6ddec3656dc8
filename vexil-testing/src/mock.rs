// Mock providers for testing

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use vexil_core::{
    CancellationToken, ErrorType, EvaluationContext, EventChannel, FeatureProvider, FlagType,
    FlagValue, Hook, ProviderError, ProviderEvent, ProviderMetadata, ProviderStatus,
    ResolutionDetails, Result,
};

/// Scripted answer for one flag
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// Resolve successfully
    Value {
        value: FlagValue,
        variant: Option<String>,
    },
    /// Return resolution details carrying an error type
    Error {
        error_type: ErrorType,
        message: Option<String>,
    },
    /// Fail the call outright
    Fail(ProviderError),
    /// Panic inside the resolver
    Panic(String),
}

/// Scriptable provider that records every call
pub struct MockProvider {
    name: String,
    outcomes: Mutex<HashMap<String, MockOutcome>>,
    init_error: Option<ProviderError>,
    shutdown_error: Option<ProviderError>,
    shutdown_event: Option<ProviderEvent>,
    delay: Option<Duration>,
    hooks: Vec<Arc<dyn Hook>>,
    events: EventChannel,
    status: Mutex<ProviderStatus>,
    calls: Mutex<Vec<String>>,
    contexts: Mutex<Vec<EvaluationContext>>,
    init_count: AtomicUsize,
    shutdown_count: AtomicUsize,
}

impl MockProvider {
    /// Create a mock whose metadata reports `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outcomes: Mutex::new(HashMap::new()),
            init_error: None,
            shutdown_error: None,
            shutdown_event: None,
            delay: None,
            hooks: Vec::new(),
            events: EventChannel::new(),
            status: Mutex::new(ProviderStatus::NotReady),
            calls: Mutex::new(Vec::new()),
            contexts: Mutex::new(Vec::new()),
            init_count: AtomicUsize::new(0),
            shutdown_count: AtomicUsize::new(0),
        }
    }

    /// Resolve `key` to `value`
    pub fn with_flag(self, key: impl Into<String>, value: impl Into<FlagValue>) -> Self {
        self.with_outcome(
            key,
            MockOutcome::Value {
                value: value.into(),
                variant: None,
            },
        )
    }

    /// Resolve `key` to `value` with a variant name
    pub fn with_variant(
        self,
        key: impl Into<String>,
        value: impl Into<FlagValue>,
        variant: impl Into<String>,
    ) -> Self {
        self.with_outcome(
            key,
            MockOutcome::Value {
                value: value.into(),
                variant: Some(variant.into()),
            },
        )
    }

    /// Return an error result for `key`
    pub fn with_flag_error(
        self,
        key: impl Into<String>,
        error_type: ErrorType,
        message: Option<&str>,
    ) -> Self {
        self.with_outcome(
            key,
            MockOutcome::Error {
                error_type,
                message: message.map(str::to_string),
            },
        )
    }

    /// Fail the resolve call for `key`
    pub fn with_flag_failure(self, key: impl Into<String>, error: ProviderError) -> Self {
        self.with_outcome(key, MockOutcome::Fail(error))
    }

    pub fn with_outcome(self, key: impl Into<String>, outcome: MockOutcome) -> Self {
        self.outcomes.lock().insert(key.into(), outcome);
        self
    }

    pub fn with_init_error(mut self, error: ProviderError) -> Self {
        self.init_error = Some(error);
        self
    }

    pub fn with_shutdown_error(mut self, error: ProviderError) -> Self {
        self.shutdown_error = Some(error);
        self
    }

    /// Publish `event` on the provider's channel when shutdown starts
    pub fn with_shutdown_event(mut self, event: ProviderEvent) -> Self {
        self.shutdown_event = Some(event);
        self
    }

    /// Sleep before every resolution
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_hook(mut self, hook: Arc<dyn Hook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Replace the outcome for `key` after construction
    pub fn set_outcome(&self, key: impl Into<String>, outcome: MockOutcome) {
        self.outcomes.lock().insert(key.into(), outcome);
    }

    /// Publish an event as this provider
    pub fn emit(&self, event: ProviderEvent) -> bool {
        self.events.send(event)
    }

    pub fn init_count(&self) -> usize {
        self.init_count.load(Ordering::SeqCst)
    }

    pub fn shutdown_count(&self) -> usize {
        self.shutdown_count.load(Ordering::SeqCst)
    }

    /// Number of resolve calls, across all flags
    pub fn resolve_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.starts_with("resolve:"))
            .count()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn was_called(&self, call: &str) -> bool {
        self.calls.lock().iter().any(|c| c == call)
    }

    /// Contexts received by resolve calls, in call order
    pub fn received_contexts(&self) -> Vec<EvaluationContext> {
        self.contexts.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
        self.contexts.lock().clear();
    }

    fn record_call(&self, call: String) {
        self.calls.lock().push(call);
    }

    async fn resolve<T: FlagType>(
        &self,
        flag_key: &str,
        default_value: T,
        context: &EvaluationContext,
        cancel: &CancellationToken,
    ) -> Result<ResolutionDetails<T>> {
        self.record_call(format!("resolve:{}", flag_key));
        self.contexts.lock().push(context.clone());

        if let Some(delay) = self.delay {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            }
        }

        let outcome = self.outcomes.lock().get(flag_key).cloned();
        match outcome {
            None => Ok(ResolutionDetails::error(
                flag_key,
                default_value,
                ErrorType::FlagNotFound,
                format!("flag '{}' not found in {}", flag_key, self.name),
            )),
            Some(MockOutcome::Value { value, variant }) => match T::from_flag_value(value) {
                Some(typed) => {
                    let mut details = ResolutionDetails::success(flag_key, typed);
                    details.variant = variant;
                    Ok(details)
                }
                None => Ok(ResolutionDetails::error(
                    flag_key,
                    default_value,
                    ErrorType::TypeMismatch,
                    format!("flag '{}' is not a {}", flag_key, T::VALUE_TYPE),
                )),
            },
            Some(MockOutcome::Error {
                error_type,
                message,
            }) => {
                let mut details =
                    ResolutionDetails::error(flag_key, default_value, error_type, "");
                details.error_message = message;
                Ok(details)
            }
            Some(MockOutcome::Fail(error)) => Err(error),
            Some(MockOutcome::Panic(message)) => panic!("{}", message),
        }
    }
}

#[async_trait]
impl FeatureProvider for MockProvider {
    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata::new(self.name.clone())
    }

    fn status(&self) -> ProviderStatus {
        *self.status.lock()
    }

    async fn initialize(
        &self,
        _context: &EvaluationContext,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        self.init_count.fetch_add(1, Ordering::SeqCst);
        self.record_call("initialize".to_string());

        match &self.init_error {
            Some(error) => {
                *self.status.lock() = ProviderStatus::Fatal;
                Err(error.clone())
            }
            None => {
                *self.status.lock() = ProviderStatus::Ready;
                Ok(())
            }
        }
    }

    async fn shutdown(&self, _cancel: &CancellationToken) -> Result<()> {
        self.shutdown_count.fetch_add(1, Ordering::SeqCst);
        self.record_call("shutdown".to_string());

        if let Some(event) = &self.shutdown_event {
            self.events.send(event.clone());
        }

        match &self.shutdown_error {
            Some(error) => Err(error.clone()),
            None => {
                *self.status.lock() = ProviderStatus::NotReady;
                Ok(())
            }
        }
    }

    async fn resolve_boolean(
        &self,
        flag_key: &str,
        default_value: bool,
        context: &EvaluationContext,
        cancel: &CancellationToken,
    ) -> Result<ResolutionDetails<bool>> {
        self.resolve(flag_key, default_value, context, cancel).await
    }

    async fn resolve_string(
        &self,
        flag_key: &str,
        default_value: String,
        context: &EvaluationContext,
        cancel: &CancellationToken,
    ) -> Result<ResolutionDetails<String>> {
        self.resolve(flag_key, default_value, context, cancel).await
    }

    async fn resolve_integer(
        &self,
        flag_key: &str,
        default_value: i64,
        context: &EvaluationContext,
        cancel: &CancellationToken,
    ) -> Result<ResolutionDetails<i64>> {
        self.resolve(flag_key, default_value, context, cancel).await
    }

    async fn resolve_float(
        &self,
        flag_key: &str,
        default_value: f64,
        context: &EvaluationContext,
        cancel: &CancellationToken,
    ) -> Result<ResolutionDetails<f64>> {
        self.resolve(flag_key, default_value, context, cancel).await
    }

    async fn resolve_structure(
        &self,
        flag_key: &str,
        default_value: serde_json::Value,
        context: &EvaluationContext,
        cancel: &CancellationToken,
    ) -> Result<ResolutionDetails<serde_json::Value>> {
        self.resolve(flag_key, default_value, context, cancel).await
    }

    fn event_channel(&self) -> Option<EventChannel> {
        Some(self.events.clone())
    }

    fn hooks(&self) -> Vec<Arc<dyn Hook>> {
        self.hooks.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_resolves_scripted_values() {
        let provider = MockProvider::new("mock").with_variant("color", "blue", "b");
        let cancel = CancellationToken::new();

        let details = provider
            .resolve_string("color", "red".into(), &EvaluationContext::new(), &cancel)
            .await
            .unwrap();

        assert_eq!(details.value, "blue");
        assert_eq!(details.variant.as_deref(), Some("b"));
        assert!(provider.was_called("resolve:color"));
    }

    #[tokio::test]
    async fn test_mock_unknown_flag_is_not_found() {
        let provider = MockProvider::new("mock");
        let cancel = CancellationToken::new();

        let details = provider
            .resolve_boolean("missing", true, &EvaluationContext::new(), &cancel)
            .await
            .unwrap();

        assert!(details.value);
        assert_eq!(details.error_type, Some(ErrorType::FlagNotFound));
    }

    #[tokio::test]
    async fn test_mock_lifecycle_counters() {
        let provider =
            MockProvider::new("mock").with_init_error(ProviderError::general("cannot start"));
        let cancel = CancellationToken::new();

        assert!(
            provider
                .initialize(&EvaluationContext::new(), &cancel)
                .await
                .is_err()
        );
        assert_eq!(provider.init_count(), 1);
        assert_eq!(provider.status(), ProviderStatus::Fatal);

        provider.shutdown(&cancel).await.unwrap();
        assert_eq!(provider.shutdown_count(), 1);
        assert_eq!(provider.calls(), vec!["initialize", "shutdown"]);
    }
}
