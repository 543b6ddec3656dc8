//! The multi-provider facade
//!
//! [`MultiProvider`] presents several children as one [`FeatureProvider`].
//! It can itself be registered as a child of another facade.

use crate::config::MultiProviderConfig;
use crate::dispatch::Dispatcher;
use crate::events::spawn_event_loops;
use crate::lifecycle::LifecycleCoordinator;
use crate::registry::{ProviderEntry, ProviderRegistry};
use crate::status::StatusTracker;
use crate::strategy::{EvaluationStrategy, FinalResult, FirstMatchStrategy, MismatchCallback};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use vexil_core::{
    CancellationToken, EvaluationContext, EventChannel, FeatureProvider, FlagType, FlagValue,
    ProviderError, ProviderMetadata, ProviderStatus, ResolutionDetails, Result,
};

/// Name used when none is configured
pub const DEFAULT_NAME: &str = "MultiProvider";

/// State shared between the facade and its event loops
pub(crate) struct FacadeState {
    pub(crate) name: String,
    pub(crate) registry: ProviderRegistry,
    pub(crate) status: StatusTracker,
    pub(crate) events: EventChannel,
}

impl FacadeState {
    pub(crate) fn new(name: impl Into<String>, registry: ProviderRegistry) -> Self {
        Self {
            name: name.into(),
            registry,
            status: StatusTracker::new(),
            events: EventChannel::new(),
        }
    }
}

/// Feature provider composed of several child providers.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use vexil_core::{CancellationToken, EvaluationContext, FeatureProvider};
/// use vexil_multi::{FirstSuccessfulStrategy, MultiProvider};
/// # async fn example(
/// #     remote: Arc<dyn FeatureProvider>,
/// #     local: Arc<dyn FeatureProvider>,
/// # ) -> Result<(), Box<dyn std::error::Error>> {
/// let provider = MultiProvider::builder()
///     .name("flags")
///     .provider(remote)
///     .named_provider("fallback", local)
///     .strategy(FirstSuccessfulStrategy::new())
///     .build()?;
///
/// let cancel = CancellationToken::new();
/// provider.initialize(&EvaluationContext::new(), &cancel).await?;
///
/// let details = provider
///     .resolve_boolean("new-ui", false, &EvaluationContext::new(), &cancel)
///     .await?;
/// println!("new-ui = {}", details.value);
///
/// provider.dispose().await?;
/// # Ok(())
/// # }
/// ```
pub struct MultiProvider {
    state: Arc<FacadeState>,
    strategy: Box<dyn EvaluationStrategy>,
    lifecycle: LifecycleCoordinator,
    event_cancel: CancellationToken,
    /// `None` until the event loops have been spawned
    event_tasks: Mutex<Option<Vec<JoinHandle<()>>>>,
    disposed: AtomicBool,
}

impl MultiProvider {
    /// Facade over `entries` using [`FirstMatchStrategy`]
    pub fn new(entries: Vec<ProviderEntry>) -> crate::Result<Self> {
        Self::with_strategy(DEFAULT_NAME, entries, Box::new(FirstMatchStrategy::new()))
    }

    /// Facade with an explicit name and strategy
    pub fn with_strategy(
        name: impl Into<String>,
        entries: Vec<ProviderEntry>,
        strategy: Box<dyn EvaluationStrategy>,
    ) -> crate::Result<Self> {
        let registry = ProviderRegistry::build(entries)?;
        let state = Arc::new(FacadeState::new(name, registry));

        info!(
            name = %state.name,
            providers = state.registry.len(),
            strategy = strategy.name(),
            "Created multi-provider"
        );

        let provider = Self {
            state,
            strategy,
            lifecycle: LifecycleCoordinator::new(),
            event_cancel: CancellationToken::new(),
            event_tasks: Mutex::new(None),
            disposed: AtomicBool::new(false),
        };
        provider.ensure_event_loops();
        Ok(provider)
    }

    /// Facade built from configuration
    pub fn from_config(
        entries: Vec<ProviderEntry>,
        config: &MultiProviderConfig,
        on_mismatch: Option<MismatchCallback>,
    ) -> crate::Result<Self> {
        let strategy = config.strategy.build(on_mismatch);
        Self::with_strategy(config.name.clone(), entries, strategy)
    }

    pub fn builder() -> MultiProviderBuilder {
        MultiProviderBuilder::new()
    }

    pub fn name(&self) -> &str {
        &self.state.name
    }

    pub fn strategy(&self) -> &dyn EvaluationStrategy {
        self.strategy.as_ref()
    }

    /// Registered child names, in registry order
    pub fn provider_names(&self) -> Vec<String> {
        self.state.registry.names()
    }

    /// Snapshot of every child's tracked status, in registry order
    pub fn provider_statuses(&self) -> Vec<(String, ProviderStatus)> {
        self.state
            .registry
            .iter()
            .map(|child| (child.name().to_string(), child.status()))
            .collect()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Evaluate a flag and return the full result, including child errors
    pub async fn evaluate(
        &self,
        flag_key: &str,
        default_value: FlagValue,
        context: &EvaluationContext,
        cancel: &CancellationToken,
    ) -> Result<FinalResult> {
        self.check_disposed()?;

        let result = Dispatcher::new(&self.state.registry, self.strategy.as_ref())
            .evaluate(&self.state.name, flag_key, default_value, context, cancel)
            .await;

        if !result.errors.is_empty() {
            debug!(
                flag_key,
                provider = %result.provider_name,
                errors = result.errors.len(),
                "Evaluation finished with provider errors"
            );
        }
        Ok(result)
    }

    /// Stop the event loops, then shut every child down.
    ///
    /// Later calls are no-ops; every other operation fails afterwards.
    pub async fn dispose(&self) -> Result<()> {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        info!(name = %self.state.name, "Disposing multi-provider");
        self.event_cancel.cancel();

        let tasks = self.event_tasks.lock().take().unwrap_or_default();
        for task in tasks {
            if let Err(e) = task.await
                && !e.is_cancelled()
            {
                warn!(name = %self.state.name, error = %e, "Event loop ended abnormally");
            }
        }

        self.lifecycle
            .shutdown(
                &self.state.registry,
                &self.state.status,
                &CancellationToken::new(),
            )
            .await
    }

    async fn resolve_typed<T: FlagType>(
        &self,
        flag_key: &str,
        default_value: T,
        context: &EvaluationContext,
        cancel: &CancellationToken,
    ) -> Result<ResolutionDetails<T>> {
        let result = self
            .evaluate(flag_key, default_value.clone().into_flag_value(), context, cancel)
            .await?;
        Ok(result.details.into_typed(default_value))
    }

    fn check_disposed(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(ProviderError::Disposed(self.state.name.clone()));
        }
        Ok(())
    }

    /// Spawn the event loops once a runtime is available
    fn ensure_event_loops(&self) {
        let mut tasks = self.event_tasks.lock();
        if tasks.is_some() || self.event_cancel.is_cancelled() {
            return;
        }
        if tokio::runtime::Handle::try_current().is_err() {
            debug!(name = %self.state.name, "No runtime yet, deferring event loops");
            return;
        }
        *tasks = Some(spawn_event_loops(&self.state, &self.event_cancel));
    }
}

impl Drop for MultiProvider {
    fn drop(&mut self) {
        self.event_cancel.cancel();
    }
}

impl fmt::Debug for MultiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiProvider")
            .field("name", &self.state.name)
            .field("strategy", &self.strategy.name())
            .field("providers", &self.state.registry.names())
            .field("status", &self.state.status.get())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[async_trait]
impl FeatureProvider for MultiProvider {
    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata::new(self.state.name.clone())
    }

    fn status(&self) -> ProviderStatus {
        self.state.status.get()
    }

    async fn initialize(&self, context: &EvaluationContext, cancel: &CancellationToken) -> Result<()> {
        self.check_disposed()?;
        self.ensure_event_loops();
        self.lifecycle
            .initialize(&self.state.registry, &self.state.status, context, cancel)
            .await
    }

    async fn shutdown(&self, cancel: &CancellationToken) -> Result<()> {
        self.check_disposed()?;
        self.lifecycle
            .shutdown(&self.state.registry, &self.state.status, cancel)
            .await
    }

    async fn resolve_boolean(
        &self,
        flag_key: &str,
        default_value: bool,
        context: &EvaluationContext,
        cancel: &CancellationToken,
    ) -> Result<ResolutionDetails<bool>> {
        self.resolve_typed(flag_key, default_value, context, cancel).await
    }

    async fn resolve_string(
        &self,
        flag_key: &str,
        default_value: String,
        context: &EvaluationContext,
        cancel: &CancellationToken,
    ) -> Result<ResolutionDetails<String>> {
        self.resolve_typed(flag_key, default_value, context, cancel).await
    }

    async fn resolve_integer(
        &self,
        flag_key: &str,
        default_value: i64,
        context: &EvaluationContext,
        cancel: &CancellationToken,
    ) -> Result<ResolutionDetails<i64>> {
        self.resolve_typed(flag_key, default_value, context, cancel).await
    }

    async fn resolve_float(
        &self,
        flag_key: &str,
        default_value: f64,
        context: &EvaluationContext,
        cancel: &CancellationToken,
    ) -> Result<ResolutionDetails<f64>> {
        self.resolve_typed(flag_key, default_value, context, cancel).await
    }

    async fn resolve_structure(
        &self,
        flag_key: &str,
        default_value: serde_json::Value,
        context: &EvaluationContext,
        cancel: &CancellationToken,
    ) -> Result<ResolutionDetails<serde_json::Value>> {
        self.resolve_typed(flag_key, default_value, context, cancel).await
    }

    fn event_channel(&self) -> Option<EventChannel> {
        Some(self.state.events.clone())
    }
}

/// Builder for [`MultiProvider`]
#[derive(Default)]
pub struct MultiProviderBuilder {
    name: Option<String>,
    entries: Vec<ProviderEntry>,
    strategy: Option<Box<dyn EvaluationStrategy>>,
}

impl MultiProviderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Add a child named after its metadata
    pub fn provider(mut self, provider: Arc<dyn FeatureProvider>) -> Self {
        self.entries.push(ProviderEntry::new(provider));
        self
    }

    /// Add a child under an explicit name
    pub fn named_provider(mut self, name: impl Into<String>, provider: Arc<dyn FeatureProvider>) -> Self {
        self.entries.push(ProviderEntry::named(name, provider));
        self
    }

    pub fn entry(mut self, entry: ProviderEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn strategy(mut self, strategy: impl EvaluationStrategy + 'static) -> Self {
        self.strategy = Some(Box::new(strategy));
        self
    }

    pub fn boxed_strategy(mut self, strategy: Box<dyn EvaluationStrategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn build(self) -> crate::Result<MultiProvider> {
        MultiProvider::with_strategy(
            self.name.unwrap_or_else(|| DEFAULT_NAME.to_string()),
            self.entries,
            self.strategy
                .unwrap_or_else(|| Box::new(FirstMatchStrategy::new())),
        )
    }
}

impl fmt::Debug for MultiProviderBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiProviderBuilder")
            .field("name", &self.name)
            .field("entries", &self.entries)
            .field("strategy", &self.strategy.as_ref().map(|s| s.name().to_string()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MultiProviderError;
    use vexil_core::ErrorType;
    use vexil_testing::MockProvider;

    #[test]
    fn test_construction_without_runtime_defers_event_loops() {
        let provider = MultiProvider::new(vec![ProviderEntry::new(Arc::new(MockProvider::new("a")))])
            .unwrap();

        assert!(provider.event_tasks.lock().is_none());
        assert_eq!(provider.name(), DEFAULT_NAME);
        assert_eq!(provider.status(), ProviderStatus::NotReady);
    }

    #[test]
    fn test_builder_rejects_empty() {
        let result = MultiProvider::builder().name("empty").build();
        assert!(matches!(result, Err(MultiProviderError::NoProviders)));
    }

    #[tokio::test]
    async fn test_typed_resolution_reports_type_mismatch() {
        let child = Arc::new(MockProvider::new("a").with_flag("limit", "ten"));
        let provider = MultiProvider::builder().provider(child).build().unwrap();
        let cancel = CancellationToken::new();
        let ctx = EvaluationContext::new();
        provider.initialize(&ctx, &cancel).await.unwrap();

        let details = provider.resolve_integer("limit", 5, &ctx, &cancel).await.unwrap();

        assert_eq!(details.value, 5);
        assert_eq!(details.error_type, Some(ErrorType::TypeMismatch));
    }

    #[tokio::test]
    async fn test_dispose_is_idempotent() {
        let child = Arc::new(MockProvider::new("a"));
        let provider = MultiProvider::builder().provider(child.clone()).build().unwrap();
        let cancel = CancellationToken::new();
        provider
            .initialize(&EvaluationContext::new(), &cancel)
            .await
            .unwrap();

        provider.dispose().await.unwrap();
        provider.dispose().await.unwrap();

        assert_eq!(child.shutdown_count(), 1);
        assert!(matches!(
            provider.initialize(&EvaluationContext::new(), &cancel).await,
            Err(ProviderError::Disposed(_))
        ));
    }
}
