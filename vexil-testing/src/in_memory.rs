//! In-memory provider
//!
//! Serves flags from a table of variants. Useful as a local fallback and in tests.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use vexil_core::{
    CancellationToken, ErrorType, EvaluationContext, EventChannel, FeatureProvider, FlagType,
    FlagValue, ProviderEvent, ProviderMetadata, ProviderStatus, Reason, ResolutionDetails, Result,
};

/// Picks a variant name for a context; `None` falls back to the default variant
pub type ContextEvaluator = Arc<dyn Fn(&EvaluationContext) -> Option<String> + Send + Sync>;

/// Flag definition
#[derive(Clone)]
pub struct InMemoryFlag {
    /// Available variants by name
    pub variants: HashMap<String, FlagValue>,

    /// Variant served when targeting does not pick one
    pub default_variant: String,

    /// Disabled flags resolve to the caller's default
    pub disabled: bool,

    /// Targeting
    pub evaluator: Option<ContextEvaluator>,
}

impl InMemoryFlag {
    /// Flag with the given variants
    pub fn new(default_variant: impl Into<String>, variants: Vec<(&str, FlagValue)>) -> Self {
        Self {
            variants: variants
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
            default_variant: default_variant.into(),
            disabled: false,
            evaluator: None,
        }
    }

    /// Boolean flag with `on`/`off` variants
    pub fn boolean(default_value: bool) -> Self {
        let default_variant = if default_value { "on" } else { "off" };
        Self::new(
            default_variant,
            vec![
                ("on", FlagValue::Boolean(true)),
                ("off", FlagValue::Boolean(false)),
            ],
        )
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    pub fn with_evaluator(
        mut self,
        evaluator: impl Fn(&EvaluationContext) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.evaluator = Some(Arc::new(evaluator));
        self
    }

    fn evaluate<T: FlagType>(
        &self,
        flag_key: &str,
        default_value: T,
        context: &EvaluationContext,
    ) -> ResolutionDetails<T> {
        if self.disabled {
            return ResolutionDetails::success(flag_key, default_value).with_reason(Reason::Disabled);
        }

        let (variant, reason) = match self.evaluator.as_ref().and_then(|f| f(context)) {
            Some(variant) => (variant, Reason::TargetingMatch),
            None => (self.default_variant.clone(), Reason::Static),
        };

        let Some(value) = self.variants.get(&variant) else {
            return ResolutionDetails::error(
                flag_key,
                default_value,
                ErrorType::General,
                format!("variant '{}' is not defined", variant),
            );
        };

        match T::from_flag_value(value.clone()) {
            Some(typed) => ResolutionDetails::success(flag_key, typed)
                .with_variant(variant)
                .with_reason(reason),
            None => ResolutionDetails::error(
                flag_key,
                default_value,
                ErrorType::TypeMismatch,
                format!("flag '{}' is not a {}", flag_key, T::VALUE_TYPE),
            ),
        }
    }
}

impl fmt::Debug for InMemoryFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryFlag")
            .field("variants", &self.variants)
            .field("default_variant", &self.default_variant)
            .field("disabled", &self.disabled)
            .field("targeted", &self.evaluator.is_some())
            .finish()
    }
}

/// Provider serving an in-memory flag table
pub struct InMemoryProvider {
    name: String,
    flags: RwLock<HashMap<String, InMemoryFlag>>,
    status: RwLock<ProviderStatus>,
    events: EventChannel,
}

impl InMemoryProvider {
    pub fn new(flags: HashMap<String, InMemoryFlag>) -> Self {
        Self::named("InMemory", flags)
    }

    pub fn named(name: impl Into<String>, flags: HashMap<String, InMemoryFlag>) -> Self {
        Self {
            name: name.into(),
            flags: RwLock::new(flags),
            status: RwLock::new(ProviderStatus::NotReady),
            events: EventChannel::new(),
        }
    }

    /// Replace the flag table and announce the changed keys
    pub fn update_flags(&self, flags: HashMap<String, InMemoryFlag>) {
        let mut changed: Vec<String> = {
            let current = self.flags.read();
            current.keys().chain(flags.keys()).cloned().collect()
        };
        changed.sort();
        changed.dedup();

        *self.flags.write() = flags;
        self.events
            .send(ProviderEvent::configuration_changed(self.name.clone(), changed));
    }

    fn resolve<T: FlagType>(
        &self,
        flag_key: &str,
        default_value: T,
        context: &EvaluationContext,
    ) -> ResolutionDetails<T> {
        let flags = self.flags.read();
        match flags.get(flag_key) {
            Some(flag) => flag.evaluate(flag_key, default_value, context),
            None => ResolutionDetails::error(
                flag_key,
                default_value,
                ErrorType::FlagNotFound,
                format!("flag '{}' not found", flag_key),
            ),
        }
    }
}

#[async_trait]
impl FeatureProvider for InMemoryProvider {
    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata::new(self.name.clone())
    }

    fn status(&self) -> ProviderStatus {
        *self.status.read()
    }

    async fn initialize(
        &self,
        _context: &EvaluationContext,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        *self.status.write() = ProviderStatus::Ready;
        Ok(())
    }

    async fn shutdown(&self, _cancel: &CancellationToken) -> Result<()> {
        *self.status.write() = ProviderStatus::NotReady;
        Ok(())
    }

    async fn resolve_boolean(
        &self,
        flag_key: &str,
        default_value: bool,
        context: &EvaluationContext,
        _cancel: &CancellationToken,
    ) -> Result<ResolutionDetails<bool>> {
        Ok(self.resolve(flag_key, default_value, context))
    }

    async fn resolve_string(
        &self,
        flag_key: &str,
        default_value: String,
        context: &EvaluationContext,
        _cancel: &CancellationToken,
    ) -> Result<ResolutionDetails<String>> {
        Ok(self.resolve(flag_key, default_value, context))
    }

    async fn resolve_integer(
        &self,
        flag_key: &str,
        default_value: i64,
        context: &EvaluationContext,
        _cancel: &CancellationToken,
    ) -> Result<ResolutionDetails<i64>> {
        Ok(self.resolve(flag_key, default_value, context))
    }

    async fn resolve_float(
        &self,
        flag_key: &str,
        default_value: f64,
        context: &EvaluationContext,
        _cancel: &CancellationToken,
    ) -> Result<ResolutionDetails<f64>> {
        Ok(self.resolve(flag_key, default_value, context))
    }

    async fn resolve_structure(
        &self,
        flag_key: &str,
        default_value: serde_json::Value,
        context: &EvaluationContext,
        _cancel: &CancellationToken,
    ) -> Result<ResolutionDetails<serde_json::Value>> {
        Ok(self.resolve(flag_key, default_value, context))
    }

    fn event_channel(&self) -> Option<EventChannel> {
        Some(self.events.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vexil_core::{FlagValue, ProviderEventType};

    fn provider() -> InMemoryProvider {
        let mut flags = HashMap::new();
        flags.insert("new-ui".to_string(), InMemoryFlag::boolean(true));
        flags.insert(
            "button-color".to_string(),
            InMemoryFlag::new(
                "red",
                vec![
                    ("red", FlagValue::string("red")),
                    ("blue", FlagValue::string("blue")),
                ],
            )
            .with_evaluator(|ctx| {
                (ctx.targeting_key() == Some("beta-user")).then(|| "blue".to_string())
            }),
        );
        flags.insert("old-ui".to_string(), InMemoryFlag::boolean(true).disabled());
        InMemoryProvider::new(flags)
    }

    #[tokio::test]
    async fn test_default_variant() {
        let provider = provider();
        let cancel = CancellationToken::new();
        let details = provider
            .resolve_boolean("new-ui", false, &EvaluationContext::new(), &cancel)
            .await
            .unwrap();

        assert!(details.value);
        assert_eq!(details.variant.as_deref(), Some("on"));
        assert_eq!(details.reason, Some(Reason::Static));
    }

    #[tokio::test]
    async fn test_targeting_match() {
        let provider = provider();
        let cancel = CancellationToken::new();
        let context = EvaluationContext::new().with_targeting_key("beta-user");
        let details = provider
            .resolve_string("button-color", "green".into(), &context, &cancel)
            .await
            .unwrap();

        assert_eq!(details.value, "blue");
        assert_eq!(details.reason, Some(Reason::TargetingMatch));
    }

    #[tokio::test]
    async fn test_disabled_and_missing_flags() {
        let provider = provider();
        let cancel = CancellationToken::new();
        let context = EvaluationContext::new();

        let details = provider
            .resolve_boolean("old-ui", false, &context, &cancel)
            .await
            .unwrap();
        assert!(!details.value);
        assert_eq!(details.reason, Some(Reason::Disabled));

        let details = provider
            .resolve_boolean("unknown", false, &context, &cancel)
            .await
            .unwrap();
        assert_eq!(details.error_type, Some(ErrorType::FlagNotFound));
    }

    #[tokio::test]
    async fn test_type_mismatch() {
        let provider = provider();
        let cancel = CancellationToken::new();
        let details = provider
            .resolve_integer("new-ui", 3, &EvaluationContext::new(), &cancel)
            .await
            .unwrap();

        assert_eq!(details.value, 3);
        assert_eq!(details.error_type, Some(ErrorType::TypeMismatch));
    }

    #[tokio::test]
    async fn test_update_flags_emits_configuration_changed() {
        let provider = provider();
        let channel = provider.event_channel().unwrap();

        let mut flags = HashMap::new();
        flags.insert("new-ui".to_string(), InMemoryFlag::boolean(false));
        provider.update_flags(flags);

        let event = channel.recv().await.unwrap();
        assert_eq!(event.event_type, ProviderEventType::ConfigurationChanged);
        assert_eq!(
            event.flags_changed,
            vec!["button-color", "new-ui", "old-ui"]
        );
    }
}
