//! Feature provider trait and lifecycle status.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::{
    EvaluationContext, EventChannel, FlagValue, Hook, ResolutionDetails, Result,
};

/// Descriptive metadata of a provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderMetadata {
    /// Provider name, used to infer registration names.
    pub name: String,
}

impl ProviderMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Lifecycle status of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderStatus {
    /// Not yet initialized, or shut down
    #[default]
    NotReady,
    /// Able to evaluate flags
    Ready,
    /// Evaluating from cached, possibly outdated state
    Stale,
    /// Recoverable error
    Error,
    /// Unrecoverable error
    Fatal,
}

impl fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotReady => "NOT_READY",
            Self::Ready => "READY",
            Self::Stale => "STALE",
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
        };
        f.write_str(name)
    }
}

/// Feature flag provider trait.
///
/// Implemented by every backend and by the multi-provider facade itself.
#[async_trait]
pub trait FeatureProvider: Send + Sync {
    /// Provider metadata.
    fn metadata(&self) -> ProviderMetadata;

    /// Current status as reported by the provider.
    fn status(&self) -> ProviderStatus {
        ProviderStatus::Ready
    }

    /// Prepare the provider for evaluation.
    async fn initialize(
        &self,
        _context: &EvaluationContext,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        Ok(())
    }

    /// Release provider resources.
    async fn shutdown(&self, _cancel: &CancellationToken) -> Result<()> {
        Ok(())
    }

    async fn resolve_boolean(
        &self,
        flag_key: &str,
        default_value: bool,
        context: &EvaluationContext,
        cancel: &CancellationToken,
    ) -> Result<ResolutionDetails<bool>>;

    async fn resolve_string(
        &self,
        flag_key: &str,
        default_value: String,
        context: &EvaluationContext,
        cancel: &CancellationToken,
    ) -> Result<ResolutionDetails<String>>;

    async fn resolve_integer(
        &self,
        flag_key: &str,
        default_value: i64,
        context: &EvaluationContext,
        cancel: &CancellationToken,
    ) -> Result<ResolutionDetails<i64>>;

    async fn resolve_float(
        &self,
        flag_key: &str,
        default_value: f64,
        context: &EvaluationContext,
        cancel: &CancellationToken,
    ) -> Result<ResolutionDetails<f64>>;

    async fn resolve_structure(
        &self,
        flag_key: &str,
        default_value: serde_json::Value,
        context: &EvaluationContext,
        cancel: &CancellationToken,
    ) -> Result<ResolutionDetails<serde_json::Value>>;

    /// Channel the provider publishes lifecycle and change events on.
    fn event_channel(&self) -> Option<EventChannel> {
        None
    }

    /// Hooks the provider wants run around its own resolutions.
    fn hooks(&self) -> Vec<Arc<dyn Hook>> {
        Vec::new()
    }
}

/// Resolve a type-erased value by dispatching on the default's type.
pub async fn resolve_flag_value(
    provider: &dyn FeatureProvider,
    flag_key: &str,
    default_value: FlagValue,
    context: &EvaluationContext,
    cancel: &CancellationToken,
) -> Result<ResolutionDetails<FlagValue>> {
    let details = match default_value {
        FlagValue::Boolean(default) => provider
            .resolve_boolean(flag_key, default, context, cancel)
            .await?
            .into_flag_value(),
        FlagValue::String(default) => provider
            .resolve_string(flag_key, default, context, cancel)
            .await?
            .into_flag_value(),
        FlagValue::Integer(default) => provider
            .resolve_integer(flag_key, default, context, cancel)
            .await?
            .into_flag_value(),
        FlagValue::Float(default) => provider
            .resolve_float(flag_key, default, context, cancel)
            .await?
            .into_flag_value(),
        FlagValue::Structure(default) => provider
            .resolve_structure(flag_key, default, context, cancel)
            .await?
            .into_flag_value(),
    };
    Ok(details)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorType;

    struct FixedProvider;

    #[async_trait]
    impl FeatureProvider for FixedProvider {
        fn metadata(&self) -> ProviderMetadata {
            ProviderMetadata::new("fixed")
        }

        async fn resolve_boolean(
            &self,
            flag_key: &str,
            _default_value: bool,
            _context: &EvaluationContext,
            _cancel: &CancellationToken,
        ) -> Result<ResolutionDetails<bool>> {
            Ok(ResolutionDetails::success(flag_key, true))
        }

        async fn resolve_string(
            &self,
            flag_key: &str,
            _default_value: String,
            _context: &EvaluationContext,
            _cancel: &CancellationToken,
        ) -> Result<ResolutionDetails<String>> {
            Ok(ResolutionDetails::success(flag_key, "fixed".to_string()))
        }

        async fn resolve_integer(
            &self,
            flag_key: &str,
            default_value: i64,
            _context: &EvaluationContext,
            _cancel: &CancellationToken,
        ) -> Result<ResolutionDetails<i64>> {
            Ok(ResolutionDetails::error(
                flag_key,
                default_value,
                ErrorType::FlagNotFound,
                "no integers here",
            ))
        }

        async fn resolve_float(
            &self,
            flag_key: &str,
            _default_value: f64,
            _context: &EvaluationContext,
            _cancel: &CancellationToken,
        ) -> Result<ResolutionDetails<f64>> {
            Err(crate::ProviderError::general(format!("{} unsupported", flag_key)))
        }

        async fn resolve_structure(
            &self,
            flag_key: &str,
            default_value: serde_json::Value,
            _context: &EvaluationContext,
            _cancel: &CancellationToken,
        ) -> Result<ResolutionDetails<serde_json::Value>> {
            Ok(ResolutionDetails::success(flag_key, default_value))
        }
    }

    #[tokio::test]
    async fn test_resolve_flag_value_dispatches_on_type() {
        let provider = FixedProvider;
        let context = EvaluationContext::new();
        let cancel = CancellationToken::new();

        let details = resolve_flag_value(&provider, "a", FlagValue::Boolean(false), &context, &cancel)
            .await
            .unwrap();
        assert_eq!(details.value, FlagValue::Boolean(true));

        let details = resolve_flag_value(&provider, "b", FlagValue::Integer(7), &context, &cancel)
            .await
            .unwrap();
        assert_eq!(details.value, FlagValue::Integer(7));
        assert_eq!(details.error_type, Some(ErrorType::FlagNotFound));

        let result =
            resolve_flag_value(&provider, "c", FlagValue::Float(1.0), &context, &cancel).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_default_status_and_hooks() {
        let provider = FixedProvider;
        assert_eq!(provider.status(), ProviderStatus::Ready);
        assert!(provider.hooks().is_empty());
        assert!(provider.event_channel().is_none());
    }
}
