//! Evaluation strategies
//!
//! A strategy decides which children are asked, whether sequential dispatch
//! continues after each answer, and how the collected answers reduce to one
//! [`FinalResult`].
//!
//! # Shipped strategies
//!
//! - [`FirstMatchStrategy`] - sequential, stops at the first answer that is not `FlagNotFound`
//! - [`FirstSuccessfulStrategy`] - sequential, stops at the first success
//! - [`ComparisonStrategy`] - parallel, compares every successful answer

mod comparison;
mod first_match;
mod first_successful;

pub use comparison::{ComparisonStrategy, MismatchCallback};
pub use first_match::FirstMatchStrategy;
pub use first_successful::{ALL_PROVIDERS_FAILED_MESSAGE, FirstSuccessfulStrategy};

use std::fmt;
use std::sync::Arc;
use vexil_core::{
    ErrorType, EvaluationContext, FeatureProvider, FlagValue, FlagValueType, ProviderError,
    ProviderStatus, ResolutionDetails,
};

/// Message used when no child produced a usable answer
pub const NO_PROVIDERS_MESSAGE: &str = "No providers available or all providers failed";

/// How eligible children are dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// All eligible children at once
    Parallel,
    /// One child at a time, in registry order
    Sequential,
}

/// Per-call data shared by every child
#[derive(Debug, Clone)]
pub struct StrategyEvaluationContext {
    pub flag_key: String,
    pub value_type: FlagValueType,
    /// Facade name, used to attribute synthetic results
    pub multi_provider_name: String,
}

/// Per-child data for one call
#[derive(Clone)]
pub struct StrategyPerProviderContext {
    pub provider: Arc<dyn FeatureProvider>,
    pub provider_name: String,
    /// Snapshot taken when the call started
    pub provider_status: ProviderStatus,
    pub flag_key: String,
    pub value_type: FlagValueType,
}

impl fmt::Debug for StrategyPerProviderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyPerProviderContext")
            .field("provider_name", &self.provider_name)
            .field("provider_status", &self.provider_status)
            .field("flag_key", &self.flag_key)
            .field("value_type", &self.value_type)
            .finish()
    }
}

/// One child's answer
#[derive(Clone)]
pub struct ProviderResolutionResult {
    pub provider: Arc<dyn FeatureProvider>,
    pub provider_name: String,
    pub details: ResolutionDetails<FlagValue>,
    /// Set when the child call (or one of its hooks) failed outright
    pub error: Option<ProviderError>,
}

impl ProviderResolutionResult {
    pub fn new(
        provider: Arc<dyn FeatureProvider>,
        provider_name: impl Into<String>,
        details: ResolutionDetails<FlagValue>,
    ) -> Self {
        Self {
            provider,
            provider_name: provider_name.into(),
            details,
            error: None,
        }
    }

    /// Result for a failed call. Details carry the default value and the
    /// error's own classification (`General` unless it is a resolution error).
    pub fn failed(
        provider: Arc<dyn FeatureProvider>,
        provider_name: impl Into<String>,
        flag_key: &str,
        default_value: FlagValue,
        error: ProviderError,
    ) -> Self {
        let message = match &error {
            ProviderError::Resolution { message, .. } => message.clone(),
            other => other.to_string(),
        };
        let details =
            ResolutionDetails::error(flag_key, default_value, error.error_type(), message);
        Self {
            provider,
            provider_name: provider_name.into(),
            details,
            error: Some(error),
        }
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some() || self.details.error_type.is_some()
    }

    pub fn is_success(&self) -> bool {
        !self.has_error()
    }

    /// Promote this answer to the final result
    pub fn into_final_result(self, errors: Vec<ProviderErrorEntry>) -> FinalResult {
        FinalResult {
            details: self.details,
            provider: Some(self.provider),
            provider_name: self.provider_name,
            errors,
        }
    }
}

impl fmt::Debug for ProviderResolutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderResolutionResult")
            .field("provider_name", &self.provider_name)
            .field("details", &self.details)
            .field("error", &self.error)
            .finish()
    }
}

/// A child failure reported alongside the final result
#[derive(Debug, Clone)]
pub struct ProviderErrorEntry {
    pub provider_name: String,
    pub error: ProviderError,
}

/// Outcome of one facade evaluation
#[derive(Clone)]
pub struct FinalResult {
    pub details: ResolutionDetails<FlagValue>,
    /// Winning child, `None` when the facade produced the result itself
    pub provider: Option<Arc<dyn FeatureProvider>>,
    /// Winning child's name, or the facade's name
    pub provider_name: String,
    /// Child failures in registry order
    pub errors: Vec<ProviderErrorEntry>,
}

impl FinalResult {
    /// Result produced by the facade without a winning child
    pub fn synthetic(
        multi_provider_name: impl Into<String>,
        details: ResolutionDetails<FlagValue>,
        errors: Vec<ProviderErrorEntry>,
    ) -> Self {
        Self {
            details,
            provider: None,
            provider_name: multi_provider_name.into(),
            errors,
        }
    }

    /// `ProviderNotReady` result for when no child answered usefully
    pub fn not_ready(
        context: &StrategyEvaluationContext,
        default_value: FlagValue,
        errors: Vec<ProviderErrorEntry>,
    ) -> Self {
        Self::synthetic(
            context.multi_provider_name.clone(),
            ResolutionDetails::error(
                context.flag_key.clone(),
                default_value,
                ErrorType::ProviderNotReady,
                NO_PROVIDERS_MESSAGE,
            ),
            errors,
        )
    }
}

impl fmt::Debug for FinalResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FinalResult")
            .field("details", &self.details)
            .field("provider_name", &self.provider_name)
            .field("errors", &self.errors)
            .finish()
    }
}

/// Collect every failure in `results`, in order.
///
/// Caught errors are reported as-is; error results are wrapped with their
/// message ("unknown error" when the child gave none).
pub fn collect_provider_errors(results: &[ProviderResolutionResult]) -> Vec<ProviderErrorEntry> {
    results
        .iter()
        .filter_map(|result| {
            let error = match (&result.error, result.details.error_type) {
                (Some(error), _) => error.clone(),
                (None, Some(error_type)) => ProviderError::resolution(
                    error_type,
                    result
                        .details
                        .error_message
                        .clone()
                        .filter(|m| !m.is_empty())
                        .unwrap_or_else(|| "unknown error".to_string()),
                ),
                (None, None) => return None,
            };
            Some(ProviderErrorEntry {
                provider_name: result.provider_name.clone(),
                error,
            })
        })
        .collect()
}

/// Policy for dispatching an evaluation across children
pub trait EvaluationStrategy: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    fn run_mode(&self) -> RunMode;

    /// Whether a child is asked at all. Children that are not ready or fatal
    /// are skipped by default.
    fn should_evaluate_this_provider(
        &self,
        provider_context: &StrategyPerProviderContext,
        _evaluation_context: &EvaluationContext,
    ) -> bool {
        !matches!(
            provider_context.provider_status,
            ProviderStatus::NotReady | ProviderStatus::Fatal
        )
    }

    /// Sequential mode only: whether to ask the next child after `result`
    fn should_evaluate_next_provider(
        &self,
        _provider_context: &StrategyPerProviderContext,
        _evaluation_context: &EvaluationContext,
        _result: &ProviderResolutionResult,
    ) -> bool {
        true
    }

    /// Reduce the collected answers (registry order) to one result
    fn determine_final_result(
        &self,
        strategy_context: &StrategyEvaluationContext,
        flag_key: &str,
        default_value: &FlagValue,
        evaluation_context: &EvaluationContext,
        results: Vec<ProviderResolutionResult>,
    ) -> FinalResult;
}

impl fmt::Debug for dyn EvaluationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluationStrategy")
            .field("name", &self.name())
            .field("run_mode", &self.run_mode())
            .finish()
    }
}
