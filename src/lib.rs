// Vexil - Feature flag evaluation across multiple providers
//
// This library composes any number of feature flag backends into a single
// provider, with pluggable strategies, hooks and aggregated lifecycle events.

// Re-export core functionality
pub use vexil_core::*;

// Re-export the orchestration engine
pub use vexil_multi::{
    ComparisonStrategy, ConfigError, EvaluationStrategy, FinalResult, FirstMatchStrategy,
    FirstSuccessfulStrategy, MismatchCallback, MultiProvider, MultiProviderBuilder,
    MultiProviderConfig, MultiProviderError, ProviderEntry, ProviderErrorEntry,
    ProviderResolutionResult, RunMode, StrategyConfig, StrategyEvaluationContext,
    StrategyPerProviderContext,
};

pub use vexil_multi;

// Re-export optional crates
#[cfg(feature = "testing")]
pub use vexil_testing;

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        CancellationToken,
        ComparisonStrategy,
        ErrorType,
        EvaluationContext,
        EvaluationStrategy,
        FeatureProvider,
        FirstMatchStrategy,
        FirstSuccessfulStrategy,
        FlagValue,
        Hook,
        MultiProvider,
        ProviderEntry,
        ProviderEvent,
        ProviderEventType,
        ProviderStatus,
        ResolutionDetails,
    };
}
