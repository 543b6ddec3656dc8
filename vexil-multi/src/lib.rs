//! Multi-provider orchestration for Vexil
//!
//! Composes several feature flag providers into one virtual provider.
//!
//! ## Features
//!
//! - **Registry** - unique, ordered child names with deterministic collision handling
//! - **Strategies** - first match, first successful and comparison, or your own
//! - **Hooks** - before/after/error/finally around every child resolution
//! - **Lifecycle** - concurrent initialize/shutdown with aggregated failures
//! - **Events** - child events fanned into one channel, with aggregate status changes
//! - **Configuration** - strategy selection from TOML, JSON or environment variables
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vexil_core::*;
//! use vexil_multi::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = MultiProvider::builder()
//!         .provider(Arc::new(RemoteProvider::new()))
//!         .provider(Arc::new(LocalProvider::new()))
//!         .strategy(FirstSuccessfulStrategy::new())
//!         .build()?;
//!
//!     let cancel = CancellationToken::new();
//!     provider.initialize(&EvaluationContext::new(), &cancel).await?;
//!
//!     let context = EvaluationContext::new().with_targeting_key("user-123");
//!     let enabled = provider
//!         .resolve_boolean("new-checkout", false, &context, &cancel)
//!         .await?;
//!
//!     provider.dispose().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Comparing Providers
//!
//! ```rust,ignore
//! let strategy = ComparisonStrategy::new()
//!     .with_fallback_provider("remote")
//!     .with_mismatch_callback(|values| {
//!         tracing::warn!(?values, "Providers disagree");
//!     });
//! ```
//!
//! ## Events
//!
//! ```rust,ignore
//! let events = provider.event_channel().unwrap();
//! while let Some(event) = events.recv().await {
//!     println!("{} from {}", event.event_type, event.provider_name);
//! }
//! ```
//!
//! ## Configuration
//!
//! ```toml
//! name = "flags"
//!
//! [strategy]
//! type = "comparison"
//! fallback_provider = "remote"
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
mod events;
pub mod hooks;
pub mod lifecycle;
pub mod provider;
pub mod registry;
pub mod status;
pub mod strategy;

pub use config::{FileFormat, MultiProviderConfig, StrategyConfig, load_dotenv};
pub use dispatch::Dispatcher;
pub use error::{ConfigError, MultiProviderError, Result};
pub use hooks::{HookRunner, resolve_with_hooks};
pub use lifecycle::{LifecycleCoordinator, LifecyclePhase};
pub use provider::{DEFAULT_NAME, MultiProvider, MultiProviderBuilder};
pub use registry::{ProviderEntry, ProviderRegistry, RegisteredProvider, UNKNOWN_PROVIDER_NAME};
pub use status::{StatusChange, StatusTracker, aggregate_status};
pub use strategy::{
    ALL_PROVIDERS_FAILED_MESSAGE, ComparisonStrategy, EvaluationStrategy, FinalResult,
    FirstMatchStrategy, FirstSuccessfulStrategy, MismatchCallback, NO_PROVIDERS_MESSAGE,
    ProviderErrorEntry, ProviderResolutionResult, RunMode, StrategyEvaluationContext,
    StrategyPerProviderContext, collect_provider_errors,
};
