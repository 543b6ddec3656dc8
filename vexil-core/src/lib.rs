//! Vexil core types
//!
//! The contract every feature flag backend implements, and the value,
//! context, hook and event types that travel across it.
//!
//! # Features
//!
//! - **Provider contract** - [`FeatureProvider`] with typed `resolve_*` methods
//! - **Flag values** - [`FlagValue`] shared by every backend
//! - **Hooks** - [`Hook`] interceptors around each resolution
//! - **Events** - [`ProviderEvent`] published on an [`EventChannel`]
//! - **Logging** - `tracing` subscriber setup in [`logging`]
//!
//! # Quick Start
//!
//! ```
//! use vexil_core::*;
//!
//! let context = EvaluationContext::new()
//!     .with_targeting_key("user-123")
//!     .with_attribute("plan", "pro");
//!
//! let details = ResolutionDetails::success("new-ui", true).with_variant("on");
//! assert!(details.is_success());
//! assert_eq!(context.targeting_key(), Some("user-123"));
//! ```

pub mod context;
pub mod error;
pub mod event;
pub mod hook;
pub mod logging;
pub mod provider;
pub mod resolution;
pub mod value;

pub use context::EvaluationContext;
pub use error::{HookStage, ProviderError, Result};
pub use event::{EventChannel, ProviderEvent, ProviderEventType};
pub use hook::{Hook, HookContext, HookHints, HookResult};
pub use provider::{FeatureProvider, ProviderMetadata, ProviderStatus, resolve_flag_value};
pub use resolution::{ErrorType, Reason, ResolutionDetails};
pub use value::{FlagType, FlagValue, FlagValueType};

// Re-exported so callers do not need a direct tokio-util dependency
pub use tokio_util::sync::CancellationToken;
