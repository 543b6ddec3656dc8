//! Testing utilities for Vexil
//!
//! - [`MockProvider`] - scriptable provider recording every call
//! - [`RecordingHook`] - hook that logs each stage and can fail on demand
//! - [`InMemoryProvider`] - provider backed by an in-memory flag table

pub mod hook;
pub mod in_memory;
pub mod mock;

pub use hook::{HookLog, RecordingHook, hook_log};
pub use in_memory::{ContextEvaluator, InMemoryFlag, InMemoryProvider};
pub use mock::{MockOutcome, MockProvider};
