//! Initialization and shutdown of all children
//!
//! ```text
//! NotReady --initialize--> Ready | Fatal
//! Ready | Fatal --shutdown--> NotReady | Fatal
//! ```
//!
//! Both operations run the children concurrently and collect every failure
//! into one [`ProviderError::Aggregate`].
//!
//! The transitions are gated on the coordinator's own [`LifecyclePhase`],
//! which only initialize and shutdown change. Child events move the
//! aggregate status but never the phase.

use crate::hooks::panic_message;
use crate::registry::{ProviderRegistry, RegisteredProvider};
use crate::status::StatusTracker;
use futures::FutureExt;
use futures::future::join_all;
use std::panic::AssertUnwindSafe;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info};
use vexil_core::{CancellationToken, EvaluationContext, ProviderError, ProviderStatus, Result};

/// Where the facade is in its own lifecycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LifecyclePhase {
    #[default]
    NotReady,
    Initializing,
    Ready,
    Fatal,
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotReady => "NOT_READY",
            Self::Initializing => "INITIALIZING",
            Self::Ready => "READY",
            Self::Fatal => "FATAL",
        };
        f.write_str(name)
    }
}

/// Serializes lifecycle transitions.
///
/// Initialize and shutdown each have their own lock; they do not exclude
/// each other.
#[derive(Debug, Default)]
pub struct LifecycleCoordinator {
    init_lock: Mutex<()>,
    shutdown_lock: Mutex<()>,
    phase: parking_lot::Mutex<LifecyclePhase>,
}

impl LifecycleCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> LifecyclePhase {
        *self.phase.lock()
    }

    /// Initialize every child. No-op unless the facade is `NotReady`.
    pub async fn initialize(
        &self,
        registry: &ProviderRegistry,
        status: &StatusTracker,
        context: &EvaluationContext,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let _guard = self.init_lock.lock().await;

        {
            let mut phase = self.phase.lock();
            if *phase != LifecyclePhase::NotReady {
                debug!(phase = %*phase, "Already initialized, skipping");
                return Ok(());
            }
            *phase = LifecyclePhase::Initializing;
        }

        info!(providers = registry.len(), "Initializing providers");

        let outcomes = join_all(registry.iter().map(|child| {
            run_guarded(child, child.provider().initialize(context, cancel))
        }))
        .await;

        let result = self.apply("initialize", registry, status, outcomes, |ok| {
            if ok {
                ProviderStatus::Ready
            } else {
                ProviderStatus::Fatal
            }
        });
        self.set_phase(if result.is_ok() {
            LifecyclePhase::Ready
        } else {
            LifecyclePhase::Fatal
        });
        result
    }

    /// Shut every child down. Only proceeds from `Ready` or `Fatal`.
    pub async fn shutdown(
        &self,
        registry: &ProviderRegistry,
        status: &StatusTracker,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let _guard = self.shutdown_lock.lock().await;

        let current = self.phase();
        if !matches!(current, LifecyclePhase::Ready | LifecyclePhase::Fatal) {
            debug!(phase = %current, "Not running, skipping shutdown");
            return Ok(());
        }

        info!(providers = registry.len(), "Shutting down providers");

        let outcomes = join_all(
            registry
                .iter()
                .map(|child| run_guarded(child, child.provider().shutdown(cancel))),
        )
        .await;

        let result = self.apply("shutdown", registry, status, outcomes, |ok| {
            if ok {
                ProviderStatus::NotReady
            } else {
                ProviderStatus::Fatal
            }
        });
        self.set_phase(if result.is_ok() {
            LifecyclePhase::NotReady
        } else {
            LifecyclePhase::Fatal
        });
        result
    }

    fn set_phase(&self, next: LifecyclePhase) {
        *self.phase.lock() = next;
    }

    fn apply(
        &self,
        operation: &str,
        registry: &ProviderRegistry,
        status: &StatusTracker,
        outcomes: Vec<(Arc<RegisteredProvider>, Result<()>)>,
        next_status: impl Fn(bool) -> ProviderStatus,
    ) -> Result<()> {
        let mut updates = Vec::with_capacity(outcomes.len());
        let mut failures = Vec::new();

        for (child, outcome) in &outcomes {
            updates.push((child.name(), next_status(outcome.is_ok())));
            if let Err(e) = outcome {
                error!(provider = %child.name(), operation, error = %e, "Provider lifecycle call failed");
                failures.push((child.name().to_string(), e.clone()));
            }
        }

        status.update_children(registry, &updates);

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ProviderError::Aggregate {
                operation: operation.to_string(),
                failures,
            })
        }
    }
}

async fn run_guarded(
    child: &Arc<RegisteredProvider>,
    call: impl Future<Output = Result<()>>,
) -> (Arc<RegisteredProvider>, Result<()>) {
    let outcome = match AssertUnwindSafe(call).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(panic) => Err(ProviderError::Task(panic_message(panic.as_ref()))),
    };
    (child.clone(), outcome)
}
