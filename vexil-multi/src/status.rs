//! Aggregate status of the facade
//!
//! The facade's status is a pure function of its children's statuses:
//!
//! | Children contain       | Facade     |
//! |------------------------|------------|
//! | any `Fatal`            | `Fatal`    |
//! | any `NotReady`         | `NotReady` |
//! | any `Error`            | `Error`    |
//! | any `Stale`            | `Stale`    |
//! | only `Ready`           | `Ready`    |
//! | nothing                | `NotReady` |

use crate::registry::ProviderRegistry;
use parking_lot::Mutex;
use tracing::debug;
use vexil_core::ProviderStatus;

type StatusRule = (fn(&[ProviderStatus]) -> bool, ProviderStatus);

fn any(statuses: &[ProviderStatus], status: ProviderStatus) -> bool {
    statuses.contains(&status)
}

fn any_fatal(statuses: &[ProviderStatus]) -> bool {
    any(statuses, ProviderStatus::Fatal)
}

fn any_not_ready(statuses: &[ProviderStatus]) -> bool {
    any(statuses, ProviderStatus::NotReady)
}

fn any_error(statuses: &[ProviderStatus]) -> bool {
    any(statuses, ProviderStatus::Error)
}

fn any_stale(statuses: &[ProviderStatus]) -> bool {
    any(statuses, ProviderStatus::Stale)
}

fn all_ready(statuses: &[ProviderStatus]) -> bool {
    !statuses.is_empty() && statuses.iter().all(|s| *s == ProviderStatus::Ready)
}

// Evaluated top-down, first match wins
const PRECEDENCE: [StatusRule; 5] = [
    (any_fatal, ProviderStatus::Fatal),
    (any_not_ready, ProviderStatus::NotReady),
    (any_error, ProviderStatus::Error),
    (any_stale, ProviderStatus::Stale),
    (all_ready, ProviderStatus::Ready),
];

/// Reduce child statuses to one facade status
pub fn aggregate_status(statuses: &[ProviderStatus]) -> ProviderStatus {
    PRECEDENCE
        .iter()
        .find(|(matches, _)| matches(statuses))
        .map(|(_, status)| *status)
        .unwrap_or(ProviderStatus::NotReady)
}

/// A recomputation that changed the facade status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub previous: ProviderStatus,
    pub current: ProviderStatus,
}

/// Holds the facade status.
///
/// Child updates and the recomputation happen under one lock, so the stored
/// value is always the aggregate of the latest child statuses.
#[derive(Debug, Default)]
pub struct StatusTracker {
    current: Mutex<ProviderStatus>,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> ProviderStatus {
        *self.current.lock()
    }

    /// Set one child's status and recompute
    pub fn update_child(
        &self,
        registry: &ProviderRegistry,
        name: &str,
        status: ProviderStatus,
    ) -> Option<StatusChange> {
        self.update_children(registry, &[(name, status)])
    }

    /// Set several children's statuses and recompute once
    pub fn update_children(
        &self,
        registry: &ProviderRegistry,
        updates: &[(&str, ProviderStatus)],
    ) -> Option<StatusChange> {
        let mut current = self.current.lock();

        for (name, status) in updates {
            if let Some(child) = registry.get(name) {
                child.set_status(*status);
            }
        }

        let next = aggregate_status(&registry.statuses());
        let previous = *current;
        *current = next;

        if previous == next {
            return None;
        }

        debug!(%previous, current = %next, "Aggregate status changed");
        Some(StatusChange {
            previous,
            current: next,
        })
    }

    /// Recompute from the registry without touching children
    pub fn recompute(&self, registry: &ProviderRegistry) -> Option<StatusChange> {
        self.update_children(registry, &[])
    }
}
