//! Provider registry
//!
//! Turns constructor entries into uniquely named children, in input order.
//! Both dispatch order and strategy tie-breaks follow this order.

use crate::{MultiProviderError, Result};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use vexil_core::{FeatureProvider, ProviderStatus};

/// Name used when neither an explicit nor a metadata name is available
pub const UNKNOWN_PROVIDER_NAME: &str = "UnknownProvider";

/// Constructor input: a provider and an optional explicit name
pub struct ProviderEntry {
    provider: Arc<dyn FeatureProvider>,
    name: Option<String>,
}

impl ProviderEntry {
    /// Entry named after the provider's metadata
    pub fn new(provider: Arc<dyn FeatureProvider>) -> Self {
        Self {
            provider,
            name: None,
        }
    }

    /// Entry with an explicit name
    pub fn named(name: impl Into<String>, provider: Arc<dyn FeatureProvider>) -> Self {
        Self {
            provider,
            name: Some(name.into()),
        }
    }

    fn base_name(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        let metadata = self.provider.metadata();
        if metadata.name.is_empty() {
            UNKNOWN_PROVIDER_NAME.to_string()
        } else {
            metadata.name
        }
    }
}

impl fmt::Debug for ProviderEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderEntry")
            .field("name", &self.name)
            .field("provider", &self.provider.metadata().name)
            .finish()
    }
}

/// Child provider registered under a unique name
pub struct RegisteredProvider {
    name: String,
    provider: Arc<dyn FeatureProvider>,
    status: RwLock<ProviderStatus>,
}

impl RegisteredProvider {
    fn new(name: String, provider: Arc<dyn FeatureProvider>) -> Self {
        Self {
            name,
            provider,
            status: RwLock::new(ProviderStatus::NotReady),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn provider(&self) -> &Arc<dyn FeatureProvider> {
        &self.provider
    }

    /// Snapshot of the tracked status
    pub fn status(&self) -> ProviderStatus {
        *self.status.read()
    }

    pub(crate) fn set_status(&self, status: ProviderStatus) {
        *self.status.write() = status;
    }
}

impl fmt::Debug for RegisteredProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredProvider")
            .field("name", &self.name)
            .field("status", &self.status())
            .finish()
    }
}

/// Ordered, immutable set of registered children
#[derive(Debug)]
pub struct ProviderRegistry {
    providers: Vec<Arc<RegisteredProvider>>,
}

impl ProviderRegistry {
    /// Register `entries`, resolving names.
    ///
    /// Entries are grouped by `explicit name ?? metadata name ?? UnknownProvider`.
    /// Two explicit names in one group is a conflict. In a group with several
    /// entries, unnamed entries become `base-1`, `base-2`, ... in input order.
    pub fn build(entries: Vec<ProviderEntry>) -> Result<Self> {
        if entries.is_empty() {
            return Err(MultiProviderError::NoProviders);
        }

        let keys: Vec<String> = entries.iter().map(ProviderEntry::base_name).collect();

        // (entries, explicit names) per key
        let mut groups: HashMap<&str, (usize, usize)> = HashMap::new();
        for (entry, key) in entries.iter().zip(&keys) {
            let group = groups.entry(key.as_str()).or_default();
            group.0 += 1;
            if entry.name.is_some() {
                group.1 += 1;
            }
        }

        for key in &keys {
            if groups[key.as_str()].1 > 1 {
                return Err(MultiProviderError::NamingConflict(key.clone()));
            }
        }

        let mut counters: HashMap<&str, usize> = HashMap::new();
        let mut seen = HashSet::new();
        let mut providers = Vec::with_capacity(entries.len());

        for (entry, key) in entries.into_iter().zip(&keys) {
            let name = if groups[key.as_str()].0 == 1 {
                key.clone()
            } else {
                match entry.name {
                    Some(name) => name,
                    None => {
                        let counter = counters.entry(key.as_str()).or_insert(0);
                        *counter += 1;
                        format!("{}-{}", key, counter)
                    }
                }
            };

            if !seen.insert(name.clone()) {
                return Err(MultiProviderError::NamingConflict(name));
            }

            debug!(provider = %name, "Registered provider");
            providers.push(Arc::new(RegisteredProvider::new(name, entry.provider)));
        }

        Ok(Self { providers })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<RegisteredProvider>> {
        self.providers.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<RegisteredProvider>> {
        self.providers.iter().find(|p| p.name == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name.clone()).collect()
    }

    /// Current status of every child, in registry order
    pub fn statuses(&self) -> Vec<ProviderStatus> {
        self.providers.iter().map(|p| p.status()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
