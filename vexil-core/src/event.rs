//! Provider events and the channel they travel on

use crate::{ErrorType, FlagValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use uuid::Uuid;

/// Kind of provider event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderEventType {
    /// Provider became ready
    Ready,
    /// Provider entered an error state
    Error,
    /// Provider's cached state is stale
    Stale,
    /// Flag definitions changed
    ConfigurationChanged,
}

impl fmt::Display for ProviderEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ready => "PROVIDER_READY",
            Self::Error => "PROVIDER_ERROR",
            Self::Stale => "PROVIDER_STALE",
            Self::ConfigurationChanged => "PROVIDER_CONFIGURATION_CHANGED",
        };
        f.write_str(name)
    }
}

/// Event emitted by a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderEvent {
    /// Unique event ID
    pub id: Uuid,

    /// Timestamp when event was created
    pub timestamp: DateTime<Utc>,

    /// Name of the emitting provider
    pub provider_name: String,

    /// Event kind
    pub event_type: ProviderEventType,

    /// Optional human-readable message
    pub message: Option<String>,

    /// Error classification for error events
    pub error_type: Option<ErrorType>,

    /// Keys of flags that changed
    pub flags_changed: Vec<String>,

    /// Custom metadata
    pub metadata: HashMap<String, FlagValue>,
}

impl ProviderEvent {
    /// Create new event
    pub fn new(provider_name: impl Into<String>, event_type: ProviderEventType) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            provider_name: provider_name.into(),
            event_type,
            message: None,
            error_type: None,
            flags_changed: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    pub fn ready(provider_name: impl Into<String>) -> Self {
        Self::new(provider_name, ProviderEventType::Ready)
    }

    pub fn stale(provider_name: impl Into<String>) -> Self {
        Self::new(provider_name, ProviderEventType::Stale)
    }

    pub fn error(provider_name: impl Into<String>, error_type: ErrorType) -> Self {
        Self::new(provider_name, ProviderEventType::Error).with_error_type(error_type)
    }

    pub fn configuration_changed(provider_name: impl Into<String>, flags: Vec<String>) -> Self {
        Self::new(provider_name, ProviderEventType::ConfigurationChanged).with_flags_changed(flags)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_error_type(mut self, error_type: ErrorType) -> Self {
        self.error_type = Some(error_type);
        self
    }

    pub fn with_flags_changed(mut self, flags: Vec<String>) -> Self {
        self.flags_changed = flags;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<FlagValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Unbounded event channel owned by a provider.
///
/// Cloning shares the same queue: every clone can publish, and readers
/// compete for events (each event is delivered to exactly one reader).
#[derive(Clone)]
pub struct EventChannel {
    sender: mpsc::UnboundedSender<ProviderEvent>,
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<ProviderEvent>>>,
}

impl EventChannel {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
        }
    }

    /// Publish an event. Returns false if the channel has been closed.
    pub fn send(&self, event: ProviderEvent) -> bool {
        self.sender.send(event).is_ok()
    }

    /// Wait for the next event.
    ///
    /// Cancel-safe: dropping the future loses no event.
    pub async fn recv(&self) -> Option<ProviderEvent> {
        let mut receiver = self.receiver.lock().await;
        receiver.recv().await
    }

    /// Take the next event if one is queued and no other reader holds the channel.
    pub fn try_recv(&self) -> Option<ProviderEvent> {
        let mut receiver = self.receiver.try_lock().ok()?;
        receiver.try_recv().ok()
    }
}

impl Default for EventChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventChannel")
            .field("closed", &self.sender.is_closed())
            .finish()
    }
}
