//! Provider error types.

use crate::ErrorType;
use std::fmt;
use thiserror::Error;

/// Result type for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Hook stage that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookStage {
    Before,
    After,
    Error,
    Finally,
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Before => "before",
            Self::After => "after",
            Self::Error => "error",
            Self::Finally => "finally",
        };
        f.write_str(name)
    }
}

/// Errors raised by providers, hooks and the multi-provider facade.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Resolution failed with a classified error.
    #[error("{error_type}: {message}")]
    Resolution {
        /// Classification.
        error_type: ErrorType,
        /// Message.
        message: String,
    },

    /// A hook failed.
    #[error("hook '{hook}' failed during {stage}: {message}")]
    Hook {
        /// Hook name.
        hook: String,
        /// Stage in which the hook failed.
        stage: HookStage,
        /// Message.
        message: String,
    },

    /// The object was used after disposal.
    #[error("object disposed: {0}")]
    Disposed(String),

    /// One or more providers failed during a lifecycle operation.
    #[error("{operation} failed for providers: {}", failed_names(.failures))]
    Aggregate {
        /// Operation name (`initialize`, `shutdown`).
        operation: String,
        /// Every failing provider with its error, in registry order.
        failures: Vec<(String, ProviderError)>,
    },

    /// The operation was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// A spawned task failed or panicked.
    #[error("task failed: {0}")]
    Task(String),

    /// Anything else.
    #[error("{0}")]
    Other(String),
}

fn failed_names(failures: &[(String, ProviderError)]) -> String {
    failures
        .iter()
        .map(|(name, error)| format!("{} ({})", name, error))
        .collect::<Vec<_>>()
        .join(", ")
}

impl ProviderError {
    /// Resolution error with the given classification.
    pub fn resolution(error_type: ErrorType, message: impl Into<String>) -> Self {
        Self::Resolution {
            error_type,
            message: message.into(),
        }
    }

    pub fn flag_not_found(flag_key: &str) -> Self {
        Self::resolution(ErrorType::FlagNotFound, format!("flag '{}' not found", flag_key))
    }

    pub fn general(message: impl Into<String>) -> Self {
        Self::resolution(ErrorType::General, message)
    }

    /// Classification of this error.
    pub fn error_type(&self) -> ErrorType {
        match self {
            Self::Resolution { error_type, .. } => *error_type,
            _ => ErrorType::General,
        }
    }

    /// Check if this error marks the provider as unrecoverable.
    pub fn is_fatal(&self) -> bool {
        self.error_type() == ErrorType::ProviderFatal
    }

    /// Names of failing providers for an aggregate error.
    pub fn failed_providers(&self) -> Vec<&str> {
        match self {
            Self::Aggregate { failures, .. } => {
                failures.iter().map(|(name, _)| name.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }
}

impl From<tokio::task::JoinError> for ProviderError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_cancelled() {
            Self::Cancelled
        } else {
            Self::Task(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_type_mapping() {
        assert_eq!(
            ProviderError::flag_not_found("x").error_type(),
            ErrorType::FlagNotFound
        );
        assert_eq!(
            ProviderError::Disposed("MultiProvider".into()).error_type(),
            ErrorType::General
        );
        assert!(ProviderError::resolution(ErrorType::ProviderFatal, "boom").is_fatal());
    }

    #[test]
    fn test_aggregate_display_names_every_provider() {
        let err = ProviderError::Aggregate {
            operation: "initialize".into(),
            failures: vec![
                ("alpha".into(), ProviderError::general("down")),
                ("beta".into(), ProviderError::Cancelled),
            ],
        };

        let display = err.to_string();
        assert!(display.contains("alpha"));
        assert!(display.contains("beta"));
        assert_eq!(err.failed_providers(), vec!["alpha", "beta"]);
    }
}
